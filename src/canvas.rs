// ============================================================================
// CANVAS — pixel buffers, layers, blend modes, and the compositor
// ============================================================================

use rayon::prelude::*;

/// Canvas size used when compositing with no visible layers.
pub const DEFAULT_CANVAS_WIDTH: u32 = 600;
pub const DEFAULT_CANVAS_HEIGHT: u32 = 600;

/// Default number of layer slots in a [`LayerStack`].
pub const DEFAULT_MAX_LAYERS: usize = 2;

// ============================================================================
// PIXEL BUFFER
// ============================================================================

/// An immutable RGBA8 raster. Channel order is R,G,B,A, row-major,
/// `pixels.len() == width * height * 4` always.
///
/// Every transform in the crate takes a `&PixelBuffer` and returns a new
/// buffer; no operation mutates one in place once it is constructed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

/// Error type for pixel buffer construction
#[derive(Debug)]
pub enum BufferError {
    /// Byte length does not match `width * height * 4`.
    InvalidLayout {
        width: u32,
        height: u32,
        len: usize,
    },
}

impl std::fmt::Display for BufferError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BufferError::InvalidLayout { width, height, len } => write!(
                f,
                "invalid buffer layout: {} bytes for {}x{} (expected {})",
                len,
                width,
                height,
                *width as usize * *height as usize * 4
            ),
        }
    }
}

impl std::error::Error for BufferError {}

impl PixelBuffer {
    /// Create a zero-filled (fully transparent black) buffer.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0u8; width as usize * height as usize * 4],
        }
    }

    /// Create a buffer filled with a single RGBA color.
    pub fn new_filled(width: u32, height: u32, color: [u8; 4]) -> Self {
        let count = width as usize * height as usize;
        let mut pixels = Vec::with_capacity(count * 4);
        for _ in 0..count {
            pixels.extend_from_slice(&color);
        }
        Self { width, height, pixels }
    }

    /// Wrap an existing RGBA byte vector, validating the layout invariant.
    pub fn from_raw(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, BufferError> {
        let expected = width as usize * height as usize * 4;
        if pixels.len() != expected {
            return Err(BufferError::InvalidLayout {
                width,
                height,
                len: pixels.len(),
            });
        }
        Ok(Self { width, height, pixels })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Raw RGBA bytes, row-major.
    pub fn as_raw(&self) -> &[u8] {
        &self.pixels
    }

    /// Consume the buffer and return its raw bytes.
    pub fn into_raw(self) -> Vec<u8> {
        self.pixels
    }

    /// RGBA of the pixel at (x, y). Panics out of bounds; callers are
    /// expected to stay inside `width`/`height`.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = (y as usize * self.width as usize + x as usize) * 4;
        [
            self.pixels[i],
            self.pixels[i + 1],
            self.pixels[i + 2],
            self.pixels[i + 3],
        ]
    }

    /// True iff every pixel satisfies R == G == B.
    ///
    /// Used to pick the grayscale correction path: a grayscale image gets a
    /// single luma curve instead of independent R/G/B curves.
    pub fn is_grayscale(&self) -> bool {
        self.pixels.chunks_exact(4).all(|px| px[0] == px[1] && px[1] == px[2])
    }

    /// True iff any pixel has alpha below 255.
    pub fn has_transparency(&self) -> bool {
        self.pixels.chunks_exact(4).any(|px| px[3] < 255)
    }

    /// Copy with every alpha byte forced to 255. RGB is untouched.
    pub fn alpha_stripped(&self) -> PixelBuffer {
        let mut pixels = self.pixels.clone();
        for px in pixels.chunks_exact_mut(4) {
            px[3] = 255;
        }
        Self {
            width: self.width,
            height: self.height,
            pixels,
        }
    }
}

// ============================================================================
// BLEND MODES
// ============================================================================

/// Per-channel combining function applied before alpha compositing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum BlendMode {
    #[default]
    Normal,
    Multiply,
    Screen,
    Overlay,
}

impl BlendMode {
    /// Returns all blend modes for UI display
    pub fn all() -> &'static [BlendMode] {
        &[
            BlendMode::Normal,
            BlendMode::Multiply,
            BlendMode::Screen,
            BlendMode::Overlay,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            BlendMode::Normal => "Normal",
            BlendMode::Multiply => "Multiply",
            BlendMode::Screen => "Screen",
            BlendMode::Overlay => "Overlay",
        }
    }

    /// Parse a mode from its lowercase name (CLI / config input).
    pub fn from_name(name: &str) -> Option<BlendMode> {
        match name.to_ascii_lowercase().as_str() {
            "normal" => Some(BlendMode::Normal),
            "multiply" => Some(BlendMode::Multiply),
            "screen" => Some(BlendMode::Screen),
            "overlay" => Some(BlendMode::Overlay),
            _ => None,
        }
    }

    /// Blend one channel in the 0–255 byte domain. The result is left as f32
    /// so the caller can finish the alpha-weighted mix before rounding once.
    pub fn blend_channel(self, dst: u8, src: u8) -> f32 {
        let d = dst as f32;
        let s = src as f32;
        match self {
            BlendMode::Normal => s,
            BlendMode::Multiply => d * s / 255.0,
            BlendMode::Screen => 255.0 - (255.0 - d) * (255.0 - s) / 255.0,
            BlendMode::Overlay => {
                if dst < 128 {
                    2.0 * d * s / 255.0
                } else {
                    255.0 - 2.0 * (255.0 - d) * (255.0 - s) / 255.0
                }
            }
        }
    }
}

// ============================================================================
// LAYERS
// ============================================================================

/// An independently editable raster slot.
///
/// `original` is the canonical source raster supplied by the loader; every
/// edit reads `original` and replaces `edited`, which is what the compositor
/// consumes. A freshly created layer is an empty placeholder until the
/// loader fills it.
#[derive(Clone, Debug)]
pub struct Layer {
    pub id: u32,
    pub original: Option<PixelBuffer>,
    pub edited: Option<PixelBuffer>,
    pub offset_x: i32,
    pub offset_y: i32,
    pub blend_mode: BlendMode,
    pub opacity: f32,
    pub has_alpha_channel: bool,
    pub alpha_channel_visible: bool,
    pub visible: bool,
    /// Bits per pixel reported by the loader's probe. Advisory metadata,
    /// displayed to the user but never consulted by any algorithm.
    pub color_depth: u32,
}

impl Layer {
    pub fn new(id: u32) -> Self {
        Self {
            id,
            original: None,
            edited: None,
            offset_x: 0,
            offset_y: 0,
            blend_mode: BlendMode::Normal,
            opacity: 1.0,
            has_alpha_channel: false,
            alpha_channel_visible: false,
            visible: true,
            color_depth: 0,
        }
    }
}

/// Error type for layer stack operations. These are all recoverable: the
/// stack's prior state is left unchanged and the caller decides how to
/// surface the failure.
#[derive(Debug, PartialEq, Eq)]
pub enum LayerError {
    /// An edit was requested with no active layer selected.
    NoActiveLayer,
    /// `add_layer` beyond the configured capacity.
    CapacityExceeded { max_layers: usize },
    /// The given layer id does not exist.
    NoSuchLayer(u32),
    /// The target layer has no raster yet.
    EmptyLayer(u32),
}

impl std::fmt::Display for LayerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LayerError::NoActiveLayer => write!(f, "no active layer selected"),
            LayerError::CapacityExceeded { max_layers } => {
                write!(f, "layer capacity of {} exceeded", max_layers)
            }
            LayerError::NoSuchLayer(id) => write!(f, "no layer with id {}", id),
            LayerError::EmptyLayer(id) => write!(f, "layer {} has no image data", id),
        }
    }
}

impl std::error::Error for LayerError {}

/// The ordered collection of layers and the only writer to them.
///
/// Everything else in the crate receives buffers by value or immutable
/// reference; mutation goes through this API exclusively.
pub struct LayerStack {
    layers: Vec<Layer>,
    active_id: Option<u32>,
    max_layers: usize,
    next_id: u32,
}

impl Default for LayerStack {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LAYERS)
    }
}

impl LayerStack {
    pub fn new(max_layers: usize) -> Self {
        Self {
            layers: Vec::new(),
            active_id: None,
            max_layers,
            next_id: 0,
        }
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn max_layers(&self) -> usize {
        self.max_layers
    }

    pub fn active_id(&self) -> Option<u32> {
        self.active_id
    }

    /// Append an empty layer slot. The first layer added becomes active.
    pub fn add_layer(&mut self) -> Result<u32, LayerError> {
        if self.layers.len() >= self.max_layers {
            return Err(LayerError::CapacityExceeded {
                max_layers: self.max_layers,
            });
        }
        let id = self.next_id;
        self.next_id += 1;
        self.layers.push(Layer::new(id));
        if self.layers.len() == 1 {
            self.active_id = Some(id);
        }
        Ok(id)
    }

    /// Select which layer edit operations target. `None` deselects.
    /// Selecting an unknown id is rejected and the previous selection kept.
    pub fn set_active(&mut self, id: Option<u32>) -> Result<(), LayerError> {
        if let Some(id) = id
            && !self.layers.iter().any(|l| l.id == id)
        {
            return Err(LayerError::NoSuchLayer(id));
        }
        self.active_id = id;
        Ok(())
    }

    pub fn layer(&self, id: u32) -> Option<&Layer> {
        self.layers.iter().find(|l| l.id == id)
    }

    fn layer_mut(&mut self, id: u32) -> Result<&mut Layer, LayerError> {
        self.layers
            .iter_mut()
            .find(|l| l.id == id)
            .ok_or(LayerError::NoSuchLayer(id))
    }

    pub fn active_layer(&self) -> Option<&Layer> {
        self.active_id.and_then(|id| self.layer(id))
    }

    pub(crate) fn active_layer_mut(&mut self) -> Result<&mut Layer, LayerError> {
        let id = self.active_id.ok_or(LayerError::NoActiveLayer)?;
        self.layer_mut(id)
    }

    /// Install a raster as the layer's canonical source. `edited` is
    /// mirrored from it, and the alpha flags are derived from the buffer's
    /// actual transparency.
    pub fn set_original(
        &mut self,
        id: u32,
        buffer: PixelBuffer,
        color_depth: u32,
    ) -> Result<(), LayerError> {
        let layer = self.layer_mut(id)?;
        let has_alpha = buffer.has_transparency();
        layer.edited = Some(buffer.clone());
        layer.original = Some(buffer);
        layer.has_alpha_channel = has_alpha;
        layer.alpha_channel_visible = has_alpha;
        layer.color_depth = color_depth;
        Ok(())
    }

    pub fn set_opacity(&mut self, id: u32, opacity: f32) -> Result<(), LayerError> {
        self.layer_mut(id)?.opacity = opacity.clamp(0.0, 1.0);
        Ok(())
    }

    pub fn set_blend_mode(&mut self, id: u32, mode: BlendMode) -> Result<(), LayerError> {
        self.layer_mut(id)?.blend_mode = mode;
        Ok(())
    }

    pub fn set_visible(&mut self, id: u32, visible: bool) -> Result<(), LayerError> {
        self.layer_mut(id)?.visible = visible;
        Ok(())
    }

    /// Show or hide the layer's transparency without touching `original`:
    /// `edited` becomes either the unmodified source or an alpha-stripped
    /// copy. No-op once the alpha channel has been permanently deleted.
    pub fn toggle_alpha_visibility(&mut self, id: u32) -> Result<(), LayerError> {
        let layer = self.layer_mut(id)?;
        if !layer.has_alpha_channel {
            return Ok(());
        }
        let original = layer.original.as_ref().ok_or(LayerError::EmptyLayer(id))?;
        let now_visible = !layer.alpha_channel_visible;
        layer.edited = Some(if now_visible {
            original.clone()
        } else {
            original.alpha_stripped()
        });
        layer.alpha_channel_visible = now_visible;
        Ok(())
    }

    /// Permanently remove transparency: both `original` and `edited` are
    /// replaced by alpha-stripped copies and further toggling is disabled.
    pub fn delete_alpha_channel(&mut self, id: u32) -> Result<(), LayerError> {
        let layer = self.layer_mut(id)?;
        let stripped = layer
            .original
            .as_ref()
            .ok_or(LayerError::EmptyLayer(id))?
            .alpha_stripped();
        layer.edited = Some(stripped.clone());
        layer.original = Some(stripped);
        layer.has_alpha_channel = false;
        layer.alpha_channel_visible = false;
        Ok(())
    }

    /// Fill the active layer with a uniform color. The result replaces
    /// `edited` and has the dimensions of the layer's source raster.
    pub fn fill_active(&mut self, color: [u8; 4]) -> Result<(), LayerError> {
        let layer = self.active_layer_mut()?;
        let id = layer.id;
        let original = layer.original.as_ref().ok_or(LayerError::EmptyLayer(id))?;
        let (w, h) = (original.width(), original.height());
        layer.edited = Some(PixelBuffer::new_filled(w, h, color));
        Ok(())
    }

    /// Replace the active layer's `edited` buffer with the result of an edit
    /// operation (convolution, correction). Used by the `ops` modules.
    pub(crate) fn replace_active_edited(&mut self, buffer: PixelBuffer) -> Result<(), LayerError> {
        self.active_layer_mut()?.edited = Some(buffer);
        Ok(())
    }

    /// Move a layer to a new position in the stacking order. Ids are stable
    /// identities and are NOT renumbered by a move. Out-of-range indices are
    /// tolerated as a silent no-op so a stale UI request cannot corrupt the
    /// stack.
    pub fn move_layer(&mut self, from: usize, to: usize) {
        if from >= self.layers.len() || to >= self.layers.len() {
            return;
        }
        let layer = self.layers.remove(from);
        self.layers.insert(to, layer);
    }

    /// Delete a layer. Survivors are re-indexed so ids stay contiguous from
    /// 0 in stacking order, and the active id resets to the first remaining
    /// layer (or none).
    pub fn remove_layer(&mut self, id: u32) -> Result<(), LayerError> {
        let pos = self
            .layers
            .iter()
            .position(|l| l.id == id)
            .ok_or(LayerError::NoSuchLayer(id))?;
        self.layers.remove(pos);
        for (index, layer) in self.layers.iter_mut().enumerate() {
            layer.id = index as u32;
        }
        self.next_id = self.layers.len() as u32;
        self.active_id = if self.layers.is_empty() { None } else { Some(0) };
        Ok(())
    }

    // ========================================================================
    // COMPOSITOR
    // ========================================================================

    /// Merge all visible layers, bottom to top, into one buffer.
    ///
    /// The canvas is sized to the largest visible layer and every layer is
    /// centered on it; compositing is standard "over" with the layer's blend
    /// mode applied per channel first. Rows are processed in parallel, layers
    /// sequentially (each layer pass reads the previous pass's output).
    pub fn composite(&self) -> PixelBuffer {
        let visible: Vec<&Layer> = self
            .layers
            .iter()
            .filter(|l| l.visible && l.edited.is_some())
            .collect();

        if visible.is_empty() {
            return PixelBuffer::new(DEFAULT_CANVAS_WIDTH, DEFAULT_CANVAS_HEIGHT);
        }

        let canvas_w = visible
            .iter()
            .map(|l| l.edited.as_ref().unwrap().width())
            .max()
            .unwrap();
        let canvas_h = visible
            .iter()
            .map(|l| l.edited.as_ref().unwrap().height())
            .max()
            .unwrap();

        let stride = canvas_w as usize * 4;
        let mut out = vec![0u8; canvas_h as usize * stride];

        for layer in visible {
            let src = layer.edited.as_ref().unwrap();
            let (lw, lh) = (src.width(), src.height());
            // Centering is always computed from the sizes; the stored
            // per-layer offsets are a viewport concern, not a compositing one.
            let off_x = ((canvas_w - lw) / 2) as usize;
            let off_y = ((canvas_h - lh) / 2) as usize;
            let src_raw = src.as_raw();
            let src_stride = lw as usize * 4;
            let opacity = layer.opacity.clamp(0.0, 1.0);
            let mode = layer.blend_mode;

            out.par_chunks_mut(stride).enumerate().for_each(|(dy, dst_row)| {
                if dy < off_y || dy >= off_y + lh as usize {
                    return;
                }
                let sy = dy - off_y;
                let src_row = &src_raw[sy * src_stride..(sy + 1) * src_stride];
                for sx in 0..lw as usize {
                    let si = sx * 4;
                    let di = (off_x + sx) * 4;

                    let src_a = (src_row[si + 3] as f32 / 255.0) * opacity;
                    if src_a <= 0.0 {
                        continue; // nothing to contribute, leave dst alone
                    }
                    let dst_a = dst_row[di + 3] as f32 / 255.0;
                    let out_a = src_a + dst_a * (1.0 - src_a);

                    for c in 0..3 {
                        let blended = mode.blend_channel(dst_row[di + c], src_row[si + c]);
                        let comp = (1.0 - src_a) * dst_row[di + c] as f32 + src_a * blended;
                        dst_row[di + c] = comp.round().clamp(0.0, 255.0) as u8;
                    }
                    dst_row[di + 3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
                }
            });
        }

        PixelBuffer::from_raw(canvas_w, canvas_h, out)
            .expect("composite output matches canvas dimensions")
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(w: u32, h: u32, color: [u8; 4]) -> PixelBuffer {
        PixelBuffer::new_filled(w, h, color)
    }

    #[test]
    fn from_raw_rejects_bad_length() {
        let err = PixelBuffer::from_raw(2, 2, vec![0u8; 15]).unwrap_err();
        match err {
            BufferError::InvalidLayout { width: 2, height: 2, len: 15 } => {}
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(PixelBuffer::from_raw(2, 2, vec![0u8; 16]).is_ok());
    }

    #[test]
    fn new_buffer_is_transparent() {
        let buf = PixelBuffer::new(3, 2);
        assert_eq!(buf.as_raw(), &[0u8; 24][..]);
    }

    #[test]
    fn grayscale_classification() {
        assert!(solid(2, 2, [80, 80, 80, 255]).is_grayscale());
        assert!(!solid(2, 2, [80, 81, 80, 255]).is_grayscale());
    }

    #[test]
    fn alpha_stripping_only_touches_alpha() {
        let src = solid(2, 2, [10, 20, 30, 100]);
        let stripped = src.alpha_stripped();
        for px in stripped.as_raw().chunks_exact(4) {
            assert_eq!(px, &[10, 20, 30, 255]);
        }
        // Source is untouched
        assert_eq!(src.pixel(0, 0)[3], 100);
    }

    #[test]
    fn add_layer_respects_capacity() {
        let mut stack = LayerStack::new(2);
        assert_eq!(stack.add_layer().unwrap(), 0);
        assert_eq!(stack.add_layer().unwrap(), 1);
        let err = stack.add_layer().unwrap_err();
        assert_eq!(err, LayerError::CapacityExceeded { max_layers: 2 });
        assert_eq!(stack.len(), 2);
    }

    #[test]
    fn first_layer_becomes_active() {
        let mut stack = LayerStack::default();
        assert_eq!(stack.active_id(), None);
        stack.add_layer().unwrap();
        assert_eq!(stack.active_id(), Some(0));
    }

    #[test]
    fn remove_layer_reindexes_and_resets_active() {
        let mut stack = LayerStack::new(2);
        let a = stack.add_layer().unwrap();
        let b = stack.add_layer().unwrap();
        stack.set_original(b, solid(1, 1, [5, 5, 5, 255]), 24).unwrap();
        stack.remove_layer(a).unwrap();
        assert_eq!(stack.len(), 1);
        assert_eq!(stack.layers()[0].id, 0);
        assert_eq!(stack.active_id(), Some(0));
        // The survivor kept its raster through the re-index
        assert!(stack.layers()[0].original.is_some());

        stack.remove_layer(0).unwrap();
        assert_eq!(stack.active_id(), None);
    }

    #[test]
    fn move_layer_out_of_range_is_a_noop() {
        let mut stack = LayerStack::new(2);
        stack.add_layer().unwrap();
        stack.add_layer().unwrap();
        stack.move_layer(0, 5);
        stack.move_layer(7, 0);
        assert_eq!(stack.layers()[0].id, 0);
        assert_eq!(stack.layers()[1].id, 1);

        stack.move_layer(0, 1);
        // Ids are stable identities; only positions changed
        assert_eq!(stack.layers()[0].id, 1);
        assert_eq!(stack.layers()[1].id, 0);
    }

    #[test]
    fn toggle_alpha_visibility_round_trips() {
        let mut stack = LayerStack::default();
        let id = stack.add_layer().unwrap();
        stack.set_original(id, solid(2, 2, [9, 9, 9, 120]), 32).unwrap();
        assert!(stack.layer(id).unwrap().has_alpha_channel);

        stack.toggle_alpha_visibility(id).unwrap();
        let layer = stack.layer(id).unwrap();
        assert!(!layer.alpha_channel_visible);
        assert_eq!(layer.edited.as_ref().unwrap().pixel(0, 0)[3], 255);
        assert_eq!(layer.original.as_ref().unwrap().pixel(0, 0)[3], 120);

        stack.toggle_alpha_visibility(id).unwrap();
        assert_eq!(
            stack.layer(id).unwrap().edited.as_ref().unwrap().pixel(0, 0)[3],
            120
        );
    }

    #[test]
    fn delete_alpha_channel_is_permanent() {
        let mut stack = LayerStack::default();
        let id = stack.add_layer().unwrap();
        stack.set_original(id, solid(2, 2, [9, 9, 9, 120]), 32).unwrap();
        stack.delete_alpha_channel(id).unwrap();

        let layer = stack.layer(id).unwrap();
        assert!(!layer.has_alpha_channel);
        assert_eq!(layer.original.as_ref().unwrap().pixel(1, 1)[3], 255);
        assert_eq!(layer.edited.as_ref().unwrap().pixel(1, 1)[3], 255);

        // Toggling after deletion no longer does anything
        stack.toggle_alpha_visibility(id).unwrap();
        assert_eq!(
            stack.layer(id).unwrap().edited.as_ref().unwrap().pixel(0, 0)[3],
            255
        );
    }

    #[test]
    fn fill_requires_an_active_layer() {
        let mut stack = LayerStack::default();
        let id = stack.add_layer().unwrap();
        stack.set_original(id, solid(2, 2, [1, 2, 3, 255]), 24).unwrap();
        stack.set_active(None).unwrap();
        assert_eq!(
            stack.fill_active([255, 0, 0, 255]).unwrap_err(),
            LayerError::NoActiveLayer
        );

        stack.set_active(Some(id)).unwrap();
        stack.fill_active([255, 0, 0, 255]).unwrap();
        let layer = stack.layer(id).unwrap();
        assert_eq!(layer.edited.as_ref().unwrap().pixel(1, 0), [255, 0, 0, 255]);
        // Fill writes the edited buffer only
        assert_eq!(layer.original.as_ref().unwrap().pixel(1, 0), [1, 2, 3, 255]);
    }

    #[test]
    fn composite_with_no_layers_is_default_transparent_canvas() {
        let stack = LayerStack::default();
        let out = stack.composite();
        assert_eq!(out.width(), DEFAULT_CANVAS_WIDTH);
        assert_eq!(out.height(), DEFAULT_CANVAS_HEIGHT);
        assert!(out.as_raw().iter().all(|&b| b == 0));
    }

    #[test]
    fn opaque_normal_top_layer_wins() {
        let mut stack = LayerStack::new(2);
        let base = stack.add_layer().unwrap();
        let top = stack.add_layer().unwrap();
        stack.set_original(base, solid(4, 4, [200, 10, 10, 255]), 24).unwrap();
        stack.set_original(top, solid(4, 4, [10, 10, 200, 255]), 24).unwrap();

        let out = stack.composite();
        assert_eq!(out, solid(4, 4, [10, 10, 200, 255]));
    }

    #[test]
    fn zero_opacity_layer_contributes_nothing() {
        for mode in BlendMode::all() {
            let mut stack = LayerStack::new(2);
            let base = stack.add_layer().unwrap();
            let top = stack.add_layer().unwrap();
            stack.set_original(base, solid(3, 3, [40, 90, 140, 255]), 24).unwrap();
            stack.set_original(top, solid(3, 3, [255, 255, 0, 255]), 24).unwrap();
            stack.set_opacity(top, 0.0).unwrap();
            stack.set_blend_mode(top, *mode).unwrap();

            assert_eq!(
                stack.composite(),
                solid(3, 3, [40, 90, 140, 255]),
                "mode {:?}",
                mode
            );
        }
    }

    #[test]
    fn smaller_layer_is_centered() {
        let mut stack = LayerStack::new(2);
        let base = stack.add_layer().unwrap();
        let top = stack.add_layer().unwrap();
        stack.set_original(base, solid(5, 5, [0, 0, 0, 255]), 24).unwrap();
        stack.set_original(top, solid(1, 1, [255, 255, 255, 255]), 24).unwrap();

        let out = stack.composite();
        assert_eq!(out.pixel(2, 2), [255, 255, 255, 255]);
        assert_eq!(out.pixel(0, 0), [0, 0, 0, 255]);
        assert_eq!(out.pixel(4, 4), [0, 0, 0, 255]);
    }

    #[test]
    fn multiply_blend_matches_formula() {
        let mut stack = LayerStack::new(2);
        let base = stack.add_layer().unwrap();
        let top = stack.add_layer().unwrap();
        stack.set_original(base, solid(2, 2, [100, 200, 50, 255]), 24).unwrap();
        stack.set_original(top, solid(2, 2, [128, 128, 128, 255]), 24).unwrap();
        stack.set_blend_mode(top, BlendMode::Multiply).unwrap();

        let out = stack.composite();
        // dst*src/255, rounded
        assert_eq!(out.pixel(0, 0), [50, 100, 25, 255]);
    }

    #[test]
    fn overlay_threshold_switches_at_128() {
        // dst < 128: 2*d*s/255; dst >= 128: inverted screen form
        assert_eq!(BlendMode::Overlay.blend_channel(100, 100).round() as u8, 78);
        assert_eq!(BlendMode::Overlay.blend_channel(200, 100).round() as u8, 188);
    }

    #[test]
    fn half_opacity_normal_mixes_toward_source() {
        let mut stack = LayerStack::new(2);
        let base = stack.add_layer().unwrap();
        let top = stack.add_layer().unwrap();
        stack.set_original(base, solid(1, 1, [0, 0, 0, 255]), 24).unwrap();
        stack.set_original(top, solid(1, 1, [255, 255, 255, 255]), 24).unwrap();
        stack.set_opacity(top, 0.5).unwrap();

        let out = stack.composite();
        let px = out.pixel(0, 0);
        assert_eq!(&px[0..3], &[128, 128, 128]);
        assert_eq!(px[3], 255);
    }

    #[test]
    fn hidden_layer_is_skipped() {
        let mut stack = LayerStack::new(2);
        let base = stack.add_layer().unwrap();
        let top = stack.add_layer().unwrap();
        stack.set_original(base, solid(2, 2, [7, 7, 7, 255]), 24).unwrap();
        stack.set_original(top, solid(2, 2, [250, 250, 250, 255]), 24).unwrap();
        stack.set_visible(top, false).unwrap();

        assert_eq!(stack.composite(), solid(2, 2, [7, 7, 7, 255]));
    }
}
