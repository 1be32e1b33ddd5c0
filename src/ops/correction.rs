// ============================================================================
// TONAL CORRECTION — two-point curves applied through 256-entry LUTs
// ============================================================================

use crate::canvas::{LayerError, LayerStack, PixelBuffer};

/// One end of a correction curve, both coordinates in the 0–255 byte domain.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ControlPoint {
    pub input: u8,
    pub output: u8,
}

impl ControlPoint {
    pub fn new(input: u8, output: u8) -> Self {
        Self { input, output }
    }
}

/// Error type for curve construction
#[derive(Debug, PartialEq, Eq)]
pub enum CurveError {
    /// The left point must be strictly left of the right point. Violating
    /// pairs are rejected outright, never silently reordered.
    InvalidControlPoints { p1: ControlPoint, p2: ControlPoint },
}

impl std::fmt::Display for CurveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CurveError::InvalidControlPoints { p1, p2 } => write!(
                f,
                "invalid curve control points: p1.input ({}) must be < p2.input ({})",
                p1.input, p2.input
            ),
        }
    }
}

impl std::error::Error for CurveError {}

/// A two-point piecewise-linear tonal curve.
///
/// Inputs at or below `p1.input` map to `p1.output`, inputs at or above
/// `p2.input` map to `p2.output`, and the span between is linear.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Curve {
    p1: ControlPoint,
    p2: ControlPoint,
}

impl Curve {
    pub fn new(p1: ControlPoint, p2: ControlPoint) -> Result<Self, CurveError> {
        if p1.input >= p2.input {
            return Err(CurveError::InvalidControlPoints { p1, p2 });
        }
        Ok(Self { p1, p2 })
    }

    /// The identity curve (0,0)-(255,255).
    pub fn identity() -> Self {
        Self {
            p1: ControlPoint::new(0, 0),
            p2: ControlPoint::new(255, 255),
        }
    }

    /// Expand the curve into a full 256-entry lookup table.
    pub fn build_lut(&self) -> [u8; 256] {
        let mut lut = [0u8; 256];
        let (p1, p2) = (self.p1, self.p2);
        let span = (p2.input - p1.input) as f32;
        for (i, entry) in lut.iter_mut().enumerate() {
            let i = i as u8;
            *entry = if i <= p1.input {
                p1.output
            } else if i >= p2.input {
                p2.output
            } else {
                let t = (i - p1.input) as f32 / span;
                (p1.output as f32 + t * (p2.output as f32 - p1.output as f32)).round() as u8
            };
        }
        lut
    }
}

/// The set of curves for one correction pass.
///
/// When `gray` is present the pass runs in grayscale mode: luma is computed
/// per pixel, mapped through the gray curve, and written identically to R, G
/// and B (collapsing any color difference). Otherwise the R/G/B curves apply
/// independently and a missing channel passes through. The alpha curve, if
/// any, applies in either mode. Callers pick the mode from the source
/// image's classification ([`PixelBuffer::is_grayscale`]).
#[derive(Clone, Copy, Debug, Default)]
pub struct CurveSet {
    pub r: Option<Curve>,
    pub g: Option<Curve>,
    pub b: Option<Curve>,
    pub gray: Option<Curve>,
    pub alpha: Option<Curve>,
}

/// Luma weights used by the grayscale correction path (ITU-R BT.601).
/// Note: histograms use the plain (R+G+B)/3 average instead; the two
/// formulas are intentionally different and must not be unified.
fn luma(r: u8, g: u8, b: u8) -> u8 {
    (0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32)
        .round()
        .clamp(0.0, 255.0) as u8
}

/// Apply a set of correction curves to a buffer. Pure: the input is never
/// mutated and the output has identical dimensions.
pub fn apply_curves(src: &PixelBuffer, curves: &CurveSet) -> PixelBuffer {
    let lut_r = curves.r.map(|c| c.build_lut());
    let lut_g = curves.g.map(|c| c.build_lut());
    let lut_b = curves.b.map(|c| c.build_lut());
    let lut_gray = curves.gray.map(|c| c.build_lut());
    let lut_alpha = curves.alpha.map(|c| c.build_lut());

    let mut dst = Vec::with_capacity(src.as_raw().len());
    for px in src.as_raw().chunks_exact(4) {
        let (r, g, b, a) = (px[0], px[1], px[2], px[3]);

        if let Some(lut) = &lut_gray {
            let corrected = lut[luma(r, g, b) as usize];
            dst.extend_from_slice(&[corrected, corrected, corrected]);
        } else {
            dst.push(lut_r.as_ref().map_or(r, |lut| lut[r as usize]));
            dst.push(lut_g.as_ref().map_or(g, |lut| lut[g as usize]));
            dst.push(lut_b.as_ref().map_or(b, |lut| lut[b as usize]));
        }
        dst.push(lut_alpha.as_ref().map_or(a, |lut| lut[a as usize]));
    }

    PixelBuffer::from_raw(src.width(), src.height(), dst)
        .expect("correction preserves dimensions")
}

/// Correct the active layer's source raster and store the result as its
/// edited buffer.
pub fn apply_to_active(stack: &mut LayerStack, curves: &CurveSet) -> Result<(), LayerError> {
    let layer = stack.active_layer_mut()?;
    let id = layer.id;
    let source = layer.original.as_ref().ok_or(LayerError::EmptyLayer(id))?;
    let corrected = apply_curves(source, curves);
    stack.replace_active_edited(corrected)
}

// ============================================================================
// TESTS
// ============================================================================
