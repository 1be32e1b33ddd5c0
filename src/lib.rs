// ============================================================================
// gb7studio — two-layer raster editing engine with a custom GB7 codec
// ============================================================================
//
// The crate is the pixel-processing core of a layered image editor: the
// layer model and alpha-blend compositor, 3x3 convolution filtering,
// two-point tonal-curve correction with histograms, and the bit-exact GB7
// raster format. Presentation (canvas drawing, viewport scaling, dialogs)
// lives outside this crate and only ever exchanges `PixelBuffer`s with it.

pub mod canvas;
pub mod cli;
pub mod gb7;
pub mod io;
pub mod logger;
pub mod ops;

pub use canvas::{BlendMode, Layer, LayerStack, PixelBuffer};
