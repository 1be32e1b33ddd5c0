// ============================================================================
// OPS — per-pixel edit operations applied to the active layer
// ============================================================================

pub mod convolution;
pub mod correction;
pub mod histogram;
