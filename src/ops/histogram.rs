// ============================================================================
// HISTOGRAMS — per-channel and grayscale frequency tables
// ============================================================================

use crate::canvas::PixelBuffer;

/// One of the four raw channels of an RGBA buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Channel {
    R,
    G,
    B,
    A,
}

impl Channel {
    fn index(self) -> usize {
        match self {
            Channel::R => 0,
            Channel::G => 1,
            Channel::B => 2,
            Channel::A => 3,
        }
    }
}

/// Count how many pixels hold each 0–255 value in one channel. Every pixel
/// is counted, including fully transparent ones.
pub fn channel_histogram(buffer: &PixelBuffer, channel: Channel) -> [u32; 256] {
    let mut histogram = [0u32; 256];
    let index = channel.index();
    for px in buffer.as_raw().chunks_exact(4) {
        histogram[px[index] as usize] += 1;
    }
    histogram
}

/// Grayscale frequency table using the simple channel average
/// `round((R+G+B)/3)`.
///
/// This deliberately differs from the luma weights the correction path
/// uses; the curve editor displays this average-based histogram next to its
/// weighted-luma curve, and the two formulas must not be unified.
pub fn grayscale_histogram(buffer: &PixelBuffer) -> [u32; 256] {
    let mut histogram = [0u32; 256];
    for px in buffer.as_raw().chunks_exact(4) {
        let gray = ((px[0] as u32 + px[1] as u32 + px[2] as u32) as f32 / 3.0).round() as usize;
        histogram[gray] += 1;
    }
    histogram
}

// ============================================================================
// TESTS
// ============================================================================
