// ============================================================================
// GB7 CODEC — 7-bit grayscale raster with optional 1-bit transparency mask
// ============================================================================
//
// Wire layout, fixed 12-byte header then one byte per pixel, row-major:
//
//   bytes 0–3   magic  47 42 37 1D
//   byte  4     format version, 0x01
//   byte  5     mask flag: 0x01 when a transparency bit is embedded
//   bytes 6–7   width, big-endian u16
//   bytes 8–9   height, big-endian u16
//   bytes 10–11 reserved, written as zero
//   payload     low 7 bits = gray >> 1; top bit = mask (alpha > 0) when the
//               mask flag is set, otherwise always 0

use crate::canvas::PixelBuffer;

pub const GB7_MAGIC: [u8; 4] = [0x47, 0x42, 0x37, 0x1D];
pub const GB7_VERSION: u8 = 0x01;
pub const GB7_HEADER_LEN: usize = 12;

/// Largest dimension encodable in the u16 header fields.
pub const GB7_MAX_DIM: u32 = u16::MAX as u32;

/// Error type for GB7 encode/decode. All failures are fatal for the call;
/// no partially written buffer is ever returned.
#[derive(Debug)]
pub enum Gb7Error {
    /// Magic or version mismatch on decode, or a header shorter than 12
    /// bytes.
    InvalidHeader(String),
    /// Payload shorter than `width * height`.
    TruncatedPayload { expected: usize, actual: usize },
    /// Encode input larger than the u16 header fields can carry.
    DimensionsTooLarge { width: u32, height: u32 },
}

impl std::fmt::Display for Gb7Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Gb7Error::InvalidHeader(msg) => write!(f, "invalid GB7 header: {}", msg),
            Gb7Error::TruncatedPayload { expected, actual } => write!(
                f,
                "truncated GB7 payload: {} pixels declared, {} present",
                expected, actual
            ),
            Gb7Error::DimensionsTooLarge { width, height } => write!(
                f,
                "image {}x{} exceeds the GB7 limit of {}x{}",
                width, height, GB7_MAX_DIM, GB7_MAX_DIM
            ),
        }
    }
}

impl std::error::Error for Gb7Error {}

/// Encode a buffer as GB7 bytes.
///
/// Each pixel is averaged to gray (`round((R+G+B)/3)`) and stored with the
/// low bit dropped, a 7-bit value. With `use_mask` the top bit records
/// whether the source alpha was non-zero; without it the top bit is always
/// zero and transparency is discarded.
pub fn encode(buffer: &PixelBuffer, use_mask: bool) -> Result<Vec<u8>, Gb7Error> {
    let (width, height) = (buffer.width(), buffer.height());
    if width > GB7_MAX_DIM || height > GB7_MAX_DIM {
        return Err(Gb7Error::DimensionsTooLarge { width, height });
    }

    let pixel_count = width as usize * height as usize;
    let mut out = Vec::with_capacity(GB7_HEADER_LEN + pixel_count);

    out.extend_from_slice(&GB7_MAGIC);
    out.push(GB7_VERSION);
    out.push(if use_mask { 0x01 } else { 0x00 });
    out.extend_from_slice(&(width as u16).to_be_bytes());
    out.extend_from_slice(&(height as u16).to_be_bytes());
    out.extend_from_slice(&[0x00, 0x00]); // reserved

    for px in buffer.as_raw().chunks_exact(4) {
        let gray = ((px[0] as u32 + px[1] as u32 + px[2] as u32) as f32 / 3.0).round() as u8;
        let gray7 = gray >> 1;
        let byte = if use_mask && px[3] > 0 {
            gray7 | 0x80
        } else {
            gray7
        };
        out.push(byte);
    }

    Ok(out)
}

/// Decode GB7 bytes into an RGBA buffer.
///
/// The 7-bit gray expands as `gray7 << 1` — the dropped low bit is gone and
/// is not guessed at. Without a mask flag every pixel is opaque; with it the
/// top bit selects alpha 255 or 0. Trailing bytes beyond the declared
/// payload are ignored.
pub fn decode(bytes: &[u8]) -> Result<PixelBuffer, Gb7Error> {
    if bytes.len() < GB7_HEADER_LEN {
        return Err(Gb7Error::InvalidHeader(format!(
            "{} bytes is shorter than the {}-byte header",
            bytes.len(),
            GB7_HEADER_LEN
        )));
    }
    if bytes[0..4] != GB7_MAGIC {
        return Err(Gb7Error::InvalidHeader(format!(
            "bad magic {:02X} {:02X} {:02X} {:02X}",
            bytes[0], bytes[1], bytes[2], bytes[3]
        )));
    }
    if bytes[4] != GB7_VERSION {
        return Err(Gb7Error::InvalidHeader(format!(
            "unsupported version 0x{:02X}",
            bytes[4]
        )));
    }

    let has_mask = bytes[5] & 0x01 != 0;
    let width = u16::from_be_bytes([bytes[6], bytes[7]]) as u32;
    let height = u16::from_be_bytes([bytes[8], bytes[9]]) as u32;

    let pixel_count = width as usize * height as usize;
    let payload = &bytes[GB7_HEADER_LEN..];
    if payload.len() < pixel_count {
        return Err(Gb7Error::TruncatedPayload {
            expected: pixel_count,
            actual: payload.len(),
        });
    }

    let mut pixels = Vec::with_capacity(pixel_count * 4);
    for &byte in &payload[..pixel_count] {
        let gray8 = (byte & 0x7F) << 1;
        let alpha = if !has_mask {
            255
        } else if byte & 0x80 != 0 {
            255
        } else {
            0
        };
        pixels.extend_from_slice(&[gray8, gray8, gray8, alpha]);
    }

    PixelBuffer::from_raw(width, height, pixels)
        .map_err(|e| Gb7Error::InvalidHeader(e.to_string()))
}

/// Bits per pixel a GB7 file carries: 7 bits of gray, plus the mask bit
/// when the flag is set. Advisory metadata for the UI's status bar.
pub fn color_depth(bytes: &[u8]) -> u32 {
    if bytes.len() > 5 && bytes[5] & 0x01 != 0 { 8 } else { 7 }
}

// ============================================================================
// TESTS
// ============================================================================
