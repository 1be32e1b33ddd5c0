// ============================================================================
// IMAGE I/O — format sniffing, decoding, color-depth probe, save helpers
// ============================================================================
//
// Formats are identified by magic bytes, never by file extension — dropped
// files arrive with arbitrary names.
// PNG and JPEG decoding is delegated to the `image` crate; GB7 is ours.

use std::path::Path;

use image::RgbaImage;

use crate::canvas::{BufferError, PixelBuffer};
use crate::gb7::{self, Gb7Error};

/// Raster formats the loader accepts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Jpeg,
    Gb7,
}

impl ImageFormat {
    pub fn name(&self) -> &'static str {
        match self {
            ImageFormat::Png => "PNG",
            ImageFormat::Jpeg => "JPEG",
            ImageFormat::Gb7 => "GB7",
        }
    }
}

/// Error type for load operations
#[derive(Debug)]
pub enum LoadError {
    /// The byte stream matches none of the supported formats.
    UnsupportedFormat,
    Io(std::io::Error),
    /// PNG/JPEG decoder failure.
    Decode(String),
    Gb7(Gb7Error),
    Buffer(BufferError),
}

impl std::fmt::Display for LoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadError::UnsupportedFormat => {
                write!(f, "unsupported image format (expected PNG, JPEG or GB7)")
            }
            LoadError::Io(e) => write!(f, "I/O error: {}", e),
            LoadError::Decode(e) => write!(f, "decode error: {}", e),
            LoadError::Gb7(e) => write!(f, "GB7 error: {}", e),
            LoadError::Buffer(e) => write!(f, "buffer error: {}", e),
        }
    }
}

impl std::error::Error for LoadError {}

impl From<std::io::Error> for LoadError {
    fn from(e: std::io::Error) -> Self {
        LoadError::Io(e)
    }
}

impl From<Gb7Error> for LoadError {
    fn from(e: Gb7Error) -> Self {
        LoadError::Gb7(e)
    }
}

impl From<BufferError> for LoadError {
    fn from(e: BufferError) -> Self {
        LoadError::Buffer(e)
    }
}

const PNG_MAGIC: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
const JPEG_MAGIC: [u8; 3] = [0xFF, 0xD8, 0xFF];

/// Identify a byte stream by its magic bytes.
pub fn detect_format(bytes: &[u8]) -> Result<ImageFormat, LoadError> {
    if bytes.len() >= 8 && bytes[0..8] == PNG_MAGIC {
        Ok(ImageFormat::Png)
    } else if bytes.len() >= 3 && bytes[0..3] == JPEG_MAGIC {
        Ok(ImageFormat::Jpeg)
    } else if bytes.len() >= 4 && bytes[0..4] == gb7::GB7_MAGIC {
        Ok(ImageFormat::Gb7)
    } else {
        Err(LoadError::UnsupportedFormat)
    }
}

/// Decode an image file's bytes into a [`PixelBuffer`], sniffing the format.
pub fn decode_image(bytes: &[u8]) -> Result<(PixelBuffer, ImageFormat), LoadError> {
    let format = detect_format(bytes)?;
    let buffer = match format {
        ImageFormat::Gb7 => gb7::decode(bytes)?,
        ImageFormat::Png | ImageFormat::Jpeg => {
            let img_format = match format {
                ImageFormat::Png => image::ImageFormat::Png,
                _ => image::ImageFormat::Jpeg,
            };
            let decoded = image::load_from_memory_with_format(bytes, img_format)
                .map_err(|e| LoadError::Decode(e.to_string()))?
                .to_rgba8();
            let (w, h) = (decoded.width(), decoded.height());
            PixelBuffer::from_raw(w, h, decoded.into_raw())?
        }
    };
    Ok((buffer, format))
}

/// Bits per pixel declared by the file itself. Advisory metadata for the
/// status bar — no algorithm consumes this.
///
/// PNG: IHDR bit depth × channel count. JPEG: always 24. GB7: 7, or 8 with
/// an embedded mask bit.
pub fn color_depth(bytes: &[u8], format: ImageFormat) -> u32 {
    match format {
        ImageFormat::Jpeg => 24,
        ImageFormat::Gb7 => gb7::color_depth(bytes),
        ImageFormat::Png => {
            // IHDR is always the first chunk: bit depth at offset 24,
            // color type at offset 25.
            if bytes.len() < 26 {
                return 0;
            }
            let bit_depth = bytes[24] as u32;
            let channels = match bytes[25] {
                0 => 1, // grayscale
                2 => 3, // truecolor
                3 => 1, // indexed
                4 => 2, // grayscale + alpha
                6 => 4, // truecolor + alpha
                _ => 0,
            };
            bit_depth * channels
        }
    }
}

/// Read and decode an image file, returning the buffer together with the
/// sniffed format and its advisory color depth.
pub fn load_image_file(path: &Path) -> Result<(PixelBuffer, ImageFormat, u32), LoadError> {
    let bytes = std::fs::read(path)?;
    let (buffer, format) = decode_image(&bytes)?;
    let depth = color_depth(&bytes, format);
    Ok((buffer, format, depth))
}

/// Write a buffer as a PNG file.
pub fn save_png(buffer: &PixelBuffer, path: &Path) -> Result<(), LoadError> {
    let img = RgbaImage::from_raw(buffer.width(), buffer.height(), buffer.as_raw().to_vec())
        .expect("PixelBuffer layout invariant");
    img.save_with_format(path, image::ImageFormat::Png)
        .map_err(|e| LoadError::Decode(e.to_string()))
}

/// Write a buffer as a GB7 file.
pub fn save_gb7(buffer: &PixelBuffer, path: &Path, use_mask: bool) -> Result<(), LoadError> {
    let bytes = gb7::encode(buffer, use_mask)?;
    std::fs::write(path, bytes)?;
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================
