// End-to-end pipeline: decode files from disk, stack them as layers, edit,
// composite, and export — the same path the CLI drives.

use gb7studio::canvas::{BlendMode, LayerStack};
use gb7studio::ops::convolution::{self, ConvolveMode, KernelPreset};
use gb7studio::ops::correction::{self, ControlPoint, Curve, CurveSet};
use gb7studio::{gb7, io};

use gb7studio::PixelBuffer;

fn write_png(path: &std::path::Path, buffer: &PixelBuffer) {
    image::RgbaImage::from_raw(buffer.width(), buffer.height(), buffer.as_raw().to_vec())
        .unwrap()
        .save_with_format(path, image::ImageFormat::Png)
        .unwrap();
}

#[test]
fn load_edit_composite_export_round_trip() {
    let dir = tempfile::tempdir().unwrap();

    // Bottom layer: an 8x8 color PNG
    let base = PixelBuffer::new_filled(8, 8, [200, 40, 40, 255]);
    let base_path = dir.path().join("base.png");
    write_png(&base_path, &base);

    // Top layer: a 4x4 GB7 with a transparency mask (left half opaque)
    let mut bytes = Vec::new();
    for _row in 0..4u32 {
        for x in 0..4u32 {
            let a = if x < 2 { 255 } else { 0 };
            bytes.extend_from_slice(&[120, 120, 120, a]);
        }
    }
    let top_src = PixelBuffer::from_raw(4, 4, bytes).unwrap();
    let top_path = dir.path().join("top.gb7");
    io::save_gb7(&top_src, &top_path, true).unwrap();

    // Load both through the sniffing loader
    let (base_buf, base_fmt, base_depth) = io::load_image_file(&base_path).unwrap();
    assert_eq!(base_fmt, io::ImageFormat::Png);
    assert_eq!(base_depth, 32);
    assert_eq!(base_buf, base);

    let (top_buf, top_fmt, top_depth) = io::load_image_file(&top_path).unwrap();
    assert_eq!(top_fmt, io::ImageFormat::Gb7);
    assert_eq!(top_depth, 8);
    assert!(top_buf.is_grayscale());

    // Stack them
    let mut stack = LayerStack::default();
    let bottom = stack.add_layer().unwrap();
    let top = stack.add_layer().unwrap();
    stack.set_original(bottom, base_buf, base_depth).unwrap();
    stack.set_original(top, top_buf, top_depth).unwrap();
    stack.set_active(Some(top)).unwrap();
    stack.set_blend_mode(top, BlendMode::Normal).unwrap();

    // Edit the top layer: identity filter then a brightening curve
    convolution::apply_to_active(&mut stack, &KernelPreset::Identity.kernel(), ConvolveMode::Rgb)
        .unwrap();
    let curve = Curve::new(ControlPoint::new(0, 60), ControlPoint::new(255, 255)).unwrap();
    let curves = CurveSet { gray: Some(curve), ..CurveSet::default() };
    correction::apply_to_active(&mut stack, &curves).unwrap();

    // Composite: 8x8 canvas, 4x4 top layer centered at (2,2)
    let out = stack.composite();
    assert_eq!(out.width(), 8);
    assert_eq!(out.height(), 8);
    // Outside the top layer: base shows through
    assert_eq!(out.pixel(0, 0), [200, 40, 40, 255]);
    // Inside, opaque half: corrected gray. GB7 stored round(120) >> 1 << 1 =
    // 120; curve maps 120 -> round(60 + 120/255*195) = 152
    assert_eq!(out.pixel(2, 3), [152, 152, 152, 255]);
    // Inside, masked-out half: base shows through
    assert_eq!(out.pixel(5, 3), [200, 40, 40, 255]);

    // Export both formats and reload them
    let png_out = dir.path().join("out.png");
    io::save_png(&out, &png_out).unwrap();
    let (reloaded, fmt, _) = io::load_image_file(&png_out).unwrap();
    assert_eq!(fmt, io::ImageFormat::Png);
    assert_eq!(reloaded, out);

    let gb7_out = dir.path().join("out.gb7");
    io::save_gb7(&out, &gb7_out, false).unwrap();
    let gb7_bytes = std::fs::read(&gb7_out).unwrap();
    assert_eq!(&gb7_bytes[0..4], &gb7::GB7_MAGIC);
    let (gb7_reloaded, fmt, depth) = io::load_image_file(&gb7_out).unwrap();
    assert_eq!(fmt, io::ImageFormat::Gb7);
    assert_eq!(depth, 7);
    assert_eq!(gb7_reloaded.width(), 8);
    assert!(gb7_reloaded.is_grayscale());
    assert!(!gb7_reloaded.has_transparency());
}

#[test]
fn corrupt_gb7_file_fails_without_partial_result() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.gb7");

    let buffer = PixelBuffer::new_filled(4, 4, [77, 77, 77, 255]);
    let mut bytes = gb7::encode(&buffer, false).unwrap();
    bytes.truncate(bytes.len() - 3);
    std::fs::write(&path, &bytes).unwrap();

    match io::load_image_file(&path) {
        Err(io::LoadError::Gb7(gb7::Gb7Error::TruncatedPayload { expected: 16, actual: 13 })) => {}
        other => panic!("unexpected result: {:?}", other.map(|_| ())),
    }
}

#[test]
fn unsupported_file_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("notes.txt");
    std::fs::write(&path, b"not an image at all").unwrap();

    assert!(matches!(
        io::load_image_file(&path),
        Err(io::LoadError::UnsupportedFormat)
    ));
}
