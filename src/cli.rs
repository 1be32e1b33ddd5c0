// ============================================================================
// gb7studio CLI — headless layer compositing via command-line arguments
// ============================================================================
//
// Usage examples:
//   gb7studio -i photo.png -o photo.gb7 --mask
//   gb7studio -i base.png -i top.gb7 --blend multiply --opacity 0.8 -o out.png
//   gb7studio -i scan.gb7 --filter sharpen -o cleaned.png
//   gb7studio -i photo.jpg --curve 50:0,200:255 --histogram -o out.png
//
// Up to two inputs are stacked as layers (first = bottom). Edits apply to
// the topmost layer, the stack is composited, and the result is written in
// the format implied by the output extension (.gb7, anything else = PNG).

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use crate::canvas::{BlendMode, LayerStack};
use crate::ops::convolution::{ConvolutionJob, ConvolutionWorker, ConvolveMode, KernelPreset};
use crate::ops::correction::{self, ControlPoint, Curve, CurveSet};
use crate::ops::histogram::{self, Channel};
use crate::{io, log_err, log_info};

/// gb7studio headless image processor.
///
/// Stack up to two images as layers, edit the top one, composite, and export
/// to PNG or GB7 — no GUI required.
#[derive(Parser, Debug)]
#[command(
    name = "gb7studio",
    about = "gb7studio headless layer compositor",
    long_about = "Load PNG, JPEG or GB7 images as layers, apply convolution filters\n\
                  and tonal-curve corrections to the top layer, composite with a\n\
                  blend mode, and export the result.\n\n\
                  Example:\n  \
                  gb7studio -i base.png -i top.gb7 --blend multiply -o out.png"
)]
pub struct CliArgs {
    /// Input file(s), bottom layer first. PNG, JPEG and GB7 are detected by
    /// content, not extension. At most two inputs.
    #[arg(short, long, required = true, num_args = 1..=2)]
    pub input: Vec<PathBuf>,

    /// Output file path. A `.gb7` extension selects GB7, everything else PNG.
    #[arg(short, long, value_name = "FILE")]
    pub output: PathBuf,

    /// Blend mode for the top layer: normal, multiply, screen, overlay.
    #[arg(long, default_value = "normal", value_name = "MODE")]
    pub blend: String,

    /// Opacity of the top layer, 0.0–1.0.
    #[arg(long, default_value_t = 1.0, value_name = "0.0-1.0")]
    pub opacity: f32,

    /// Convolution preset applied to the top layer: identity, sharpen,
    /// gaussian-blur, box-blur, prewitt-horizontal, prewitt-vertical.
    #[arg(long, value_name = "PRESET")]
    pub filter: Option<String>,

    /// Channels the filter runs on: rgb or alpha.
    #[arg(long, default_value = "rgb", value_name = "rgb|alpha")]
    pub filter_target: String,

    /// Two-point tonal curve "in:out,in:out" applied to the top layer.
    /// Grayscale images get a luma curve; color images get the same curve on
    /// R, G and B.
    #[arg(long, value_name = "I:O,I:O")]
    pub curve: Option<String>,

    /// Two-point curve applied to the top layer's alpha channel.
    #[arg(long, value_name = "I:O,I:O")]
    pub alpha_curve: Option<String>,

    /// Fill the top layer with a solid color, RRGGBB or RRGGBBAA hex.
    #[arg(long, value_name = "HEX")]
    pub fill: Option<String>,

    /// Permanently delete the top layer's alpha channel before compositing.
    #[arg(long, default_value_t = false)]
    pub no_alpha: bool,

    /// Print per-channel histogram summaries of the composite to stdout.
    #[arg(long, default_value_t = false)]
    pub histogram: bool,

    /// Embed the 1-bit transparency mask when writing GB7.
    #[arg(long, default_value_t = false)]
    pub mask: bool,
}

/// Run the CLI. Returns the process exit code.
pub fn run(args: CliArgs) -> ExitCode {
    match run_inner(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(msg) => {
            log_err!("{}", msg);
            eprintln!("error: {}", msg);
            ExitCode::FAILURE
        }
    }
}

fn run_inner(args: CliArgs) -> Result<(), String> {
    let mut stack = LayerStack::default();

    for path in &args.input {
        let (buffer, format, depth) = io::load_image_file(path)
            .map_err(|e| format!("failed to load {}: {}", path.display(), e))?;
        log_info!(
            "loaded {} ({}x{} {}, {} bpp)",
            path.display(),
            buffer.width(),
            buffer.height(),
            format.name(),
            depth
        );
        let id = stack.add_layer().map_err(|e| e.to_string())?;
        stack.set_original(id, buffer, depth).map_err(|e| e.to_string())?;
    }

    // Edits target the topmost layer
    let top = stack.layers().last().map(|l| l.id).expect("at least one input");
    stack.set_active(Some(top)).map_err(|e| e.to_string())?;

    let blend = BlendMode::from_name(&args.blend)
        .ok_or_else(|| format!("unknown blend mode '{}'", args.blend))?;
    stack.set_blend_mode(top, blend).map_err(|e| e.to_string())?;
    stack.set_opacity(top, args.opacity).map_err(|e| e.to_string())?;

    if let Some(hex) = &args.fill {
        let color = parse_hex_color(hex)?;
        stack.fill_active(color).map_err(|e| e.to_string())?;
        log_info!("filled layer {} with #{}", top, hex.trim_start_matches('#'));
    }

    if args.no_alpha {
        stack.delete_alpha_channel(top).map_err(|e| e.to_string())?;
        log_info!("deleted alpha channel of layer {}", top);
    }

    if let Some(name) = &args.filter {
        let preset = KernelPreset::from_name(name)
            .ok_or_else(|| format!("unknown filter preset '{}'", name))?;
        let mode = match args.filter_target.to_ascii_lowercase().as_str() {
            "rgb" => ConvolveMode::Rgb,
            "alpha" => ConvolveMode::Alpha,
            other => return Err(format!("unknown filter target '{}'", other)),
        };

        // Convolution runs on the worker thread, the same path an
        // interactive frontend uses to keep its UI responsive.
        let source = stack
            .active_layer()
            .and_then(|l| l.original.clone())
            .ok_or("top layer has no image data")?;
        let worker = ConvolutionWorker::spawn();
        worker.submit(ConvolutionJob {
            buffer: source,
            kernel: preset.kernel(),
            mode,
        });
        let filtered = worker.recv().ok_or("convolution worker exited unexpectedly")?;
        stack.replace_active_edited(filtered).map_err(|e| e.to_string())?;
        log_info!("applied {} to layer {} ({:?})", preset.name(), top, mode);
    }

    if args.curve.is_some() || args.alpha_curve.is_some() {
        let curve = args.curve.as_deref().map(parse_curve).transpose()?;
        let alpha = args.alpha_curve.as_deref().map(parse_curve).transpose()?;

        let grayscale = stack
            .active_layer()
            .and_then(|l| l.original.as_ref())
            .is_some_and(|b| b.is_grayscale());

        let curves = match (curve, grayscale) {
            (Some(c), true) => CurveSet { gray: Some(c), alpha, ..CurveSet::default() },
            (Some(c), false) => CurveSet {
                r: Some(c),
                g: Some(c),
                b: Some(c),
                alpha,
                ..CurveSet::default()
            },
            (None, _) => CurveSet { alpha, ..CurveSet::default() },
        };
        correction::apply_to_active(&mut stack, &curves).map_err(|e| e.to_string())?;
        log_info!(
            "applied tonal correction to layer {} ({} mode)",
            top,
            if grayscale && curves.gray.is_some() { "grayscale" } else { "color" }
        );
    }

    let composite = stack.composite();
    log_info!("composited {}x{}", composite.width(), composite.height());

    if args.histogram {
        print_histograms(&composite);
    }

    let is_gb7 = args
        .output
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("gb7"));
    if is_gb7 {
        io::save_gb7(&composite, &args.output, args.mask)
            .map_err(|e| format!("failed to write {}: {}", args.output.display(), e))?;
    } else {
        io::save_png(&composite, &args.output)
            .map_err(|e| format!("failed to write {}: {}", args.output.display(), e))?;
    }
    log_info!("wrote {}", args.output.display());
    println!("{}", args.output.display());
    Ok(())
}

/// Parse "in:out,in:out" into a validated two-point curve.
fn parse_curve(spec: &str) -> Result<Curve, String> {
    let points: Vec<ControlPoint> = spec
        .split(',')
        .map(|pair| {
            let (i, o) = pair
                .split_once(':')
                .ok_or_else(|| format!("bad curve point '{}', expected in:out", pair))?;
            let input = i.trim().parse::<u8>().map_err(|e| format!("bad input '{}': {}", i, e))?;
            let output = o.trim().parse::<u8>().map_err(|e| format!("bad output '{}': {}", o, e))?;
            Ok(ControlPoint::new(input, output))
        })
        .collect::<Result<_, String>>()?;

    match points.as_slice() {
        [p1, p2] => Curve::new(*p1, *p2).map_err(|e| e.to_string()),
        _ => Err(format!("expected exactly two curve points, got {}", points.len())),
    }
}

/// Parse RRGGBB or RRGGBBAA hex (leading '#' optional) into RGBA.
fn parse_hex_color(hex: &str) -> Result<[u8; 4], String> {
    let hex = hex.trim_start_matches('#');
    let parse = |s: &str| u8::from_str_radix(s, 16).map_err(|e| format!("bad hex '{}': {}", s, e));
    match hex.len() {
        6 => Ok([parse(&hex[0..2])?, parse(&hex[2..4])?, parse(&hex[4..6])?, 255]),
        8 => Ok([
            parse(&hex[0..2])?,
            parse(&hex[2..4])?,
            parse(&hex[4..6])?,
            parse(&hex[6..8])?,
        ]),
        _ => Err(format!("expected 6 or 8 hex digits, got '{}'", hex)),
    }
}

fn print_histograms(buffer: &crate::canvas::PixelBuffer) {
    for (label, channel) in [
        ("R", Channel::R),
        ("G", Channel::G),
        ("B", Channel::B),
        ("A", Channel::A),
    ] {
        summarize(label, &histogram::channel_histogram(buffer, channel));
    }
    summarize("gray", &histogram::grayscale_histogram(buffer));
}

/// One line per channel: value range, mean, and the most frequent value.
fn summarize(label: &str, hist: &[u32; 256]) {
    let total: u64 = hist.iter().map(|&c| c as u64).sum();
    if total == 0 {
        println!("{:>4}: empty", label);
        return;
    }
    let min = hist.iter().position(|&c| c > 0).unwrap_or(0);
    let max = 255 - hist.iter().rev().position(|&c| c > 0).unwrap_or(0);
    let mean: u64 = hist
        .iter()
        .enumerate()
        .map(|(v, &c)| v as u64 * c as u64)
        .sum::<u64>()
        / total;
    let peak = hist
        .iter()
        .enumerate()
        .max_by_key(|&(_, &c)| c)
        .map(|(v, _)| v)
        .unwrap_or(0);
    println!(
        "{:>4}: min {} max {} mean {} peak {}",
        label, min, max, mean, peak
    );
}

// ============================================================================
// TESTS
// ============================================================================
