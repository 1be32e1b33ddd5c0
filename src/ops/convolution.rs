// ============================================================================
// CONVOLUTION — fixed 3x3 kernel filtering with channel selection
// ============================================================================

use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::JoinHandle;

use rayon::prelude::*;

use crate::canvas::{LayerError, LayerStack, PixelBuffer};

/// A 3x3 convolution kernel. Weights may sum to anything — normalization is
/// decided at apply time, not stored here.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Kernel(pub [[f32; 3]; 3]);

impl Kernel {
    /// Sum of all nine weights.
    pub fn weight_sum(&self) -> f32 {
        self.0.iter().flatten().sum()
    }
}

/// Which channels a convolution pass filters. The other channels are copied
/// through byte-for-byte; a single call never touches both groups.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConvolveMode {
    /// Filter R, G, B; alpha passes through unchanged.
    Rgb,
    /// Filter alpha only; R, G, B pass through unchanged.
    Alpha,
}

/// The built-in filter kernels offered by the filter dialog.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KernelPreset {
    Identity,
    Sharpen,
    GaussianBlur,
    BoxBlur,
    PrewittHorizontal,
    PrewittVertical,
}

impl KernelPreset {
    /// Returns all presets for UI display
    pub fn all() -> &'static [KernelPreset] {
        &[
            KernelPreset::Identity,
            KernelPreset::Sharpen,
            KernelPreset::GaussianBlur,
            KernelPreset::BoxBlur,
            KernelPreset::PrewittHorizontal,
            KernelPreset::PrewittVertical,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            KernelPreset::Identity => "Identity",
            KernelPreset::Sharpen => "Sharpen",
            KernelPreset::GaussianBlur => "Gaussian Blur",
            KernelPreset::BoxBlur => "Box Blur",
            KernelPreset::PrewittHorizontal => "Prewitt Horizontal",
            KernelPreset::PrewittVertical => "Prewitt Vertical",
        }
    }

    /// Parse a preset from a CLI-friendly name (case-insensitive, hyphens
    /// and underscores accepted for spaces).
    pub fn from_name(name: &str) -> Option<KernelPreset> {
        let normalized = name.to_ascii_lowercase().replace(['-', '_'], " ");
        KernelPreset::all()
            .iter()
            .find(|p| p.name().to_ascii_lowercase() == normalized)
            .copied()
    }

    pub fn kernel(&self) -> Kernel {
        match self {
            KernelPreset::Identity => Kernel([
                [0.0, 0.0, 0.0],
                [0.0, 1.0, 0.0],
                [0.0, 0.0, 0.0],
            ]),
            KernelPreset::Sharpen => Kernel([
                [0.0, -1.0, 0.0],
                [-1.0, 5.0, -1.0],
                [0.0, -1.0, 0.0],
            ]),
            KernelPreset::GaussianBlur => Kernel([
                [1.0, 2.0, 1.0],
                [2.0, 4.0, 2.0],
                [1.0, 2.0, 1.0],
            ]),
            KernelPreset::BoxBlur => Kernel([
                [1.0, 1.0, 1.0],
                [1.0, 1.0, 1.0],
                [1.0, 1.0, 1.0],
            ]),
            KernelPreset::PrewittHorizontal => Kernel([
                [-1.0, 0.0, 1.0],
                [-1.0, 0.0, 1.0],
                [-1.0, 0.0, 1.0],
            ]),
            KernelPreset::PrewittVertical => Kernel([
                [-1.0, -1.0, -1.0],
                [0.0, 0.0, 0.0],
                [1.0, 1.0, 1.0],
            ]),
        }
    }
}

/// Convolve a buffer with a 3x3 kernel.
///
/// Out-of-bounds taps replicate the nearest border pixel. The weighted sum is
/// divided by the kernel's weight sum, or left unnormalized when that sum is
/// exactly zero (edge-detect kernels). Each filtered channel is rounded to
/// nearest and clamped to 0–255. The input is never mutated and the output
/// has identical dimensions.
pub fn convolve(src: &PixelBuffer, kernel: &Kernel, mode: ConvolveMode) -> PixelBuffer {
    let w = src.width() as usize;
    let h = src.height() as usize;
    if w == 0 || h == 0 {
        return src.clone();
    }

    let sum = kernel.weight_sum();
    let normalize = if sum == 0.0 { 1.0 } else { sum };
    let src_raw = src.as_raw();
    let stride = w * 4;

    // Border replication
    let tap = |x: isize, y: isize, c: usize| -> f32 {
        let cx = x.clamp(0, w as isize - 1) as usize;
        let cy = y.clamp(0, h as isize - 1) as usize;
        src_raw[cy * stride + cx * 4 + c] as f32
    };

    let filter_channel = |x: usize, y: usize, c: usize| -> u8 {
        let mut acc = 0.0f32;
        for ky in 0..3 {
            for kx in 0..3 {
                let px = x as isize + kx as isize - 1;
                let py = y as isize + ky as isize - 1;
                acc += tap(px, py, c) * kernel.0[ky][kx];
            }
        }
        (acc / normalize).round().clamp(0.0, 255.0) as u8
    };

    let mut dst_raw = vec![0u8; src_raw.len()];
    dst_raw.par_chunks_mut(stride).enumerate().for_each(|(y, row_out)| {
        let row_in = &src_raw[y * stride..(y + 1) * stride];
        for x in 0..w {
            let pi = x * 4;
            match mode {
                ConvolveMode::Rgb => {
                    for c in 0..3 {
                        row_out[pi + c] = filter_channel(x, y, c);
                    }
                    row_out[pi + 3] = row_in[pi + 3];
                }
                ConvolveMode::Alpha => {
                    row_out[pi..pi + 3].copy_from_slice(&row_in[pi..pi + 3]);
                    row_out[pi + 3] = filter_channel(x, y, 3);
                }
            }
        }
    });

    PixelBuffer::from_raw(src.width(), src.height(), dst_raw)
        .expect("convolution preserves dimensions")
}

/// Convolve the active layer's source raster and store the result as its
/// edited buffer.
pub fn apply_to_active(
    stack: &mut LayerStack,
    kernel: &Kernel,
    mode: ConvolveMode,
) -> Result<(), LayerError> {
    let layer = stack.active_layer_mut()?;
    let id = layer.id;
    let source = layer.original.as_ref().ok_or(LayerError::EmptyLayer(id))?;
    let filtered = convolve(source, kernel, mode);
    stack.replace_active_edited(filtered)
}

// ============================================================================
// WORKER OFFLOAD
// ============================================================================
//
// Convolution is the most expensive per-pixel loop in the crate, so callers
// driving an interactive surface can push it onto a dedicated thread. The
// boundary is message passing: jobs go in by value, finished buffers come
// back on a completion channel. There is no cancellation — a caller that
// loses interest simply discards the eventual result.

/// One convolution request, owned by the worker once submitted.
pub struct ConvolutionJob {
    pub buffer: PixelBuffer,
    pub kernel: Kernel,
    pub mode: ConvolveMode,
}

/// A dedicated convolution thread fed through a channel.
pub struct ConvolutionWorker {
    job_tx: Option<Sender<ConvolutionJob>>,
    result_rx: Receiver<PixelBuffer>,
    handle: Option<JoinHandle<()>>,
}

impl ConvolutionWorker {
    /// Spawn the worker thread. Jobs are processed strictly in submission
    /// order, so results pair up with submissions FIFO.
    pub fn spawn() -> Self {
        let (job_tx, job_rx) = mpsc::channel::<ConvolutionJob>();
        let (result_tx, result_rx) = mpsc::channel::<PixelBuffer>();

        let handle = std::thread::spawn(move || {
            while let Ok(job) = job_rx.recv() {
                let out = convolve(&job.buffer, &job.kernel, job.mode);
                // Receiver gone means the caller abandoned the result.
                if result_tx.send(out).is_err() {
                    break;
                }
            }
        });

        Self {
            job_tx: Some(job_tx),
            result_rx,
            handle: Some(handle),
        }
    }

    /// Queue a job. Returns `false` if the worker thread has exited.
    pub fn submit(&self, job: ConvolutionJob) -> bool {
        match &self.job_tx {
            Some(tx) => tx.send(job).is_ok(),
            None => false,
        }
    }

    /// Block until the next finished buffer arrives.
    pub fn recv(&self) -> Option<PixelBuffer> {
        self.result_rx.recv().ok()
    }

    /// Poll for a finished buffer without blocking.
    pub fn try_recv(&self) -> Option<PixelBuffer> {
        self.result_rx.try_recv().ok()
    }
}

impl Drop for ConvolutionWorker {
    fn drop(&mut self) {
        // Closing the job channel lets the thread drain and exit.
        self.job_tx.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
