// Spectrum analyzer - fixed-band FFT magnitudes for the lighting pipeline
//
// The lighting algorithms consume exactly 60 frequency buckets between the
// low and high bounds. The transform size is derived from that resolution
// rather than the block length: with `delta_f` the bucket width, an FFT of
// `ceil(sample_rate / delta_f)` points makes one output bin one bucket wide,
// so the 60 buckets are a contiguous slice of the FFT output starting at
// `floor(low / delta_f)`. Shorter blocks are zero-padded into the transform.

use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::Arc;

/// Number of frequency buckets the lighting pipeline consumes
pub const BIN_COUNT: usize = 60;

/// Lower edge of the analyzed range in Hz
pub const LOW_FREQ_HZ: f32 = 40.0;

/// Upper edge of the analyzed range in Hz
pub const HIGH_FREQ_HZ: f32 = 2000.0;

/// Fixed input gain applied to raw magnitudes
pub const INPUT_GAIN: f32 = 7.0;

/// Scale bringing unit magnitudes into the 0..~1000 display range
const DISPLAY_SCALE: f32 = 100_000.0;

/// One finished analysis block: 60 display-scaled bins plus stereo peaks.
///
/// Bins hold the maximum of the left and right magnitude per bucket. The
/// whole value is replaced atomically under the snapshot mutex; a frame is
/// never partially updated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpectrumFrame {
    pub bins: [f32; BIN_COUNT],
    pub left_peak: f32,
    pub right_peak: f32,
}

impl Default for SpectrumFrame {
    fn default() -> Self {
        Self {
            bins: [0.0; BIN_COUNT],
            left_peak: 0.0,
            right_peak: 0.0,
        }
    }
}

/// Per-channel FFT with the bucket mapping fixed at construction.
pub struct SpectrumAnalyzer {
    fft: Arc<dyn Fft<f32>>,
    fft_size: usize,
    low_bin: usize,
    scratch: Vec<Complex<f32>>,
}

impl SpectrumAnalyzer {
    /// Build an analyzer for the given device sample rate.
    pub fn new(sample_rate: u32) -> Self {
        let delta_f = (HIGH_FREQ_HZ - LOW_FREQ_HZ) / (BIN_COUNT as f32 - 1.0);
        let fft_size = (sample_rate as f32 / delta_f).ceil() as usize;
        let low_bin = (LOW_FREQ_HZ / delta_f).floor() as usize;

        let fft = FftPlanner::new().plan_fft_forward(fft_size);
        let scratch = vec![Complex::new(0.0, 0.0); fft_size];

        Self {
            fft,
            fft_size,
            low_bin,
            scratch,
        }
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    pub fn low_bin(&self) -> usize {
        self.low_bin
    }

    /// Analyze one de-interleaved stereo block into a frame.
    pub fn analyze(&mut self, left: &[f32], right: &[f32]) -> SpectrumFrame {
        let mut left_bins = [0.0f32; BIN_COUNT];
        let mut right_bins = [0.0f32; BIN_COUNT];
        self.channel_bins(left, &mut left_bins);
        self.channel_bins(right, &mut right_bins);

        let mut bins = [0.0f32; BIN_COUNT];
        for i in 0..BIN_COUNT {
            bins[i] = left_bins[i].max(right_bins[i]);
        }

        SpectrumFrame {
            bins,
            left_peak: peak(&left_bins),
            right_peak: peak(&right_bins),
        }
    }

    /// One channel: zero-padded FFT, magnitude, gain, bucket slice, rounding.
    fn channel_bins(&mut self, samples: &[f32], out: &mut [f32; BIN_COUNT]) {
        let copied = samples.len().min(self.fft_size);
        for (slot, &sample) in self.scratch.iter_mut().zip(&samples[..copied]) {
            *slot = Complex::new(sample, 0.0);
        }
        for slot in self.scratch[copied..].iter_mut() {
            *slot = Complex::new(0.0, 0.0);
        }

        self.fft.process(&mut self.scratch);

        let scale = INPUT_GAIN / self.fft_size as f32;
        for (i, value) in out.iter_mut().enumerate() {
            let magnitude = self.scratch[self.low_bin + i].norm() * scale;
            *value = (magnitude * DISPLAY_SCALE).round();
        }
    }
}

fn peak(bins: &[f32; BIN_COUNT]) -> f32 {
    bins.iter().fold(0.0f32, |acc, &v| acc.max(v))
}
