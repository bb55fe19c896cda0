// Gain normalization - auto-gain and logarithmic compression
//
// Both stages run on the tick's private copy of the spectrum, never on the
// shared snapshot, in fixed order: auto-gain, then compression. Auto-gain
// rides a running peak so quiet passages still reach the trigger thresholds;
// the compressor squeezes the top of the range so loud material does not pin
// every channel at maximum. Each stage is a no-op while its toggle is off.

use std::time::{Duration, Instant};

use crate::audio::BIN_COUNT;

/// Bins checked for the silence gate (the activity sub-range)
const ACTIVITY_BINS: usize = 30;

/// Activity at or below this level counts as silence
const SILENCE_THRESHOLD: f32 = 20.0;

/// The running peak is re-armed after this long without a new peak
const PEAK_HOLD: Duration = Duration::from_secs(15);

/// Compression anchor: input at this level maps to zero output
const COMP_FLOOR: f32 = 50.0;

/// Top of the nominal output range before burst boost
const BASE_RANGE: f32 = 1000.0;

/// Stateful spectrum normalizer. One instance lives in the tick engine.
pub struct GainNormalizer {
    max_value: f32,
    last_peak: Instant,
}

impl GainNormalizer {
    pub fn new(now: Instant) -> Self {
        Self {
            max_value: 1.0,
            last_peak: now,
        }
    }

    /// Burst-boosted output ceiling: 1000 at 0%, up to 1700 at 70%.
    fn boost(burst: u8) -> f32 {
        (burst as f32 / 100.0) * BASE_RANGE + BASE_RANGE
    }

    /// Auto-gain stage.
    ///
    /// While the activity sub-range shows signal, track the running frame
    /// maximum (re-armed to 1 after 15 s without a new peak) and scale every
    /// bin so that maximum fills the boosted range. In silence the frame
    /// passes through unscaled and the running peak resets.
    pub fn auto_gain(&mut self, bins: &mut [f32; BIN_COUNT], burst: u8, now: Instant) {
        let activity = bins[..ACTIVITY_BINS]
            .iter()
            .fold(0.0f32, |acc, &v| acc.max(v));

        if activity > SILENCE_THRESHOLD {
            if now.duration_since(self.last_peak) > PEAK_HOLD {
                self.max_value = 1.0;
            }
            let frame_max = bins.iter().fold(0.0f32, |acc, &v| acc.max(v));
            if frame_max > self.max_value {
                self.max_value = frame_max;
                self.last_peak = now;
            }
            let correction = Self::boost(burst) / self.max_value;
            for value in bins.iter_mut() {
                *value *= correction;
            }
        } else {
            self.max_value = 1.0;
        }
    }

    /// Logarithmic compression stage.
    ///
    /// Input at the floor (50) maps to 0 and the nominal top (1000) maps to
    /// the boosted ceiling. Non-positive input would be a log domain error;
    /// it clamps to 0 instead, as does any negative result.
    pub fn compress(bins: &mut [f32; BIN_COUNT], burst: u8) {
        let scale = Self::boost(burst) / (BASE_RANGE / COMP_FLOOR).log10();
        for value in bins.iter_mut() {
            if *value <= 0.0 {
                *value = 0.0;
                continue;
            }
            let mapped = scale * (*value / COMP_FLOOR).log10();
            *value = if mapped < 0.0 { 0.0 } else { mapped };
        }
    }

    /// Run the enabled stages in fixed order on one frame copy.
    pub fn process(
        &mut self,
        bins: &mut [f32; BIN_COUNT],
        auto_gain: bool,
        compressor: bool,
        burst: u8,
        now: Instant,
    ) {
        if auto_gain {
            self.auto_gain(bins, burst, now);
        }
        if compressor {
            Self::compress(bins, burst);
        }
    }

    pub fn running_peak(&self) -> f32 {
        self.max_value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(level: f32, index: usize) -> [f32; BIN_COUNT] {
        let mut bins = [0.0; BIN_COUNT];
        bins[index] = level;
        bins
    }

    #[test]
    fn test_silence_passes_through_and_resets_peak() {
        let now = Instant::now();
        let mut normalizer = GainNormalizer::new(now);

        // Establish a peak first.
        let mut bins = frame(500.0, 3);
        normalizer.auto_gain(&mut bins, 0, now);
        assert_eq!(normalizer.running_peak(), 500.0);

        // Energy outside the activity sub-range does not count as activity.
        let mut bins = frame(500.0, 40);
        normalizer.auto_gain(&mut bins, 0, now);
        assert_eq!(bins[40], 500.0);
        assert_eq!(normalizer.running_peak(), 1.0);
    }

    #[test]
    fn test_auto_gain_scales_to_range() {
        let now = Instant::now();
        let mut normalizer = GainNormalizer::new(now);

        let mut bins = frame(500.0, 3);
        normalizer.auto_gain(&mut bins, 0, now);
        // 500 is the running peak, so it scales to the full 1000 range.
        assert!((bins[3] - 1000.0).abs() < 1e-3);

        // A quieter frame under the same peak scales proportionally.
        let mut bins = frame(250.0, 3);
        normalizer.auto_gain(&mut bins, 0, now + Duration::from_millis(20));
        assert!((bins[3] - 500.0).abs() < 1e-3);
    }

    #[test]
    fn test_auto_gain_burst_raises_ceiling() {
        let now = Instant::now();
        let mut normalizer = GainNormalizer::new(now);

        let mut bins = frame(500.0, 3);
        normalizer.auto_gain(&mut bins, 70, now);
        assert!((bins[3] - 1700.0).abs() < 1e-3);
    }

    #[test]
    fn test_peak_rearms_after_hold() {
        let t0 = Instant::now();
        let mut normalizer = GainNormalizer::new(t0);

        let mut bins = frame(800.0, 3);
        normalizer.auto_gain(&mut bins, 0, t0);
        assert_eq!(normalizer.running_peak(), 800.0);

        // Still held just inside the window.
        let mut bins = frame(100.0, 3);
        normalizer.auto_gain(&mut bins, 0, t0 + Duration::from_secs(14));
        assert_eq!(normalizer.running_peak(), 800.0);

        // Past the window the stale peak drops and the frame becomes the peak.
        let mut bins = frame(100.0, 3);
        normalizer.auto_gain(&mut bins, 0, t0 + Duration::from_secs(16));
        assert_eq!(normalizer.running_peak(), 100.0);
        assert!((bins[3] - 1000.0).abs() < 1e-3);
    }

    #[test]
    fn test_compress_anchor_points() {
        let mut bins = [0.0; BIN_COUNT];
        bins[0] = 50.0;
        bins[1] = 1000.0;
        bins[2] = 0.0;
        bins[3] = 10.0; // below the floor: negative log output clamps

        GainNormalizer::compress(&mut bins, 0);
        assert_eq!(bins[0], 0.0);
        assert!((bins[1] - 1000.0).abs() < 1e-3);
        assert_eq!(bins[2], 0.0);
        assert_eq!(bins[3], 0.0);
    }

    #[test]
    fn test_compress_respects_burst() {
        let mut bins = [0.0; BIN_COUNT];
        bins[0] = 1000.0;
        GainNormalizer::compress(&mut bins, 70);
        assert!((bins[0] - 1700.0).abs() < 1e-2);
    }

    #[test]
    fn test_disabled_stages_are_noops() {
        let now = Instant::now();
        let mut normalizer = GainNormalizer::new(now);
        let mut bins = frame(500.0, 3);
        normalizer.process(&mut bins, false, false, 70, now);
        assert_eq!(bins[3], 500.0);
    }
}
