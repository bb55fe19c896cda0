// EngineContext: owned shared state passed to each thread
//
// One injected context instead of process-wide statics: the mutex-guarded
// spectrum snapshot written by the capture worker, the cooperative stop
// flag, and the atomic control scalars shared between the console, the
// control-surface loop and the tick loop.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Mutex;

use crate::audio::SpectrumFrame;
use crate::config::Settings;

/// Control scalars shared across threads.
///
/// Every field is an independent atomic; no cross-field consistency is
/// required, so no lock. Writers are the console and the control-surface
/// loop, the reader is the tick loop.
pub struct ControlState {
    sensitivity: [AtomicU8; 3],
    burst: AtomicU8,
    auto_gain: AtomicBool,
    compressor: AtomicBool,
    mode_id: AtomicU8,
}

impl ControlState {
    /// Upper limit of the burst boost percentage
    pub const BURST_MAX: u8 = 70;
    /// Increment of one burst adjustment
    pub const BURST_STEP: u8 = 5;

    fn new(settings: &Settings) -> Self {
        Self {
            sensitivity: [
                AtomicU8::new(settings.sensitivity[0].min(127)),
                AtomicU8::new(settings.sensitivity[1].min(127)),
                AtomicU8::new(settings.sensitivity[2].min(127)),
            ],
            burst: AtomicU8::new(0),
            auto_gain: AtomicBool::new(false),
            compressor: AtomicBool::new(false),
            mode_id: AtomicU8::new(settings.mode),
        }
    }

    pub fn sensitivity(&self, lamp: usize) -> u8 {
        self.sensitivity[lamp].load(Ordering::Relaxed)
    }

    pub fn set_sensitivity(&self, lamp: usize, value: u8) {
        self.sensitivity[lamp].store(value.min(127), Ordering::Relaxed);
    }

    pub fn sensitivities(&self) -> [u8; 3] {
        [
            self.sensitivity(0),
            self.sensitivity(1),
            self.sensitivity(2),
        ]
    }

    pub fn burst(&self) -> u8 {
        self.burst.load(Ordering::Relaxed)
    }

    /// Step the burst boost up or down, returning the new value.
    ///
    /// Load-then-store is fine here: the console is the only writer.
    pub fn adjust_burst(&self, increase: bool) -> u8 {
        let current = self.burst.load(Ordering::Relaxed);
        let next = if increase {
            (current + Self::BURST_STEP).min(Self::BURST_MAX)
        } else {
            current.saturating_sub(Self::BURST_STEP)
        };
        self.burst.store(next, Ordering::Relaxed);
        next
    }

    pub fn auto_gain(&self) -> bool {
        self.auto_gain.load(Ordering::Relaxed)
    }

    pub fn toggle_auto_gain(&self) -> bool {
        let next = !self.auto_gain.load(Ordering::Relaxed);
        self.auto_gain.store(next, Ordering::Relaxed);
        next
    }

    pub fn compressor(&self) -> bool {
        self.compressor.load(Ordering::Relaxed)
    }

    pub fn toggle_compressor(&self) -> bool {
        let next = !self.compressor.load(Ordering::Relaxed);
        self.compressor.store(next, Ordering::Relaxed);
        next
    }

    pub fn mode_id(&self) -> u8 {
        self.mode_id.load(Ordering::Relaxed)
    }

    pub fn set_mode_id(&self, id: u8) {
        self.mode_id.store(id, Ordering::Relaxed);
    }
}

/// Shared state for the whole pipeline, one instance per process.
pub struct EngineContext {
    spectrum: Mutex<SpectrumFrame>,
    stop: AtomicBool,
    pub controls: ControlState,
}

impl EngineContext {
    pub fn new(settings: &Settings) -> Self {
        Self {
            spectrum: Mutex::new(SpectrumFrame::default()),
            stop: AtomicBool::new(false),
            controls: ControlState::new(settings),
        }
    }

    /// Replace the snapshot wholesale. Called by the capture worker only.
    pub fn publish_spectrum(&self, frame: SpectrumFrame) {
        let mut guard = match self.spectrum.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = frame;
    }

    /// Copy the latest snapshot. The critical section is the copy only;
    /// all processing happens on the caller's copy outside the lock.
    pub fn latest_spectrum(&self) -> SpectrumFrame {
        match self.spectrum.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    pub fn should_stop(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }

    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> EngineContext {
        EngineContext::new(&Settings::default())
    }

    #[test]
    fn test_initial_state_follows_settings() {
        let ctx = context();
        assert_eq!(ctx.controls.sensitivities(), [100, 100, 100]);
        assert_eq!(ctx.controls.mode_id(), 1);
        assert_eq!(ctx.controls.burst(), 0);
        assert!(!ctx.controls.auto_gain());
        assert!(!ctx.controls.compressor());
        assert!(!ctx.should_stop());
    }

    #[test]
    fn test_snapshot_roundtrip() {
        let ctx = context();
        assert_eq!(ctx.latest_spectrum(), SpectrumFrame::default());

        let mut frame = SpectrumFrame::default();
        frame.bins[7] = 950.0;
        frame.left_peak = 950.0;
        ctx.publish_spectrum(frame);

        assert_eq!(ctx.latest_spectrum().bins[7], 950.0);
    }

    #[test]
    fn test_burst_steps_and_clamps() {
        let ctx = context();
        for _ in 0..20 {
            ctx.controls.adjust_burst(true);
        }
        assert_eq!(ctx.controls.burst(), ControlState::BURST_MAX);

        assert_eq!(ctx.controls.adjust_burst(false), 65);
        for _ in 0..20 {
            ctx.controls.adjust_burst(false);
        }
        assert_eq!(ctx.controls.burst(), 0);
    }

    #[test]
    fn test_sensitivity_clamped_to_midi_range() {
        let ctx = context();
        ctx.controls.set_sensitivity(2, 200);
        assert_eq!(ctx.controls.sensitivity(2), 127);
    }

    #[test]
    fn test_toggles_flip() {
        let ctx = context();
        assert!(ctx.controls.toggle_auto_gain());
        assert!(!ctx.controls.toggle_auto_gain());
        assert!(ctx.controls.toggle_compressor());
        assert!(ctx.controls.compressor());
    }
}
