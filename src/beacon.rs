// RGBY beacon bank - three latched threshold lamps plus an idle channel
//
// Relay lamps cannot flicker at tick rate, so each colored lamp latches:
// a threshold crossing (re)arms a 100 ms hold and the lamp stays lit until
// the hold expires, even if the band drops below threshold immediately. The
// blue "idle" lamp is the unlatched NOR of the other three, recomputed every
// tick.

use std::time::{Duration, Instant};

use crate::audio::BIN_COUNT;

/// Minimum time a triggered lamp stays lit
pub const LAMP_HOLD: Duration = Duration::from_millis(100);

/// Bin spans watched by the red, yellow and green lamps
const LAMP_BANDS: [(usize, usize); 3] = [(0, 4), (4, 8), (8, 13)];

/// Sensitivity-to-threshold conversion step
const SENSITIVITY_STEP: f32 = 7.8125;

/// Lamp flags in wire order: red, yellow, green, idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BeaconState {
    pub red: bool,
    pub yellow: bool,
    pub green: bool,
    pub idle: bool,
}

impl BeaconState {
    /// All colored lamps dark, idle lit. Also the shutdown state.
    pub const IDLE: BeaconState = BeaconState {
        red: false,
        yellow: false,
        green: false,
        idle: true,
    };

    pub fn flags(&self) -> [bool; 4] {
        [self.red, self.yellow, self.green, self.idle]
    }
}

impl Default for BeaconState {
    fn default() -> Self {
        Self::IDLE
    }
}

/// Convert a 0-127 sensitivity knob value into an amplitude threshold.
/// Higher sensitivity means a lower threshold.
pub fn sensitivity_threshold(sensitivity: u8) -> f32 {
    (128.0 - sensitivity.min(127) as f32) * SENSITIVITY_STEP
}

/// Latching controller for the three colored lamps.
pub struct BeaconController {
    expiry: [Option<Instant>; 3],
}

impl BeaconController {
    pub fn new() -> Self {
        Self { expiry: [None; 3] }
    }

    /// Advance one tick: lamps whose band crosses its threshold are
    /// triggered (or their hold extended), expired holds clear, and the
    /// idle channel is recomputed.
    pub fn update(
        &mut self,
        bins: &[f32; BIN_COUNT],
        sensitivity: [u8; 3],
        now: Instant,
    ) -> BeaconState {
        let mut lit = [false; 3];
        for (i, band) in LAMP_BANDS.iter().enumerate() {
            let level = bins[band.0..band.1].iter().fold(0.0f32, |acc, &v| acc.max(v));
            if level > sensitivity_threshold(sensitivity[i]) {
                self.expiry[i] = Some(now + LAMP_HOLD);
            }

            lit[i] = match self.expiry[i] {
                Some(expiry) => now < expiry,
                None => false,
            };
            if !lit[i] {
                self.expiry[i] = None;
            }
        }

        BeaconState {
            red: lit[0],
            yellow: lit[1],
            green: lit[2],
            idle: !(lit[0] || lit[1] || lit[2]),
        }
    }
}

impl Default for BeaconController {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bass_frame(level: f32) -> [f32; BIN_COUNT] {
        let mut bins = [0.0; BIN_COUNT];
        bins[0] = level;
        bins
    }

    #[test]
    fn test_threshold_conversion() {
        assert!((sensitivity_threshold(100) - 218.75).abs() < 1e-3);
        assert!((sensitivity_threshold(127) - 7.8125).abs() < 1e-3);
        assert!((sensitivity_threshold(0) - 1000.0).abs() < 1e-3);
    }

    #[test]
    fn test_single_crossing_holds_for_latch_window() {
        let t0 = Instant::now();
        let mut beacons = BeaconController::new();
        let sensitivity = [100, 100, 100];

        let state = beacons.update(&bass_frame(500.0), sensitivity, t0);
        assert!(state.red);
        assert!(!state.idle);

        // The band drops immediately, but the lamp holds inside the window.
        let silent = bass_frame(0.0);
        let state = beacons.update(&silent, sensitivity, t0 + Duration::from_millis(40));
        assert!(state.red);
        let state = beacons.update(&silent, sensitivity, t0 + Duration::from_millis(99));
        assert!(state.red);

        // Past the hold it clears and idle takes over.
        let state = beacons.update(&silent, sensitivity, t0 + Duration::from_millis(120));
        assert!(!state.red);
        assert!(state.idle);
    }

    #[test]
    fn test_retrigger_extends_hold() {
        let t0 = Instant::now();
        let mut beacons = BeaconController::new();
        let sensitivity = [100, 100, 100];

        beacons.update(&bass_frame(500.0), sensitivity, t0);
        beacons.update(&bass_frame(500.0), sensitivity, t0 + Duration::from_millis(80));

        // 140 ms after the first trigger but only 60 ms after the second.
        let state = beacons.update(
            &bass_frame(0.0),
            sensitivity,
            t0 + Duration::from_millis(140),
        );
        assert!(state.red);
    }

    #[test]
    fn test_lamp_bands_are_independent() {
        let t0 = Instant::now();
        let mut beacons = BeaconController::new();
        let mut bins = [0.0; BIN_COUNT];
        bins[5] = 500.0; // yellow band only
        let state = beacons.update(&bins, [100, 100, 100], t0);
        assert!(!state.red);
        assert!(state.yellow);
        assert!(!state.green);
        assert!(!state.idle);
    }

    #[test]
    fn test_sensitivity_gates_trigger() {
        let t0 = Instant::now();
        let mut beacons = BeaconController::new();
        // Sensitivity 0 puts the threshold at 1000; 500 must not trigger.
        let state = beacons.update(&bass_frame(500.0), [0, 0, 0], t0);
        assert!(!state.red);
        assert!(state.idle);
    }

    #[test]
    fn test_idle_is_nor_of_lamps() {
        let t0 = Instant::now();
        let mut beacons = BeaconController::new();
        let state = beacons.update(&[0.0; BIN_COUNT], [100, 100, 100], t0);
        assert_eq!(state, BeaconState::IDLE);
        assert_eq!(state.flags(), [false, false, false, true]);
    }
}
