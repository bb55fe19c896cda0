// Output tick engine - the 20 ms pipeline driver
//
// Each tick: copy the snapshot under its lock (copy only, never processing
// inside the critical section), normalize the copy, advance the active mode,
// update the beacon bank and push both encodings out. Send failures are
// transient: logged, dropped, superseded by the next tick.

use log::{info, warn};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::beacon::{BeaconController, BeaconState};
use crate::context::EngineContext;
use crate::error::log_transport_error;
use crate::gain::GainNormalizer;
use crate::modes::{LightMode, Strip};
use crate::output::{BeaconSink, LedFrame, SharedLedSink};

/// Output tick period
pub const TICK_PERIOD: Duration = Duration::from_millis(20);

/// The periodic pipeline driver. Owns every piece of per-tick state.
pub struct TickEngine {
    ctx: Arc<EngineContext>,
    normalizer: GainNormalizer,
    beacons: BeaconController,
    strip: Strip,
    led_sink: SharedLedSink,
    beacon_sink: Box<dyn BeaconSink>,
}

impl TickEngine {
    pub fn new(
        ctx: Arc<EngineContext>,
        led_sink: SharedLedSink,
        beacon_sink: Box<dyn BeaconSink>,
    ) -> Self {
        Self {
            ctx,
            normalizer: GainNormalizer::new(Instant::now()),
            beacons: BeaconController::new(),
            strip: Strip::default(),
            led_sink,
            beacon_sink,
        }
    }

    /// Run one pipeline pass. `run` drives this on the tick clock; tests
    /// call it directly with synthetic instants.
    pub fn tick(&mut self, now: Instant) {
        let mut frame = self.ctx.latest_spectrum();

        let controls = &self.ctx.controls;
        self.normalizer.process(
            &mut frame.bins,
            controls.auto_gain(),
            controls.compressor(),
            controls.burst(),
            now,
        );

        let mode = match LightMode::from_id(controls.mode_id()) {
            Some(mode) => mode,
            None => {
                warn!(
                    "[Engine] unknown mode id {}; falling back to mode 1",
                    controls.mode_id()
                );
                controls.set_mode_id(LightMode::MirroredBands.id());
                LightMode::MirroredBands
            }
        };
        mode.advance(&frame.bins, &mut self.strip);

        let beacons = self.beacons.update(&frame.bins, controls.sensitivities(), now);

        self.send_led_frame(&LedFrame::from_strip(&self.strip));
        self.send_beacons(&beacons);
    }

    fn send_led_frame(&self, frame: &LedFrame) {
        let mut sink = match self.led_sink.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Err(err) = sink.send_frame(frame) {
            log_transport_error(&err, "led frame");
        }
    }

    fn send_beacons(&mut self, state: &BeaconState) {
        if let Err(err) = self.beacon_sink.send_state(state) {
            log_transport_error(&err, "beacon datagram");
        }
    }

    /// Drive the tick loop until the stop flag is raised, then zero outputs.
    ///
    /// Deadlines advance on the monotonic clock; after an overrun the loop
    /// resynchronizes instead of bursting missed ticks.
    pub fn run(mut self) {
        info!("[Engine] tick loop running");
        let mut next = Instant::now() + TICK_PERIOD;
        while !self.ctx.should_stop() {
            self.tick(Instant::now());

            let now = Instant::now();
            match next.checked_duration_since(now) {
                Some(wait) => {
                    thread::sleep(wait);
                    next += TICK_PERIOD;
                }
                None => {
                    next = now + TICK_PERIOD;
                }
            }
        }
        self.shutdown();
        info!("[Engine] tick loop stopped");
    }

    /// Closing frames: strip dark, beacons idle.
    fn shutdown(&mut self) {
        self.send_led_frame(&LedFrame::blackout());
        self.send_beacons(&BeaconState::IDLE);
    }

    pub fn spawn(self) -> JoinHandle<()> {
        thread::spawn(move || self.run())
    }

    pub fn strip(&self) -> &Strip {
        &self.strip
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::SpectrumFrame;
    use crate::config::Settings;
    use crate::output::{beacon_datagram, shared_sink, MemoryBeaconSink, MemoryLedSink};

    fn engine_with_logs() -> (TickEngine, crate::output::FrameLog, crate::output::BeaconLog) {
        let ctx = Arc::new(EngineContext::new(&Settings::default()));
        let (led_sink, frames) = MemoryLedSink::new();
        let (beacon_sink, states) = MemoryBeaconSink::new();
        let engine = TickEngine::new(ctx, shared_sink(Box::new(led_sink)), Box::new(beacon_sink));
        (engine, frames, states)
    }

    #[test]
    fn test_tick_emits_both_outputs() {
        let (mut engine, frames, states) = engine_with_logs();
        engine.tick(Instant::now());

        assert_eq!(frames.lock().unwrap().len(), 1);
        assert_eq!(states.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_zero_snapshot_outputs_blackout_and_idle() {
        let (mut engine, frames, states) = engine_with_logs();
        for _ in 0..4 {
            engine.tick(Instant::now());
        }

        for frame in frames.lock().unwrap().iter() {
            assert_eq!(*frame, LedFrame::blackout());
        }
        for state in states.lock().unwrap().iter() {
            assert_eq!(&beacon_datagram(state), b"0001");
        }
    }

    #[test]
    fn test_loud_frame_lights_strip_and_beacons() {
        let (mut engine, frames, states) = engine_with_logs();

        let mut snapshot = SpectrumFrame::default();
        for v in &mut snapshot.bins[..4] {
            *v = 950.0;
        }
        engine.ctx.publish_spectrum(snapshot);
        engine.tick(Instant::now());

        let frame = *frames.lock().unwrap().last().unwrap();
        // Mode 1, band 0 above 900: red on the mirrored end cells.
        assert_eq!(frame.as_bytes()[1], 255);
        assert_eq!(frame.as_bytes()[28], 255);

        let state = *states.lock().unwrap().last().unwrap();
        assert_eq!(&beacon_datagram(&state), b"1000");
    }

    #[test]
    fn test_invalid_mode_id_falls_back() {
        let (mut engine, _frames, _states) = engine_with_logs();
        engine.ctx.controls.set_mode_id(99);
        engine.tick(Instant::now());
        assert_eq!(engine.ctx.controls.mode_id(), 1);
    }

    #[test]
    fn test_mode_switch_applies_next_tick() {
        let (mut engine, frames, _states) = engine_with_logs();

        let mut snapshot = SpectrumFrame::default();
        for v in &mut snapshot.bins {
            *v = 800.0;
        }
        engine.ctx.publish_spectrum(snapshot);

        engine.ctx.controls.set_mode_id(4);
        engine.tick(Instant::now());

        // Flood mode: every cell saturated on all three components.
        let frame = *frames.lock().unwrap().last().unwrap();
        assert!(frame.as_bytes()[1..].iter().all(|&b| b == 255));
    }
}
