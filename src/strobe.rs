// Strobe generator - tempo-locked full-on override
//
// The strobe runs beside the normal tick output with no arbitration: both
// write the same shared sink and whichever writes last wins on the wire.
// The flicker between the override and the live frame is accepted
// nondeterminism, not something to fix with an arbitration layer.

use log::info;
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::error::log_transport_error;
use crate::output::{LedFrame, SharedLedSink};

/// The five selectable strobe tempos.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrobePreset {
    Bpm60,
    Bpm120,
    Bpm300,
    Bpm600,
    Bpm1200,
}

impl StrobePreset {
    pub const ALL: [StrobePreset; 5] = [
        StrobePreset::Bpm60,
        StrobePreset::Bpm120,
        StrobePreset::Bpm300,
        StrobePreset::Bpm600,
        StrobePreset::Bpm1200,
    ];

    /// Preset by its 1-based selector position.
    pub fn from_index(index: usize) -> Option<Self> {
        match index {
            1 => Some(StrobePreset::Bpm60),
            2 => Some(StrobePreset::Bpm120),
            3 => Some(StrobePreset::Bpm300),
            4 => Some(StrobePreset::Bpm600),
            5 => Some(StrobePreset::Bpm1200),
            _ => None,
        }
    }

    pub fn bpm(self) -> u32 {
        match self {
            StrobePreset::Bpm60 => 60,
            StrobePreset::Bpm120 => 120,
            StrobePreset::Bpm300 => 300,
            StrobePreset::Bpm600 => 600,
            StrobePreset::Bpm1200 => 1200,
        }
    }

    /// Flash period: one full-on frame per beat.
    pub fn period(self) -> Duration {
        Duration::from_millis((60_000.0 / self.bpm() as f64).round() as u64)
    }
}

/// Commands accepted by the strobe thread. Selecting a preset while another
/// is active replaces it; the presets are mutually exclusive by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrobeCommand {
    Start(StrobePreset),
    Stop,
    Shutdown,
}

/// Pure activation state machine, kept apart from the thread for tests.
#[derive(Debug, Default)]
pub struct StrobeController {
    active: Option<StrobePreset>,
}

impl StrobeController {
    pub fn new() -> Self {
        Self { active: None }
    }

    pub fn apply(&mut self, command: StrobeCommand) {
        match command {
            StrobeCommand::Start(preset) => self.active = Some(preset),
            StrobeCommand::Stop | StrobeCommand::Shutdown => self.active = None,
        }
    }

    pub fn active(&self) -> Option<StrobePreset> {
        self.active
    }

    pub fn period(&self) -> Option<Duration> {
        self.active.map(StrobePreset::period)
    }
}

/// Run the strobe timer until a Shutdown command or a dropped sender.
///
/// Idle: block on the command channel. Active: wait out one period per
/// flash, handling commands as they arrive.
pub fn run_strobe(commands: Receiver<StrobeCommand>, sink: SharedLedSink) {
    let mut state = StrobeController::new();
    loop {
        let command = match state.period() {
            None => commands.recv().ok(),
            Some(period) => match commands.recv_timeout(period) {
                Ok(command) => Some(command),
                Err(RecvTimeoutError::Timeout) => {
                    flash(&sink);
                    continue;
                }
                Err(RecvTimeoutError::Disconnected) => None,
            },
        };

        match command {
            None | Some(StrobeCommand::Shutdown) => break,
            Some(command) => {
                state.apply(command);
                match state.active() {
                    Some(preset) => info!("[Strobe] active at {} BPM", preset.bpm()),
                    None => info!("[Strobe] off"),
                }
            }
        }
    }
    info!("[Strobe] stopped");
}

fn flash(sink: &SharedLedSink) {
    let frame = LedFrame::strobe();
    let mut guard = match sink.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    if let Err(err) = guard.send_frame(&frame) {
        log_transport_error(&err, "strobe flash");
    }
}

pub fn spawn_strobe(commands: Receiver<StrobeCommand>, sink: SharedLedSink) -> JoinHandle<()> {
    thread::spawn(move || run_strobe(commands, sink))
}
