// Control surface - knob messages to sensitivity state
//
// The external surface (X-TOUCH MINI style) speaks 3-byte control-change
// messages. Only the part the pipeline consumes is mapped here: three knobs
// onto the three beacon sensitivities, plus the connect-time sync that puts
// the encoder rings into the right display style and position. The device
// transport itself lives behind the ControlSurface trait.

use log::{debug, info};
use std::collections::VecDeque;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::context::EngineContext;
use crate::error::TransportError;

/// Status byte for encoder ring display configuration
pub const STATUS_DISPLAY: u8 = 176;

/// Status byte carrying knob rotation updates
pub const STATUS_KNOB: u8 = 186;

/// Ring display style pushed at connect time
const DISPLAY_MODE: u8 = 2;

/// First knob control id; knobs 1..=3 map to lamps 0..=2
const KNOB_BASE: u8 = 1;

/// Poll cadence of the input loop
pub const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// One 3-byte control message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlMessage {
    pub status: u8,
    pub control: u8,
    pub value: u8,
}

impl ControlMessage {
    pub fn new(status: u8, control: u8, value: u8) -> Self {
        Self {
            status,
            control,
            value,
        }
    }
}

/// Device seam: real surfaces poll hardware, the null surface stands in
/// when no device is attached, and tests script messages.
pub trait ControlSurface: Send {
    /// Next pending message from the device, if any.
    fn poll(&mut self) -> Option<ControlMessage>;

    /// Push one message to the device.
    fn send(&mut self, message: ControlMessage) -> Result<(), TransportError>;
}

/// Pipeline-relevant event decoded from a raw message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlEvent {
    Sensitivity { lamp: usize, value: u8 },
}

/// Decode one raw message, if it maps to a pipeline event.
pub fn decode(message: ControlMessage) -> Option<ControlEvent> {
    if message.status == STATUS_KNOB && (KNOB_BASE..KNOB_BASE + 3).contains(&message.control) {
        return Some(ControlEvent::Sensitivity {
            lamp: (message.control - KNOB_BASE) as usize,
            value: message.value.min(127),
        });
    }
    None
}

/// Connect-time sync: display style for the three encoder rings, then the
/// current sensitivities echoed to the knobs.
pub fn sync_surface(
    surface: &mut dyn ControlSurface,
    sensitivity: [u8; 3],
) -> Result<(), TransportError> {
    for knob in 0..3u8 {
        surface.send(ControlMessage::new(
            STATUS_DISPLAY,
            KNOB_BASE + knob,
            DISPLAY_MODE,
        ))?;
    }
    for (knob, value) in sensitivity.iter().enumerate() {
        surface.send(ControlMessage::new(
            STATUS_KNOB,
            KNOB_BASE + knob as u8,
            *value,
        ))?;
    }
    Ok(())
}

/// Input loop: poll the surface, apply decoded events, honor the stop flag.
pub fn run_control_loop(ctx: Arc<EngineContext>, mut surface: Box<dyn ControlSurface>) {
    info!("[Control] surface loop running");
    while !ctx.should_stop() {
        while let Some(message) = surface.poll() {
            if let Some(ControlEvent::Sensitivity { lamp, value }) = decode(message) {
                debug!("[Control] sensitivity {} -> {}", lamp, value);
                ctx.controls.set_sensitivity(lamp, value);
            }
        }
        thread::sleep(POLL_INTERVAL);
    }
    info!("[Control] surface loop stopped");
}

pub fn spawn_control_loop(
    ctx: Arc<EngineContext>,
    surface: Box<dyn ControlSurface>,
) -> JoinHandle<()> {
    thread::spawn(move || run_control_loop(ctx, surface))
}

/// No-device stand-in: receives nothing, accepts everything.
pub struct NullSurface;

impl ControlSurface for NullSurface {
    fn poll(&mut self) -> Option<ControlMessage> {
        None
    }

    fn send(&mut self, _message: ControlMessage) -> Result<(), TransportError> {
        Ok(())
    }
}

/// Scripted surface: feeds queued messages in order and records every send.
pub struct ScriptedSurface {
    incoming: VecDeque<ControlMessage>,
    pub sent: Vec<ControlMessage>,
}

impl ScriptedSurface {
    pub fn new(incoming: impl IntoIterator<Item = ControlMessage>) -> Self {
        Self {
            incoming: incoming.into_iter().collect(),
            sent: Vec::new(),
        }
    }
}

impl ControlSurface for ScriptedSurface {
    fn poll(&mut self) -> Option<ControlMessage> {
        self.incoming.pop_front()
    }

    fn send(&mut self, message: ControlMessage) -> Result<(), TransportError> {
        self.sent.push(message);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;

    #[test]
    fn test_decode_knob_messages() {
        let event = decode(ControlMessage::new(STATUS_KNOB, 1, 80));
        assert_eq!(event, Some(ControlEvent::Sensitivity { lamp: 0, value: 80 }));

        let event = decode(ControlMessage::new(STATUS_KNOB, 3, 127));
        assert_eq!(
            event,
            Some(ControlEvent::Sensitivity {
                lamp: 2,
                value: 127
            })
        );
    }

    #[test]
    fn test_decode_rejects_unmapped_messages() {
        assert_eq!(decode(ControlMessage::new(STATUS_KNOB, 4, 50)), None);
        assert_eq!(decode(ControlMessage::new(STATUS_KNOB, 0, 50)), None);
        assert_eq!(decode(ControlMessage::new(STATUS_DISPLAY, 1, 50)), None);
        assert_eq!(decode(ControlMessage::new(0x90, 1, 50)), None);
    }

    #[test]
    fn test_decode_clamps_value() {
        let event = decode(ControlMessage::new(STATUS_KNOB, 2, 200));
        assert_eq!(
            event,
            Some(ControlEvent::Sensitivity {
                lamp: 1,
                value: 127
            })
        );
    }

    #[test]
    fn test_sync_sequence() {
        let mut surface = ScriptedSurface::new(Vec::new());
        sync_surface(&mut surface, [10, 20, 30]).unwrap();

        assert_eq!(surface.sent.len(), 6);
        // Display style first, one message per ring.
        for (i, message) in surface.sent[..3].iter().enumerate() {
            assert_eq!(
                *message,
                ControlMessage::new(STATUS_DISPLAY, 1 + i as u8, 2)
            );
        }
        // Then the knob positions.
        assert_eq!(surface.sent[3], ControlMessage::new(STATUS_KNOB, 1, 10));
        assert_eq!(surface.sent[4], ControlMessage::new(STATUS_KNOB, 2, 20));
        assert_eq!(surface.sent[5], ControlMessage::new(STATUS_KNOB, 3, 30));
    }

    #[test]
    fn test_events_apply_to_context() {
        let ctx = EngineContext::new(&Settings::default());
        let mut surface = ScriptedSurface::new([
            ControlMessage::new(STATUS_KNOB, 1, 42),
            ControlMessage::new(STATUS_DISPLAY, 1, 2), // ignored
            ControlMessage::new(STATUS_KNOB, 3, 99),
        ]);

        while let Some(message) = surface.poll() {
            if let Some(ControlEvent::Sensitivity { lamp, value }) = decode(message) {
                ctx.controls.set_sensitivity(lamp, value);
            }
        }

        assert_eq!(ctx.controls.sensitivities(), [42, 100, 99]);
    }
}
