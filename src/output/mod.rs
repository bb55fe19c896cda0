// Output transports - LED frame and beacon datagram encoding plus sinks
//
// The physical transports are external collaborators; this module owns the
// byte layouts and minimal sink implementations behind traits, so the tick
// engine, the strobe thread and the tests all drive the same encoding.

use log::info;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::net::UdpSocket;
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::beacon::BeaconState;
use crate::error::TransportError;
use crate::modes::Strip;

/// Wire size of one LED frame: report id byte plus 10 RGB cells
pub const FRAME_LEN: usize = 31;

/// One encoded hardware frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedFrame([u8; FRAME_LEN]);

impl LedFrame {
    /// Encode the strip: header 0x00, then r, g, b per cell in order.
    pub fn from_strip(strip: &Strip) -> Self {
        let mut bytes = [0u8; FRAME_LEN];
        for (i, cell) in strip.cells.iter().enumerate() {
            bytes[1 + i * 3] = cell.r;
            bytes[2 + i * 3] = cell.g;
            bytes[3 + i * 3] = cell.b;
        }
        LedFrame(bytes)
    }

    /// Full-on override frame used by the strobe.
    pub fn strobe() -> Self {
        let mut bytes = [0xFF; FRAME_LEN];
        bytes[0] = 0x00;
        LedFrame(bytes)
    }

    /// All-off frame sent at shutdown.
    pub fn blackout() -> Self {
        LedFrame([0u8; FRAME_LEN])
    }

    pub fn as_bytes(&self) -> &[u8; FRAME_LEN] {
        &self.0
    }
}

/// Encode the beacon flags as the peer's 4-character text datagram.
pub fn beacon_datagram(state: &BeaconState) -> [u8; 4] {
    let mut out = [b'0'; 4];
    for (slot, lit) in out.iter_mut().zip(state.flags()) {
        if lit {
            *slot = b'1';
        }
    }
    out
}

/// Frame consumer seam for the LED strip hardware.
pub trait LedSink: Send {
    fn send_frame(&mut self, frame: &LedFrame) -> Result<(), TransportError>;
}

/// Datagram consumer seam for the beacon peer.
pub trait BeaconSink: Send {
    fn send_state(&mut self, state: &BeaconState) -> Result<(), TransportError>;
}

/// LED sink shared between the tick loop and the strobe thread. Both write
/// frames with no further coordination; last write wins on the wire.
pub type SharedLedSink = Arc<Mutex<Box<dyn LedSink>>>;

pub fn shared_sink(sink: Box<dyn LedSink>) -> SharedLedSink {
    Arc::new(Mutex::new(sink))
}

/// Writes raw output reports to a HID character device node.
pub struct HidRawSink {
    device: File,
}

impl HidRawSink {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, TransportError> {
        let path = path.as_ref();
        let device = OpenOptions::new()
            .write(true)
            .open(path)
            .map_err(|err| TransportError::Io {
                details: format!("open {}: {}", path.display(), err),
            })?;
        info!("[Output] LED device open: {}", path.display());
        Ok(Self { device })
    }
}

impl LedSink for HidRawSink {
    fn send_frame(&mut self, frame: &LedFrame) -> Result<(), TransportError> {
        self.device.write_all(frame.as_bytes())?;
        Ok(())
    }
}

/// Sends the beacon datagram to the configured peer over UDP.
pub struct UdpBeaconSink {
    socket: UdpSocket,
    target: String,
}

impl UdpBeaconSink {
    pub fn connect(ip: &str, port: u16) -> Result<Self, TransportError> {
        let socket = UdpSocket::bind("0.0.0.0:0")?;
        let target = format!("{}:{}", ip, port);
        info!("[Output] beacon peer: {}", target);
        Ok(Self { socket, target })
    }
}

impl BeaconSink for UdpBeaconSink {
    fn send_state(&mut self, state: &BeaconState) -> Result<(), TransportError> {
        self.socket
            .send_to(&beacon_datagram(state), self.target.as_str())?;
        Ok(())
    }
}

/// Stand-in when no LED device is attached: output degrades to nothing.
pub struct NullLedSink;

impl LedSink for NullLedSink {
    fn send_frame(&mut self, _frame: &LedFrame) -> Result<(), TransportError> {
        Ok(())
    }
}

/// Stand-in when the beacon peer is unreachable at startup.
pub struct NullBeaconSink;

impl BeaconSink for NullBeaconSink {
    fn send_state(&mut self, _state: &BeaconState) -> Result<(), TransportError> {
        Ok(())
    }
}

/// Shared log of frames recorded by a MemoryLedSink.
pub type FrameLog = Arc<Mutex<Vec<LedFrame>>>;

/// Shared log of states recorded by a MemoryBeaconSink.
pub type BeaconLog = Arc<Mutex<Vec<BeaconState>>>;

/// Test sink recording every frame it is handed.
pub struct MemoryLedSink {
    log: FrameLog,
}

impl MemoryLedSink {
    pub fn new() -> (Self, FrameLog) {
        let log: FrameLog = Arc::new(Mutex::new(Vec::new()));
        (Self { log: Arc::clone(&log) }, log)
    }
}

impl LedSink for MemoryLedSink {
    fn send_frame(&mut self, frame: &LedFrame) -> Result<(), TransportError> {
        if let Ok(mut frames) = self.log.lock() {
            frames.push(*frame);
        }
        Ok(())
    }
}

/// Test sink recording every beacon state it is handed.
pub struct MemoryBeaconSink {
    log: BeaconLog,
}

impl MemoryBeaconSink {
    pub fn new() -> (Self, BeaconLog) {
        let log: BeaconLog = Arc::new(Mutex::new(Vec::new()));
        (Self { log: Arc::clone(&log) }, log)
    }
}

impl BeaconSink for MemoryBeaconSink {
    fn send_state(&mut self, state: &BeaconState) -> Result<(), TransportError> {
        if let Ok(mut states) = self.log.lock() {
            states.push(*state);
        }
        Ok(())
    }
}
