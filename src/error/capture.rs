// Audio capture error types

use log::error;
use std::fmt;

/// Errors raised while opening or running the audio capture stream.
///
/// A capture failure never aborts the process: the pipeline keeps ticking on
/// a zero or stale spectrum and the lights simply stay dark.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    /// No usable input device was found at startup
    DeviceUnavailable { details: String },

    /// Failed to open or start the input stream
    StreamOpenFailed { reason: String },

    /// The device offers a sample format the pipeline does not handle
    UnsupportedFormat { format: String },
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureError::DeviceUnavailable { details } => {
                write!(f, "audio device unavailable: {}", details)
            }
            CaptureError::StreamOpenFailed { reason } => {
                write!(f, "failed to open audio stream: {}", reason)
            }
            CaptureError::UnsupportedFormat { format } => {
                write!(f, "unsupported sample format: {}", format)
            }
        }
    }
}

impl std::error::Error for CaptureError {}

/// Log a capture error with the context it occurred in.
pub fn log_capture_error(err: &CaptureError, context: &str) {
    error!("[Capture] error in {}: {}", context, err);
}
