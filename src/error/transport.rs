// Output transport error types

use log::warn;
use std::fmt;

/// Errors raised while pushing frames or datagrams to an output transport.
///
/// All transport errors are transient by contract: the failed write is
/// logged and dropped, and the next tick sends a fresh frame anyway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// An I/O failure on the underlying device or socket
    Io { details: String },
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Io { details } => write!(f, "transport I/O error: {}", details),
        }
    }
}

impl std::error::Error for TransportError {}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        TransportError::Io {
            details: err.to_string(),
        }
    }
}

/// Log a transport error with the context it occurred in.
///
/// Warn level only: a dropped frame is superseded 20 ms later.
pub fn log_transport_error(err: &TransportError, context: &str) {
    warn!("[Output] error in {}: {}", context, err);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::other("device detached");
        let err: TransportError = io_err.into();
        match err {
            TransportError::Io { details } => assert!(details.contains("device detached")),
        }
    }
}
