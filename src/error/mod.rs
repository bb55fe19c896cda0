// Error types for the colormatic application
//
// Per-domain error enums with structured variants. Nothing in the core is
// fatal: every recoverable error is handled where it occurs, and these types
// mostly exist to make the recovery paths loggable and testable.

mod capture;
mod settings;
mod transport;

pub use capture::{log_capture_error, CaptureError};
pub use settings::ConfigError;
pub use transport::{log_transport_error, TransportError};
