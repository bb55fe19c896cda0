// Settings persistence error types

use std::fmt;

/// Errors raised while loading or saving the settings file.
///
/// A missing file is not an error (defaults apply); anything else is
/// surfaced to the user but never aborts the process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The file exists but could not be read or written
    Io { path: String, details: String },

    /// The file was read but is not valid settings JSON
    Parse { path: String, details: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, details } => {
                write!(f, "settings file {} inaccessible: {}", path, details)
            }
            ConfigError::Parse { path, details } => {
                write!(f, "settings file {} malformed: {}", path, details)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::Parse {
            path: "settings.json".to_string(),
            details: "expected value".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("settings.json"));
        assert!(text.contains("malformed"));
    }
}
