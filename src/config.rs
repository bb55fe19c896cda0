//! Settings persistence
//!
//! Runtime settings loaded once at start and saved at clean shutdown: the
//! beacon peer address, the active lighting mode, the three beacon
//! sensitivities and the control surface device name. A missing file means
//! first run and yields defaults; any other load or save failure is surfaced
//! to the user without aborting the process.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Complete persisted application settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub udp: UdpTarget,
    /// Active lighting mode id, 1-7
    pub mode: u8,
    /// Beacon sensitivities in lamp order red, yellow, green (0-127 each)
    pub sensitivity: [u8; 3],
    pub midi: SurfaceSettings,
}

/// Network peer receiving the beacon datagrams
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UdpTarget {
    pub ip: String,
    pub port: u16,
}

/// Control surface selection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurfaceSettings {
    pub dev_name: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            udp: UdpTarget {
                ip: "192.168.10.100".to_string(),
                port: 8888,
            },
            mode: 1,
            sensitivity: [100, 100, 100],
            midi: SurfaceSettings {
                dev_name: "X-TOUCH MINI".to_string(),
            },
        }
    }
}

impl Settings {
    /// Load settings from a JSON file.
    ///
    /// # Returns
    /// * `Ok(Settings)` - Parsed settings, or defaults if the file is absent
    /// * `Err(ConfigError)` - The file exists but is unreadable or malformed
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(contents) => serde_json::from_str(&contents).map_err(|err| ConfigError::Parse {
                path: path.display().to_string(),
                details: err.to_string(),
            }),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                log::info!("[Config] no settings file at {:?}; using defaults", path);
                Ok(Self::default())
            }
            Err(err) => Err(ConfigError::Io {
                path: path.display().to_string(),
                details: err.to_string(),
            }),
        }
    }

    /// Save settings as pretty-printed JSON, creating parent directories.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let io_err = |err: std::io::Error| ConfigError::Io {
            path: path.display().to_string(),
            details: err.to_string(),
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let body = serde_json::to_string_pretty(self).map_err(|err| ConfigError::Parse {
            path: path.display().to_string(),
            details: err.to_string(),
        })?;
        fs::write(path, body).map_err(io_err)?;
        log::info!("[Config] settings saved to {:?}", path);
        Ok(())
    }
}

/// Default settings file location: `$XDG_CONFIG_HOME/colormatic/settings.json`
/// with a `~/.config` fallback. `None` when no home directory is known.
pub fn settings_path() -> Option<PathBuf> {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        if !xdg.trim().is_empty() {
            return Some(PathBuf::from(xdg).join("colormatic").join("settings.json"));
        }
    }
    let home = std::env::var("HOME").ok()?;
    if home.trim().is_empty() {
        return None;
    }
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("colormatic")
            .join("settings.json"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.udp.ip, "192.168.10.100");
        assert_eq!(settings.udp.port, 8888);
        assert_eq!(settings.mode, 1);
        assert_eq!(settings.sensitivity, [100, 100, 100]);
        assert_eq!(settings.midi.dev_name, "X-TOUCH MINI");
    }

    #[test]
    fn test_json_roundtrip() {
        let mut settings = Settings::default();
        settings.mode = 5;
        settings.sensitivity = [10, 64, 127];

        let json = serde_json::to_string_pretty(&settings).unwrap();
        let parsed: Settings = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, settings);
    }

    #[test]
    fn test_load_missing_file_yields_defaults() {
        let loaded = Settings::load("/nonexistent/colormatic/settings.json").unwrap();
        assert_eq!(loaded, Settings::default());
    }

    #[test]
    fn test_save_and_load() {
        let dir = std::env::temp_dir().join("colormatic-test-settings");
        let path = dir.join("settings.json");
        let _ = fs::remove_file(&path);

        let mut settings = Settings::default();
        settings.udp.port = 9999;
        settings.save(&path).unwrap();

        let loaded = Settings::load(&path).unwrap();
        assert_eq!(loaded.udp.port, 9999);

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_load_malformed_file_is_an_error() {
        let dir = std::env::temp_dir().join("colormatic-test-settings");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("broken.json");
        fs::write(&path, "{not json").unwrap();

        match Settings::load(&path) {
            Err(ConfigError::Parse { .. }) => {}
            other => panic!("expected parse error, got {:?}", other),
        }

        let _ = fs::remove_file(&path);
    }
}
