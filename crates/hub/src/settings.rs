//! Host settings consumed by the hub core
//!
//! Loaded from (in order of priority):
//! 1. `settings.json` in the hub config directory
//! 2. Runtime environment variables (fallback)

use log::warn;
use serde::{Deserialize, Serialize};

/// Settings filename in the hub config directory
const SETTINGS_FILE: &str = "settings.json";

/// Environment fallback for the experimental opener flag
const EXPERIMENTAL_OPENER_ENV: &str = "HUB_EXPERIMENTAL_WINDOW_OPENER";

/// Feature flags and knobs supplied by the settings collaborator
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Route new-window requests through the experimental external opener
    /// instead of the bridge's own classification
    #[serde(default)]
    pub use_experimental_window_opener: bool,
}

impl Settings {
    /// Load settings from the config file, falling back to environment
    /// variables, then defaults. A malformed file is logged and treated as
    /// absent rather than failing startup.
    pub fn load() -> Self {
        if config::config_exists(SETTINGS_FILE) {
            match config::load_json(SETTINGS_FILE) {
                Ok(settings) => return settings,
                Err(err) => warn!("Ignoring unreadable settings file: {err:#}"),
            }
        }
        Self::from_env()
    }

    /// Read settings from environment variables
    pub fn from_env() -> Self {
        Self {
            use_experimental_window_opener: std::env::var(EXPERIMENTAL_OPENER_ENV)
                .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
        }
    }

    /// Persist settings to the config file
    pub fn save(&self) -> anyhow::Result<()> {
        config::save_json(SETTINGS_FILE, self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_off() {
        let settings = Settings::default();
        assert!(!settings.use_experimental_window_opener);
    }

    #[test]
    fn test_missing_fields_default() {
        let settings: Settings = serde_json::from_str("{}").unwrap();
        assert!(!settings.use_experimental_window_opener);
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{ "use_experimental_window_opener": true }"#,
        )
        .unwrap();

        let settings: Settings = config::load_json_file(&path).unwrap();
        assert!(settings.use_experimental_window_opener);
    }
}
