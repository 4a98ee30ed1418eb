//! # Configuration Management
//!
//! This module handles loading and parsing configuration from the face-config.toml file.
//! It provides a centralized way to configure the layout, colours, timing, sync
//! behaviour and the demo companion payload.
//!
//! Every section is optional in the file; missing sections and fields take their
//! default values.

use crate::remote::PeerTieBreak;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Default configuration file name, looked up in the working directory
pub const CONFIG_FILE: &str = "face-config.toml";

/// Application configuration loaded from face-config.toml
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Screen dimensions
    pub display: DisplayConfig,
    /// Element offsets and text sizes
    pub layout: LayoutConfig,
    /// Colours
    pub theme: ThemeConfig,
    /// Render timer settings
    pub timing: TimingConfig,
    /// Remote channel settings
    pub sync: SyncConfig,
    /// Payload served by the loopback companion in the demo host
    pub companion: CompanionConfig,
}

/// Screen dimensions in pixels
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub width: u32,
    pub height: u32,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        DisplayConfig {
            width: 320,
            height: 320,
        }
    }
}

/// Element offsets and sizes in pixels.
///
/// Round screens use `time_x_offset_round` and `time_text_size_round`; every other
/// value is shared between shapes.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub time_x_offset: f32,
    pub time_x_offset_round: f32,
    pub time_y_offset: f32,
    pub time_text_size: f32,
    pub time_text_size_round: f32,
    pub date_x_offset: f32,
    pub date_y_offset: f32,
    pub date_text_size: f32,
    pub separator_x_offset: f32,
    pub separator_y_offset: f32,
    pub separator_length: f32,
    pub icon_x_offset: f32,
    pub icon_y_offset: f32,
    pub icon_size: u32,
    pub high_x_offset: f32,
    pub high_y_offset: f32,
    pub high_text_size: f32,
    pub low_x_offset: f32,
    pub low_y_offset: f32,
    pub low_text_size: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        LayoutConfig {
            time_x_offset: 70.0,
            time_x_offset_round: 80.0,
            time_y_offset: 120.0,
            time_text_size: 20.0,
            time_text_size_round: 18.0,
            date_x_offset: 75.0,
            date_y_offset: 150.0,
            date_text_size: 13.0,
            separator_x_offset: 130.0,
            separator_y_offset: 175.0,
            separator_length: 60.0,
            icon_x_offset: 60.0,
            icon_y_offset: 195.0,
            icon_size: 40,
            high_x_offset: 130.0,
            high_y_offset: 225.0,
            high_text_size: 20.0,
            low_x_offset: 200.0,
            low_y_offset: 225.0,
            low_text_size: 15.0,
        }
    }
}

/// RGB colours used in interactive mode
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct ThemeConfig {
    pub background: [u8; 3],
    pub primary_text: [u8; 3],
    pub secondary_text: [u8; 3],
}

impl Default for ThemeConfig {
    fn default() -> Self {
        ThemeConfig {
            background: [0x03, 0xA9, 0xF4], // sunny blue
            primary_text: [0xFF, 0xFF, 0xFF],
            secondary_text: [0xB3, 0xE5, 0xFC],
        }
    }
}

/// Render timer configuration
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Interactive update interval; ticks land on multiples of this value
    pub interactive_update_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        TimingConfig {
            interactive_update_ms: 1000,
        }
    }
}

/// Remote channel configuration
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Data item path carrying the weather payload
    pub data_path: String,
    /// Which peer to use when several are connected
    pub peer_tie_break: PeerTieBreak,
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig {
            data_path: "/sunshine".to_string(),
            peer_tie_break: PeerTieBreak::LastWins,
        }
    }
}

/// Demo payload published by the loopback companion
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct CompanionConfig {
    pub peer_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub high_temp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub low_temp: Option<String>,
    /// PNG file sent as the weather icon asset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_path: Option<PathBuf>,
}

impl Default for CompanionConfig {
    fn default() -> Self {
        CompanionConfig {
            peer_name: "phone".to_string(),
            high_temp: Some("75°".to_string()),
            low_temp: Some("54°".to_string()),
            icon_path: None,
        }
    }
}

impl Config {
    /// Load configuration from face-config.toml file
    /// Falls back to default configuration if file doesn't exist or is invalid
    pub fn load() -> Self {
        Self::load_from_path(CONFIG_FILE)
    }

    /// Load configuration from specified path
    /// Falls back to default configuration if file doesn't exist or is invalid
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(contents) => match toml::from_str::<Config>(&contents) {
                Ok(config) => {
                    log::info!("Loaded configuration from {}", path.display());
                    config
                }
                Err(e) => {
                    log::warn!("Invalid config file format: {}", e);
                    log::warn!("Using default configuration");
                    Self::default()
                }
            },
            Err(_) => {
                log::info!("No config file found, using default configuration");
                Self::default()
            }
        }
    }

    /// Save current configuration to the given path
    pub fn save<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path.as_ref(), contents)?;
        log::info!("Configuration saved to {}", path.as_ref().display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.sync.data_path, "/sunshine");
        assert_eq!(config.sync.peer_tie_break, PeerTieBreak::LastWins);
        assert_eq!(config.timing.interactive_update_ms, 1000);
        assert_eq!(config.layout.icon_size, 40);
    }

    #[test]
    fn test_config_roundtrip() {
        let config = Config::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(config.sync.data_path, parsed.sync.data_path);
        assert_eq!(config.theme.background, parsed.theme.background);
    }

    #[test]
    fn test_load_nonexistent_file() {
        let config = Config::load_from_path("/nonexistent/path");
        // Should fallback to default
        assert_eq!(config.sync.data_path, "/sunshine");
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[sync]
peer_tie_break = "first-wins"

[timing]
interactive_update_ms = 500
"#
        )
        .unwrap();

        let config = Config::load_from_path(file.path());
        assert_eq!(config.sync.peer_tie_break, PeerTieBreak::FirstWins);
        assert_eq!(config.sync.data_path, "/sunshine");
        assert_eq!(config.timing.interactive_update_ms, 500);
        assert_eq!(config.display.width, 320);
    }

    #[test]
    fn test_invalid_file_falls_back() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "this is = = not toml").unwrap();

        let config = Config::load_from_path(file.path());
        assert_eq!(config.timing.interactive_update_ms, 1000);
    }

    #[test]
    fn test_save_then_load() {
        let file = NamedTempFile::new().unwrap();
        let mut config = Config::default();
        config.companion.high_temp = Some("80°".to_string());
        config.save(file.path()).unwrap();

        let loaded = Config::load_from_path(file.path());
        assert_eq!(loaded.companion.high_temp.as_deref(), Some("80°"));
    }
}
