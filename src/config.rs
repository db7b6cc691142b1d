//! Application Configuration
//! Created once at process start and passed to the app and chart builders.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Environment variable overriding the config file location.
pub const CONFIG_ENV_VAR: &str = "PAGEVIEWS_MAP_CONFIG";
/// Config file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "pageviews_map.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid config syntax: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid config value: {0}")]
    Invalid(String),
}

/// Settings for the interactive map page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapSettings {
    pub width: u32,
    pub height: u32,
    pub projection: String,
    pub frame_duration_ms: u32,
}

impl Default for MapSettings {
    fn default() -> Self {
        Self {
            width: 1000,
            height: 700,
            projection: "natural earth".to_string(),
            frame_duration_ms: 800,
        }
    }
}

/// Settings for static PNG frame export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameSettings {
    pub top_n: usize,
    pub width: u32,
    pub height: u32,
}

impl Default for FrameSettings {
    fn default() -> Self {
        Self {
            top_n: 15,
            width: 1200,
            height: 800,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub data_path: PathBuf,
    pub output_dir: PathBuf,
    pub title: String,
    pub map: MapSettings,
    pub frames: FrameSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from("data/pageviews_year_percapita_continent.csv"),
            output_dir: PathBuf::from("output"),
            title: "Animated Pageviews Time Map".to_string(),
            map: MapSettings::default(),
            frames: FrameSettings::default(),
        }
    }
}

impl AppConfig {
    /// Resolve the config file from the environment, falling back to defaults
    /// when no file exists.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var_os(CONFIG_ENV_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

        if path.exists() {
            Self::from_file(&path)
        } else {
            debug!(path = %path.display(), "No config file, using defaults");
            Ok(Self::default())
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&text)?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.map.width == 0 || self.map.height == 0 {
            return Err(ConfigError::Invalid("map width and height must be non-zero".into()));
        }
        if self.map.frame_duration_ms == 0 {
            return Err(ConfigError::Invalid("map.frame_duration_ms must be non-zero".into()));
        }
        if self.frames.width == 0 || self.frames.height == 0 {
            return Err(ConfigError::Invalid("frame width and height must be non-zero".into()));
        }
        if self.frames.top_n == 0 {
            return Err(ConfigError::Invalid("frames.top_n must be non-zero".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_document_yields_defaults() {
        let config = AppConfig::from_toml_str("").unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let config = AppConfig::from_toml_str(
            r#"
            data_path = "stats.csv"

            [map]
            width = 1400
            "#,
        )
        .unwrap();

        assert_eq!(config.data_path, PathBuf::from("stats.csv"));
        assert_eq!(config.map.width, 1400);
        assert_eq!(config.map.height, 700);
        assert_eq!(config.map.projection, "natural earth");
        assert_eq!(config.frames.top_n, 15);
    }

    #[test]
    fn zero_dimensions_are_rejected() {
        let err = AppConfig::from_toml_str("[map]\nheight = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = AppConfig::from_toml_str("[frames]\ntop_n = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let err = AppConfig::from_toml_str("data_path = [").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn reads_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "title = \"Custom\"\noutput_dir = \"out\"").unwrap();

        let config = AppConfig::from_file(file.path()).unwrap();
        assert_eq!(config.title, "Custom");
        assert_eq!(config.output_dir, PathBuf::from("out"));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = AppConfig::from_file(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
