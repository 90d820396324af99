//! Vasari configuration system
//!
//! This crate provides centralized configuration management for the Vasari
//! runtime, loading settings from `vasari.toml` with environment overrides.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default file name searched in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "vasari.toml";

/// Errors raised while loading a configuration file.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Main configuration structure for Vasari
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct VasariConfig {
    /// Display surface settings
    pub window: WindowConfig,
    /// Render loop and input timing settings
    pub render: RenderConfig,
    /// Text rendering settings
    pub text: TextConfig,
    /// Content navigation settings
    pub navigator: NavigatorConfig,
    /// Inline script settings
    pub script: ScriptConfig,
}

/// Display surface configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    /// Surface width in pixels
    pub width: u32,
    /// Surface height in pixels
    pub height: u32,
}

/// Render loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Frame ticks per second for scheduled render passes
    pub fps: u32,
    /// Minimum interval between accepted input events of one class
    pub debounce_ms: u64,
    /// Font size used when a node does not specify `size`
    pub default_font_size: f32,
}

/// Text rendering configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct TextConfig {
    /// Path to a custom font file (.ttf/.otf). Falls back to a system sans-serif.
    pub font: Option<PathBuf>,
}

/// Navigator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigatorConfig {
    /// Path loaded by the `home` button and on startup
    pub home: String,
    /// Namespace → content base (http(s) URL or local directory)
    pub peers: BTreeMap<String, String>,
}

/// Inline script configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptConfig {
    /// Side-effecting verbs scripts are allowed to use
    pub capabilities: Vec<String>,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Vasari".to_string(),
            width: 1024,
            height: 576,
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            fps: 30,
            debounce_ms: 30,
            default_font_size: 13.0,
        }
    }
}

impl Default for NavigatorConfig {
    fn default() -> Self {
        Self {
            home: "@exactchange:page:featured".to_string(),
            peers: BTreeMap::new(),
        }
    }
}

impl Default for ScriptConfig {
    fn default() -> Self {
        Self {
            capabilities: ["navigate", "back", "exit", "log"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

impl RenderConfig {
    /// Interval between frame ticks.
    pub fn frame_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(1000 / u64::from(self.fps.max(1)))
    }

    pub fn debounce_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.debounce_ms)
    }
}

impl VasariConfig {
    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration from `vasari.toml` in the current directory,
    /// or return the default configuration if the file doesn't exist
    pub fn load_or_default() -> Self {
        Self::load_from_file(DEFAULT_CONFIG_FILE).unwrap_or_default()
    }

    /// Merge configuration with environment variables
    ///
    /// Environment variables take precedence over configuration file values.
    pub fn merge_with_env(&mut self) {
        if let Ok(title) = std::env::var("VASARI_TITLE") {
            self.window.title = title;
        }
        if let Some(width) = env_parse::<u32>("VASARI_WIDTH") {
            self.window.width = width;
        }
        if let Some(height) = env_parse::<u32>("VASARI_HEIGHT") {
            self.window.height = height;
        }

        if let Some(fps) = env_parse::<u32>("VASARI_FPS") {
            self.render.fps = fps;
        }
        if let Some(ms) = env_parse::<u64>("VASARI_DEBOUNCE_MS") {
            self.render.debounce_ms = ms;
        }
        if let Some(size) = env_parse::<f32>("VASARI_FONT_SIZE") {
            self.render.default_font_size = size;
        }

        if let Ok(font) = std::env::var("VASARI_FONT") {
            self.text.font = Some(PathBuf::from(font));
        }
        if let Ok(home) = std::env::var("VASARI_HOME") {
            self.navigator.home = home;
        }
    }

    /// Load configuration with environment variable overrides
    ///
    /// 1. Load from `path` (or `vasari.toml`, or defaults if not found)
    /// 2. Override with environment variables if present
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::load_from_file(path)?,
            None => Self::load_or_default(),
        };
        config.merge_with_env();
        Ok(config)
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = VasariConfig::default();
        assert_eq!(config.window.width, 1024);
        assert_eq!(config.window.height, 576);
        assert_eq!(config.render.fps, 30);
        assert_eq!(config.render.debounce_ms, 30);
        assert_eq!(config.render.default_font_size, 13.0);
        assert!(config.script.capabilities.iter().any(|c| c == "navigate"));
    }

    #[test]
    fn test_toml_serialization() {
        let mut config = VasariConfig::default();
        config
            .navigator
            .peers
            .insert("exactchange".into(), "https://example.com".into());
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: VasariConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(
            parsed.navigator.peers.get("exactchange").map(String::as_str),
            Some("https://example.com")
        );
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[render]\ndebounce_ms = 50\n\n[navigator.peers]\nlocal = \"./peer\"").unwrap();

        let config = VasariConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.render.debounce_ms, 50);
        assert_eq!(config.render.fps, 30);
        assert_eq!(config.window.title, "Vasari");
        assert_eq!(config.navigator.peers.len(), 1);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let err = VasariConfig::load_from_file("/definitely/not/here/vasari.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_frame_interval() {
        let render = RenderConfig::default();
        assert_eq!(render.frame_interval().as_millis(), 33);
        assert_eq!(render.debounce_interval().as_millis(), 30);
    }

    #[test]
    fn test_merge_with_env() {
        unsafe {
            std::env::set_var("VASARI_DEBOUNCE_MS", "45");
            std::env::set_var("VASARI_TITLE", "Medici");
        }

        let mut config = VasariConfig::default();
        config.merge_with_env();

        assert_eq!(config.render.debounce_ms, 45);
        assert_eq!(config.window.title, "Medici");

        unsafe {
            std::env::remove_var("VASARI_DEBOUNCE_MS");
            std::env::remove_var("VASARI_TITLE");
        }
    }
}
