use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::error::Result;

/// Application configuration loaded from `~/.config/xoverlay/config.json`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Quiet period after the last change before a frame is rendered.
    pub debounce_ms: u64,
    /// Instance half of WM_CLASS.
    pub wm_instance: String,
    /// Class half of WM_CLASS.
    pub wm_class: String,
    /// Window title; derived from the input name when unset.
    pub title: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            debounce_ms: 50,
            wm_instance: "overlay".to_string(),
            wm_class: "overlay".to_string(),
            title: None,
        }
    }
}

impl Config {
    /// Load configuration from the user's config directory.
    /// Falls back to defaults if the file doesn't exist or can't be parsed.
    pub fn load() -> Self {
        let path = match Self::config_path() {
            Some(p) => p,
            None => return Self::default(),
        };

        match fs::read_to_string(&path) {
            Ok(content) => match Self::parse(&content) {
                Ok(config) => {
                    log::debug!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    log::warn!("Ignoring malformed config {}: {}", path.display(), e);
                    Self::default()
                }
            },
            Err(e) if e.kind() == ErrorKind::NotFound => Self::default(),
            Err(e) => {
                log::warn!("Cannot read config {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// WM_CLASS property value: two NUL-terminated strings.
    pub fn wm_class_property(&self) -> Vec<u8> {
        format!("{}\0{}\0", self.wm_instance, self.wm_class).into_bytes()
    }

    fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("xoverlay").join("config.json"))
    }
}
