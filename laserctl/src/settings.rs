//! Persistent settings

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Context};
use laser_link::{ControllerConfig, LinkConfig, NoisePolicy};
use serde::{Deserialize, Serialize};

/// User settings stored as JSON
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    /// Device path used when none is given on the command line
    #[serde(default)]
    pub default_device: Option<String>,
    /// Per-operation timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Handling of unsolicited bytes
    #[serde(default)]
    pub noise_policy: NoisePolicy,
    /// How long a late reply is still expected, in milliseconds
    #[serde(default = "default_stale_window_ms")]
    pub stale_window_ms: u64,
}

fn default_timeout_ms() -> u64 {
    laser_protocol::DEFAULT_TIMEOUT.as_millis() as u64
}

fn default_stale_window_ms() -> u64 {
    LinkConfig::default().stale_window.as_millis() as u64
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_device: None,
            timeout_ms: default_timeout_ms(),
            noise_policy: NoisePolicy::default(),
            stale_window_ms: default_stale_window_ms(),
        }
    }
}

impl Settings {
    /// Get the XDG config directory for laserctl
    /// Uses $XDG_CONFIG_HOME/laserctl, falls back to ~/.config/laserctl
    fn config_dir() -> Option<PathBuf> {
        if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_config);
            if path.is_absolute() {
                return Some(path.join("laserctl"));
            }
        }

        dirs::home_dir().map(|h| h.join(".config").join("laserctl"))
    }

    /// Get the settings file path
    pub fn settings_path() -> Option<PathBuf> {
        Self::config_dir().map(|p| p.join("settings.json"))
    }

    /// Load settings from disk, falling back to defaults
    pub fn load() -> Self {
        Self::settings_path()
            .and_then(|path| std::fs::read_to_string(path).ok())
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default()
    }

    /// Save settings to disk
    pub fn save(&self) -> anyhow::Result<PathBuf> {
        let path = Self::settings_path().ok_or_else(|| anyhow!("could not determine settings path"))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }

        let json = serde_json::to_string_pretty(self).context("failed to serialize settings")?;
        std::fs::write(&path, json).with_context(|| format!("failed to write {}", path.display()))?;

        Ok(path)
    }

    pub fn link_config(&self) -> LinkConfig {
        LinkConfig {
            noise_policy: self.noise_policy,
            stale_window: Duration::from_millis(self.stale_window_ms),
            ..Default::default()
        }
    }

    pub fn controller_config(&self) -> ControllerConfig {
        ControllerConfig {
            timeout: Duration::from_millis(self.timeout_ms),
        }
    }
}
