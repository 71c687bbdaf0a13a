// Global configuration management

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub defaults: DefaultsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Default codec for new jobs (h264, h265, vp9, av1)
    #[serde(default = "default_codec")]
    pub codec: String,

    /// Default CRF quality, 0-51 (lower = better, larger output)
    #[serde(default = "default_crf")]
    pub crf: u8,

    /// Default hardware acceleration (none, nvidia, amd, intel)
    #[serde(default = "default_hw_accel")]
    pub hw_accel: String,

    /// Seconds to wait for graceful termination before killing ffmpeg
    #[serde(default = "default_stop_grace_secs")]
    pub stop_grace_secs: u64,

    /// Extra ffmpeg arguments appended to every command (shell-quoted)
    #[serde(default)]
    pub extra_args: String,

    /// Directory for batch outputs; defaults to next to each input
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
}

fn default_codec() -> String {
    "h264".to_string()
}

fn default_crf() -> u8 {
    23
}

fn default_hw_accel() -> String {
    "none".to_string()
}

fn default_stop_grace_secs() -> u64 {
    5
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            codec: default_codec(),
            crf: default_crf(),
            hw_accel: default_hw_accel(),
            stop_grace_secs: default_stop_grace_secs(),
            extra_args: String::new(),
            output_dir: None,
        }
    }
}

impl Config {
    pub fn path() -> Result<PathBuf> {
        let dir = dirs::config_dir().context("Could not determine config directory")?;
        Ok(dir.join("vcrush").join("config.toml"))
    }

    /// Load the config file, falling back to defaults when it is absent.
    pub fn load() -> Result<Self> {
        let path = Self::path()?;
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("Invalid config in {}", path.display()))
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::path()?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let text = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(&path, text).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }
}
