//! Configuration management for smallchat-client.
//!
//! Configuration is loaded from `~/.config/smallchat/config.toml`. The file
//! is optional; every key has a default.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Client behaviour.
    #[serde(default)]
    pub client: ClientConfig,
    /// Tracing filter directive (e.g. `smallchat_client=debug`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_filter: Option<String>,
}

/// Settings for the connection loop and the console.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Maximum number of bytes taken from the socket per read.
    #[serde(default = "default_read_buffer")]
    pub read_buffer: usize,
    /// Use the raw-mode line editor instead of plain line input.
    #[serde(default)]
    pub editor: bool,
    /// Capacity of the editor's input buffer, in bytes.
    #[serde(default = "default_max_line")]
    pub max_line: usize,
    /// Prefix echoed before each line submitted in the editor.
    #[serde(default = "default_prompt")]
    pub prompt: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            read_buffer: default_read_buffer(),
            editor: false,
            max_line: default_max_line(),
            prompt: default_prompt(),
        }
    }
}

fn default_read_buffer() -> usize {
    1024
}

fn default_max_line() -> usize {
    128
}

fn default_prompt() -> String {
    "you> ".to_string()
}

impl Config {
    /// Get the config directory path.
    pub fn config_dir() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|p| p.join("smallchat"))
            .context("Could not determine config directory")
    }

    /// Get the config file path.
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load configuration from the default location, using defaults if the
    /// file does not exist.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from an explicit path. The file must exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("Invalid config file: {}", path.display()))?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.client.read_buffer == 0 {
            bail!("client.read_buffer must be greater than zero");
        }
        if self.client.max_line == 0 {
            bail!("client.max_line must be greater than zero");
        }
        Ok(())
    }
}
