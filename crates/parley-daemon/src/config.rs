use anyhow::Context;
use parley_protocol::Settings;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Top-level daemon configuration.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub daemon: DaemonConfig,
    /// Initial chat settings, used only until settings have been persisted.
    #[serde(default)]
    pub chat: Option<Settings>,
}

#[derive(Debug, Deserialize)]
pub struct DaemonConfig {
    #[serde(default = "default_socket_path")]
    pub socket_path: String,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_socket_path() -> String {
    "/tmp/parley.sock".to_string()
}

fn default_data_dir() -> String {
    format!("{}/.local/share/parley", home_dir())
}

fn default_log_level() -> String {
    "info".to_string()
}

fn home_dir() -> String {
    std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string())
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path(),
            data_dir: default_data_dir(),
            log_level: default_log_level(),
        }
    }
}

impl Config {
    /// Load config from the default path (~/.config/parley/config.toml).
    pub fn load() -> anyhow::Result<Self> {
        let path = Self::config_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Config::default())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Invalid config {}", path.display()))?;
        Ok(config)
    }

    pub fn config_path() -> PathBuf {
        PathBuf::from(format!("{}/.config/parley/config.toml", home_dir()))
    }

    pub fn pid_path() -> PathBuf {
        PathBuf::from("/tmp/parley.pid")
    }

    /// Settings to start from when the store has none.
    pub fn seed_settings(&self) -> Settings {
        self.chat.clone().unwrap_or_default()
    }
}
