use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON5 parse error: {0}")]
    Json5(#[from] json5::Error),
    #[error("Config directory not found")]
    NoDirFound,
}

/// IRC server connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IrcConfig {
    /// Server host name.
    #[serde(default = "default_host")]
    pub host: String,
    /// Server port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Nickname the bot registers with. Hooks marked `direct` answer to it.
    #[serde(default = "default_nickname")]
    pub nickname: String,
    #[serde(default = "default_nickname")]
    pub username: String,
    #[serde(default = "default_nickname")]
    pub realname: String,
    /// Channels joined after registration.
    #[serde(default)]
    pub channels: Vec<String>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    6667
}

fn default_nickname() -> String {
    "hookbot".to_string()
}

impl Default for IrcConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            nickname: default_nickname(),
            username: default_nickname(),
            realname: default_nickname(),
            channels: Vec::new(),
        }
    }
}

/// Top-level hookbot configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    #[serde(default)]
    pub irc: IrcConfig,
    /// Built-in hooks to register, keyed by hook name, with their raw
    /// registration options (`in`, `channel`, `direct`, ...).
    #[serde(default = "default_hooks")]
    pub hooks: BTreeMap<String, serde_json::Map<String, serde_json::Value>>,
}

fn default_hooks() -> BTreeMap<String, serde_json::Map<String, serde_json::Value>> {
    let mut hooks = BTreeMap::new();
    hooks.insert("ping".to_string(), serde_json::Map::new());
    hooks
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            irc: IrcConfig::default(),
            hooks: default_hooks(),
        }
    }
}

/// Resolve the hookbot config directory (~/.hookbot/).
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    dirs::home_dir()
        .map(|h| h.join(".hookbot"))
        .ok_or(ConfigError::NoDirFound)
}

/// Resolve the config file path (~/.hookbot/config.json5).
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join("config.json5"))
}

/// Load configuration from the default path, falling back to defaults.
pub fn load_config() -> Result<BotConfig, ConfigError> {
    let _ = dotenvy::dotenv();

    let path = config_file_path()?;
    load_config_from(&path)
}

/// Load configuration from a specific path, falling back to defaults if not found.
pub fn load_config_from(path: &Path) -> Result<BotConfig, ConfigError> {
    if !path.exists() {
        tracing::debug!("Config file not found at {}, using defaults", path.display());
        return Ok(BotConfig::default());
    }

    let content = std::fs::read_to_string(path)?;
    let config: BotConfig = json5::from_str(&content)?;
    tracing::debug!(
        path = %path.display(),
        hooks = config.hooks.len(),
        "Config loaded"
    );
    Ok(config)
}
