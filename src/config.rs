//! Configuration loading and validation.

use crate::UserId;
use crate::error::{ConfigError, Result};
use anyhow::Context as _;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Environment variable prefix for every config key (`CONNOISSEUR_COMMAND_PREFIX`,
/// `CONNOISSEUR_REPLIES__BYTES_PER_ENTRY`, ...).
const ENV_PREFIX: &str = "CONNOISSEUR";

/// Connoisseur configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Bot token used for the gateway and the REST client.
    pub discord_token: String,

    /// Prefix that marks a message as a command rather than chat.
    pub command_prefix: String,

    /// Data directory path (SQLite database lives here).
    pub data_dir: PathBuf,

    /// Directory for rolling log files. Logs go to stderr only when unset.
    pub log_dir: Option<PathBuf>,

    /// Reply tracking limits.
    pub replies: ReplyCacheConfig,

    /// Upper bound on a single outbound send/edit/delete.
    pub transport_timeout: Duration,

    /// Users allowed to run the owner commands (`add`, `blacklist`, and
    /// `toggleserver` in any guild).
    pub owner_ids: Vec<UserId>,
}

/// Reply tracking memory budget.
///
/// The cache is bounded by entry count; the count is derived from a byte
/// budget and a rough per-entry size so the knob operators turn stays "how
/// much memory".
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ReplyCacheConfig {
    #[serde(default = "default_memory_budget")]
    pub memory_budget_bytes: u64,

    #[serde(default = "default_bytes_per_entry")]
    pub bytes_per_entry: u64,
}

impl ReplyCacheConfig {
    /// Maximum number of tracked replies.
    pub fn capacity(&self) -> u64 {
        self.memory_budget_bytes / self.bytes_per_entry.max(1)
    }
}

impl Default for ReplyCacheConfig {
    fn default() -> Self {
        Self {
            memory_budget_bytes: default_memory_budget(),
            bytes_per_entry: default_bytes_per_entry(),
        }
    }
}

fn default_memory_budget() -> u64 {
    1024 * 1024
}

fn default_bytes_per_entry() -> u64 {
    256
}

/// Shape of the config file and environment, before validation.
#[derive(Debug, Deserialize)]
struct RawConfig {
    discord_token: Option<String>,
    #[serde(default = "default_command_prefix")]
    command_prefix: String,
    data_dir: Option<PathBuf>,
    log_dir: Option<PathBuf>,
    #[serde(default)]
    replies: ReplyCacheConfig,
    #[serde(default = "default_transport_timeout_secs")]
    transport_timeout_secs: u64,
    #[serde(default)]
    owner_ids: Vec<UserId>,
}

fn default_command_prefix() -> String {
    "ec/".into()
}

fn default_transport_timeout_secs() -> u64 {
    10
}

impl Config {
    /// Load configuration from the default config file (if any) and environment.
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::default_config_path())
    }

    /// Load from a specific config file path. A missing file is not an error;
    /// environment variables alone can configure the bot.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let raw: RawConfig = config::Config::builder()
            .add_source(config::File::from(path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("owner_ids")
                    .try_parsing(true),
            )
            .build()
            .and_then(|built| built.try_deserialize())
            .map_err(|error| ConfigError::Load {
                path: path.display().to_string(),
                source: Arc::new(error),
            })?;

        let config = Self::from_raw(raw, std::env::var("DISCORD_TOKEN").ok())?;

        // Ensure data directory exists
        std::fs::create_dir_all(&config.data_dir).with_context(|| {
            format!(
                "failed to create data directory: {}",
                config.data_dir.display()
            )
        })?;

        Ok(config)
    }

    fn from_raw(raw: RawConfig, token_fallback: Option<String>) -> Result<Self> {
        let discord_token = raw
            .discord_token
            .or(token_fallback)
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty())
            .ok_or_else(|| ConfigError::MissingKey("discord_token".into()))?;

        if raw.command_prefix.trim().is_empty() {
            return Err(ConfigError::Invalid("command_prefix must not be empty".into()).into());
        }

        if raw.replies.bytes_per_entry == 0 {
            return Err(
                ConfigError::Invalid("replies.bytes_per_entry must be greater than 0".into())
                    .into(),
            );
        }

        if raw.replies.capacity() == 0 {
            return Err(ConfigError::Invalid(format!(
                "replies.memory_budget_bytes ({}) is smaller than one entry ({} bytes)",
                raw.replies.memory_budget_bytes, raw.replies.bytes_per_entry
            ))
            .into());
        }

        if raw.transport_timeout_secs == 0 {
            return Err(
                ConfigError::Invalid("transport_timeout_secs must be greater than 0".into())
                    .into(),
            );
        }

        Ok(Self {
            discord_token,
            command_prefix: raw.command_prefix,
            data_dir: raw.data_dir.unwrap_or_else(Self::default_data_dir),
            log_dir: raw.log_dir,
            replies: raw.replies,
            transport_timeout: Duration::from_secs(raw.transport_timeout_secs),
            owner_ids: raw.owner_ids,
        })
    }

    /// `<config dir>/connoisseur/config.toml`, or `./config.toml` when the
    /// platform has no config directory.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .map(|d| d.join("connoisseur").join("config.toml"))
            .unwrap_or_else(|| PathBuf::from("./config.toml"))
    }

    fn default_data_dir() -> PathBuf {
        dirs::data_dir()
            .map(|d| d.join("connoisseur"))
            .unwrap_or_else(|| PathBuf::from("./data"))
    }

    /// Get the SQLite database path.
    pub fn sqlite_path(&self) -> PathBuf {
        self.data_dir.join("connoisseur.db")
    }
}
