//! Configuration for pingfeed

use crate::error::{Result, SdkError};
use crate::mutator::WritePolicy;
use crate::store::RemoteStore;
use pingfeed_client::BackendClient;
use pingfeed_client::BackendConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default data directory (session file lives here)
pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("pingfeed")
}

/// Default config file location
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("pingfeed")
        .join("config.toml")
}

/// Configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory for local state
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Backend project URL, anon key and timeout
    #[serde(default)]
    pub backend: BackendConfig,

    /// How shared collections are written
    #[serde(default)]
    pub mutation: MutationConfig,
}

/// Write policy settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MutationConfig {
    /// `versioned` or `last_write_wins`
    #[serde(default)]
    pub policy: PolicyKind,

    /// Attempts per mutation under the versioned policy
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Base delay between attempts, multiplied by the attempt number
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Integer column carrying the row version, e.g. `"version"`. Unset or
    /// blank means the backend has none and every write is unconditional.
    #[serde(default)]
    pub version_column: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    #[default]
    Versioned,
    LastWriteWins,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    50
}

impl Default for MutationConfig {
    fn default() -> Self {
        Self {
            policy: PolicyKind::default(),
            max_attempts: default_max_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            version_column: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            backend: BackendConfig::default(),
            mutation: MutationConfig::default(),
        }
    }
}

impl Config {
    /// Load config from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| SdkError::Config(e.to_string()))
    }

    /// Load config from file, falling back to defaults when it does not exist
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save config to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| SdkError::Config(e.to_string()))?;
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get session file path
    pub fn session_path(&self) -> PathBuf {
        self.data_dir.join("session.json")
    }

    pub fn write_policy(&self) -> WritePolicy {
        match self.mutation.policy {
            PolicyKind::Versioned => WritePolicy::Versioned {
                max_attempts: self.mutation.max_attempts,
                retry_delay_ms: self.mutation.retry_delay_ms,
            },
            PolicyKind::LastWriteWins => WritePolicy::LastWriteWins,
        }
    }

    /// Version column to filter writes on, if writes are versioned at all
    ///
    /// `None` under `last_write_wins` or when the column is unset or blank.
    pub fn version_column(&self) -> Option<&str> {
        match self.mutation.policy {
            PolicyKind::LastWriteWins => None,
            PolicyKind::Versioned => self
                .mutation
                .version_column
                .as_deref()
                .map(str::trim)
                .filter(|c| !c.is_empty()),
        }
    }

    /// Record store over `client`, versioned when a version column is set
    pub fn remote_store(&self, client: BackendClient) -> RemoteStore {
        let store = RemoteStore::new(client);
        match self.version_column() {
            Some(column) => store.with_version_column(column),
            None => store,
        }
    }
}
