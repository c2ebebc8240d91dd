//! Configuration for Agora.
//!
//! ```toml
//! [store]
//! path = "${HOME}/.agora/agora.db"
//!
//! [slugs]
//! reserved_words = ["topic", "admin", "dashboard", "new"]
//! max_attempts = 5
//!
//! [log]
//! filter = "agora_core=debug,info"
//! ```

use std::path::{Path, PathBuf};
use std::{env, fs};

use serde::Deserialize;
use thiserror::Error;

/// Environment variable that overrides the config file location.
pub const CONFIG_ENV_VAR: &str = "AGORA_CONFIG";

pub const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Debug, Default, Deserialize)]
pub struct AgoraConfig {
    pub store: Option<StoreConfig>,
    pub slugs: Option<SlugConfig>,
    pub log: Option<LogConfig>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl ConfigError {
    pub fn path(&self) -> &PathBuf {
        match self {
            ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } => path,
        }
    }
}

/// Where the Topic/Post database lives.
#[derive(Debug, Default, Deserialize)]
pub struct StoreConfig {
    /// Database file. `${VAR}` references are expanded. Default: `~/.agora/agora.db`.
    pub path: Option<String>,
}

/// Slug allocation policy.
#[derive(Debug, Default, Deserialize)]
pub struct SlugConfig {
    /// Slugs that always get a timestamp suffix. Replaces the defaults when set.
    pub reserved_words: Option<Vec<String>>,
    /// Insert attempts before a lost uniqueness race is reported.
    pub max_attempts: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LogConfig {
    /// `tracing_subscriber::EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: Option<String>,
}

pub fn expand_env_vars(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) => {
                let var = &after[..end];
                if var.is_empty() {
                    out.push_str("${}");
                } else {
                    out.push_str(&env::var(var).unwrap_or_default());
                }
                rest = &after[end + 1..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);

    out
}

impl AgoraConfig {
    /// Load the config file. A missing file is `Ok(None)`.
    pub fn load() -> Result<Option<Self>, ConfigError> {
        match config_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(None),
        }
    }

    pub fn load_from(path: &Path) -> Result<Option<Self>, ConfigError> {
        if !path.exists() {
            return Ok(None);
        }

        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!("Failed to read config at {:?}: {}", path, err);
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source: err,
                });
            }
        };

        match toml::from_str(&content) {
            Ok(config) => Ok(Some(config)),
            Err(err) => {
                tracing::warn!("Failed to parse config at {:?}: {}", path, err);
                Err(ConfigError::Parse {
                    path: path.to_path_buf(),
                    source: err,
                })
            }
        }
    }

    /// Database path with `${VAR}` expanded, falling back to the default location.
    #[must_use]
    pub fn store_path(&self) -> Option<PathBuf> {
        self.store
            .as_ref()
            .and_then(|store| store.path.as_deref())
            .map(|raw| PathBuf::from(expand_env_vars(raw)))
            .or_else(default_store_path)
    }

    /// Configured reserved words. `None` keeps the allocator's defaults.
    #[must_use]
    pub fn reserved_words(&self) -> Option<&[String]> {
        self.slugs
            .as_ref()
            .and_then(|slugs| slugs.reserved_words.as_deref())
    }

    /// Configured attempt bound, never less than one. `None` keeps the allocator's default.
    #[must_use]
    pub fn slug_attempts(&self) -> Option<u32> {
        self.slugs
            .as_ref()
            .and_then(|slugs| slugs.max_attempts)
            .map(|attempts| attempts.max(1))
    }

    #[must_use]
    pub fn log_filter(&self) -> &str {
        self.log
            .as_ref()
            .and_then(|log| log.filter.as_deref())
            .unwrap_or(DEFAULT_LOG_FILTER)
    }
}

pub fn config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".agora"))
}

pub fn config_path() -> Option<PathBuf> {
    if let Ok(path) = env::var(CONFIG_ENV_VAR)
        && !path.trim().is_empty()
    {
        return Some(PathBuf::from(path));
    }
    config_dir().map(|dir| dir.join("config.toml"))
}

pub fn default_store_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("agora.db"))
}
