use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Errors that can occur in configuration operations
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),

    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidEnvVar(String, String),

    #[error("Failed to read file: {0}")]
    FileReadError(String),

    #[error("Failed to parse YAML: {0}")]
    YamlParseError(#[from] serde_yaml::Error),
}

/// Result type for configuration operations
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Environment variable naming the YAML configuration file
pub const CONFIG_FILE_VAR: &str = "COLONY_CONFIG_FILE";

/// Colony configuration
///
/// Addresses are kept as hex strings here; the colony parses them when it
/// is built so that a bad address is reported against the colony, not the
/// file format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColonyConfig {
    /// Address of this colony
    pub colony_address: String,
    /// Address of the token staked through this colony
    pub token_address: String,
    /// Address of the network registry
    pub network_registry: String,
    /// Skill id of the root domain
    #[serde(default = "default_root_skill_id")]
    pub root_skill_id: u64,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Directory for persistent state; in-memory when unset
    #[serde(default)]
    pub storage_dir: Option<PathBuf>,
}

fn default_root_skill_id() -> u64 {
    1
}

fn default_log_level() -> String {
    "info".to_string()
}

impl ColonyConfig {
    /// Load configuration from the environment
    ///
    /// If `COLONY_CONFIG_FILE` names an existing file it is used, otherwise
    /// the configuration is built from `COLONY_*` variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup(CONFIG_FILE_VAR) {
            if Path::new(&path).exists() {
                return Self::from_file(&path);
            }
            debug!("{} points at missing file {}, using variables", CONFIG_FILE_VAR, path);
        }

        let required = |name: &str| {
            lookup(name).ok_or_else(|| ConfigError::EnvVarNotFound(name.to_string()))
        };

        let colony_address = required("COLONY_ADDRESS")?;
        let token_address = required("COLONY_TOKEN_ADDRESS")?;
        let network_registry = required("COLONY_NETWORK_REGISTRY")?;

        let root_skill_id = match lookup("COLONY_ROOT_SKILL_ID") {
            Some(value) => value.parse::<u64>().map_err(|e| {
                ConfigError::InvalidEnvVar("COLONY_ROOT_SKILL_ID".to_string(), e.to_string())
            })?,
            None => default_root_skill_id(),
        };

        let log_level = lookup("COLONY_LOG_LEVEL").unwrap_or_else(default_log_level);
        let storage_dir = lookup("COLONY_STORAGE_DIR").map(PathBuf::from);

        Ok(ColonyConfig {
            colony_address,
            token_address,
            network_registry,
            root_skill_id,
            log_level,
            storage_dir,
        })
    }

    /// Load configuration from a YAML file
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|e| ConfigError::FileReadError(format!("Failed to read {}: {}", path, e)))?;

        let config: ColonyConfig = serde_yaml::from_str(&contents)?;
        debug!("Loaded colony configuration from {}", path);
        Ok(config)
    }
}
