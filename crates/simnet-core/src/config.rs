//! Configuration for a simulated network.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $SIMNET_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/simnet/config.toml
//!   3. ~/.config/simnet/config.toml

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SimnetConfig {
    pub network: NetworkConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Seed for identity generation. Unset = seeded from OS entropy.
    pub seed: Option<u64>,
    /// How many blocked accept callers a single close wakes.
    pub wake_policy: WakePolicy,
}

/// Which waiters a `close` releases.
///
/// `One` wakes a single blocked `accept`/`accept_stream` caller per close;
/// any other caller blocked at that moment stays blocked. `All` wakes every
/// caller waiting at the moment of close.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WakePolicy {
    #[default]
    One,
    All,
}

impl std::str::FromStr for WakePolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "one" => Ok(WakePolicy::One),
            "all" => Ok(WakePolicy::All),
            _ => Err(ConfigError::BadValue("wake_policy", s.to_string())),
        }
    }
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            seed: None,
            wake_policy: WakePolicy::One,
        }
    }
}

impl NetworkConfig {
    /// Deterministic config with the given seed and default policy.
    pub fn seeded(seed: u64) -> Self {
        Self {
            seed: Some(seed),
            ..Self::default()
        }
    }

    pub fn with_wake_policy(mut self, policy: WakePolicy) -> Self {
        self.wake_policy = policy;
        self
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("simnet")
}

fn dirs_or_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("failed to parse inline config: {0}")]
    ParseInline(toml::de::Error),
    #[error("invalid value for {0}: {1:?}")]
    BadValue(&'static str, String),
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl SimnetConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::file_path();
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadFailed(path.clone(), e))?;
            toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.clone(), e))?
        } else {
            SimnetConfig::default()
        };
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Parse a config from TOML text, without consulting files or env.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(ConfigError::ParseInline)
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("SIMNET_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Apply SIMNET_* env var overrides.
    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(v) = lookup("SIMNET_NETWORK__SEED") {
            let seed = v
                .trim()
                .parse()
                .map_err(|_| ConfigError::BadValue("seed", v.clone()))?;
            self.network.seed = Some(seed);
        }
        if let Some(v) = lookup("SIMNET_NETWORK__WAKE_POLICY") {
            self.network.wake_policy = v.parse()?;
        }
        Ok(())
    }
}
