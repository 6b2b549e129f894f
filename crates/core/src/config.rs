//! Pool configuration
//!
//! Protocol parameters that select the circuit shape, plus pipeline behaviour.
//! Sources are layered: defaults, then JSON, then `MASP_*` environment variables.

use serde::{Deserialize, Serialize};

use crate::crypto::commitment::AssetBinding;
use crate::error::{validation, MaspError, MaspResult};

/// Default Merkle tree depth for the demonstration pool
pub const DEFAULT_TREE_DEPTH: usize = 3;

pub const ENV_TREE_DEPTH: &str = "MASP_TREE_DEPTH";
pub const ENV_ASSET_BINDING: &str = "MASP_ASSET_BINDING";
pub const ENV_SELF_VERIFY: &str = "MASP_SELF_VERIFY";
pub const ENV_SETUP_SEED: &str = "MASP_SETUP_SEED";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PoolConfig {
    /// Number of levels in every Merkle path
    pub tree_depth: usize,
    /// Whether asset id and amount take part in commitments and nullifiers
    pub asset_binding: AssetBinding,
    /// Verify each proof against the verification key before returning it
    pub self_verify: bool,
    /// Seed for a reproducible key setup. Testing and demos only.
    pub setup_seed: Option<u64>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            tree_depth: DEFAULT_TREE_DEPTH,
            asset_binding: AssetBinding::Bound,
            self_verify: true,
            setup_seed: None,
        }
    }
}

impl PoolConfig {
    /// Parse and validate a JSON configuration; missing fields take defaults
    pub fn from_json_str(json: &str) -> MaspResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overridden by the process environment
    pub fn from_env() -> MaspResult<Self> {
        Self::default().with_env_overrides()
    }

    /// Apply `MASP_*` environment variables on top of this configuration
    pub fn with_env_overrides(self) -> MaspResult<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> MaspResult<Self> {
        if let Some(value) = lookup(ENV_TREE_DEPTH) {
            self.tree_depth = value
                .trim()
                .parse()
                .map_err(|_| invalid_env(ENV_TREE_DEPTH, &value))?;
        }
        if let Some(value) = lookup(ENV_ASSET_BINDING) {
            self.asset_binding = value.parse().map_err(MaspError::Configuration)?;
        }
        if let Some(value) = lookup(ENV_SELF_VERIFY) {
            self.self_verify = parse_flag(&value).ok_or_else(|| invalid_env(ENV_SELF_VERIFY, &value))?;
        }
        if let Some(value) = lookup(ENV_SETUP_SEED) {
            let trimmed = value.trim();
            self.setup_seed = if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.parse().map_err(|_| invalid_env(ENV_SETUP_SEED, &value))?)
            };
        }

        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> MaspResult<()> {
        validation::validate_tree_depth(self.tree_depth)
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn invalid_env(key: &str, value: &str) -> MaspError {
    MaspError::Configuration(format!("invalid value for {}: '{}'", key, value))
}
