//! Deposit commitments
//!
//! A commitment binds everything needed to later withdraw a deposit:
//!
//! commitment = Poseidon(secret, nullifier_seed, asset_id, amount)
//!
//! The argument order is part of the protocol. Reordering it silently invalidates
//! every commitment already published to the tree.

use ark_bn254::Fr;
use serde::{Deserialize, Serialize};

use super::poseidon::poseidon_hash;

/// Whether the asset identifier and amount take part in the hashes
///
/// `Bound` is the multi-asset scheme. `Unbound` reproduces the single-asset pool
/// where the leaf only commits to the secret and the nullifier seed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetBinding {
    #[default]
    Bound,
    Unbound,
}

impl AssetBinding {
    /// Ordered hash input for a leaf commitment
    ///
    /// Shared by the plain computation and the circuit so both hash the exact
    /// same sequence.
    pub fn commitment_preimage<T: Clone>(self, secret: &T, nullifier_seed: &T, asset_id: &T, amount: &T) -> Vec<T> {
        match self {
            AssetBinding::Bound => vec![secret.clone(), nullifier_seed.clone(), asset_id.clone(), amount.clone()],
            AssetBinding::Unbound => vec![secret.clone(), nullifier_seed.clone()],
        }
    }

    /// Ordered hash input for a nullifier hash
    pub fn nullifier_preimage<T: Clone>(self, nullifier_seed: &T, asset_id: &T) -> Vec<T> {
        match self {
            AssetBinding::Bound => vec![nullifier_seed.clone(), asset_id.clone()],
            AssetBinding::Unbound => vec![nullifier_seed.clone()],
        }
    }

    pub fn is_bound(self) -> bool {
        self == AssetBinding::Bound
    }
}

impl std::fmt::Display for AssetBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AssetBinding::Bound => write!(f, "bound"),
            AssetBinding::Unbound => write!(f, "unbound"),
        }
    }
}

impl std::str::FromStr for AssetBinding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bound" | "true" | "1" => Ok(AssetBinding::Bound),
            "unbound" | "false" | "0" => Ok(AssetBinding::Unbound),
            other => Err(format!("unknown asset binding '{}'", other)),
        }
    }
}

/// Compute the leaf commitment of a multi-asset deposit
pub fn commit(secret: &Fr, nullifier_seed: &Fr, asset_id: &Fr, amount: &Fr) -> Fr {
    commit_with(AssetBinding::Bound, secret, nullifier_seed, asset_id, amount)
}

/// Compute a leaf commitment under the given binding mode
pub fn commit_with(binding: AssetBinding, secret: &Fr, nullifier_seed: &Fr, asset_id: &Fr, amount: &Fr) -> Fr {
    poseidon_hash(&binding.commitment_preimage(secret, nullifier_seed, asset_id, amount))
}
