//! Nullifier hashes for double-spend prevention
//!
//! nullifier_hash = Poseidon(nullifier_seed, asset_id)
//!
//! Binding the asset identifier means the same seed used for two different assets
//! yields two unrelated nullifier hashes: spending asset A never blocks asset B,
//! while the exact same deposit still cannot be withdrawn twice.
//!
//! Tracking which hashes have been spent belongs to the host (typically the pool
//! contract). `NullifierSet` is the shape that tracking takes; `InMemoryNullifierSet`
//! is a reference implementation for off-chain hosts and tests.

use ark_bn254::Fr;
use std::collections::HashSet;

use super::commitment::AssetBinding;
use super::field::to_decimal;
use super::poseidon::poseidon_hash;
use crate::error::CryptoError;

/// Compute the public nullifier hash of a multi-asset deposit
pub fn nullifier_hash(nullifier_seed: &Fr, asset_id: &Fr) -> Fr {
    nullifier_hash_with(AssetBinding::Bound, nullifier_seed, asset_id)
}

/// Compute a nullifier hash under the given binding mode
pub fn nullifier_hash_with(binding: AssetBinding, nullifier_seed: &Fr, asset_id: &Fr) -> Fr {
    poseidon_hash(&binding.nullifier_preimage(nullifier_seed, asset_id))
}

/// Record of nullifier hashes already withdrawn
pub trait NullifierSet {
    fn is_spent(&self, nullifier_hash: &Fr) -> bool;

    /// Mark a nullifier hash as spent, failing if it already was
    fn mark_spent(&mut self, nullifier_hash: Fr) -> Result<(), CryptoError>;
}

#[derive(Clone, Debug, Default)]
pub struct InMemoryNullifierSet {
    spent: HashSet<Fr>,
}

impl InMemoryNullifierSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.spent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spent.is_empty()
    }
}

impl NullifierSet for InMemoryNullifierSet {
    fn is_spent(&self, nullifier_hash: &Fr) -> bool {
        self.spent.contains(nullifier_hash)
    }

    fn mark_spent(&mut self, nullifier_hash: Fr) -> Result<(), CryptoError> {
        if !self.spent.insert(nullifier_hash) {
            return Err(CryptoError::NullifierAlreadySpent(to_decimal(&nullifier_hash)));
        }
        Ok(())
    }
}
