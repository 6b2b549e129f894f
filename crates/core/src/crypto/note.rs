//! Deposit secrets and the notes depositors keep
//!
//! A `DepositSecret` is generated client-side at deposit time and never leaves the
//! depositor. Its commitment is published as a tree leaf; the secret itself is only
//! needed again, together with a Merkle path, to build the withdrawal proof.

use ark_bn254::Fr;
use ark_ff::UniformRand;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};

use super::commitment::commit;
use super::field::{parse_decimal, to_decimal};
use super::nullifier::nullifier_hash;
use crate::assets::AssetDescriptor;
use crate::error::CryptoError;

/// Private opening of a deposit commitment
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DepositSecret {
    pub secret: Fr,
    pub nullifier_seed: Fr,
    pub asset_id: Fr,
    pub amount: Fr,
}

impl DepositSecret {
    pub fn new(secret: Fr, nullifier_seed: Fr, asset_id: Fr, amount: Fr) -> Self {
        Self {
            secret,
            nullifier_seed,
            asset_id,
            amount,
        }
    }

    /// Draw a fresh secret and nullifier seed from OS randomness
    pub fn random(asset: &AssetDescriptor, amount: Fr) -> Self {
        Self::new(Fr::rand(&mut OsRng), Fr::rand(&mut OsRng), asset.id, amount)
    }

    /// Leaf commitment published at deposit time
    pub fn commitment(&self) -> Fr {
        commit(&self.secret, &self.nullifier_seed, &self.asset_id, &self.amount)
    }

    /// Nullifier hash published at withdrawal time
    pub fn nullifier_hash(&self) -> Fr {
        nullifier_hash(&self.nullifier_seed, &self.asset_id)
    }
}

/// Serialized deposit note, as handed back to the depositor
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositNote {
    /// Asset symbol, for display only
    pub token: String,
    pub secret: String,
    pub nullifier: String,
    pub asset_id: String,
    pub amount: String,
    pub commitment: String,
}

impl DepositNote {
    pub fn from_secret(deposit: &DepositSecret, token: &str) -> Self {
        Self {
            token: token.to_string(),
            secret: to_decimal(&deposit.secret),
            nullifier: to_decimal(&deposit.nullifier_seed),
            asset_id: to_decimal(&deposit.asset_id),
            amount: to_decimal(&deposit.amount),
            commitment: to_decimal(&deposit.commitment()),
        }
    }

    pub fn to_deposit_secret(&self) -> Result<DepositSecret, CryptoError> {
        Ok(DepositSecret::new(
            parse_decimal("secret", &self.secret)?,
            parse_decimal("nullifier", &self.nullifier)?,
            parse_decimal("assetId", &self.asset_id)?,
            parse_decimal("amount", &self.amount)?,
        ))
    }

    /// Recompute the commitment from the note's opening and compare
    pub fn check_commitment(&self) -> Result<bool, CryptoError> {
        let recorded = parse_decimal("commitment", &self.commitment)?;
        Ok(self.to_deposit_secret()?.commitment() == recorded)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
