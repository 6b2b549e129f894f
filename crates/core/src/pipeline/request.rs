//! Withdrawal request and response schema
//!
//! All field values travel as decimal strings. Field names are camelCase; the
//! older `nullifier`, `merkleProof` and `pathIndices` names are accepted as aliases.

use ark_bn254::Fr;
use serde::{Deserialize, Serialize};

use super::Stage;
use crate::crypto::field::{parse_decimal, to_decimal};
use crate::crypto::merkle::MerklePath;
use crate::crypto::note::DepositNote;
use crate::error::{FailureKind, PipelineError};
use crate::proof::withdraw_circuit::{CircuitShape, WithdrawalStatement};
use crate::proof::ProofArtifact;

/// Everything needed to prove one withdrawal
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalRequest {
    pub secret: String,
    #[serde(alias = "nullifier")]
    pub nullifier_seed: String,
    /// Ignored when the asset is not bound
    #[serde(default)]
    pub asset_id: String,
    #[serde(default)]
    pub amount: String,
    #[serde(alias = "merkleProof")]
    pub merkle_path: Vec<String>,
    #[serde(alias = "pathIndices")]
    pub path_directions: Vec<u64>,
    /// Authoritative root from the tree, if the caller has one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<String>,
}

impl WithdrawalRequest {
    /// Build a request from a stored deposit note and its current Merkle path
    pub fn from_note(note: &DepositNote, path: &MerklePath) -> Self {
        Self {
            secret: note.secret.clone(),
            nullifier_seed: note.nullifier.clone(),
            asset_id: note.asset_id.clone(),
            amount: note.amount.clone(),
            merkle_path: path.siblings().iter().map(to_decimal).collect(),
            path_directions: path.directions().iter().map(|d| d.bit() as u64).collect(),
            root: None,
        }
    }

    pub fn with_root(mut self, root: &Fr) -> Self {
        self.root = Some(to_decimal(root));
        self
    }

    pub fn from_json(json: &str) -> Result<Self, PipelineError> {
        serde_json::from_str(json).map_err(|e| PipelineError::MalformedInput(format!("invalid request JSON: {}", e)))
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

impl DepositNote {
    /// Turn this note into a withdrawal request for `path`
    pub fn into_request(self, path: &MerklePath) -> WithdrawalRequest {
        WithdrawalRequest::from_note(&self, path)
    }
}

/// Public values a verifier checks a proof against
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublicValues {
    pub root: Fr,
    pub nullifier_hash: Fr,
    /// Present only when the asset is bound
    pub asset: Option<(Fr, Fr)>,
}

impl PublicValues {
    pub fn from_statement(statement: &WithdrawalStatement) -> Self {
        Self {
            root: statement.root,
            nullifier_hash: statement.nullifier_hash,
            asset: statement
                .asset_binding
                .is_bound()
                .then_some((statement.public_asset_id, statement.public_amount)),
        }
    }

    /// Public inputs in circuit allocation order
    pub fn to_inputs(&self) -> Vec<Fr> {
        let mut inputs = vec![self.root, self.nullifier_hash];
        if let Some((asset_id, amount)) = self.asset {
            inputs.push(asset_id);
            inputs.push(amount);
        }
        inputs
    }
}

/// A proof together with the public values it was produced for
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WithdrawalProof {
    pub shape: CircuitShape,
    pub proof: ProofArtifact,
    pub public: PublicValues,
}

impl WithdrawalProof {
    pub fn public_inputs(&self) -> Vec<Fr> {
        self.public.to_inputs()
    }

    pub fn to_response(&self) -> WithdrawalResponse {
        let (asset_id, amount) = match self.public.asset {
            Some((asset_id, amount)) => (Some(to_decimal(&asset_id)), Some(to_decimal(&amount))),
            None => (None, None),
        };

        WithdrawalResponse {
            success: true,
            proof: Some(self.proof.to_hex()),
            root: Some(to_decimal(&self.public.root)),
            nullifier_hash: Some(to_decimal(&self.public.nullifier_hash)),
            public_asset_id: asset_id,
            public_amount: amount,
            ..WithdrawalResponse::default()
        }
    }

    /// Rebuild a proof from a successful response, for the given circuit shape
    pub fn from_response(response: &WithdrawalResponse, shape: CircuitShape) -> Result<Self, PipelineError> {
        if !response.success {
            return Err(PipelineError::MalformedInput("response reports a failed withdrawal".to_string()));
        }

        let required = |name: &str, value: &Option<String>| -> Result<Fr, PipelineError> {
            let value = value
                .as_deref()
                .ok_or_else(|| PipelineError::MalformedInput(format!("response is missing {}", name)))?;
            Ok(parse_decimal(name, value)?)
        };

        let proof_hex = response
            .proof
            .as_deref()
            .ok_or_else(|| PipelineError::MalformedInput("response is missing proof".to_string()))?;
        let proof = ProofArtifact::from_hex(proof_hex).map_err(|e| PipelineError::MalformedInput(e.to_string()))?;

        let asset = if shape.asset_binding.is_bound() {
            Some((
                required("publicAssetId", &response.public_asset_id)?,
                required("publicAmount", &response.public_amount)?,
            ))
        } else {
            None
        };

        Ok(Self {
            shape,
            proof,
            public: PublicValues {
                root: required("root", &response.root)?,
                nullifier_hash: required("nullifierHash", &response.nullifier_hash)?,
                asset,
            },
        })
    }
}

/// Outcome of a withdrawal request as reported to the caller
///
/// On success the public values are set and the error fields are absent; on
/// failure it is the other way round.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proof: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nullifier_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_asset_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_amount: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<FailureKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_stage: Option<Stage>,
}

impl WithdrawalResponse {
    pub fn failure(error: &PipelineError) -> Self {
        Self {
            success: false,
            error: Some(error.to_string()),
            error_kind: Some(error.kind()),
            failed_stage: Some(error.stage()),
            ..Self::default()
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, PipelineError> {
        serde_json::from_str(json).map_err(|e| PipelineError::MalformedInput(format!("invalid response JSON: {}", e)))
    }
}
