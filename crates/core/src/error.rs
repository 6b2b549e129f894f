//! Unified Error Types for the shielded pool core
//!
//! Crypto and backend errors are plain enums; `PipelineError` adds the stage at
//! which a withdrawal request failed so that callers can tell a malformed request
//! from a cryptographically inconsistent one.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pipeline::Stage;

/// Top-level error type for the crate
#[derive(Error, Debug)]
pub enum MaspError {
    #[error("Cryptographic error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("Proof error: {0}")]
    Proof(#[from] ProofError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Result type alias for crate operations
pub type MaspResult<T> = Result<T, MaspError>;

impl From<serde_json::Error> for MaspError {
    fn from(e: serde_json::Error) -> Self {
        MaspError::Serialization(e.to_string())
    }
}

/// Errors from field encoding, paths, notes and assets
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("{field} is not a decimal integer: '{value}'")]
    InvalidDecimal { field: String, value: String },

    #[error("{field} is outside the scalar field range")]
    OutOfFieldRange { field: String },

    #[error("path direction {value}{} is neither 0 nor 1", level.map(|l| format!(" at level {}", l)).unwrap_or_default())]
    InvalidDirection { level: Option<usize>, value: u64 },

    #[error("Merkle path {what} has length {got}, expected {expected}")]
    PathLengthMismatch {
        what: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("Unknown asset: {0}")]
    UnknownAsset(String),

    #[error("Duplicate asset in registry: {0}")]
    DuplicateAsset(String),

    #[error("Invalid amount: '{0}'")]
    InvalidAmount(String),

    #[error("Nullifier already spent: {0}")]
    NullifierAlreadySpent(String),
}

/// Errors reported by the proof backend
#[derive(Error, Debug)]
pub enum ProofError {
    #[error("Setup failed: {0}")]
    SetupFailed(String),

    /// Keys for a shape were neither loaded nor reproducibly derivable
    #[error("No keys loaded for {0}")]
    KeysUnavailable(String),

    #[error("Proof generation failed: {0}")]
    GenerationFailed(String),

    #[error("Proof verification failed: {0}")]
    VerificationFailed(String),

    #[error("Invalid proving key")]
    InvalidProvingKey,

    #[error("Invalid verifying key")]
    InvalidVerifyingKey,

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// Failure category of a withdrawal request, as reported to callers
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FailureKind {
    MalformedInput,
    CircuitCompilation,
    KeySetup,
    WitnessConstruction,
    Proving,
    Verification,
    Cancelled,
}

/// Typed failure of the proof orchestration pipeline
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Request could not be parsed or validated; no circuit work was done
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// Predicate could not be compiled, or does not match the key material
    #[error("circuit compilation failed: {0}")]
    CircuitCompilation(String),

    #[error("key setup failed: {0}")]
    KeySetup(String),

    /// Inputs are well-formed but do not satisfy the withdrawal predicate
    #[error("witness does not satisfy the withdrawal statement: {failed_assertion}")]
    WitnessConstruction { failed_assertion: String },

    #[error("proving failed: {0}")]
    Proving(String),

    /// Backend error during verification, or a self-check that returned false
    #[error("verification failed at {stage}: {reason}")]
    Verification { stage: Stage, reason: String },

    #[error("cancelled before {0}")]
    Cancelled(Stage),
}

impl PipelineError {
    pub fn kind(&self) -> FailureKind {
        match self {
            PipelineError::MalformedInput(_) => FailureKind::MalformedInput,
            PipelineError::CircuitCompilation(_) => FailureKind::CircuitCompilation,
            PipelineError::KeySetup(_) => FailureKind::KeySetup,
            PipelineError::WitnessConstruction { .. } => FailureKind::WitnessConstruction,
            PipelineError::Proving(_) => FailureKind::Proving,
            PipelineError::Verification { .. } => FailureKind::Verification,
            PipelineError::Cancelled(_) => FailureKind::Cancelled,
        }
    }

    /// Stage the request was in when it failed
    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::MalformedInput(_) => Stage::Received,
            PipelineError::CircuitCompilation(_) => Stage::WitnessBuilt,
            PipelineError::WitnessConstruction { .. } => Stage::WitnessBuilt,
            PipelineError::KeySetup(_) => Stage::ConstraintsCompiled,
            PipelineError::Proving(_) => Stage::KeysReady,
            PipelineError::Verification { stage, .. } => *stage,
            PipelineError::Cancelled(stage) => *stage,
        }
    }

    /// Only key setup failures are worth retrying unchanged
    pub fn is_retryable(&self) -> bool {
        matches!(self, PipelineError::KeySetup(_))
    }
}

impl From<CryptoError> for PipelineError {
    fn from(e: CryptoError) -> Self {
        PipelineError::MalformedInput(e.to_string())
    }
}

/// Input validation utilities
pub mod validation {
    use super::*;
    use crate::crypto::merkle::MAX_TREE_DEPTH;

    /// Validate a tree depth protocol parameter
    pub fn validate_tree_depth(depth: usize) -> Result<(), MaspError> {
        if depth == 0 || depth > MAX_TREE_DEPTH {
            return Err(MaspError::Configuration(format!(
                "tree depth must be between 1 and {}, got {}",
                MAX_TREE_DEPTH, depth
            )));
        }
        Ok(())
    }

    /// Validate that a raw path has exactly `depth` siblings and directions
    pub fn validate_path_shape(siblings: usize, directions: usize, depth: usize) -> Result<(), CryptoError> {
        if siblings != depth {
            return Err(CryptoError::PathLengthMismatch {
                what: "siblings",
                expected: depth,
                got: siblings,
            });
        }
        if directions != depth {
            return Err(CryptoError::PathLengthMismatch {
                what: "directions",
                expected: depth,
                got: directions,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use validation::*;

    #[test]
    fn test_validate_tree_depth() {
        assert!(validate_tree_depth(3).is_ok());
        assert!(validate_tree_depth(32).is_ok());

        assert!(validate_tree_depth(0).is_err());
        assert!(validate_tree_depth(33).is_err());
    }

    #[test]
    fn test_validate_path_shape() {
        assert!(validate_path_shape(3, 3, 3).is_ok());
        assert!(validate_path_shape(2, 3, 3).is_err());
        assert!(validate_path_shape(3, 4, 3).is_err());
    }

    #[test]
    fn test_only_key_setup_is_retryable() {
        assert!(PipelineError::KeySetup("oom".into()).is_retryable());
        assert!(!PipelineError::Proving("oom".into()).is_retryable());
        assert!(!PipelineError::MalformedInput("bad".into()).is_retryable());
        assert!(!PipelineError::WitnessConstruction {
            failed_assertion: "merkle root".into()
        }
        .is_retryable());
    }

    #[test]
    fn test_crypto_error_maps_to_malformed_input() {
        let err: PipelineError = CryptoError::InvalidDirection { level: Some(2), value: 5 }.into();
        assert_eq!(err.kind(), FailureKind::MalformedInput);
        assert_eq!(err.stage(), Stage::Received);
        assert!(err.to_string().contains("at level 2"));
    }

    #[test]
    fn test_failure_kind_serializes_camel_case() {
        let json = serde_json::to_string(&FailureKind::WitnessConstruction).unwrap();
        assert_eq!(json, "\"witnessConstruction\"");
    }
}
