//! Proof orchestration pipeline
//!
//! Drives one withdrawal request through a strictly ordered set of stages:
//!
//! ```text
//! Received -> WitnessBuilt -> ConstraintsCompiled -> KeysReady -> Proven -> Verified
//!     \_____________\_______________\___________________\___________\______> Failed
//! ```
//!
//! Every failure is typed (`PipelineError`) and carries the stage it happened in.
//! Nothing is retried automatically. Pipelines sharing a `KeyStore` share key
//! material read-only; everything else is per request.

pub mod request;

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use ark_bn254::Fr;
use ark_relations::r1cs::{ConstraintSynthesizer, ConstraintSystem};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::assets::AssetRegistry;
use crate::config::PoolConfig;
use crate::crypto::field::{parse_decimal, parse_decimal_list};
use crate::crypto::merkle::MerklePath;
use crate::crypto::note::DepositSecret;
use crate::error::{validation, MaspResult, PipelineError};
use crate::proof::withdraw_circuit::{evaluate_native, CircuitShape, WithdrawalCircuit, WithdrawalStatement};
use crate::proof::{Groth16Backend, KeyStore, ProofBackend};

pub use request::{PublicValues, WithdrawalProof, WithdrawalRequest, WithdrawalResponse};

/// States of a withdrawal request
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Stage {
    Received,
    WitnessBuilt,
    ConstraintsCompiled,
    KeysReady,
    Proven,
    Verified,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Received => "RECEIVED",
            Stage::WitnessBuilt => "WITNESS_BUILT",
            Stage::ConstraintsCompiled => "CONSTRAINTS_COMPILED",
            Stage::KeysReady => "KEYS_READY",
            Stage::Proven => "PROVEN",
            Stage::Verified => "VERIFIED",
            Stage::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

/// Cooperative cancellation flag, checked before every stage
///
/// Cancellation cannot be undone. The pipeline's own token stops every later
/// request on that pipeline; to cancel a single request, give it a fresh token
/// through `prove_request_with`.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    fn check(&self, stage: Stage) -> Result<(), PipelineError> {
        if self.is_cancelled() {
            return Err(PipelineError::Cancelled(stage));
        }
        Ok(())
    }
}

/// Withdrawal proof pipeline for one pool configuration
pub struct WithdrawalPipeline<B: ProofBackend = Groth16Backend> {
    config: PoolConfig,
    registry: Arc<AssetRegistry>,
    keys: Arc<KeyStore<B>>,
    cancel: CancelToken,
}

impl WithdrawalPipeline<Groth16Backend> {
    /// Pipeline with its own Groth16 key store
    pub fn new(config: PoolConfig, registry: AssetRegistry) -> MaspResult<Self> {
        let keys = Arc::new(KeyStore::new(Groth16Backend::from_seed(config.setup_seed)));
        Self::with_key_store(config, Arc::new(registry), keys)
    }
}

impl<B: ProofBackend> WithdrawalPipeline<B> {
    /// Pipeline sharing an existing key store
    pub fn with_key_store(config: PoolConfig, registry: Arc<AssetRegistry>, keys: Arc<KeyStore<B>>) -> MaspResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            registry,
            keys,
            cancel: CancelToken::new(),
        })
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    pub fn registry(&self) -> &AssetRegistry {
        &self.registry
    }

    pub fn key_store(&self) -> &Arc<KeyStore<B>> {
        &self.keys
    }

    pub fn shape(&self) -> CircuitShape {
        CircuitShape::from_config(&self.config)
    }

    /// Parse and validate a request into a statement (RECEIVED -> WITNESS_BUILT)
    ///
    /// No circuit work happens here; every error is `MalformedInput`.
    pub fn build_statement(&self, request: &WithdrawalRequest) -> Result<WithdrawalStatement, PipelineError> {
        self.build_statement_with(request, &self.cancel)
    }

    fn build_statement_with(
        &self,
        request: &WithdrawalRequest,
        cancel: &CancelToken,
    ) -> Result<WithdrawalStatement, PipelineError> {
        cancel.check(Stage::Received)?;

        let depth = self.config.tree_depth;
        let binding = self.config.asset_binding;

        validation::validate_path_shape(request.merkle_path.len(), request.path_directions.len(), depth)?;
        let siblings = parse_decimal_list("merklePath", &request.merkle_path)?;
        let path = MerklePath::from_raw(siblings, &request.path_directions, depth)?;

        let secret = parse_decimal("secret", &request.secret)?;
        let nullifier_seed = parse_decimal("nullifierSeed", &request.nullifier_seed)?;

        let (asset_id, amount) = if binding.is_bound() {
            let asset_id = parse_decimal("assetId", &request.asset_id)?;
            self.registry.by_id(&asset_id)?;
            (asset_id, parse_decimal("amount", &request.amount)?)
        } else {
            (Fr::from(0u64), Fr::from(0u64))
        };

        let deposit = DepositSecret::new(secret, nullifier_seed, asset_id, amount);
        let mut statement = WithdrawalStatement::from_deposit(&deposit, path, binding);

        if let Some(root) = &request.root {
            statement = statement.with_root(parse_decimal("root", root)?);
        }

        Ok(statement)
    }

    /// Run the whole pipeline on a request
    pub fn prove_request(&self, request: &WithdrawalRequest) -> Result<WithdrawalProof, PipelineError> {
        self.prove_request_with(request, &self.cancel)
    }

    /// Run the whole pipeline on a request under its own cancel token
    ///
    /// The pipeline-wide token is not consulted.
    pub fn prove_request_with(
        &self,
        request: &WithdrawalRequest,
        cancel: &CancelToken,
    ) -> Result<WithdrawalProof, PipelineError> {
        let statement = self.build_statement_with(request, cancel).map_err(|e| self.failed(e))?;
        info!(
            stage = %Stage::WitnessBuilt,
            "witness built for {}",
            self.shape()
        );

        self.prove_inner(statement, cancel).map_err(|e| self.failed(e))
    }

    /// Prove an already built statement (WITNESS_BUILT onwards)
    pub fn prove_statement(&self, statement: WithdrawalStatement) -> Result<WithdrawalProof, PipelineError> {
        self.prove_inner(statement, &self.cancel).map_err(|e| self.failed(e))
    }

    fn prove_inner(&self, statement: WithdrawalStatement, cancel: &CancelToken) -> Result<WithdrawalProof, PipelineError> {
        let shape = self.shape();

        // ===== WITNESS_BUILT -> CONSTRAINTS_COMPILED =====
        cancel.check(Stage::WitnessBuilt)?;
        let start = Instant::now();
        let num_constraints = self.compile(&statement)?;
        info!(
            stage = %Stage::ConstraintsCompiled,
            "compiled {} constraints in {:.2}s",
            num_constraints,
            start.elapsed().as_secs_f64()
        );

        // ===== CONSTRAINTS_COMPILED -> KEYS_READY =====
        cancel.check(Stage::ConstraintsCompiled)?;
        let start = Instant::now();
        let keys = self
            .keys
            .get_or_setup(shape)
            .map_err(|e| PipelineError::KeySetup(e.to_string()))?;

        let backend = self.keys.backend();
        let public_inputs = statement.public_inputs();
        if keys.shape != shape || backend.public_input_count(&keys.verifying_key) != public_inputs.len() {
            return Err(PipelineError::CircuitCompilation(format!(
                "keys were generated for {} with {} public inputs, statement has {}",
                keys.shape,
                backend.public_input_count(&keys.verifying_key),
                public_inputs.len()
            )));
        }
        info!(
            stage = %Stage::KeysReady,
            "keys ready in {:.2}s",
            start.elapsed().as_secs_f64()
        );

        // ===== KEYS_READY -> PROVEN =====
        cancel.check(Stage::KeysReady)?;
        let start = Instant::now();
        let public = PublicValues::from_statement(&statement);
        let artifact = backend
            .prove(&keys.proving_key, WithdrawalCircuit::new(statement))
            .map_err(|e| PipelineError::Proving(e.to_string()))?;
        info!(
            stage = %Stage::Proven,
            "proof generated in {:.2}s ({} bytes)",
            start.elapsed().as_secs_f64(),
            artifact.as_bytes().len()
        );

        let proof = WithdrawalProof {
            shape,
            proof: artifact,
            public,
        };

        // ===== PROVEN -> VERIFIED =====
        if self.config.self_verify {
            cancel.check(Stage::Proven)?;
            let valid = backend
                .verify(&keys.verifying_key, &proof.proof, &public_inputs)
                .map_err(|e| PipelineError::Verification {
                    stage: Stage::Proven,
                    reason: e.to_string(),
                })?;
            if !valid {
                return Err(PipelineError::Verification {
                    stage: Stage::Proven,
                    reason: "self-verification rejected the proof".to_string(),
                });
            }
            info!(stage = %Stage::Verified, "proof self-verified");
        }

        Ok(proof)
    }

    /// Synthesize the circuit and check the witness satisfies it
    ///
    /// Returns the number of constraints.
    fn compile(&self, statement: &WithdrawalStatement) -> Result<usize, PipelineError> {
        let shape = self.shape();
        if statement.shape() != shape {
            return Err(PipelineError::CircuitCompilation(format!(
                "statement has {}, pool is configured for {}",
                statement.shape(),
                shape
            )));
        }

        let violations = evaluate_native(statement).map_err(|e| PipelineError::CircuitCompilation(e.to_string()))?;

        let cs = ConstraintSystem::<Fr>::new_ref();
        WithdrawalCircuit::new(statement.clone())
            .generate_constraints(cs.clone())
            .map_err(|e| PipelineError::CircuitCompilation(e.to_string()))?;
        let satisfied = cs
            .is_satisfied()
            .map_err(|e| PipelineError::CircuitCompilation(e.to_string()))?;

        match (satisfied, violations.first()) {
            (true, None) => Ok(cs.num_constraints()),
            (false, Some(label)) => Err(PipelineError::WitnessConstruction {
                failed_assertion: label.clone(),
            }),
            (satisfied, _) => Err(PipelineError::CircuitCompilation(format!(
                "constraint system and plain evaluation disagree (r1cs satisfied: {}, violations: {:?})",
                satisfied, violations
            ))),
        }
    }

    /// Run a request and report the outcome; never fails
    pub fn run(&self, request: &WithdrawalRequest) -> WithdrawalResponse {
        match self.prove_request(request) {
            Ok(proof) => proof.to_response(),
            Err(e) => WithdrawalResponse::failure(&e),
        }
    }

    /// Parse a JSON request and run it
    pub fn run_json(&self, json: &str) -> WithdrawalResponse {
        match WithdrawalRequest::from_json(json) {
            Ok(request) => self.run(&request),
            Err(e) => WithdrawalResponse::failure(&self.failed(e)),
        }
    }

    /// Verify a proof against the key store's verifying key for its shape
    ///
    /// Fails with `KeySetup` when no keys for the shape are loaded and the backend
    /// cannot reproduce the prover's keys; `Ok(false)` always means the proof was
    /// checked against the right key and rejected.
    pub fn verify(&self, proof: &WithdrawalProof) -> Result<bool, PipelineError> {
        let keys = self
            .keys
            .verifying_keys(proof.shape)
            .map_err(|e| PipelineError::KeySetup(e.to_string()))?;

        self.keys
            .backend()
            .verify(&keys.verifying_key, &proof.proof, &proof.public_inputs())
            .map_err(|e| PipelineError::Verification {
                stage: Stage::Verified,
                reason: e.to_string(),
            })
    }

    /// Verify a serialized response produced by `run`
    pub fn verify_response(&self, response: &WithdrawalResponse) -> Result<bool, PipelineError> {
        let proof = WithdrawalProof::from_response(response, self.shape())?;
        self.verify(&proof)
    }

    fn failed(&self, error: PipelineError) -> PipelineError {
        warn!(
            stage = %error.stage(),
            kind = ?error.kind(),
            "withdrawal failed: {}",
            error
        );
        error
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::commitment::AssetBinding;
    use crate::error::FailureKind;

    fn request() -> WithdrawalRequest {
        WithdrawalRequest {
            secret: "123".into(),
            nullifier_seed: "456".into(),
            asset_id: "1".into(),
            amount: "1000000000000000000".into(),
            merkle_path: vec!["789".into(), "101112".into(), "131415".into()],
            path_directions: vec![0, 0, 0],
            root: None,
        }
    }

    fn pipeline() -> WithdrawalPipeline {
        let config = PoolConfig {
            setup_seed: Some(1),
            ..PoolConfig::default()
        };
        WithdrawalPipeline::new(config, AssetRegistry::well_known()).unwrap()
    }

    #[test]
    fn test_stage_display() {
        assert_eq!(Stage::WitnessBuilt.to_string(), "WITNESS_BUILT");
        assert_eq!(serde_json::to_string(&Stage::KeysReady).unwrap(), "\"keysReady\"");
    }

    #[test]
    fn test_build_statement() {
        let statement = pipeline().build_statement(&request()).unwrap();
        assert_eq!(statement.shape(), CircuitShape::new(3, AssetBinding::Bound));
        assert_eq!(statement.public_asset_id, Fr::from(1u64));
    }

    #[test]
    fn test_malformed_inputs() {
        let pipeline = pipeline();
        let cases: [fn(&mut WithdrawalRequest); 6] = [
            |r| {
                r.merkle_path.pop();
            },
            |r| r.path_directions = vec![0, 2, 0],
            |r| r.secret = "12a".into(),
            |r| r.amount = "-5".into(),
            |r| r.asset_id = "99".into(),
            // the field modulus itself
            |r| r.secret = "21888242871839275222246405745257275088548364400416034343698204186575808495617".into(),
        ];

        for (i, mutate) in cases.iter().enumerate() {
            let mut request = request();
            mutate(&mut request);

            let err = pipeline.build_statement(&request).unwrap_err();
            assert_eq!(err.kind(), FailureKind::MalformedInput, "case {i}");
            assert_eq!(err.stage(), Stage::Received);
        }
        assert_eq!(pipeline.key_store().setups_run(), 0);
    }

    #[test]
    fn test_wrong_root_is_witness_failure_before_setup() {
        let pipeline = pipeline();
        let request = request().with_root(&Fr::from(5u64));

        let err = pipeline.prove_request(&request).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::WitnessConstruction { ref failed_assertion } if failed_assertion == "merkle root"
        ));
        assert_eq!(pipeline.key_store().setups_run(), 0);
    }

    #[test]
    fn test_depth_mismatch_is_compilation_error() {
        let pipeline = pipeline();
        let deposit = DepositSecret::new(Fr::from(1u64), Fr::from(2u64), Fr::from(1u64), Fr::from(3u64));
        let path = MerklePath::from_raw(vec![Fr::from(4u64); 4], &[0, 0, 0, 0], 4).unwrap();
        let statement = WithdrawalStatement::from_deposit(&deposit, path, AssetBinding::Bound);

        let err = pipeline.prove_statement(statement).unwrap_err();
        assert_eq!(err.kind(), FailureKind::CircuitCompilation);
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_cancelled_before_start() {
        let pipeline = pipeline();
        pipeline.cancel_token().cancel();

        let response = pipeline.run(&request());
        assert!(!response.success);
        assert_eq!(response.error_kind, Some(FailureKind::Cancelled));
        assert_eq!(response.failed_stage, Some(Stage::Received));
    }

    #[test]
    fn test_request_token_leaves_pipeline_usable() {
        let pipeline = pipeline();
        let token = CancelToken::new();
        token.cancel();

        let err = pipeline.prove_request_with(&request(), &token).unwrap_err();
        assert!(matches!(err, PipelineError::Cancelled(Stage::Received)));

        assert!(!pipeline.cancel_token().is_cancelled());
        assert!(pipeline.build_statement(&request()).is_ok());
        assert_eq!(pipeline.key_store().setups_run(), 0);
    }

    #[test]
    fn test_run_json_reports_parse_errors() {
        let response = pipeline().run_json("{not json");
        assert!(!response.success);
        assert_eq!(response.error_kind, Some(FailureKind::MalformedInput));
        assert!(response.proof.is_none());
    }
}
