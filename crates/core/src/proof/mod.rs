//! zkSNARK proof generation and verification
//!
//! This module implements Groth16 proof generation and verification for withdrawals.
//!
//! Components:
//! - `constraints`: capability interface the predicate is written against, plus plain evaluation
//! - `gadgets`: R1CS constraint gadgets (Poseidon, Merkle) and the R1CS capability backend
//! - `withdraw_circuit`: the withdrawal predicate and its arkworks circuit
//! - `keys`: proving/verifying key cache, one setup per circuit shape
//! - `export`: EVM verifier contract and calldata export
//! - Proof generation and verification using ark-groth16

pub mod constraints;
pub mod export;
pub mod gadgets;
pub mod keys;
pub mod withdraw_circuit;

use ark_bn254::{Bn254, Fr};
use ark_groth16::{Groth16, PreparedVerifyingKey, Proof, ProvingKey};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use ark_snark::SNARK;
use rand::rngs::{OsRng, StdRng};
use rand::SeedableRng;

pub use crate::error::ProofError;
pub use keys::{KeyPair, KeyStore, SeededKeyStores};
pub use withdraw_circuit::{CircuitShape, WithdrawalCircuit, WithdrawalStatement};

/// Setup, prove and verify for the withdrawal circuit
///
/// Implementations are shared across threads through the key store, so keys
/// must be usable read-only from several pipelines at once.
pub trait ProofBackend: Send + Sync {
    type ProvingKey: Send + Sync;
    type VerifyingKey: Send + Sync;

    fn setup(&self, circuit: WithdrawalCircuit) -> Result<(Self::ProvingKey, Self::VerifyingKey), ProofError>;

    fn prove(&self, pk: &Self::ProvingKey, circuit: WithdrawalCircuit) -> Result<ProofArtifact, ProofError>;

    fn verify(&self, vk: &Self::VerifyingKey, proof: &ProofArtifact, public_inputs: &[Fr]) -> Result<bool, ProofError>;

    /// Number of public inputs the verifying key was generated for
    fn public_input_count(&self, vk: &Self::VerifyingKey) -> usize;

    /// Whether `setup` returns the same keys on every call
    ///
    /// Only then may a verifier derive keys it was never given.
    fn reproducible_setup(&self) -> bool;
}

/// Serialized Groth16 proof
///
/// Compressed arkworks encoding: A (32) || B (64) || C (32).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProofArtifact {
    bytes: Vec<u8>,
}

impl ProofArtifact {
    /// Size of a compressed BN254 Groth16 proof
    pub const SIZE: usize = 128;

    /// Create from raw bytes
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, ProofError> {
        if bytes.len() != Self::SIZE {
            return Err(ProofError::SerializationError(format!(
                "Expected {} bytes, got {}",
                Self::SIZE,
                bytes.len()
            )));
        }
        Ok(Self { bytes })
    }

    pub fn from_proof(proof: &Proof<Bn254>) -> Result<Self, ProofError> {
        let mut bytes = Vec::new();
        proof
            .serialize_compressed(&mut bytes)
            .map_err(|e| ProofError::SerializationError(e.to_string()))?;
        Self::from_bytes(bytes)
    }

    pub fn to_proof(&self) -> Result<Proof<Bn254>, ProofError> {
        Proof::deserialize_compressed(self.bytes.as_slice()).map_err(|e| ProofError::SerializationError(e.to_string()))
    }

    /// Get the raw bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }

    pub fn from_hex(s: &str) -> Result<Self, ProofError> {
        let bytes = hex::decode(s.trim().trim_start_matches("0x"))
            .map_err(|e| ProofError::SerializationError(format!("invalid proof hex: {}", e)))?;
        Self::from_bytes(bytes)
    }
}

/// Groth16 over BN254
///
/// WARNING: setup samples its own toxic waste and is suitable only for testing.
/// For production, load keys from a trusted setup ceremony into the key store.
#[derive(Clone, Debug, Default)]
pub struct Groth16Backend {
    setup_seed: Option<u64>,
}

impl Groth16Backend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive setup randomness from `seed`, making keys reproducible across processes
    pub fn with_setup_seed(seed: u64) -> Self {
        Self { setup_seed: Some(seed) }
    }

    pub fn from_seed(seed: Option<u64>) -> Self {
        Self { setup_seed: seed }
    }

    pub fn setup_seed(&self) -> Option<u64> {
        self.setup_seed
    }
}

impl ProofBackend for Groth16Backend {
    type ProvingKey = ProvingKey<Bn254>;
    type VerifyingKey = PreparedVerifyingKey<Bn254>;

    fn setup(&self, circuit: WithdrawalCircuit) -> Result<(Self::ProvingKey, Self::VerifyingKey), ProofError> {
        let (pk, vk) = match self.setup_seed {
            Some(seed) => Groth16::<Bn254>::circuit_specific_setup(circuit, &mut StdRng::seed_from_u64(seed)),
            None => Groth16::<Bn254>::circuit_specific_setup(circuit, &mut OsRng),
        }
        .map_err(|e| ProofError::SetupFailed(e.to_string()))?;

        let pvk = Groth16::<Bn254>::process_vk(&vk).map_err(|e| ProofError::SetupFailed(e.to_string()))?;

        Ok((pk, pvk))
    }

    fn prove(&self, pk: &Self::ProvingKey, circuit: WithdrawalCircuit) -> Result<ProofArtifact, ProofError> {
        let proof = Groth16::<Bn254>::prove(pk, circuit, &mut OsRng)
            .map_err(|e| ProofError::GenerationFailed(e.to_string()))?;

        ProofArtifact::from_proof(&proof)
    }

    fn verify(&self, vk: &Self::VerifyingKey, proof: &ProofArtifact, public_inputs: &[Fr]) -> Result<bool, ProofError> {
        let expected = self.public_input_count(vk);
        if public_inputs.len() != expected {
            return Err(ProofError::VerificationFailed(format!(
                "expected {} public inputs, got {}",
                expected,
                public_inputs.len()
            )));
        }

        let proof = proof.to_proof()?;

        Groth16::<Bn254>::verify_with_processed_vk(vk, public_inputs, &proof)
            .map_err(|e| ProofError::VerificationFailed(e.to_string()))
    }

    fn public_input_count(&self, vk: &Self::VerifyingKey) -> usize {
        vk.vk.gamma_abc_g1.len().saturating_sub(1)
    }

    fn reproducible_setup(&self) -> bool {
        self.setup_seed.is_some()
    }
}
