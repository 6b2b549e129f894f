//! MASP - Multi-Asset Shielded Pool Core
//!
//! Zero-knowledge withdrawals from a shielded pool where every deposit commits to
//! an asset and an amount.
//!
//! # Modules
//! - `crypto`: Cryptographic primitives (Poseidon, commitments, nullifiers, Merkle paths, notes)
//! - `assets`: Immutable asset registry
//! - `proof`: Withdrawal circuit and Groth16 proof generation, key cache, EVM export
//! - `pipeline`: Request-to-proof orchestration with typed, stage-tagged failures
//! - `config`: Pool configuration
//! - `python`: Python bindings (feature `python`)

pub mod assets;
pub mod config;
pub mod crypto;
pub mod error;
pub mod pipeline;
pub mod proof;

#[cfg(feature = "python")]
pub mod python;

// Re-export common types
pub use assets::{AssetDescriptor, AssetRegistry};
pub use config::PoolConfig;
pub use crypto::{AssetBinding, DepositNote, DepositSecret, Direction, FieldElement, MerklePath};
pub use error::{CryptoError, FailureKind, MaspError, MaspResult, PipelineError, ProofError};
pub use pipeline::{CancelToken, Stage, WithdrawalPipeline, WithdrawalProof, WithdrawalRequest, WithdrawalResponse};
pub use proof::{CircuitShape, Groth16Backend, KeyStore, ProofArtifact, ProofBackend, WithdrawalStatement};
