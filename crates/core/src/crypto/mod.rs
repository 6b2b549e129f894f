//! Cryptographic primitives for the shielded pool

pub mod commitment;
pub mod field;
pub mod merkle;
pub mod note;
pub mod nullifier;
pub mod poseidon;
pub mod poseidon_constants;

pub use commitment::{commit, commit_with, AssetBinding};
pub use field::{parse_decimal, to_decimal, FieldElement};
pub use merkle::{root_from_path, root_from_raw_path, Direction, MerklePath, MAX_TREE_DEPTH};
pub use note::{DepositNote, DepositSecret};
pub use nullifier::{nullifier_hash, nullifier_hash_with, InMemoryNullifierSet, NullifierSet};
pub use poseidon::{poseidon_hash, poseidon_hash2};
