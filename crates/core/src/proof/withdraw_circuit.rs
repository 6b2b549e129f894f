//! Withdrawal Circuit for the shielded pool
//!
//! This circuit proves that a withdrawal is valid:
//! 1. The withdrawer knows the opening of a leaf commitment
//! 2. That leaf is included in the tree with the public root
//! 3. The public nullifier hash is derived from the same nullifier seed and asset
//! 4. The private asset id and amount equal the publicly declared ones
//!
//! Public Inputs (in this order):
//! - root: Merkle root the path leads to
//! - nullifier_hash: published to prevent double spending
//! - public_asset_id, public_amount: only when the asset is bound
//!
//! Private Inputs (Witness):
//! - secret, nullifier_seed, asset_id, amount: the deposit opening
//! - siblings, directions: the Merkle path, leaf level first
//!
//! The leaf is never an input; it is recomputed from the opening.

use ark_bn254::Fr;
use ark_relations::r1cs::{ConstraintSynthesizer, ConstraintSystemRef, SynthesisError};
use serde::{Deserialize, Serialize};

use super::constraints::{ConstraintApi, NativeApi};
use super::gadgets::{constrained_root_from_path, R1csApi};
use crate::config::PoolConfig;
use crate::crypto::commitment::{commit_with, AssetBinding};
use crate::crypto::merkle::MerklePath;
use crate::crypto::note::DepositSecret;
use crate::crypto::nullifier::nullifier_hash_with;

/// Assertion labels reported when a witness does not satisfy the predicate
pub const ASSERT_MERKLE_ROOT: &str = "merkle root";
pub const ASSERT_NULLIFIER_HASH: &str = "nullifier hash";
pub const ASSERT_PUBLIC_ASSET_ID: &str = "public asset id";
pub const ASSERT_PUBLIC_AMOUNT: &str = "public amount";

/// Protocol parameters that fix the constraint system
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CircuitShape {
    pub tree_depth: usize,
    pub asset_binding: AssetBinding,
}

impl CircuitShape {
    pub fn new(tree_depth: usize, asset_binding: AssetBinding) -> Self {
        Self {
            tree_depth,
            asset_binding,
        }
    }

    pub fn from_config(config: &PoolConfig) -> Self {
        Self::new(config.tree_depth, config.asset_binding)
    }

    /// Number of public inputs the verifier expects
    pub fn public_input_count(&self) -> usize {
        if self.asset_binding.is_bound() {
            4
        } else {
            2
        }
    }
}

impl std::fmt::Display for CircuitShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "depth={} binding={}", self.tree_depth, self.asset_binding)
    }
}

/// Full assignment of one withdrawal: private opening plus public values
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WithdrawalStatement {
    pub asset_binding: AssetBinding,

    // ===== Private =====
    pub secret: Fr,
    pub nullifier_seed: Fr,
    pub asset_id: Fr,
    pub amount: Fr,
    pub path: MerklePath,

    // ===== Public =====
    pub root: Fr,
    pub nullifier_hash: Fr,
    pub public_asset_id: Fr,
    pub public_amount: Fr,
}

impl WithdrawalStatement {
    /// Build a statement whose public values are derived from the deposit and path
    pub fn from_deposit(deposit: &DepositSecret, path: MerklePath, asset_binding: AssetBinding) -> Self {
        let leaf = commit_with(
            asset_binding,
            &deposit.secret,
            &deposit.nullifier_seed,
            &deposit.asset_id,
            &deposit.amount,
        );
        let root = path.root(&leaf);
        let nullifier_hash = nullifier_hash_with(asset_binding, &deposit.nullifier_seed, &deposit.asset_id);

        Self {
            asset_binding,
            secret: deposit.secret,
            nullifier_seed: deposit.nullifier_seed,
            asset_id: deposit.asset_id,
            amount: deposit.amount,
            path,
            root,
            nullifier_hash,
            public_asset_id: deposit.asset_id,
            public_amount: deposit.amount,
        }
    }

    /// Replace the public root with an externally supplied one
    pub fn with_root(mut self, root: Fr) -> Self {
        self.root = root;
        self
    }

    pub fn shape(&self) -> CircuitShape {
        CircuitShape::new(self.path.depth(), self.asset_binding)
    }

    /// Leaf commitment recomputed from the private opening
    pub fn leaf(&self) -> Fr {
        commit_with(
            self.asset_binding,
            &self.secret,
            &self.nullifier_seed,
            &self.asset_id,
            &self.amount,
        )
    }

    /// Public inputs in circuit allocation order
    pub fn public_inputs(&self) -> Vec<Fr> {
        let mut inputs = vec![self.root, self.nullifier_hash];
        if self.asset_binding.is_bound() {
            inputs.push(self.public_asset_id);
            inputs.push(self.public_amount);
        }
        inputs
    }
}

/// Express the withdrawal predicate against any constraint backend
///
/// With `statement` set to `None` only the structure is built, which is what key
/// setup needs.
pub fn enforce_withdrawal<A: ConstraintApi>(
    api: &mut A,
    shape: CircuitShape,
    statement: Option<&WithdrawalStatement>,
) -> Result<(), SynthesisError> {
    if let Some(s) = statement {
        if s.shape() != shape {
            return Err(SynthesisError::Unsatisfiable);
        }
    }
    let bound = shape.asset_binding.is_bound();

    // ===== Allocate Public Inputs =====
    let root = api.public_input("root", statement.map(|s| s.root))?;
    let nullifier_hash = api.public_input("nullifier_hash", statement.map(|s| s.nullifier_hash))?;
    let public_asset = if bound {
        Some((
            api.public_input("public_asset_id", statement.map(|s| s.public_asset_id))?,
            api.public_input("public_amount", statement.map(|s| s.public_amount))?,
        ))
    } else {
        None
    };

    // ===== Allocate Private Inputs (Witnesses) =====
    let secret = api.witness("secret", statement.map(|s| s.secret))?;
    let nullifier_seed = api.witness("nullifier_seed", statement.map(|s| s.nullifier_seed))?;
    let asset_id = api.witness("asset_id", statement.map(|s| s.asset_id))?;
    let amount = api.witness("amount", statement.map(|s| s.amount))?;

    let mut siblings = Vec::with_capacity(shape.tree_depth);
    let mut directions = Vec::with_capacity(shape.tree_depth);
    for level in 0..shape.tree_depth {
        siblings.push(api.witness("sibling", statement.map(|s| s.path.siblings()[level]))?);
        directions.push(api.witness("direction", statement.map(|s| s.path.directions()[level].as_field()))?);
    }

    // ===== Leaf commitment =====
    let preimage = shape
        .asset_binding
        .commitment_preimage(&secret, &nullifier_seed, &asset_id, &amount);
    let leaf = api.hash(&preimage)?;

    // ===== Merkle inclusion =====
    let computed_root = constrained_root_from_path(api, &leaf, &siblings, &directions)?;
    api.assert_equal(ASSERT_MERKLE_ROOT, &computed_root, &root)?;

    // ===== Nullifier derivation =====
    let preimage = shape.asset_binding.nullifier_preimage(&nullifier_seed, &asset_id);
    let computed_nullifier = api.hash(&preimage)?;
    api.assert_equal(ASSERT_NULLIFIER_HASH, &computed_nullifier, &nullifier_hash)?;

    // ===== Public/private consistency =====
    if let Some((public_asset_id, public_amount)) = public_asset {
        api.assert_equal(ASSERT_PUBLIC_ASSET_ID, &asset_id, &public_asset_id)?;
        api.assert_equal(ASSERT_PUBLIC_AMOUNT, &amount, &public_amount)?;
    }

    Ok(())
}

/// Evaluate the predicate with plain arithmetic, returning the failed assertions
pub fn evaluate_native(statement: &WithdrawalStatement) -> Result<Vec<String>, SynthesisError> {
    let mut api = NativeApi::new();
    enforce_withdrawal(&mut api, statement.shape(), Some(statement))?;
    Ok(api.into_violations())
}

/// Withdrawal circuit for Groth16
#[derive(Clone, Debug)]
pub struct WithdrawalCircuit {
    shape: CircuitShape,
    statement: Option<WithdrawalStatement>,
}

impl WithdrawalCircuit {
    /// Circuit with values, for proving
    pub fn new(statement: WithdrawalStatement) -> Self {
        Self {
            shape: statement.shape(),
            statement: Some(statement),
        }
    }

    /// Circuit without values, for key setup
    pub fn blank(shape: CircuitShape) -> Self {
        Self { shape, statement: None }
    }

    pub fn shape(&self) -> CircuitShape {
        self.shape
    }

    pub fn statement(&self) -> Option<&WithdrawalStatement> {
        self.statement.as_ref()
    }
}

impl ConstraintSynthesizer<Fr> for WithdrawalCircuit {
    fn generate_constraints(self, cs: ConstraintSystemRef<Fr>) -> Result<(), SynthesisError> {
        let mut api = R1csApi::new(cs);
        enforce_withdrawal(&mut api, self.shape, self.statement.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::merkle::Direction;
    use crate::crypto::poseidon::poseidon_hash;
    use ark_relations::r1cs::ConstraintSystem;

    fn demo_statement() -> WithdrawalStatement {
        let deposit = DepositSecret::new(
            Fr::from(123u64),
            Fr::from(456u64),
            Fr::from(1u64),
            Fr::from(1_000_000_000_000_000_000u64),
        );
        let path = MerklePath::new(
            vec![Fr::from(789u64), Fr::from(101112u64), Fr::from(131415u64)],
            vec![Direction::Left; 3],
            3,
        )
        .unwrap();
        WithdrawalStatement::from_deposit(&deposit, path, AssetBinding::Bound)
    }

    fn r1cs_satisfied(statement: &WithdrawalStatement) -> bool {
        let cs = ConstraintSystem::<Fr>::new_ref();
        WithdrawalCircuit::new(statement.clone())
            .generate_constraints(cs.clone())
            .unwrap();
        cs.is_satisfied().unwrap()
    }

    #[test]
    fn test_demo_public_values() {
        let statement = demo_statement();
        let amount = Fr::from(1_000_000_000_000_000_000u64);

        let leaf = poseidon_hash(&[Fr::from(123u64), Fr::from(456u64), Fr::from(1u64), amount]);
        let level0 = poseidon_hash(&[leaf, Fr::from(789u64)]);
        let level1 = poseidon_hash(&[level0, Fr::from(101112u64)]);
        let root = poseidon_hash(&[level1, Fr::from(131415u64)]);

        assert_eq!(statement.leaf(), leaf);
        assert_eq!(statement.root, root);
        assert_eq!(statement.nullifier_hash, poseidon_hash(&[Fr::from(456u64), Fr::from(1u64)]));
        assert_eq!(statement.public_inputs(), vec![root, statement.nullifier_hash, Fr::from(1u64), amount]);
    }

    #[test]
    fn test_valid_statement_satisfies_both_backends() {
        let statement = demo_statement();
        assert!(evaluate_native(&statement).unwrap().is_empty());
        assert!(r1cs_satisfied(&statement));
    }

    #[test]
    fn test_mutated_sibling_breaks_root() {
        let statement = demo_statement();

        for level in 0..3 {
            let mut bad = statement.clone();
            bad.path.siblings_mut()[level] += Fr::from(1u64);

            assert_eq!(evaluate_native(&bad).unwrap(), vec![ASSERT_MERKLE_ROOT.to_string()]);
            assert!(!r1cs_satisfied(&bad), "level {level}");
        }
    }

    #[test]
    fn test_flipped_direction_breaks_root() {
        let mut bad = demo_statement();
        bad.path.directions_mut()[1] = Direction::Right;

        assert_eq!(evaluate_native(&bad).unwrap(), vec![ASSERT_MERKLE_ROOT.to_string()]);
        assert!(!r1cs_satisfied(&bad));
    }

    #[test]
    fn test_public_asset_mismatch() {
        let mut bad = demo_statement();
        bad.public_asset_id = Fr::from(2u64);

        assert_eq!(evaluate_native(&bad).unwrap(), vec![ASSERT_PUBLIC_ASSET_ID.to_string()]);
        assert!(!r1cs_satisfied(&bad));
    }

    #[test]
    fn test_wrong_nullifier_hash() {
        let mut bad = demo_statement();
        bad.nullifier_hash = poseidon_hash(&[Fr::from(456u64), Fr::from(2u64)]);

        assert_eq!(evaluate_native(&bad).unwrap(), vec![ASSERT_NULLIFIER_HASH.to_string()]);
        assert!(!r1cs_satisfied(&bad));
    }

    #[test]
    fn test_unbound_shape() {
        let deposit = DepositSecret::new(Fr::from(1u64), Fr::from(2u64), Fr::from(0u64), Fr::from(0u64));
        let path = MerklePath::new(vec![Fr::from(3u64); 2], vec![Direction::Right; 2], 2).unwrap();
        let statement = WithdrawalStatement::from_deposit(&deposit, path, AssetBinding::Unbound);

        assert_eq!(statement.shape().public_input_count(), 2);
        assert_eq!(statement.public_inputs().len(), 2);
        assert!(evaluate_native(&statement).unwrap().is_empty());
        assert!(r1cs_satisfied(&statement));
    }

    #[test]
    fn test_blank_circuit_has_same_structure() {
        let statement = demo_statement();

        let full = ConstraintSystem::<Fr>::new_ref();
        WithdrawalCircuit::new(statement.clone()).generate_constraints(full.clone()).unwrap();

        let blank = ConstraintSystem::<Fr>::new_ref();
        blank.set_mode(ark_relations::r1cs::SynthesisMode::Setup);
        WithdrawalCircuit::blank(statement.shape()).generate_constraints(blank.clone()).unwrap();

        assert_eq!(full.num_constraints(), blank.num_constraints());
        // The constant one counts as an instance variable
        assert_eq!(blank.num_instance_variables(), 1 + 4);
    }

    #[test]
    fn test_shape_mismatch_is_error() {
        let statement = demo_statement();
        let mut api = NativeApi::new();
        let wrong = CircuitShape::new(4, AssetBinding::Bound);

        assert!(enforce_withdrawal(&mut api, wrong, Some(&statement)).is_err());
    }
}
