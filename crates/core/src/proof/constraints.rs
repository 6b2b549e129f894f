//! Constraint capability interface
//!
//! The withdrawal predicate and the Merkle verifier are written once against
//! `ConstraintApi` and evaluated by two backends:
//!
//! - `NativeApi`: plain field arithmetic. Failed assertions are recorded by label
//!   instead of aborting, so a caller can see which check an inconsistent witness
//!   breaks.
//! - `gadgets::R1csApi`: arkworks R1CS variables, used for setup and proving.
//!
//! Both must agree on every value: `select` is the same linear expression in both,
//! and `hash` is the same Poseidon sponge.

use ark_bn254::Fr;
use ark_ff::Zero;
use ark_relations::r1cs::SynthesisError;

use crate::crypto::poseidon::poseidon_hash;

/// Primitives a constraint system must offer to express the withdrawal predicate
pub trait ConstraintApi {
    type Var: Clone;

    /// Allocate a private value. `None` is only valid during key setup.
    fn witness(&mut self, label: &str, value: Option<Fr>) -> Result<Self::Var, SynthesisError>;

    /// Allocate a public input. Allocation order is the public input order.
    fn public_input(&mut self, label: &str, value: Option<Fr>) -> Result<Self::Var, SynthesisError>;

    fn assert_equal(&mut self, label: &str, a: &Self::Var, b: &Self::Var) -> Result<(), SynthesisError>;

    /// Require `bit` to be 0 or 1
    fn assert_boolean(&mut self, label: &str, bit: &Self::Var) -> Result<(), SynthesisError>;

    /// `when_set` if `bit` is 1, `when_clear` if `bit` is 0
    ///
    /// Computed as `when_clear + bit * (when_set - when_clear)`; only meaningful
    /// once `bit` has been constrained boolean.
    fn select(&mut self, bit: &Self::Var, when_set: &Self::Var, when_clear: &Self::Var) -> Result<Self::Var, SynthesisError>;

    /// Poseidon hash of an ordered sequence
    fn hash(&mut self, inputs: &[Self::Var]) -> Result<Self::Var, SynthesisError>;
}

/// Plain evaluation of the predicate
#[derive(Debug, Default)]
pub struct NativeApi {
    violations: Vec<String>,
}

impl NativeApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_satisfied(&self) -> bool {
        self.violations.is_empty()
    }

    /// Labels of failed assertions, in evaluation order
    pub fn violations(&self) -> &[String] {
        &self.violations
    }

    pub fn into_violations(self) -> Vec<String> {
        self.violations
    }
}

impl ConstraintApi for NativeApi {
    type Var = Fr;

    fn witness(&mut self, _label: &str, value: Option<Fr>) -> Result<Fr, SynthesisError> {
        value.ok_or(SynthesisError::AssignmentMissing)
    }

    fn public_input(&mut self, _label: &str, value: Option<Fr>) -> Result<Fr, SynthesisError> {
        value.ok_or(SynthesisError::AssignmentMissing)
    }

    fn assert_equal(&mut self, label: &str, a: &Fr, b: &Fr) -> Result<(), SynthesisError> {
        if a != b {
            self.violations.push(label.to_string());
        }
        Ok(())
    }

    fn assert_boolean(&mut self, label: &str, bit: &Fr) -> Result<(), SynthesisError> {
        if !(bit.is_zero() || *bit == Fr::from(1u64)) {
            self.violations.push(label.to_string());
        }
        Ok(())
    }

    fn select(&mut self, bit: &Fr, when_set: &Fr, when_clear: &Fr) -> Result<Fr, SynthesisError> {
        Ok(*when_clear + *bit * (*when_set - when_clear))
    }

    fn hash(&mut self, inputs: &[Fr]) -> Result<Fr, SynthesisError> {
        Ok(poseidon_hash(inputs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select() {
        let mut api = NativeApi::new();
        let a = Fr::from(7u64);
        let b = Fr::from(9u64);

        assert_eq!(api.select(&Fr::from(1u64), &a, &b).unwrap(), a);
        assert_eq!(api.select(&Fr::from(0u64), &a, &b).unwrap(), b);
    }

    #[test]
    fn test_violations_recorded_in_order() {
        let mut api = NativeApi::new();

        api.assert_equal("first", &Fr::from(1u64), &Fr::from(1u64)).unwrap();
        api.assert_boolean("bit", &Fr::from(2u64)).unwrap();
        api.assert_equal("second", &Fr::from(1u64), &Fr::from(2u64)).unwrap();

        assert!(!api.is_satisfied());
        assert_eq!(api.violations(), ["bit".to_string(), "second".to_string()]);
    }

    #[test]
    fn test_boolean_accepts_zero_and_one() {
        let mut api = NativeApi::new();
        api.assert_boolean("zero", &Fr::from(0u64)).unwrap();
        api.assert_boolean("one", &Fr::from(1u64)).unwrap();
        assert!(api.is_satisfied());
    }

    #[test]
    fn test_missing_value_is_an_error() {
        let mut api = NativeApi::new();
        assert!(matches!(api.witness("secret", None), Err(SynthesisError::AssignmentMissing)));
    }
}
