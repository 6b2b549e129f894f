//! Circuit gadgets for zkSNARK proofs
//!
//! This module contains constraint system implementations for:
//! - Poseidon hash function
//! - Merkle tree path verification
//! - `R1csApi`, the arkworks backend of `ConstraintApi`

pub mod merkle;
pub mod poseidon;

use ark_bn254::Fr;
use ark_r1cs_std::{fields::fp::FpVar, prelude::*};
use ark_relations::r1cs::{ConstraintSystemRef, SynthesisError};

use super::constraints::ConstraintApi;

pub use merkle::constrained_root_from_path;
pub use poseidon::PoseidonGadget;

/// `ConstraintApi` over an arkworks constraint system
pub struct R1csApi {
    cs: ConstraintSystemRef<Fr>,
    poseidon: PoseidonGadget,
}

impl R1csApi {
    pub fn new(cs: ConstraintSystemRef<Fr>) -> Self {
        Self {
            cs,
            poseidon: PoseidonGadget::new(),
        }
    }
}

impl ConstraintApi for R1csApi {
    type Var = FpVar<Fr>;

    fn witness(&mut self, _label: &str, value: Option<Fr>) -> Result<FpVar<Fr>, SynthesisError> {
        FpVar::new_witness(self.cs.clone(), || value.ok_or(SynthesisError::AssignmentMissing))
    }

    fn public_input(&mut self, _label: &str, value: Option<Fr>) -> Result<FpVar<Fr>, SynthesisError> {
        FpVar::new_input(self.cs.clone(), || value.ok_or(SynthesisError::AssignmentMissing))
    }

    fn assert_equal(&mut self, _label: &str, a: &FpVar<Fr>, b: &FpVar<Fr>) -> Result<(), SynthesisError> {
        a.enforce_equal(b)
    }

    fn assert_boolean(&mut self, _label: &str, bit: &FpVar<Fr>) -> Result<(), SynthesisError> {
        // bit * (bit - 1) == 0
        let bit_minus_one = bit - FpVar::one();
        bit.mul_equals(&bit_minus_one, &FpVar::zero())
    }

    fn select(
        &mut self,
        bit: &FpVar<Fr>,
        when_set: &FpVar<Fr>,
        when_clear: &FpVar<Fr>,
    ) -> Result<FpVar<Fr>, SynthesisError> {
        let delta = when_set - when_clear;
        Ok(when_clear + bit * &delta)
    }

    fn hash(&mut self, inputs: &[FpVar<Fr>]) -> Result<FpVar<Fr>, SynthesisError> {
        self.poseidon.hash(inputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_relations::r1cs::ConstraintSystem;

    #[test]
    fn test_boolean_constraint() {
        for (value, ok) in [(0u64, true), (1, true), (2, false)] {
            let cs = ConstraintSystem::<Fr>::new_ref();
            let mut api = R1csApi::new(cs.clone());

            let bit = api.witness("bit", Some(Fr::from(value))).unwrap();
            api.assert_boolean("bit", &bit).unwrap();

            assert_eq!(cs.is_satisfied().unwrap(), ok, "value {value}");
        }
    }

    #[test]
    fn test_select_matches_native() {
        let cs = ConstraintSystem::<Fr>::new_ref();
        let mut api = R1csApi::new(cs.clone());

        let a = api.witness("a", Some(Fr::from(7u64))).unwrap();
        let b = api.witness("b", Some(Fr::from(9u64))).unwrap();
        let one = api.witness("one", Some(Fr::from(1u64))).unwrap();
        let zero = api.witness("zero", Some(Fr::from(0u64))).unwrap();

        assert_eq!(api.select(&one, &a, &b).unwrap().value().unwrap(), Fr::from(7u64));
        assert_eq!(api.select(&zero, &a, &b).unwrap().value().unwrap(), Fr::from(9u64));
        assert!(cs.is_satisfied().unwrap());
    }

    #[test]
    fn test_assert_equal_unsatisfied() {
        let cs = ConstraintSystem::<Fr>::new_ref();
        let mut api = R1csApi::new(cs.clone());

        let a = api.witness("a", Some(Fr::from(1u64))).unwrap();
        let b = api.public_input("b", Some(Fr::from(2u64))).unwrap();
        api.assert_equal("a == b", &a, &b).unwrap();

        assert!(!cs.is_satisfied().unwrap());
    }
}
