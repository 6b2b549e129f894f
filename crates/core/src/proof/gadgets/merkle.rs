//! Constrained Merkle root recomputation
//!
//! The constrained twin of `crypto::merkle::root_from_path`, written against
//! `ConstraintApi` so the same loop runs as plain arithmetic and as R1CS.

use ark_relations::r1cs::SynthesisError;

use crate::proof::constraints::ConstraintApi;

/// Recompute the root from `leaf`, constraining every direction to be boolean
///
/// A direction of 0 keeps the running node on the left, 1 moves it to the right.
/// Siblings and directions are zipped level by level; their lengths are fixed by
/// the circuit shape.
pub fn constrained_root_from_path<A: ConstraintApi>(
    api: &mut A,
    leaf: &A::Var,
    siblings: &[A::Var],
    directions: &[A::Var],
) -> Result<A::Var, SynthesisError> {
    if siblings.len() != directions.len() {
        return Err(SynthesisError::Unsatisfiable);
    }

    let mut node = leaf.clone();

    for (level, (sibling, bit)) in siblings.iter().zip(directions.iter()).enumerate() {
        api.assert_boolean(&format!("direction[{}] is boolean", level), bit)?;

        let left = api.select(bit, sibling, &node)?;
        let right = api.select(bit, &node, sibling)?;

        node = api.hash(&[left, right])?;
    }

    Ok(node)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::merkle::{root_from_path, Direction};
    use crate::proof::constraints::NativeApi;
    use crate::proof::gadgets::R1csApi;
    use ark_bn254::Fr;
    use ark_r1cs_std::R1CSVar;
    use ark_relations::r1cs::ConstraintSystem;

    fn siblings() -> Vec<Fr> {
        vec![Fr::from(789u64), Fr::from(101112u64), Fr::from(131415u64)]
    }

    fn r1cs_root(leaf: Fr, siblings: &[Fr], bits: &[Fr]) -> (Fr, bool) {
        let cs = ConstraintSystem::<Fr>::new_ref();
        let mut api = R1csApi::new(cs.clone());

        let leaf = api.witness("leaf", Some(leaf)).unwrap();
        let siblings: Vec<_> = siblings.iter().map(|s| api.witness("sibling", Some(*s)).unwrap()).collect();
        let bits: Vec<_> = bits.iter().map(|b| api.witness("direction", Some(*b)).unwrap()).collect();

        let root = constrained_root_from_path(&mut api, &leaf, &siblings, &bits).unwrap();
        (root.value().unwrap(), cs.is_satisfied().unwrap())
    }

    #[test]
    fn test_all_backends_agree() {
        let leaf = Fr::from(42u64);
        let directions = [Direction::Right, Direction::Left, Direction::Right];
        let bits: Vec<Fr> = directions.iter().map(|d| d.as_field()).collect();

        let plain = root_from_path(&leaf, &siblings(), &directions);

        let mut native = NativeApi::new();
        let evaluated = constrained_root_from_path(&mut native, &leaf, &siblings(), &bits).unwrap();
        assert!(native.is_satisfied());
        assert_eq!(evaluated, plain);

        let (constrained, satisfied) = r1cs_root(leaf, &siblings(), &bits);
        assert!(satisfied);
        assert_eq!(constrained, plain);
    }

    #[test]
    fn test_non_boolean_direction_rejected() {
        let leaf = Fr::from(42u64);
        let bits = [Fr::from(0u64), Fr::from(2u64), Fr::from(1u64)];

        let mut native = NativeApi::new();
        constrained_root_from_path(&mut native, &leaf, &siblings(), &bits).unwrap();
        assert_eq!(native.violations(), ["direction[1] is boolean".to_string()]);

        let (_, satisfied) = r1cs_root(leaf, &siblings(), &bits);
        assert!(!satisfied);
    }

    #[test]
    fn test_length_mismatch_is_error() {
        let mut native = NativeApi::new();
        let result = constrained_root_from_path(&mut native, &Fr::from(1u64), &siblings(), &[Fr::from(0u64)]);
        assert!(result.is_err());
    }
}
