//! Poseidon Hash Function
//!
//! A zkSNARK-friendly hash function using the Poseidon permutation over the BN254
//! scalar field (https://eprint.iacr.org/2019/458).
//!
//! Inputs of any length are absorbed by a sponge with rate 2. The capacity lane
//! starts at the input length, so sequences that differ only by trailing zeros hash
//! differently. The circuit gadget in `proof::gadgets::poseidon` mirrors this
//! construction step for step.

use ark_bn254::Fr;
use ark_ff::Field;

use super::poseidon_constants::{constants, PoseidonConstants, FULL_ROUNDS, PARTIAL_ROUNDS, RATE, WIDTH};

/// Poseidon hasher over the shared parameter set
pub struct Poseidon {
    params: &'static PoseidonConstants,
}

impl Default for Poseidon {
    fn default() -> Self {
        Self::new()
    }
}

impl Poseidon {
    pub fn new() -> Self {
        Self { params: constants() }
    }

    /// Hash an ordered sequence of field elements
    pub fn hash(&self, inputs: &[Fr]) -> Fr {
        let mut state = [Fr::from(inputs.len() as u64), Fr::from(0u64), Fr::from(0u64)];

        if inputs.is_empty() {
            self.permute(&mut state);
            return state[0];
        }

        for chunk in inputs.chunks(RATE) {
            for (i, input) in chunk.iter().enumerate() {
                state[i + 1] += input;
            }
            self.permute(&mut state);
        }

        state[0]
    }

    /// Apply the Poseidon permutation to the state
    fn permute(&self, state: &mut [Fr; WIDTH]) {
        let half_full = FULL_ROUNDS / 2;

        for round in 0..FULL_ROUNDS + PARTIAL_ROUNDS {
            let full = round < half_full || round >= half_full + PARTIAL_ROUNDS;

            for (elem, c) in state.iter_mut().zip(self.params.round_constants[round].iter()) {
                *elem += c;
            }

            if full {
                for elem in state.iter_mut() {
                    *elem = sbox(*elem);
                }
            } else {
                state[0] = sbox(state[0]);
            }

            self.mds_multiply(state);
        }
    }

    fn mds_multiply(&self, state: &mut [Fr; WIDTH]) {
        let mut mixed = [Fr::from(0u64); WIDTH];

        for (i, out) in mixed.iter_mut().enumerate() {
            for (j, elem) in state.iter().enumerate() {
                *out += self.params.mds[i][j] * elem;
            }
        }

        *state = mixed;
    }
}

/// S-box function: x^5
#[inline]
fn sbox(x: Fr) -> Fr {
    let x2 = x.square();
    let x4 = x2.square();
    x4 * x
}

// ============================================================================
// Public API
// ============================================================================

/// Hash field elements using Poseidon
pub fn poseidon_hash(inputs: &[Fr]) -> Fr {
    Poseidon::new().hash(inputs)
}

/// Hash two field elements using Poseidon
pub fn poseidon_hash2(a: &Fr, b: &Fr) -> Fr {
    poseidon_hash(&[*a, *b])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poseidon_hash_deterministic() {
        let a = Fr::from(1u64);
        let b = Fr::from(2u64);

        assert_eq!(poseidon_hash2(&a, &b), poseidon_hash2(&a, &b));
    }

    #[test]
    fn test_poseidon_order_matters() {
        let a = Fr::from(1u64);
        let b = Fr::from(2u64);

        assert_ne!(poseidon_hash2(&a, &b), poseidon_hash2(&b, &a));
    }

    #[test]
    fn test_poseidon_different_inputs() {
        let a = Fr::from(1u64);
        let b = Fr::from(2u64);
        let c = Fr::from(3u64);

        assert_ne!(poseidon_hash2(&a, &b), poseidon_hash2(&a, &c));
    }

    #[test]
    fn test_length_is_bound() {
        let one = Fr::from(1u64);
        let zero = Fr::from(0u64);

        assert_ne!(poseidon_hash(&[one]), poseidon_hash(&[one, zero]));
        assert_ne!(poseidon_hash(&[one, one, one]), poseidon_hash(&[one, one, one, zero]));
        assert_ne!(poseidon_hash(&[]), poseidon_hash(&[zero]));
    }

    #[test]
    fn test_four_inputs_use_two_chunks() {
        let inputs = [Fr::from(123u64), Fr::from(456u64), Fr::from(1u64), Fr::from(1000u64)];

        // Changing an element of the second chunk must change the digest
        let mut tweaked = inputs;
        tweaked[3] += Fr::from(1u64);

        assert_ne!(poseidon_hash(&inputs), poseidon_hash(&tweaked));
    }

    #[test]
    fn test_sbox() {
        assert_eq!(sbox(Fr::from(2u64)), Fr::from(32u64));
    }

    #[test]
    fn test_empty_input_nonzero() {
        assert_ne!(poseidon_hash(&[]), Fr::from(0u64));
    }
}
