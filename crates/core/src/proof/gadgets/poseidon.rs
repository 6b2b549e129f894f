//! Poseidon Hash Gadget for R1CS circuits
//!
//! Implements the Poseidon sponge as constraints for use in zkSNARK circuits.
//! This gadget is compatible with the native Poseidon implementation in crypto::poseidon:
//! same constants, same capacity initialisation, same absorption order.

use ark_bn254::Fr;
use ark_r1cs_std::{fields::fp::FpVar, prelude::*};
use ark_relations::r1cs::SynthesisError;

use crate::crypto::poseidon_constants::{constants, FULL_ROUNDS, PARTIAL_ROUNDS, RATE, WIDTH};

/// Poseidon hash gadget for circuits
pub struct PoseidonGadget {
    /// Round constants as constant variables, one row per round
    round_constants: Vec<Vec<FpVar<Fr>>>,
    /// MDS matrix as constant variables
    mds_matrix: Vec<Vec<FpVar<Fr>>>,
}

impl Default for PoseidonGadget {
    fn default() -> Self {
        Self::new()
    }
}

impl PoseidonGadget {
    /// Create a new Poseidon gadget with the shared constants
    pub fn new() -> Self {
        let params = constants();

        let round_constants = params
            .round_constants
            .iter()
            .map(|row| row.iter().map(|c| FpVar::constant(*c)).collect())
            .collect();

        let mds_matrix = params
            .mds
            .iter()
            .map(|row| row.iter().map(|c| FpVar::constant(*c)).collect())
            .collect();

        Self {
            round_constants,
            mds_matrix,
        }
    }

    /// Hash an ordered sequence of variables
    pub fn hash(&self, inputs: &[FpVar<Fr>]) -> Result<FpVar<Fr>, SynthesisError> {
        let mut state = vec![
            FpVar::constant(Fr::from(inputs.len() as u64)),
            FpVar::zero(),
            FpVar::zero(),
        ];

        if inputs.is_empty() {
            self.permute(&mut state)?;
            return Ok(state[0].clone());
        }

        // Absorb phase
        for chunk in inputs.chunks(RATE) {
            for (i, input) in chunk.iter().enumerate() {
                state[i + 1] = &state[i + 1] + input;
            }
            self.permute(&mut state)?;
        }

        Ok(state[0].clone())
    }

    /// Apply the Poseidon permutation to the state
    fn permute(&self, state: &mut [FpVar<Fr>]) -> Result<(), SynthesisError> {
        let half_full = FULL_ROUNDS / 2;

        for round in 0..FULL_ROUNDS + PARTIAL_ROUNDS {
            for (elem, c) in state.iter_mut().zip(self.round_constants[round].iter()) {
                *elem = &*elem + c;
            }

            if round < half_full || round >= half_full + PARTIAL_ROUNDS {
                for elem in state.iter_mut() {
                    *elem = sbox(elem)?;
                }
            } else {
                state[0] = sbox(&state[0])?;
            }

            self.mds_multiply(state);
        }

        Ok(())
    }

    /// Multiply state by MDS matrix
    fn mds_multiply(&self, state: &mut [FpVar<Fr>]) {
        let mixed: Vec<FpVar<Fr>> = self
            .mds_matrix
            .iter()
            .map(|row| {
                row.iter()
                    .zip(state.iter())
                    .fold(FpVar::zero(), |acc, (m, s)| acc + m * s)
            })
            .collect();

        for (elem, value) in state.iter_mut().zip(mixed) {
            *elem = value;
        }
    }
}

/// S-box function: x^5
fn sbox(x: &FpVar<Fr>) -> Result<FpVar<Fr>, SynthesisError> {
    let x2 = x.square()?;
    let x4 = x2.square()?;
    Ok(&x4 * x)
}

/// Standalone function to hash a sequence of variables
pub fn poseidon_hash_gadget(inputs: &[FpVar<Fr>]) -> Result<FpVar<Fr>, SynthesisError> {
    PoseidonGadget::new().hash(inputs)
}
