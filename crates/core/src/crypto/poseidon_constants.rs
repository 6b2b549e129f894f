//! Poseidon parameters for the BN254 scalar field
//!
//! Round constants come from a blake3-based counter-mode generator under a fixed
//! domain tag; the MDS matrix is a Cauchy matrix. Both are derived once per process
//! and shared read-only by the plain hasher and the circuit gadget, which is what
//! keeps the two computations bit-for-bit identical.
//!
//! Parameters:
//! - Field: BN254 scalar field (Fr)
//! - Width: t = 3 (rate 2, capacity 1)
//! - Full rounds: RF = 8 (4 at start, 4 at end)
//! - Partial rounds: RP = 57
//! - S-box: x^5

use ark_bn254::Fr;
use ark_ff::{Field, PrimeField};
use once_cell::sync::Lazy;

/// Number of full rounds (RF = 8)
pub const FULL_ROUNDS: usize = 8;

/// Number of partial rounds (RP = 57)
pub const PARTIAL_ROUNDS: usize = 57;

/// State width (t = 3)
pub const WIDTH: usize = 3;

/// Elements absorbed per permutation
pub const RATE: usize = WIDTH - 1;

/// Total number of rounds
pub const NUM_ROUNDS: usize = FULL_ROUNDS + PARTIAL_ROUNDS;

/// Domain tag fed to the constant generator
const CONSTANTS_DOMAIN: &[u8] = b"MASP_Poseidon_BN254_t3_RF8_RP57";

/// Round constants and MDS matrix for one parameter set
#[derive(Debug)]
pub struct PoseidonConstants {
    /// One row of WIDTH constants per round
    pub round_constants: Vec<[Fr; WIDTH]>,
    /// MDS mixing matrix
    pub mds: [[Fr; WIDTH]; WIDTH],
}

static CONSTANTS: Lazy<PoseidonConstants> = Lazy::new(|| PoseidonConstants {
    round_constants: generate_round_constants(),
    mds: generate_mds_matrix(),
});

/// Process-wide Poseidon constants
pub fn constants() -> &'static PoseidonConstants {
    &CONSTANTS
}

fn generate_round_constants() -> Vec<[Fr; WIDTH]> {
    (0..NUM_ROUNDS)
        .map(|round| {
            let mut row = [Fr::from(0u64); WIDTH];
            for (lane, slot) in row.iter_mut().enumerate() {
                let mut hasher = blake3::Hasher::new();
                hasher.update(CONSTANTS_DOMAIN);
                hasher.update(&(round as u64).to_le_bytes());
                hasher.update(&(lane as u64).to_le_bytes());
                *slot = Fr::from_le_bytes_mod_order(hasher.finalize().as_bytes());
            }
            row
        })
        .collect()
}

/// M[i][j] = 1 / (x_i + y_j) with x = [0, t), y = [t, 2t)
fn generate_mds_matrix() -> [[Fr; WIDTH]; WIDTH] {
    let mut matrix = [[Fr::from(0u64); WIDTH]; WIDTH];

    for (i, row) in matrix.iter_mut().enumerate() {
        for (j, cell) in row.iter_mut().enumerate() {
            let sum = Fr::from(i as u64) + Fr::from((WIDTH + j) as u64);
            // x_i + y_j ranges over [t, 3t) and is never zero
            *cell = sum.inverse().unwrap_or(Fr::from(1u64));
        }
    }

    matrix
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constants_shape() {
        let c = constants();
        assert_eq!(c.round_constants.len(), NUM_ROUNDS);
        assert_eq!(c.mds.len(), WIDTH);
    }

    #[test]
    fn test_round_constants_nonzero_and_distinct() {
        let c = constants();
        let flat: Vec<Fr> = c.round_constants.iter().flatten().copied().collect();

        assert!(flat.iter().all(|x| *x != Fr::from(0u64)));

        let unique: std::collections::HashSet<Fr> = flat.iter().copied().collect();
        assert_eq!(unique.len(), flat.len());
    }

    #[test]
    fn test_generation_deterministic() {
        assert_eq!(generate_round_constants(), constants().round_constants);
        assert_eq!(generate_mds_matrix(), constants().mds);
    }

    #[test]
    fn test_mds_is_cauchy() {
        let m = constants().mds;
        // M[0][0] = 1/3
        assert_eq!(m[0][0] * Fr::from(3u64), Fr::from(1u64));
        // M[2][1] = 1/(2 + 4)
        assert_eq!(m[2][1] * Fr::from(6u64), Fr::from(1u64));
    }
}
