//! EVM verifier export
//!
//! Converts Groth16 verification keys and proofs into the coordinate layout used by
//! the BN254 precompiles (ecAdd 0x06, ecMul 0x07, ecPairing 0x08), and renders a
//! standalone Solidity verifier.
//!
//! G2 coordinates are written imaginary part first: `[x.c1, x.c0], [y.c1, y.c0]`.

use ark_bn254::{Bn254, Fq, Fq2, Fr, G1Affine, G2Affine};
use ark_ec::AffineRepr;
use ark_ff::PrimeField;
use ark_groth16::VerifyingKey;
use serde::{Deserialize, Serialize};
use std::fmt::Write;

use super::ProofArtifact;
use crate::crypto::field::to_decimal;
use crate::error::ProofError;

pub type EvmG1 = [String; 2];
pub type EvmG2 = [[String; 2]; 2];

fn fq_to_decimal(value: &Fq) -> String {
    value.into_bigint().to_string()
}

/// The point at infinity is encoded as (0, 0), as the precompiles expect
fn g1(point: &G1Affine) -> EvmG1 {
    match point.xy() {
        Some((x, y)) => [fq_to_decimal(x), fq_to_decimal(y)],
        None => ["0".to_string(), "0".to_string()],
    }
}

fn fq2(value: &Fq2) -> [String; 2] {
    [fq_to_decimal(&value.c1), fq_to_decimal(&value.c0)]
}

fn g2(point: &G2Affine) -> EvmG2 {
    match point.xy() {
        Some((x, y)) => [fq2(x), fq2(y)],
        None => [["0".to_string(), "0".to_string()], ["0".to_string(), "0".to_string()]],
    }
}

/// Verification key in EVM precompile order, decimal strings
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvmVerifyingKey {
    pub alpha_g1: EvmG1,
    pub beta_g2: EvmG2,
    pub gamma_g2: EvmG2,
    pub delta_g2: EvmG2,
    /// One point per public input, plus the constant term first
    pub ic: Vec<EvmG1>,
}

impl EvmVerifyingKey {
    pub fn from_vk(vk: &VerifyingKey<Bn254>) -> Self {
        Self {
            alpha_g1: g1(&vk.alpha_g1),
            beta_g2: g2(&vk.beta_g2),
            gamma_g2: g2(&vk.gamma_g2),
            delta_g2: g2(&vk.delta_g2),
            ic: vk.gamma_abc_g1.iter().map(g1).collect(),
        }
    }

    pub fn public_input_count(&self) -> usize {
        self.ic.len().saturating_sub(1)
    }

    /// Render a Solidity Groth16 verifier contract
    pub fn to_solidity(&self, contract_name: &str) -> Result<String, ProofError> {
        if contract_name.is_empty()
            || !contract_name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
            || contract_name.starts_with(|c: char| c.is_ascii_digit())
        {
            return Err(ProofError::SerializationError(format!(
                "'{}' is not a valid contract name",
                contract_name
            )));
        }

        let mut vk_body = String::new();
        let fmt_err = |e: std::fmt::Error| ProofError::SerializationError(e.to_string());

        writeln!(vk_body, "        vk.alpha = {};", g1_literal(&self.alpha_g1)).map_err(fmt_err)?;
        writeln!(vk_body, "        vk.beta = {};", g2_literal(&self.beta_g2)).map_err(fmt_err)?;
        writeln!(vk_body, "        vk.gamma = {};", g2_literal(&self.gamma_g2)).map_err(fmt_err)?;
        writeln!(vk_body, "        vk.delta = {};", g2_literal(&self.delta_g2)).map_err(fmt_err)?;
        for (i, point) in self.ic.iter().enumerate() {
            writeln!(vk_body, "        vk.ic[{}] = {};", i, g1_literal(point)).map_err(fmt_err)?;
        }

        Ok(SOLIDITY_TEMPLATE
            .replace("__CONTRACT_NAME__", contract_name)
            .replace("__SCALAR_FIELD__", &Fr::MODULUS.to_string())
            .replace("__BASE_FIELD__", &Fq::MODULUS.to_string())
            .replace("__IC_LENGTH__", &self.ic.len().to_string())
            .replace("__INPUT_COUNT__", &self.public_input_count().to_string())
            .replace("__VERIFYING_KEY__", vk_body.trim_end()))
    }
}

fn g1_literal(p: &EvmG1) -> String {
    format!("G1Point({}, {})", p[0], p[1])
}

fn g2_literal(p: &EvmG2) -> String {
    format!("G2Point([{}, {}], [{}, {}])", p[0][0], p[0][1], p[1][0], p[1][1])
}

/// Proof in `verifyProof` calldata order
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvmProof {
    pub a: EvmG1,
    pub b: EvmG2,
    pub c: EvmG1,
}

impl EvmProof {
    pub fn from_artifact(artifact: &ProofArtifact) -> Result<Self, ProofError> {
        let proof = artifact.to_proof()?;
        Ok(Self {
            a: g1(&proof.a),
            b: g2(&proof.b),
            c: g1(&proof.c),
        })
    }

    /// `[a.x, a.y, b.x.c1, b.x.c0, b.y.c1, b.y.c0, c.x, c.y]`
    pub fn to_calldata(&self) -> [String; 8] {
        [
            self.a[0].clone(),
            self.a[1].clone(),
            self.b[0][0].clone(),
            self.b[0][1].clone(),
            self.b[1][0].clone(),
            self.b[1][1].clone(),
            self.c[0].clone(),
            self.c[1].clone(),
        ]
    }
}

/// Public inputs as decimal strings for the `input` calldata argument
pub fn public_inputs_calldata(inputs: &[Fr]) -> Vec<String> {
    inputs.iter().map(to_decimal).collect()
}

const SOLIDITY_TEMPLATE: &str = r#"// SPDX-License-Identifier: MIT
// Generated Groth16 verifier for the shielded pool withdrawal circuit.
pragma solidity ^0.8.20;

contract __CONTRACT_NAME__ {
    uint256 constant SNARK_SCALAR_FIELD = __SCALAR_FIELD__;
    uint256 constant PRIME_Q = __BASE_FIELD__;

    struct G1Point {
        uint256 X;
        uint256 Y;
    }

    // Coordinates are [imaginary, real]
    struct G2Point {
        uint256[2] X;
        uint256[2] Y;
    }

    struct VerifyingKey {
        G1Point alpha;
        G2Point beta;
        G2Point gamma;
        G2Point delta;
        G1Point[__IC_LENGTH__] ic;
    }

    function verifyingKey() internal pure returns (VerifyingKey memory vk) {
__VERIFYING_KEY__
    }

    function negate(G1Point memory p) internal pure returns (G1Point memory) {
        if (p.X == 0 && p.Y == 0) {
            return G1Point(0, 0);
        }
        return G1Point(p.X, PRIME_Q - (p.Y % PRIME_Q));
    }

    function addition(G1Point memory p1, G1Point memory p2) internal view returns (G1Point memory r) {
        uint256[4] memory input = [p1.X, p1.Y, p2.X, p2.Y];
        bool success;
        assembly {
            success := staticcall(sub(gas(), 2000), 0x06, input, 0x80, r, 0x40)
        }
        require(success, "ecAdd failed");
    }

    function scalarMul(G1Point memory p, uint256 s) internal view returns (G1Point memory r) {
        uint256[3] memory input = [p.X, p.Y, s];
        bool success;
        assembly {
            success := staticcall(sub(gas(), 2000), 0x07, input, 0x60, r, 0x40)
        }
        require(success, "ecMul failed");
    }

    function pairing(G1Point[4] memory a, G2Point[4] memory b) internal view returns (bool) {
        uint256[24] memory input;
        for (uint256 i = 0; i < 4; i++) {
            input[i * 6 + 0] = a[i].X;
            input[i * 6 + 1] = a[i].Y;
            input[i * 6 + 2] = b[i].X[0];
            input[i * 6 + 3] = b[i].X[1];
            input[i * 6 + 4] = b[i].Y[0];
            input[i * 6 + 5] = b[i].Y[1];
        }
        uint256[1] memory out;
        bool success;
        assembly {
            success := staticcall(sub(gas(), 2000), 0x08, input, 0x300, out, 0x20)
        }
        require(success, "ecPairing failed");
        return out[0] != 0;
    }

    /// proof = [a.x, a.y, b.x.c1, b.x.c0, b.y.c1, b.y.c0, c.x, c.y]
    function verifyProof(uint256[8] calldata proof, uint256[__INPUT_COUNT__] calldata input) public view returns (bool) {
        VerifyingKey memory vk = verifyingKey();

        G1Point memory vkX = vk.ic[0];
        for (uint256 i = 0; i < input.length; i++) {
            require(input[i] < SNARK_SCALAR_FIELD, "input not in field");
            vkX = addition(vkX, scalarMul(vk.ic[i + 1], input[i]));
        }

        G1Point memory a = G1Point(proof[0], proof[1]);
        G2Point memory b = G2Point([proof[2], proof[3]], [proof[4], proof[5]]);
        G1Point memory c = G1Point(proof[6], proof[7]);

        G1Point[4] memory p1 = [negate(a), vk.alpha, vkX, c];
        G2Point[4] memory p2 = [b, vk.beta, vk.gamma, vk.delta];
        return pairing(p1, p2);
    }
}
"#;
