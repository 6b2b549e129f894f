//! Merkle inclusion paths and plain root recomputation
//!
//! A path is a fixed-depth list of siblings, leaf level first, plus one direction
//! per level. `Direction::Left` means the running node is the left operand:
//!
//! node = Poseidon(node, sibling)      if Left
//! node = Poseidon(sibling, node)      if Right
//!
//! The constrained version of this loop lives in `proof::gadgets::merkle` and must
//! agree with `root_from_path` for every input. The tree itself (storage, insertion,
//! known-root history) belongs to the host.

use ark_bn254::Fr;
use serde::{Deserialize, Serialize};

use super::poseidon::poseidon_hash;
use crate::error::CryptoError;

/// Largest depth accepted anywhere in the crate
pub const MAX_TREE_DEPTH: usize = 32;

/// Position of the running node when hashed with its sibling
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Direction {
    Left,
    Right,
}

impl Direction {
    /// 0 for Left, 1 for Right
    pub fn bit(self) -> u8 {
        match self {
            Direction::Left => 0,
            Direction::Right => 1,
        }
    }

    pub fn as_field(self) -> Fr {
        Fr::from(self.bit() as u64)
    }

    pub fn flipped(self) -> Self {
        match self {
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
        }
    }
}

impl TryFrom<u8> for Direction {
    type Error = CryptoError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Direction::Left),
            1 => Ok(Direction::Right),
            other => Err(CryptoError::InvalidDirection { level: None, value: other as u64 }),
        }
    }
}

impl From<Direction> for u8 {
    fn from(direction: Direction) -> Self {
        direction.bit()
    }
}

/// Sibling path from a leaf to the root
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MerklePath {
    siblings: Vec<Fr>,
    directions: Vec<Direction>,
}

impl MerklePath {
    /// Build a path, requiring exactly `depth` siblings and directions
    pub fn new(siblings: Vec<Fr>, directions: Vec<Direction>, depth: usize) -> Result<Self, CryptoError> {
        if siblings.len() != depth {
            return Err(CryptoError::PathLengthMismatch {
                what: "siblings",
                expected: depth,
                got: siblings.len(),
            });
        }
        if directions.len() != depth {
            return Err(CryptoError::PathLengthMismatch {
                what: "directions",
                expected: depth,
                got: directions.len(),
            });
        }
        Ok(Self { siblings, directions })
    }

    /// Build a path from raw 0/1 direction values, validating each
    pub fn from_raw(siblings: Vec<Fr>, raw_directions: &[u64], depth: usize) -> Result<Self, CryptoError> {
        let directions = validate_directions(raw_directions)?;
        Self::new(siblings, directions, depth)
    }

    pub fn depth(&self) -> usize {
        self.siblings.len()
    }

    pub fn siblings(&self) -> &[Fr] {
        &self.siblings
    }

    pub fn directions(&self) -> &[Direction] {
        &self.directions
    }

    /// Mutable access for callers that need to tamper with a path in tests
    pub fn siblings_mut(&mut self) -> &mut [Fr] {
        &mut self.siblings
    }

    pub fn directions_mut(&mut self) -> &mut [Direction] {
        &mut self.directions
    }

    /// Recompute the root this path leads to from `leaf`
    pub fn root(&self, leaf: &Fr) -> Fr {
        root_from_path(leaf, &self.siblings, &self.directions)
    }

    /// Check the path leads from `leaf` to `expected_root`
    pub fn verify(&self, leaf: &Fr, expected_root: &Fr) -> bool {
        self.root(leaf) == *expected_root
    }
}

/// Convert raw direction values to `Direction`, rejecting anything but 0 or 1
pub fn validate_directions(raw: &[u64]) -> Result<Vec<Direction>, CryptoError> {
    raw.iter()
        .enumerate()
        .map(|(level, &value)| match value {
            0 => Ok(Direction::Left),
            1 => Ok(Direction::Right),
            other => Err(CryptoError::InvalidDirection { level: Some(level), value: other }),
        })
        .collect()
}

/// Recompute a root from a leaf, its siblings and directions
///
/// `siblings` and `directions` are zipped level by level; callers enforce the
/// depth through `MerklePath::new`.
pub fn root_from_path(leaf: &Fr, siblings: &[Fr], directions: &[Direction]) -> Fr {
    let mut node = *leaf;

    for (sibling, direction) in siblings.iter().zip(directions.iter()) {
        node = match direction {
            Direction::Left => poseidon_hash(&[node, *sibling]),
            Direction::Right => poseidon_hash(&[*sibling, node]),
        };
    }

    node
}

/// Recompute a root from raw direction values
///
/// Unlike the circuit there is no boolean constraint to fall back on, so every
/// direction is validated before any hashing happens.
pub fn root_from_raw_path(leaf: &Fr, siblings: &[Fr], raw_directions: &[u64]) -> Result<Fr, CryptoError> {
    if siblings.len() != raw_directions.len() {
        return Err(CryptoError::PathLengthMismatch {
            what: "directions",
            expected: siblings.len(),
            got: raw_directions.len(),
        });
    }
    let directions = validate_directions(raw_directions)?;
    Ok(root_from_path(leaf, siblings, &directions))
}
