//! Merkle Tree for UTXO Commitments
//!
//! Client-side tree holding every leaf, used to build inclusion paths for the
//! prover. Its root matches the on-chain [`IncrementalMerkleTree`] for the
//! same leaf sequence.
//!
//! ```text
//!                    Root
//!                   /    \
//!                 H01    H23
//!                /  \   /   \
//!               C0  C1 C2   Z0      Z0 = zero leaf (32 zero bytes)
//!                                   Z(i+1) = H(Zi, Zi)
//! ```
//!
//! [`IncrementalMerkleTree`]: crate::incremental::IncrementalMerkleTree

use std::collections::HashMap;
use std::sync::LazyLock;

use ark_bn254::Fr;
use ark_ff::Zero;
use serde::{Deserialize, Serialize};

use crate::error::{MerkleTreeError, MerkleTreeErrorCode};
use crate::field::{fr_from_bytes, fr_to_bytes, poseidon_hash};

/// Largest supported tree height (2^32 leaves)
pub const MAX_TREE_HEIGHT: usize = 32;

static ZEROS: LazyLock<Vec<[u8; 32]>> = LazyLock::new(|| {
    let mut zeros = Vec::with_capacity(MAX_TREE_HEIGHT + 1);
    let mut current = Fr::zero();
    zeros.push(fr_to_bytes(&current));
    for _ in 0..MAX_TREE_HEIGHT {
        current = poseidon_hash(&[current, current]);
        zeros.push(fr_to_bytes(&current));
    }
    zeros
});

/// A Merkle path proving inclusion of a leaf
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerklePath {
    /// Sibling hashes from leaf to root
    pub siblings: Vec<[u8; 32]>,
    /// Position bits (false = left, true = right)
    pub path_bits: Vec<bool>,
    /// The leaf position
    pub position: u64,
}

impl MerklePath {
    /// Verify that this path proves inclusion of `leaf` in `root`
    pub fn verify(&self, leaf: &[u8; 32], root: &[u8; 32]) -> bool {
        MerkleHasher
            .compute_root_from_path(leaf, &self.siblings, &self.path_bits)
            .map(|computed| &computed == root)
            .unwrap_or(false)
    }

    /// Sibling hashes as circuit inputs
    pub fn to_field_elements(&self) -> Result<Vec<Fr>, MerkleTreeError> {
        self.siblings
            .iter()
            .map(|s| {
                fr_from_bytes(s).ok_or_else(|| {
                    MerkleTreeError::new(
                        MerkleTreeErrorCode::FieldOverflow,
                        "MerklePath::to_field_elements",
                        "sibling exceeds field modulus",
                    )
                })
            })
            .collect()
    }

    /// Leaf position as a circuit input
    pub fn position_field(&self) -> Fr {
        Fr::from(self.position)
    }
}

/// Poseidon two-to-one hash over field-encoded nodes
#[derive(Debug, Clone, Copy, Default)]
pub struct MerkleHasher;

impl MerkleHasher {
    /// Hash two children to get the parent, rejecting non-canonical operands
    pub fn hash_pair(&self, left: &[u8; 32], right: &[u8; 32]) -> Result<[u8; 32], MerkleTreeError> {
        let overflow = || {
            MerkleTreeError::new(
                MerkleTreeErrorCode::FieldOverflow,
                "MerkleHasher::hash_pair",
                "operand exceeds field modulus",
            )
        };
        let left = fr_from_bytes(left).ok_or_else(overflow)?;
        let right = fr_from_bytes(right).ok_or_else(overflow)?;
        Ok(fr_to_bytes(&poseidon_hash(&[left, right])))
    }

    /// Root of an empty subtree of the given height
    pub fn zero(&self, level: usize) -> [u8; 32] {
        ZEROS[level.min(MAX_TREE_HEIGHT)]
    }

    pub fn compute_root_from_path(
        &self,
        leaf: &[u8; 32],
        siblings: &[[u8; 32]],
        path_bits: &[bool],
    ) -> Result<[u8; 32], MerkleTreeError> {
        let mut current = *leaf;
        for (sibling, is_right) in siblings.iter().zip(path_bits.iter()) {
            current = if *is_right {
                self.hash_pair(sibling, &current)?
            } else {
                self.hash_pair(&current, sibling)?
            };
        }
        Ok(current)
    }
}

pub(crate) fn check_height(height: usize, origin: &'static str) -> Result<(), MerkleTreeError> {
    if height == 0 || height > MAX_TREE_HEIGHT {
        return Err(MerkleTreeError::new(
            MerkleTreeErrorCode::InvalidHeight,
            origin,
            format!("height {height} not in 1..={MAX_TREE_HEIGHT}"),
        ));
    }
    Ok(())
}

/// Sparse Merkle tree over all known leaves
///
/// Only non-empty nodes are stored.
#[derive(Debug, Clone)]
pub struct MerkleTree {
    height: usize,
    /// Non-empty nodes: (level, index) -> hash
    nodes: HashMap<(usize, u64), [u8; 32]>,
    leaves: Vec<[u8; 32]>,
    root: [u8; 32],
}

impl MerkleTree {
    pub fn new(height: usize) -> Result<Self, MerkleTreeError> {
        check_height(height, "MerkleTree::new")?;
        Ok(Self {
            height,
            nodes: HashMap::new(),
            leaves: Vec::new(),
            root: MerkleHasher.zero(height),
        })
    }

    /// Rebuild from the ordered leaf sequence read from the ledger
    pub fn from_leaves(height: usize, leaves: &[[u8; 32]]) -> Result<Self, MerkleTreeError> {
        let mut tree = Self::new(height)?;
        for leaf in leaves {
            tree.insert(*leaf)?;
        }
        Ok(tree)
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn root(&self) -> [u8; 32] {
        self.root
    }

    pub fn len(&self) -> u64 {
        self.leaves.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    pub fn leaves(&self) -> &[[u8; 32]] {
        &self.leaves
    }

    /// Append a leaf and return its position
    pub fn insert(&mut self, leaf: [u8; 32]) -> Result<u64, MerkleTreeError> {
        let position = self.len();
        if position >= 1u64 << self.height {
            return Err(MerkleTreeError::new(
                MerkleTreeErrorCode::TreeFull,
                "MerkleTree::insert",
                format!("tree of height {} holds {position} leaves", self.height),
            ));
        }

        // collect node updates first so a failed hash leaves the tree untouched
        let mut updates = Vec::with_capacity(self.height + 1);
        updates.push(((0, position), leaf));

        let mut current_index = position;
        let mut current_hash = leaf;
        for level in 0..self.height {
            let is_right = current_index & 1 == 1;
            let sibling = self.node(level, current_index ^ 1);
            current_hash = if is_right {
                MerkleHasher.hash_pair(&sibling, &current_hash)?
            } else {
                MerkleHasher.hash_pair(&current_hash, &sibling)?
            };
            current_index /= 2;
            updates.push(((level + 1, current_index), current_hash));
        }

        self.nodes.extend(updates);
        self.leaves.push(leaf);
        self.root = current_hash;
        Ok(position)
    }

    /// Merkle path for a position
    pub fn path(&self, position: u64) -> Option<MerklePath> {
        if position >= self.len() {
            return None;
        }

        let mut siblings = Vec::with_capacity(self.height);
        let mut path_bits = Vec::with_capacity(self.height);
        let mut current_index = position;

        for level in 0..self.height {
            path_bits.push(current_index & 1 == 1);
            siblings.push(self.node(level, current_index ^ 1));
            current_index /= 2;
        }

        Some(MerklePath {
            siblings,
            path_bits,
            position,
        })
    }

    /// Position of the first occurrence of `leaf`
    pub fn index_of(&self, leaf: &[u8; 32]) -> Option<u64> {
        self.leaves.iter().position(|l| l == leaf).map(|i| i as u64)
    }

    fn node(&self, level: usize, index: u64) -> [u8; 32] {
        self.nodes
            .get(&(level, index))
            .copied()
            .unwrap_or_else(|| MerkleHasher.zero(level))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(n: u64) -> [u8; 32] {
        fr_to_bytes(&Fr::from(n))
    }

    #[test]
    fn test_empty_tree() {
        let tree = MerkleTree::new(4).unwrap();
        assert_eq!(tree.len(), 0);
        assert_eq!(tree.root(), MerkleHasher.zero(4));
        assert_eq!(MerkleHasher.zero(0), [0u8; 32]);
    }

    #[test]
    fn test_insert_and_path() {
        let mut tree = MerkleTree::new(4).unwrap();
        assert_eq!(tree.insert(leaf(1)).unwrap(), 0);
        assert_eq!(tree.insert(leaf(2)).unwrap(), 1);

        let path = tree.path(0).unwrap();
        assert!(path.verify(&leaf(1), &tree.root()));
        assert!(!path.verify(&leaf(99), &tree.root()));
        assert!(tree.path(1).unwrap().verify(&leaf(2), &tree.root()));
        assert!(tree.path(2).is_none());
        assert_eq!(tree.index_of(&leaf(2)), Some(1));
    }

    #[test]
    fn test_full_tree() {
        let mut tree = MerkleTree::new(1).unwrap();
        tree.insert(leaf(1)).unwrap();
        tree.insert(leaf(2)).unwrap();
        let err = tree.insert(leaf(3)).unwrap_err();
        assert_eq!(err.kind, MerkleTreeErrorCode::TreeFull);
        assert_eq!(tree.len(), 2);
    }

    #[test]
    fn test_overflowing_leaf_leaves_tree_intact() {
        let mut tree = MerkleTree::new(3).unwrap();
        tree.insert(leaf(1)).unwrap();
        let root = tree.root();

        let err = tree.insert([0xff; 32]).unwrap_err();
        assert_eq!(err.kind, MerkleTreeErrorCode::FieldOverflow);
        assert_eq!(tree.root(), root);
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn test_invalid_height() {
        assert_eq!(
            MerkleTree::new(0).unwrap_err().kind,
            MerkleTreeErrorCode::InvalidHeight
        );
        assert_eq!(
            MerkleTree::new(33).unwrap_err().kind,
            MerkleTreeErrorCode::InvalidHeight
        );
    }
}
