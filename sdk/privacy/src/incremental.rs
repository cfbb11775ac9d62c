//! Incremental Commitment Tree
//!
//! Append-only tree that keeps only the frontier, the on-chain form of the
//! commitment tree.
//!
//! ```text
//! insert(leaf):
//!   idx = next_index, cur = leaf
//!   for level in 0..height:
//!     idx even: filled_subtrees[level] = cur; cur = H(cur, zeros[level])
//!     idx odd:  cur = H(filled_subtrees[level], cur)
//!     idx /= 2
//!   roots[(current_root_index + 1) % history] = cur
//! ```
//!
//! Account layout:
//!
//! ```text
//! "obscmtre" | height u64 | history u64 | filled_subtrees[height] | roots[history]
//!            | next_index u64 | current_root_index u64
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{MerkleTreeError, MerkleTreeErrorCode};
use crate::field::fr_from_bytes;
use crate::merkle::{MerkleHasher, check_height};

pub const MERKLE_TREE_HEIGHT: usize = 18;
pub const ROOT_HISTORY_SIZE: usize = 256;

const DISCRIMINATOR: &[u8; 8] = b"obscmtre";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncrementalMerkleTree {
    height: usize,
    filled_subtrees: Vec<[u8; 32]>,
    roots: Vec<[u8; 32]>,
    current_root_index: usize,
    next_index: u64,
}

impl IncrementalMerkleTree {
    pub fn new(height: usize, root_history_size: usize) -> Result<Self, MerkleTreeError> {
        check_height(height, "IncrementalMerkleTree::new")?;
        if root_history_size == 0 {
            return Err(MerkleTreeError::new(
                MerkleTreeErrorCode::InvalidRootHistorySize,
                "IncrementalMerkleTree::new",
                "root history must hold at least one root",
            ));
        }

        Ok(Self::empty(height, root_history_size))
    }

    fn empty(height: usize, root_history_size: usize) -> Self {
        let filled_subtrees = (0..height).map(|level| MerkleHasher.zero(level)).collect();
        let mut roots = vec![[0u8; 32]; root_history_size];
        roots[0] = MerkleHasher.zero(height);

        Self {
            height,
            filled_subtrees,
            roots,
            current_root_index: 0,
            next_index: 0,
        }
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn capacity(&self) -> u64 {
        1u64 << self.height
    }

    pub fn next_index(&self) -> u64 {
        self.next_index
    }

    pub fn root(&self) -> [u8; 32] {
        self.roots[self.current_root_index]
    }

    /// Root ring buffer in storage order
    pub fn roots(&self) -> &[[u8; 32]] {
        &self.roots
    }

    /// Append a leaf and return its index
    ///
    /// Root, frontier and index are only updated when every hash succeeds.
    pub fn insert(&mut self, leaf: [u8; 32]) -> Result<u64, MerkleTreeError> {
        let index = self.next_index;
        if index >= self.capacity() {
            return Err(MerkleTreeError::new(
                MerkleTreeErrorCode::TreeFull,
                "IncrementalMerkleTree::insert",
                format!("all {} leaves used", self.capacity()),
            ));
        }

        let mut filled_subtrees = self.filled_subtrees.clone();
        let mut current = leaf;
        let mut current_index = index;
        for (level, filled) in filled_subtrees.iter_mut().enumerate() {
            current = if current_index % 2 == 0 {
                *filled = current;
                MerkleHasher.hash_pair(&current, &MerkleHasher.zero(level))?
            } else {
                MerkleHasher.hash_pair(filled, &current)?
            };
            current_index /= 2;
        }

        self.filled_subtrees = filled_subtrees;
        self.current_root_index = (self.current_root_index + 1) % self.roots.len();
        self.roots[self.current_root_index] = current;
        self.next_index = index + 1;

        log::debug!(
            "inserted leaf {index}, root index {}",
            self.current_root_index
        );
        Ok(index)
    }

    /// Whether `root` is still in the history ring
    pub fn is_known_root(&self, root: &[u8; 32]) -> bool {
        if *root == [0u8; 32] {
            return false;
        }
        let len = self.roots.len();
        (0..len)
            .map(|back| (self.current_root_index + len - back) % len)
            .any(|i| self.roots[i] == *root)
    }

    /// Serialize into the on-chain account layout
    pub fn to_account_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(
            DISCRIMINATOR.len() + 32 + 32 * (self.filled_subtrees.len() + self.roots.len()),
        );
        bytes.extend_from_slice(DISCRIMINATOR);
        bytes.extend_from_slice(&(self.height as u64).to_le_bytes());
        bytes.extend_from_slice(&(self.roots.len() as u64).to_le_bytes());
        for node in self.filled_subtrees.iter().chain(&self.roots) {
            bytes.extend_from_slice(node);
        }
        bytes.extend_from_slice(&self.next_index.to_le_bytes());
        bytes.extend_from_slice(&(self.current_root_index as u64).to_le_bytes());
        bytes
    }

    /// Parse the on-chain account layout
    pub fn from_account_bytes(data: &[u8]) -> Result<Self, MerkleTreeError> {
        const ORIGIN: &str = "IncrementalMerkleTree::from_account_bytes";
        let invalid = |msg: String| {
            MerkleTreeError::new(MerkleTreeErrorCode::InvalidAccountData, ORIGIN, msg)
        };

        let mut reader = AccountReader { data, offset: 0 };
        if reader.take(DISCRIMINATOR.len()).map_err(&invalid)? != DISCRIMINATOR {
            return Err(invalid("bad discriminator".to_string()));
        }
        let height = reader.u64().map_err(&invalid)? as usize;
        let history = reader.u64().map_err(&invalid)? as usize;
        check_height(height, ORIGIN).map_err(|e| invalid(e.message))?;
        if history == 0 {
            return Err(invalid("empty root history".to_string()));
        }
        if history > data.len() / 32 {
            return Err(invalid(format!("history of {history} exceeds account data")));
        }

        let mut nodes = Vec::with_capacity(height + history);
        for _ in 0..height + history {
            let node = reader.node().map_err(&invalid)?;
            if fr_from_bytes(&node).is_none() {
                return Err(invalid("node exceeds field modulus".to_string()));
            }
            nodes.push(node);
        }
        let roots = nodes.split_off(height);
        let next_index = reader.u64().map_err(&invalid)?;
        let current_root_index = reader.u64().map_err(&invalid)? as usize;

        if current_root_index >= history {
            return Err(invalid(format!(
                "root index {current_root_index} outside history of {history}"
            )));
        }
        if next_index > 1u64 << height {
            return Err(invalid(format!("next index {next_index} beyond capacity")));
        }

        Ok(Self {
            height,
            filled_subtrees: nodes,
            roots,
            current_root_index,
            next_index,
        })
    }
}

impl Default for IncrementalMerkleTree {
    fn default() -> Self {
        Self::empty(MERKLE_TREE_HEIGHT, ROOT_HISTORY_SIZE)
    }
}

struct AccountReader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> AccountReader<'a> {
    fn take(&mut self, len: usize) -> Result<&'a [u8], String> {
        let end = self
            .offset
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| format!("account data too short at offset {}", self.offset))?;
        let slice = &self.data[self.offset..end];
        self.offset = end;
        Ok(slice)
    }

    fn u64(&mut self) -> Result<u64, String> {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(self.take(8)?);
        Ok(u64::from_le_bytes(buf))
    }

    fn node(&mut self) -> Result<[u8; 32], String> {
        let mut buf = [0u8; 32];
        buf.copy_from_slice(self.take(32)?);
        Ok(buf)
    }
}
