// crates/ledger/src/merkle.rs
//! Append-only compact Merkle tree over per-block transaction roots.
//!
//! Every node ever created (leaves and interior) is appended to a flat
//! file of 32-byte hashes; the in-memory state is just the leaf count and
//! the frontier (the roots of the complete subtrees covering the leaves).
//! That is enough to append, to compute the current root, and to rebuild
//! audit paths for any historical tree size from the stored nodes.

use crate::hash::Hash256;
use sha3::{Digest, Sha3_256};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use thiserror::Error;

const NODE_LEN: u64 = 32;

#[derive(Debug, Error)]
pub enum MerkleError {
    #[error("merkle io: {0}")]
    Io(#[from] std::io::Error),
    #[error("hash store has {have} nodes, tree of {size} leaves needs {need}")]
    ShortStore { have: u64, need: u64, size: u32 },
    #[error("frontier length {got} does not match tree size {size}")]
    BadFrontier { got: usize, size: u32 },
    #[error("leaf {index} out of range for tree of {size} leaves")]
    IndexOutOfRange { index: u32, size: u32 },
    #[error("proof length does not match tree shape")]
    BadProof,
}

/// Interior node hash; the 0x01 prefix keeps interior nodes from
/// colliding with leaves.
#[inline]
fn hash_children(left: &Hash256, right: &Hash256) -> Hash256 {
    let mut hasher = Sha3_256::new();
    hasher.update([1u8]);
    hasher.update(left.0);
    hasher.update(right.0);
    let out = hasher.finalize();
    let mut node = [0u8; 32];
    node.copy_from_slice(&out);
    Hash256(node)
}

/// Total nodes stored for a tree of `n` leaves.
#[inline]
fn node_count(n: u32) -> u64 {
    2 * n as u64 - n.count_ones() as u64
}

/// Flat append-only file of 32-byte nodes.
struct FileHashStore {
    file: File,
    count: u64,
}

impl FileHashStore {
    /// Open the node file. Surplus nodes past `expected` are a torn append
    /// from a crash before the KV commit and are truncated; a short file
    /// is unrecoverable.
    fn open(path: &Path, expected: u64, tree_size: u32) -> Result<Self, MerkleError> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;
        let have = file.metadata()?.len() / NODE_LEN;
        if have > expected {
            file.set_len(expected * NODE_LEN)?;
            file.seek(SeekFrom::End(0))?;
        } else if have < expected {
            return Err(MerkleError::ShortStore {
                have,
                need: expected,
                size: tree_size,
            });
        }
        Ok(Self {
            file,
            count: expected,
        })
    }

    fn append(&mut self, nodes: &[Hash256]) -> Result<(), MerkleError> {
        self.file.seek(SeekFrom::Start(self.count * NODE_LEN))?;
        for node in nodes {
            self.file.write_all(&node.0)?;
        }
        self.count += nodes.len() as u64;
        Ok(())
    }

    fn read(&mut self, index: u64) -> Result<Hash256, MerkleError> {
        self.file.seek(SeekFrom::Start(index * NODE_LEN))?;
        let mut buf = [0u8; 32];
        self.file.read_exact(&mut buf)?;
        Ok(Hash256(buf))
    }

    fn sync(&mut self) -> Result<(), MerkleError> {
        self.file.sync_data()?;
        Ok(())
    }

    fn truncate(&mut self) -> Result<(), MerkleError> {
        self.file.set_len(0)?;
        self.count = 0;
        Ok(())
    }
}

pub struct CompactMerkleTree {
    tree_size: u32,
    /// Roots of the complete subtrees covering the leaves, largest first;
    /// one entry per set bit of `tree_size`.
    frontier: Vec<Hash256>,
    store: FileHashStore,
}

impl CompactMerkleTree {
    pub fn open(
        path: &Path,
        tree_size: u32,
        frontier: Vec<Hash256>,
    ) -> Result<Self, MerkleError> {
        if frontier.len() != tree_size.count_ones() as usize {
            return Err(MerkleError::BadFrontier {
                got: frontier.len(),
                size: tree_size,
            });
        }
        let store = FileHashStore::open(path, node_count(tree_size), tree_size)?;
        Ok(Self {
            tree_size,
            frontier,
            store,
        })
    }

    #[inline]
    pub fn tree_size(&self) -> u32 {
        self.tree_size
    }

    #[inline]
    pub fn frontier(&self) -> &[Hash256] {
        &self.frontier
    }

    /// Append one leaf, writing the leaf and every merge node it closes.
    pub fn append(&mut self, leaf: Hash256) -> Result<(), MerkleError> {
        let mut nodes = vec![leaf];
        let mut node = leaf;
        let mut s = self.tree_size;
        while s & 1 == 1 {
            let left = self.frontier.pop().expect("frontier tracks tree size");
            node = hash_children(&left, &node);
            nodes.push(node);
            s >>= 1;
        }
        self.frontier.push(node);
        self.tree_size += 1;
        self.store.append(&nodes)
    }

    /// Root over the current leaves; the zero hash for an empty tree.
    pub fn root(&self) -> Hash256 {
        fold_frontier(&self.frontier)
    }

    /// Root the tree would have after appending `leaf`, without mutating.
    pub fn root_with_new_leaf(&self, leaf: Hash256) -> Hash256 {
        let mut frontier = self.frontier.clone();
        let mut node = leaf;
        let mut s = self.tree_size;
        while s & 1 == 1 {
            let left = frontier.pop().expect("frontier tracks tree size");
            node = hash_children(&left, &node);
            s >>= 1;
        }
        frontier.push(node);
        fold_frontier(&frontier)
    }

    /// Audit path (bottom to top) for leaf `index` in the tree formed by
    /// the first `size` leaves.
    pub fn inclusion_proof(
        &mut self,
        index: u32,
        size: u32,
    ) -> Result<Vec<Hash256>, MerkleError> {
        if size == 0 || size > self.tree_size || index >= size {
            return Err(MerkleError::IndexOutOfRange {
                index,
                size: size.min(self.tree_size),
            });
        }
        let mut path = Vec::new();
        self.walk_path(index, 0, size, &mut path)?;
        Ok(path)
    }

    fn walk_path(
        &mut self,
        index: u32,
        start: u32,
        len: u32,
        out: &mut Vec<Hash256>,
    ) -> Result<(), MerkleError> {
        if len == 1 {
            return Ok(());
        }
        let k = prev_pow2(len);
        if index < k {
            self.walk_path(index, start, k, out)?;
            out.push(self.range_root(start + k, len - k)?);
        } else {
            self.walk_path(index - k, start + k, len - k, out)?;
            out.push(self.range_root(start, k)?);
        }
        Ok(())
    }

    /// Root of leaves `[start, start + len)`. `start` is always aligned so
    /// the greedy largest-first decomposition yields stored subtrees.
    fn range_root(&mut self, start: u32, len: u32) -> Result<Hash256, MerkleError> {
        let mut parts = Vec::new();
        let mut s = start;
        let mut rem = len;
        while rem > 0 {
            let k = 31 - rem.leading_zeros();
            parts.push(self.subtree_root(s, k)?);
            s += 1 << k;
            rem -= 1 << k;
        }
        Ok(fold_frontier(&parts))
    }

    /// Stored root of the complete subtree of `2^level` leaves starting at
    /// `start`. The node was created while appending leaf
    /// `start + 2^level - 1`, after the leaf itself and `level - 1` smaller
    /// merge nodes.
    fn subtree_root(&mut self, start: u32, level: u32) -> Result<Hash256, MerkleError> {
        let last = start as u64 + (1u64 << level) - 1;
        let index = 2 * last - last.count_ones() as u64 + level as u64;
        self.store.read(index)
    }

    /// Flush node writes to disk; called before the owning store's KV
    /// batch commit.
    pub fn sync(&mut self) -> Result<(), MerkleError> {
        self.store.sync()
    }

    /// Drop all leaves and nodes (genesis re-seed).
    pub fn reset(&mut self) -> Result<(), MerkleError> {
        self.store.truncate()?;
        self.tree_size = 0;
        self.frontier.clear();
        Ok(())
    }
}

fn fold_frontier(parts: &[Hash256]) -> Hash256 {
    match parts.split_last() {
        None => Hash256::ZERO,
        Some((last, rest)) => {
            let mut acc = *last;
            for part in rest.iter().rev() {
                acc = hash_children(part, &acc);
            }
            acc
        }
    }
}

/// Largest power of two strictly below `n` (`n >= 2`).
#[inline]
fn prev_pow2(n: u32) -> u32 {
    debug_assert!(n >= 2);
    let k = 1u32 << (31 - n.leading_zeros());
    if k == n {
        k >> 1
    } else {
        k
    }
}

/// Recompute the root a proof commits to: leaf `index` of a tree with
/// `size` leaves, audit path bottom to top.
pub fn root_from_proof(
    leaf: Hash256,
    index: u32,
    size: u32,
    path: &[Hash256],
) -> Result<Hash256, MerkleError> {
    if size == 0 || index >= size {
        return Err(MerkleError::IndexOutOfRange { index, size });
    }
    if size == 1 {
        return if path.is_empty() {
            Ok(leaf)
        } else {
            Err(MerkleError::BadProof)
        };
    }
    let (rest, last) = path.split_last().ok_or(MerkleError::BadProof)?;
    let k = prev_pow2(size);
    if index < k {
        Ok(hash_children(&root_from_proof(leaf, index, k, rest)?, last))
    } else {
        Ok(hash_children(
            last,
            &root_from_proof(leaf, index - k, size - k, rest)?,
        ))
    }
}
