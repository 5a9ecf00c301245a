//! Merkle aggregation over a batch of EventHashes (RFC 6962 style).
//!
//! - Leaf: `H(0x00 || digest)`
//! - Internal node: `H(0x01 || left || right)`
//! - An unpaired last node is carried up to the next level unchanged
//!
//! The tree is position-sensitive: leaves keep persisted order, and audit
//! paths bind the leaf index and the leaf count.

use serde::{Deserialize, Serialize};

use crate::crypto::{Digest, HashAlgorithm};
use crate::error::{CoreError, Result};

/// Domain separation tag for leaves.
pub const LEAF_PREFIX: u8 = 0x00;

/// Domain separation tag for internal nodes.
pub const NODE_PREFIX: u8 = 0x01;

/// Algorithm label written into anchor records.
pub const TREE_ALGORITHM: &str = "RFC6962_SHA256";

/// Hash a leaf digest with the leaf prefix.
pub fn leaf_hash(algo: HashAlgorithm, digest: &Digest) -> Digest {
    algo.digest_parts(&[&[LEAF_PREFIX], digest.as_bytes()])
}

/// Hash two children with the node prefix.
pub fn node_hash(algo: HashAlgorithm, left: &Digest, right: &Digest) -> Digest {
    algo.digest_parts(&[&[NODE_PREFIX], left.as_bytes(), right.as_bytes()])
}

/// Which side the sibling sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    /// Sibling is the left child; the running hash is the right one.
    Left,
    /// Sibling is the right child.
    Right,
}

/// One level of an audit path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AuditStep {
    pub sibling: Digest,
    pub direction: Direction,
}

/// Inclusion proof for one leaf.
///
/// Levels where the node was carried up contribute no step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AuditPath {
    pub leaf_index: usize,
    pub leaf_count: usize,
    pub steps: Vec<AuditStep>,
}

/// A fully materialized tree. `levels[0]` holds the leaf hashes, the last
/// level holds only the root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleTree {
    algo: HashAlgorithm,
    levels: Vec<Vec<Digest>>,
}

impl MerkleTree {
    /// Build a SHA-256 tree over leaf digests in order.
    pub fn build(leaves: &[Digest]) -> Result<Self> {
        Self::build_with(HashAlgorithm::Sha256, leaves)
    }

    /// Build a tree with an explicit hash function.
    pub fn build_with(algo: HashAlgorithm, leaves: &[Digest]) -> Result<Self> {
        if leaves.is_empty() {
            return Err(CoreError::EmptyBatch);
        }

        let mut levels = vec![leaves.iter().map(|d| leaf_hash(algo, d)).collect::<Vec<_>>()];

        while let Some(current) = levels.last() {
            if current.len() == 1 {
                break;
            }
            let next: Vec<Digest> = current
                .chunks(2)
                .map(|pair| {
                    if pair.len() == 2 {
                        node_hash(algo, &pair[0], &pair[1])
                    } else {
                        pair[0]
                    }
                })
                .collect();
            levels.push(next);
        }

        Ok(Self { algo, levels })
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.algo
    }

    /// The root digest.
    pub fn root(&self) -> Digest {
        // build_with guarantees a final level with exactly one node
        self.levels
            .last()
            .and_then(|level| level.first())
            .copied()
            .unwrap_or(Digest::ZERO)
    }

    pub fn leaf_count(&self) -> usize {
        self.levels.first().map(Vec::len).unwrap_or(0)
    }

    /// All levels, leaves first.
    pub fn levels(&self) -> &[Vec<Digest>] {
        &self.levels
    }

    /// Sibling hashes from a leaf up to the root.
    pub fn audit_path(&self, leaf_index: usize) -> Result<AuditPath> {
        let leaf_count = self.leaf_count();
        if leaf_index >= leaf_count {
            return Err(CoreError::LeafIndexOutOfRange {
                index: leaf_index,
                leaf_count,
            });
        }

        let mut steps = Vec::new();
        let mut idx = leaf_index;
        for level in &self.levels[..self.levels.len() - 1] {
            if idx % 2 == 1 {
                steps.push(AuditStep {
                    sibling: level[idx - 1],
                    direction: Direction::Left,
                });
            } else if idx + 1 < level.len() {
                steps.push(AuditStep {
                    sibling: level[idx + 1],
                    direction: Direction::Right,
                });
            }
            idx /= 2;
        }

        Ok(AuditPath {
            leaf_index,
            leaf_count,
            steps,
        })
    }
}

/// Build a tree from hex EventHashes.
pub fn build_tree<S: AsRef<str>>(leaf_digests: &[S]) -> Result<MerkleTree> {
    let leaves = leaf_digests
        .iter()
        .map(|h| Digest::from_hex(h.as_ref()))
        .collect::<Result<Vec<_>>>()?;
    MerkleTree::build(&leaves)
}

/// Root of a SHA-256 tree over `leaves`.
pub fn compute_root(leaves: &[Digest]) -> Result<Digest> {
    MerkleTree::build(leaves).map(|tree| tree.root())
}

/// Check a SHA-256 audit path.
pub fn verify_audit_path(
    leaf: &Digest,
    leaf_index: usize,
    path: &AuditPath,
    expected_root: &Digest,
) -> bool {
    verify_audit_path_with(HashAlgorithm::Sha256, leaf, leaf_index, path, expected_root)
}

/// Check an audit path by rebuilding the root from one leaf.
///
/// The expected tree shape is derived from `leaf_index` and the path's
/// `leaf_count`; each step must sit on the side that shape dictates and no
/// steps may be left over.
pub fn verify_audit_path_with(
    algo: HashAlgorithm,
    leaf: &Digest,
    leaf_index: usize,
    path: &AuditPath,
    expected_root: &Digest,
) -> bool {
    if path.leaf_index != leaf_index || leaf_index >= path.leaf_count {
        return false;
    }

    let mut node = leaf_hash(algo, leaf);
    let mut idx = leaf_index;
    let mut width = path.leaf_count;
    let mut steps = path.steps.iter();

    while width > 1 {
        if idx % 2 == 1 {
            match steps.next() {
                Some(step) if step.direction == Direction::Left => {
                    node = node_hash(algo, &step.sibling, &node);
                }
                _ => return false,
            }
        } else if idx + 1 < width {
            match steps.next() {
                Some(step) if step.direction == Direction::Right => {
                    node = node_hash(algo, &node, &step.sibling);
                }
                _ => return false,
            }
        }
        idx /= 2;
        width = (width + 1) / 2;
    }

    steps.next().is_none() && node == *expected_root
}
