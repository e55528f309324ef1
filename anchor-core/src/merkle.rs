//! Merkle tree over anchored content hashes
//!
//! A batch submission puts only the Merkle root on the consensus log.
//! Anyone holding an item's payload, its hash, its index, and its proof can
//! recompute the root and compare it to the on-ledger value; a mismatch
//! signals tampering.
//!
//! # Design
//!
//! - Binary tree, SHA-256 pair hashing `H(left || right)`
//! - Odd level width: last node duplicated
//! - Proofs are serializable (they are persisted on transaction rows)

use crate::{hash, Error, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Which side a sibling hash sits on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Sibling is the left input of the pair hash
    Left,
    /// Sibling is the right input of the pair hash
    Right,
}

/// One step of a membership proof
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofStep {
    /// Sibling position
    pub side: Side,
    /// Sibling hash, 64 lowercase hex chars
    pub sibling: String,
}

/// Membership proof: the sibling path from one leaf to the root
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleProof {
    /// Leaf content hash being proven
    pub leaf: String,
    /// Leaf position in the batch, fixed at aggregation time
    pub index: usize,
    /// Sibling hashes, leaf-adjacent first
    pub steps: Vec<ProofStep>,
}

impl MerkleProof {
    /// Recompute the root implied by this proof
    pub fn computed_root(&self) -> Result<String> {
        let mut current = hash::decode_hash(&self.leaf)?;
        for step in &self.steps {
            let sibling = hash::decode_hash(&step.sibling)?;
            current = match step.side {
                Side::Left => hash_pair(&sibling, &current),
                Side::Right => hash_pair(&current, &sibling),
            };
        }
        Ok(hex::encode(current))
    }

    /// Verify this proof against a known root
    pub fn verify(&self, expected_root: &str) -> bool {
        match self.computed_root() {
            Ok(root) => root == expected_root,
            Err(_) => false,
        }
    }
}

/// Verify a leaf's membership without constructing a tree
pub fn verify_proof(leaf: &str, proof: &MerkleProof, root: &str) -> bool {
    proof.leaf == leaf && proof.verify(root)
}

fn hash_pair(left: &[u8; 32], right: &[u8; 32]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(left);
    hasher.update(right);
    hasher.finalize().into()
}

/// Merkle tree built over an ordered sequence of content hashes
pub struct MerkleTree {
    leaves: Vec<[u8; 32]>,
}

impl MerkleTree {
    /// Build from hex content hashes, preserving order
    pub fn from_hashes<S: AsRef<str>>(hashes: &[S]) -> Result<Self> {
        let leaves = hashes
            .iter()
            .map(|h| hash::decode_hash(h.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { leaves })
    }

    /// Number of leaves
    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    /// True when the tree has no leaves
    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    /// Merkle root, 64 lowercase hex chars
    ///
    /// A single leaf is its own root; an empty tree hashes to all zeroes.
    pub fn root(&self) -> String {
        hex::encode(self.root_bytes())
    }

    fn root_bytes(&self) -> [u8; 32] {
        if self.leaves.is_empty() {
            return [0u8; 32];
        }

        let mut level = self.leaves.clone();
        while level.len() > 1 {
            level = Self::next_level(&level);
        }
        level[0]
    }

    fn next_level(level: &[[u8; 32]]) -> Vec<[u8; 32]> {
        let mut next = Vec::with_capacity((level.len() + 1) / 2);
        for pair in level.chunks(2) {
            let left = pair[0];
            // Duplicate the last node when the level is odd
            let right = if pair.len() == 2 { pair[1] } else { pair[0] };
            next.push(hash_pair(&left, &right));
        }
        next
    }

    /// Membership proof for the leaf at `index`
    pub fn proof(&self, index: usize) -> Result<MerkleProof> {
        if index >= self.leaves.len() {
            return Err(Error::Merkle(format!(
                "leaf index {} out of range (len {})",
                index,
                self.leaves.len()
            )));
        }

        let mut steps = Vec::new();
        let mut level = self.leaves.clone();
        let mut pos = index;

        while level.len() > 1 {
            let (side, sibling_pos) = if pos % 2 == 0 {
                // Right sibling, or self when the level ends here
                let sib = if pos + 1 < level.len() { pos + 1 } else { pos };
                (Side::Right, sib)
            } else {
                (Side::Left, pos - 1)
            };

            steps.push(ProofStep {
                side,
                sibling: hex::encode(level[sibling_pos]),
            });

            level = Self::next_level(&level);
            pos /= 2;
        }

        Ok(MerkleProof {
            leaf: hex::encode(self.leaves[index]),
            index,
            steps,
        })
    }
}
