//! Fixed-size binary Merkle tree hashed with the Poseidon byte sponge.
//!
//! Nodes follow wealdtech go-merkletree with an iden3 Poseidon hasher: a leaf
//! node is `HashBytes(bytes(data))` and an internal node is
//! `HashBytes(bytes(left) || bytes(right))`, where `bytes` is the minimal
//! big-endian encoding. No sorting and no salting.

use ark_bn254::Fr;

use crate::error::CryptoError;
use crate::field::{field_to_biguint, minimal_be_bytes};
use crate::poseidon::poseidon_hash_bytes;

/// Minimal big-endian bytes of a node. Zero is the single byte `0x00`, which
/// is how padding leaves are encoded.
fn node_bytes(value: &Fr) -> Vec<u8> {
    let bytes = minimal_be_bytes(&field_to_biguint(value));
    if bytes.is_empty() {
        vec![0]
    } else {
        bytes
    }
}

/// Hash of a leaf node from its data.
pub fn hash_leaf(data: &Fr) -> Result<Fr, CryptoError> {
    poseidon_hash_bytes(&node_bytes(data))
}

/// Hash of an internal node from its children.
pub fn hash_node(left: &Fr, right: &Fr) -> Result<Fr, CryptoError> {
    let mut bytes = node_bytes(left);
    bytes.extend_from_slice(&node_bytes(right));
    poseidon_hash_bytes(&bytes)
}

/// A complete Poseidon Merkle tree over `2^depth` leaves.
#[derive(Debug, Clone)]
pub struct PoseidonMerkleTree {
    leaf_data: Vec<Fr>,
    /// `levels[0]` holds the hashed leaves, the last level holds the root.
    levels: Vec<Vec<Fr>>,
}

/// Sibling path from a leaf up to the root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InclusionProof {
    /// Leaf index the proof was generated for.
    pub index: usize,
    /// Sibling hashes, leaf level first.
    pub siblings: Vec<Fr>,
    /// Order bit per level: 0 when the running node is the left child.
    pub path: Vec<u8>,
}

impl PoseidonMerkleTree {
    /// Build a tree over `leaf_data`, whose length must be a power of two.
    pub fn new(leaf_data: Vec<Fr>) -> Result<Self, CryptoError> {
        if leaf_data.is_empty() || !leaf_data.len().is_power_of_two() {
            return Err(CryptoError::MerkleError(format!(
                "leaf count must be a non-zero power of two, got {}",
                leaf_data.len()
            )));
        }

        let leaves = leaf_data
            .iter()
            .map(hash_leaf)
            .collect::<Result<Vec<_>, _>>()?;

        let mut levels = vec![leaves];
        while let Some(level) = levels.last().filter(|level| level.len() > 1) {
            let parents = level
                .chunks(2)
                .map(|pair| hash_node(&pair[0], &pair[1]))
                .collect::<Result<Vec<_>, _>>()?;
            levels.push(parents);
        }

        tracing::trace!(leaves = leaf_data.len(), depth = levels.len() - 1, "built merkle tree");

        Ok(Self { leaf_data, levels })
    }

    /// Build a tree of the given depth, padding the missing leaves with zero.
    pub fn with_depth(mut leaf_data: Vec<Fr>, depth: u32) -> Result<Self, CryptoError> {
        let capacity = 1usize
            .checked_shl(depth)
            .ok_or_else(|| CryptoError::MerkleError(format!("depth {} too large", depth)))?;
        if leaf_data.len() > capacity {
            return Err(CryptoError::MerkleError(format!(
                "{} leaves exceed capacity {} of depth {}",
                leaf_data.len(),
                capacity,
                depth
            )));
        }
        leaf_data.resize(capacity, Fr::from(0u64));
        Self::new(leaf_data)
    }

    pub fn root(&self) -> Fr {
        self.levels
            .last()
            .and_then(|level| level.first())
            .copied()
            .unwrap_or_default()
    }

    pub fn depth(&self) -> usize {
        self.levels.len() - 1
    }

    pub fn leaf_data(&self) -> &[Fr] {
        &self.leaf_data
    }

    /// Inclusion proof for the leaf at `index`.
    pub fn proof(&self, index: usize) -> Result<InclusionProof, CryptoError> {
        if index >= self.leaf_data.len() {
            return Err(CryptoError::MerkleError(format!(
                "leaf index {} out of range for {} leaves",
                index,
                self.leaf_data.len()
            )));
        }

        let mut siblings = Vec::with_capacity(self.depth());
        let mut path = Vec::with_capacity(self.depth());
        let mut position = index;
        for level in &self.levels[..self.depth()] {
            siblings.push(level[position ^ 1]);
            path.push((position & 1) as u8);
            position >>= 1;
        }

        Ok(InclusionProof {
            index,
            siblings,
            path,
        })
    }

    /// Inclusion proof for the first leaf whose data equals `data`.
    pub fn proof_for(&self, data: &Fr) -> Option<InclusionProof> {
        let index = self.leaf_data.iter().position(|leaf| leaf == data)?;
        self.proof(index).ok()
    }
}

impl InclusionProof {
    /// Recompute the root from the leaf's data.
    pub fn compute_root(&self, leaf_data: &Fr) -> Result<Fr, CryptoError> {
        if self.siblings.len() != self.path.len() {
            return Err(CryptoError::MerkleError(format!(
                "{} siblings but {} order bits",
                self.siblings.len(),
                self.path.len()
            )));
        }
        let mut node = hash_leaf(leaf_data)?;
        for (sibling, bit) in self.siblings.iter().zip(&self.path) {
            node = match bit {
                0 => hash_node(&node, sibling)?,
                1 => hash_node(sibling, &node)?,
                other => {
                    return Err(CryptoError::MerkleError(format!(
                        "invalid order bit {}",
                        other
                    )))
                }
            };
        }
        Ok(node)
    }

    /// Whether the proof links `leaf_data` to `root`.
    pub fn verify(&self, leaf_data: &Fr, root: &Fr) -> bool {
        self.compute_root(leaf_data)
            .map(|computed| computed == *root)
            .unwrap_or(false)
    }
}
