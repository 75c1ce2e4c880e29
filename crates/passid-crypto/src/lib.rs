//! Passid Crypto: BN254 scalar helpers, circom-compatible Poseidon hashing,
//! nullifier derivation, and fixed-depth Poseidon Merkle trees.

pub mod error;
pub mod field;
mod grain;
pub mod merkle;
pub mod nullifier;
pub mod poseidon;

pub use ark_bn254::Fr;
pub use error::CryptoError;
pub use field::{field_from_be_bytes, field_to_decimal, minimal_be_bytes, parse_field};
pub use merkle::{hash_leaf, hash_node, InclusionProof, PoseidonMerkleTree};
pub use nullifier::{document_hash, document_nullifier, nullifier, registration_salt};
pub use poseidon::{poseidon_hash, poseidon_hash_bytes};
