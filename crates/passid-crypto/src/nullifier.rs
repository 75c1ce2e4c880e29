//! Document hashing and nullifier derivation.

use ark_bn254::Fr;
use chrono::{DateTime, Utc};

use crate::error::CryptoError;
use crate::field::field_from_be_bytes;
use crate::poseidon::{poseidon_hash, poseidon_hash_bytes};

/// Salts are millisecond timestamps truncated to 48 bits.
const SALT_MASK: u64 = (1 << 48) - 1;

/// Poseidon sponge digest (iden3 `HashBytes`) of the passport's signed attributes.
pub fn document_hash(signed_attributes: &[u8]) -> Result<Fr, CryptoError> {
    poseidon_hash_bytes(signed_attributes)
}

/// Per-account nullifier: `Poseidon(document_hash, blinder, salt)`.
pub fn nullifier(document_hash: &Fr, blinder: &Fr, salt: &Fr) -> Result<Fr, CryptoError> {
    poseidon_hash(&[*document_hash, *blinder, *salt])
}

/// Salt for a registration made at `now`.
pub fn registration_salt(now: DateTime<Utc>) -> u64 {
    (now.timestamp_millis().max(0) as u64) & SALT_MASK
}

/// Per-document nullifier derived from the DG2 hash.
///
/// Hashes of 32 bytes or more are split into two halves so each half fits in
/// a field element; shorter hashes are used whole.
pub fn document_nullifier(dg2_hash: &[u8], blinder: &Fr) -> Result<Fr, CryptoError> {
    if dg2_hash.is_empty() {
        return Err(CryptoError::InvalidInput("empty DG2 hash".into()));
    }
    let mut inputs = Vec::with_capacity(3);
    if dg2_hash.len() >= 32 {
        let (high, low) = dg2_hash.split_at(dg2_hash.len() / 2);
        inputs.push(field_from_be_bytes(high)?);
        inputs.push(field_from_be_bytes(low)?);
    } else {
        inputs.push(field_from_be_bytes(dg2_hash)?);
    }
    inputs.push(*blinder);
    poseidon_hash(&inputs)
}
