//! Conversions between BN254 scalars and their decimal, hex and byte forms.
//!
//! Values crossing the service boundary are never reduced silently: anything
//! at or above the scalar modulus is rejected.

use ark_bn254::Fr;
use ark_ff::{BigInteger, PrimeField};
use num_bigint::BigUint;

use crate::error::CryptoError;

fn modulus() -> BigUint {
    BigUint::from(Fr::MODULUS)
}

/// Convert an unsigned integer to a field element, rejecting values >= r.
pub fn field_from_biguint(value: &BigUint) -> Result<Fr, CryptoError> {
    if *value >= modulus() {
        return Err(CryptoError::FieldOverflow(value.to_string()));
    }
    Ok(Fr::from(value.clone()))
}

/// Parse a decimal or `0x`-prefixed hexadecimal string into a field element.
pub fn parse_field(value: &str) -> Result<Fr, CryptoError> {
    let parsed = parse_biguint(value)?;
    field_from_biguint(&parsed)
}

/// Parse a decimal or `0x`-prefixed hexadecimal string into an integer.
pub fn parse_biguint(value: &str) -> Result<BigUint, CryptoError> {
    let trimmed = value.trim();
    let parsed = match trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        Some(hex_digits) => BigUint::parse_bytes(hex_digits.as_bytes(), 16),
        None => BigUint::parse_bytes(trimmed.as_bytes(), 10),
    };
    parsed.ok_or_else(|| CryptoError::InvalidFieldElement(value.to_string()))
}

/// Interpret big-endian bytes as a field element, rejecting values >= r.
pub fn field_from_be_bytes(bytes: &[u8]) -> Result<Fr, CryptoError> {
    field_from_biguint(&BigUint::from_bytes_be(bytes))
}

/// Decimal representation of a field element.
pub fn field_to_decimal(value: &Fr) -> String {
    field_to_biguint(value).to_string()
}

/// Field element as an unsigned integer.
pub fn field_to_biguint(value: &Fr) -> BigUint {
    BigUint::from_bytes_be(&value.into_bigint().to_bytes_be())
}

/// Minimal big-endian bytes of an integer. Zero encodes as an empty slice.
pub fn minimal_be_bytes(value: &BigUint) -> Vec<u8> {
    if *value == BigUint::default() {
        return Vec::new();
    }
    value.to_bytes_be()
}
