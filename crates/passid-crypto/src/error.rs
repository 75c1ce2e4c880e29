/// Cryptographic operation errors.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("invalid field element: {0}")]
    InvalidFieldElement(String),

    #[error("value does not fit in the BN254 scalar field: {0}")]
    FieldOverflow(String),

    #[error("poseidon hash failed: {0}")]
    HashError(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("merkle tree error: {0}")]
    MerkleError(String),
}
