use chrono::NaiveDate;

/// Zero-knowledge proof errors.
#[derive(Debug, thiserror::Error)]
pub enum ProofError {
    #[error("malformed proof: {0}")]
    MalformedProof(String),

    #[error("malformed public signals: {0}")]
    MalformedSignals(String),

    #[error("proof verification failed: {0}")]
    ProofInvalid(String),

    #[error("DG1 hash in public signals does not match the document")]
    Dg1Mismatch,

    #[error("proof date {proof} does not match current date {today}")]
    DateMismatch { proof: String, today: NaiveDate },

    #[error("age {age} is below the required minimum {min}")]
    AgeTooLow { age: u64, min: u32 },

    #[error("{count} salts exceed the circuit capacity of {max}")]
    TooManySalts { count: usize, max: usize },

    #[error("proof generation failed: {0}")]
    ProofGenerationFailed(String),

    #[error("invalid verification key: {0}")]
    VerificationKey(String),

    #[error("crypto error: {0}")]
    Crypto(#[from] passid_crypto::CryptoError),
}

impl ProofError {
    /// Whether the error was caused by the submitted proof rather than by
    /// the service.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::MalformedProof(_)
                | Self::MalformedSignals(_)
                | Self::ProofInvalid(_)
                | Self::Dg1Mismatch
                | Self::DateMismatch { .. }
                | Self::AgeTooLow { .. }
        )
    }
}
