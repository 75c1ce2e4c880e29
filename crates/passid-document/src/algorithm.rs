use passid_core::HashFamily;
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha384, Sha512};
use std::fmt;

use crate::error::DocumentError;

/// Message digest algorithms understood by the verifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestAlgorithm {
    Sha1,
    Sha256,
    Sha384,
    Sha512,
}

impl DigestAlgorithm {
    /// Hash `data` with this algorithm.
    pub fn digest(&self, data: &[u8]) -> Vec<u8> {
        match self {
            Self::Sha1 => Sha1::digest(data).to_vec(),
            Self::Sha256 => Sha256::digest(data).to_vec(),
            Self::Sha384 => Sha384::digest(data).to_vec(),
            Self::Sha512 => Sha512::digest(data).to_vec(),
        }
    }
}

/// Signature algorithms accepted for the SOD signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureAlgorithm {
    Sha1Ecdsa,
    Sha256Ecdsa,
    Sha256Rsa,
}

impl SignatureAlgorithm {
    /// Select an algorithm from the identifier carried in the request.
    pub fn from_identifier(identifier: &str) -> Result<Self, DocumentError> {
        let normalized = identifier.trim().to_ascii_lowercase();
        if normalized.contains("pss") {
            return Err(DocumentError::UnsupportedAlgorithm(format!(
                "RSA-PSS is not supported: {}",
                identifier
            )));
        }
        match normalized.as_str() {
            "sha256withrsa" | "sha256withrsaencryption" => Ok(Self::Sha256Rsa),
            "sha1withecdsa" | "ecdsa-with-sha1" => Ok(Self::Sha1Ecdsa),
            "sha256withecdsa" | "ecdsa-with-sha256" => Ok(Self::Sha256Ecdsa),
            _ => Err(DocumentError::UnsupportedAlgorithm(identifier.to_string())),
        }
    }

    pub fn digest_algorithm(&self) -> DigestAlgorithm {
        match self {
            Self::Sha1Ecdsa => DigestAlgorithm::Sha1,
            Self::Sha256Ecdsa | Self::Sha256Rsa => DigestAlgorithm::Sha256,
        }
    }

    pub fn family(&self) -> HashFamily {
        match self {
            Self::Sha1Ecdsa => HashFamily::Sha1,
            Self::Sha256Ecdsa | Self::Sha256Rsa => HashFamily::Sha256,
        }
    }

    pub fn is_rsa(&self) -> bool {
        matches!(self, Self::Sha256Rsa)
    }
}

impl fmt::Display for SignatureAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sha1Ecdsa => write!(f, "SHA1withECDSA"),
            Self::Sha256Ecdsa => write!(f, "SHA256withECDSA"),
            Self::Sha256Rsa => write!(f, "SHA256withRSA"),
        }
    }
}
