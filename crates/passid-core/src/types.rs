use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::claim_state::ClaimState;
use crate::error::CoreError;

/// Decentralized Identifier of the account requesting a claim.
/// Format: `did:<method>:<identifier>` (e.g. `did:iden3:readonly:tJ9...`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Did(String);

impl Did {
    /// Parse and validate a DID URI.
    pub fn new(uri: impl Into<String>) -> Result<Self, CoreError> {
        let uri = uri.into();
        let mut parts = uri.splitn(3, ':');
        let scheme = parts.next().unwrap_or_default();
        let method = parts.next().unwrap_or_default();
        let identifier = parts.next().unwrap_or_default();

        if scheme != "did" {
            return Err(CoreError::InvalidDid(format!(
                "DID must start with 'did:', got: {}",
                uri
            )));
        }
        if method.is_empty()
            || !method
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        {
            return Err(CoreError::InvalidDid(format!(
                "DID method must be lowercase alphanumeric, got: {}",
                uri
            )));
        }
        if identifier.is_empty() {
            return Err(CoreError::InvalidDid(format!(
                "DID must have format 'did:<method>:<identifier>', got: {}",
                uri
            )));
        }
        Ok(Self(uri))
    }

    /// Get the full DID URI.
    pub fn uri(&self) -> &str {
        &self.0
    }

    /// Extract the DID method.
    pub fn method(&self) -> &str {
        self.0.split(':').nth(1).unwrap_or_default()
    }
}

impl fmt::Display for Did {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for Did {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Did> for String {
    fn from(did: Did) -> Self {
        did.0
    }
}

/// Raw passport Security Object Document fields as submitted by the holder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSod {
    /// Hex-encoded DER `SET OF Attribute` covered by the signature.
    pub signed_attributes: String,
    /// Signature algorithm identifier, e.g. `SHA256withRSA`.
    pub algorithm: String,
    /// Hex-encoded signature over `signed_attributes`.
    pub signature: String,
    /// PEM-encoded document signer certificate.
    pub pem_file: String,
    /// Hex-encoded DER LDS security object.
    pub encapsulated_content: String,
}

/// Hash family of the passport signature. Each family is proven by its own
/// circuit and therefore has its own verification key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashFamily {
    Sha1,
    Sha256,
}

impl fmt::Display for HashFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sha1 => write!(f, "sha1"),
            Self::Sha256 => write!(f, "sha256"),
        }
    }
}

/// Groth16 proof points in snarkjs JSON layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofPoints {
    pub pi_a: Vec<String>,
    pub pi_b: Vec<Vec<String>>,
    pub pi_c: Vec<String>,
    #[serde(default = "default_protocol")]
    pub protocol: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub curve: String,
}

fn default_protocol() -> String {
    "groth16".into()
}

/// A zero-knowledge proof together with its ordered public signals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZkProof {
    pub proof: ProofPoints,
    pub pub_signals: Vec<String>,
}

/// A persisted identity claim. One row per issued credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimRecord {
    /// Credential id assigned by the external issuer.
    pub id: Uuid,
    pub user_did: String,
    pub issuer_did: String,
    /// Decimal Poseidon nullifier.
    pub nullifier: String,
    /// Decimal salt (registration time in milliseconds).
    pub salt: String,
    /// Decimal Poseidon hash of the signed attributes.
    pub document_hash: String,
    pub created_at: DateTime<Utc>,
    pub is_banned: bool,
}

impl ClaimRecord {
    /// Lifecycle state of a stored claim.
    pub fn state(&self) -> ClaimState {
        if self.is_banned {
            ClaimState::Banned
        } else {
            ClaimState::Active
        }
    }

    /// Identifiers returned to the caller.
    pub fn issued(&self) -> IssuedClaim {
        IssuedClaim {
            claim_id: self.id,
            issuer_did: self.issuer_did.clone(),
        }
    }
}

/// Immutable audit record of the proof that backed a claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofRecord {
    pub id: Uuid,
    pub did: String,
    pub claim_id: Uuid,
    pub proof_data: ProofPoints,
    pub public_signals: Vec<String>,
    pub document_sod: DocumentSod,
}

impl ProofRecord {
    /// Build the audit record for a freshly issued claim.
    pub fn new(did: &Did, claim_id: Uuid, proof: &ZkProof, document_sod: &DocumentSod) -> Self {
        Self {
            id: Uuid::now_v7(),
            did: did.uri().to_string(),
            claim_id,
            proof_data: proof.proof.clone(),
            public_signals: proof.pub_signals.clone(),
            document_sod: document_sod.clone(),
        }
    }
}

/// Identifiers of an issued claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuedClaim {
    pub claim_id: Uuid,
    pub issuer_did: String,
}

/// Page selector for paginated listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageParams {
    pub number: u64,
    pub limit: u64,
}

impl PageParams {
    pub const DEFAULT_LIMIT: u64 = 1;
    pub const MAX_LIMIT: u64 = 100;

    /// Build page parameters, applying the default limit for zero and
    /// capping oversized limits.
    pub fn new(number: Option<u64>, limit: Option<u64>) -> Self {
        let limit = match limit {
            None | Some(0) => Self::DEFAULT_LIMIT,
            Some(l) => l.min(Self::MAX_LIMIT),
        };
        Self {
            number: number.unwrap_or(0),
            limit,
        }
    }

    /// Number of rows to skip.
    pub fn offset(&self) -> u64 {
        self.number.saturating_mul(self.limit)
    }

    /// The following page.
    pub fn next(&self) -> Self {
        Self {
            number: self.number + 1,
            limit: self.limit,
        }
    }
}

impl Default for PageParams {
    fn default() -> Self {
        Self::new(None, None)
    }
}
