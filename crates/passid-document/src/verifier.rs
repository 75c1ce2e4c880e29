use chrono::{DateTime, Utc};
use passid_core::DocumentSod;
use std::sync::Arc;
use x509_cert::Certificate;

use crate::algorithm::SignatureAlgorithm;
use crate::certificate::{parse_pem_certificate, KeyKind, PublicKey, TrustStore};
use crate::error::DocumentError;
use crate::sod::{message_digest, LdsSecurityObject};

/// Data group carrying the MRZ.
const DG1: u8 = 1;
/// Data group carrying the facial image.
const DG2: u8 = 2;

/// Outcome of a successful SOD verification.
#[derive(Debug, Clone)]
pub struct VerifiedDocument {
    pub algorithm: SignatureAlgorithm,
    /// Raw DER signed attributes; input to the document hash.
    pub signed_attributes: Vec<u8>,
    pub security_object: LdsSecurityObject,
    pub signer: Certificate,
}

impl VerifiedDocument {
    /// DG1 hash octets from the security object.
    pub fn dg1_hash(&self) -> Result<&[u8], DocumentError> {
        self.security_object.data_group(DG1).ok_or_else(|| {
            DocumentError::MalformedAsn1("security object has no DG1 hash".into())
        })
    }

    /// DG2 hash octets, when present.
    pub fn dg2_hash(&self) -> Option<&[u8]> {
        self.security_object.data_group(DG2)
    }
}

/// Verifies passport SODs against a set of trusted CSCA masters.
pub struct DocumentVerifier {
    trust_store: Arc<TrustStore>,
}

impl DocumentVerifier {
    pub fn new(trust_store: Arc<TrustStore>) -> Self {
        Self { trust_store }
    }

    /// Verify a SOD at the current time.
    pub fn verify(&self, sod: &DocumentSod) -> Result<VerifiedDocument, DocumentError> {
        self.verify_at(sod, Utc::now())
    }

    /// Verify a SOD, evaluating certificate validity at `now`.
    ///
    /// Checks run in a fixed order: algorithm, message digest, signature,
    /// then trust chain. The first failure is returned.
    pub fn verify_at(
        &self,
        sod: &DocumentSod,
        now: DateTime<Utc>,
    ) -> Result<VerifiedDocument, DocumentError> {
        let algorithm = SignatureAlgorithm::from_identifier(&sod.algorithm)?;

        let signed_attributes = decode_hex("signed_attributes", &sod.signed_attributes)?;
        let signature = decode_hex("signature", &sod.signature)?;
        let encapsulated_content = decode_hex("encapsulated_content", &sod.encapsulated_content)?;

        let digest = algorithm.digest_algorithm();
        let expected = message_digest(&signed_attributes)?;
        if digest.digest(&encapsulated_content) != expected {
            return Err(DocumentError::DigestMismatch(
                "encapsulated content hash differs from signed message digest".into(),
            ));
        }

        let signer = parse_pem_certificate(&sod.pem_file)?;
        let key = PublicKey::from_spki(&signer.tbs_certificate.subject_public_key_info)
            .map_err(|e| DocumentError::SignatureInvalid(e.to_string()))?;
        if key.kind() == KeyKind::Rsa && !algorithm.is_rsa() {
            return Err(DocumentError::SignatureInvalid(format!(
                "{} requires an EC key, certificate carries RSA",
                algorithm
            )));
        }
        if key.kind() == KeyKind::Ecdsa && algorithm.is_rsa() {
            return Err(DocumentError::SignatureInvalid(format!(
                "{} requires an RSA key, certificate carries EC",
                algorithm
            )));
        }
        key.verify(digest, &signed_attributes, &signature)?;

        self.trust_store.verify_chain(&signer, now)?;

        let security_object = LdsSecurityObject::from_der_bytes(&encapsulated_content)?;

        tracing::debug!(
            algorithm = %algorithm,
            data_groups = security_object.data_group_hashes.len(),
            "document SOD verified"
        );

        Ok(VerifiedDocument {
            algorithm,
            signed_attributes,
            security_object,
            signer,
        })
    }
}

/// Decode a hex field, tolerating a `0x` prefix.
fn decode_hex(field: &str, value: &str) -> Result<Vec<u8>, DocumentError> {
    let trimmed = value.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    if digits.is_empty() {
        return Err(DocumentError::MalformedInput(format!("{} is empty", field)));
    }
    hex::decode(digits).map_err(|e| DocumentError::MalformedInput(format!("{}: {}", field, e)))
}
