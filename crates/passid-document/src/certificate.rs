//! Certificates, public keys, and the CSCA trust store.

use chrono::{DateTime, Utc};
use der::asn1::ObjectIdentifier;
use der::{DecodePem, Encode};
use p256::ecdsa::signature::hazmat::PrehashVerifier;
use rsa::pkcs8::DecodePublicKey;
use rsa::{Pkcs1v15Sign, RsaPublicKey};
use spki::SubjectPublicKeyInfoOwned;
use std::path::Path;
use x509_cert::Certificate;

use crate::algorithm::DigestAlgorithm;
use crate::error::DocumentError;

const RSA_ENCRYPTION: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.1");
const EC_PUBLIC_KEY: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.2.1");

const SHA1_WITH_RSA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.5");
const SHA256_WITH_RSA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.11");
const SHA384_WITH_RSA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.12");
const SHA512_WITH_RSA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.13");
const ECDSA_WITH_SHA1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.4.1");
const ECDSA_WITH_SHA256: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.2");
const ECDSA_WITH_SHA384: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.3");
const ECDSA_WITH_SHA512: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.4");


/// Signature scheme family of a public key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    Rsa,
    Ecdsa,
}

/// A certificate subject public key usable for signature verification.
#[derive(Debug, Clone)]
pub enum PublicKey {
    Rsa(RsaPublicKey),
    P256(p256::ecdsa::VerifyingKey),
    P384(p384::ecdsa::VerifyingKey),
}

impl PublicKey {
    /// Decode a `SubjectPublicKeyInfo`.
    pub fn from_spki(spki: &SubjectPublicKeyInfoOwned) -> Result<Self, DocumentError> {
        let der = spki
            .to_der()
            .map_err(|e| DocumentError::MalformedCertificate(format!("public key: {}", e)))?;

        if spki.algorithm.oid == RSA_ENCRYPTION {
            return RsaPublicKey::from_public_key_der(&der)
                .map(Self::Rsa)
                .map_err(|e| DocumentError::MalformedCertificate(format!("RSA key: {}", e)));
        }
        if spki.algorithm.oid == EC_PUBLIC_KEY {
            if let Ok(key) = p256::ecdsa::VerifyingKey::from_public_key_der(&der) {
                return Ok(Self::P256(key));
            }
            if let Ok(key) = p384::ecdsa::VerifyingKey::from_public_key_der(&der) {
                return Ok(Self::P384(key));
            }
            return Err(DocumentError::UnsupportedAlgorithm(
                "EC keys must be on P-256 or P-384".into(),
            ));
        }
        Err(DocumentError::UnsupportedAlgorithm(format!(
            "public key algorithm {}",
            spki.algorithm.oid
        )))
    }

    pub fn kind(&self) -> KeyKind {
        match self {
            Self::Rsa(_) => KeyKind::Rsa,
            Self::P256(_) | Self::P384(_) => KeyKind::Ecdsa,
        }
    }

    /// Verify `signature` over `message`. ECDSA signatures are ASN.1 DER;
    /// RSA signatures use PKCS#1 v1.5 padding.
    pub fn verify(
        &self,
        digest: DigestAlgorithm,
        message: &[u8],
        signature: &[u8],
    ) -> Result<(), DocumentError> {
        let hashed = digest.digest(message);
        let invalid = |e: &dyn std::fmt::Display| DocumentError::SignatureInvalid(e.to_string());

        match self {
            Self::Rsa(key) => {
                let scheme = match digest {
                    DigestAlgorithm::Sha1 => Pkcs1v15Sign::new::<sha1::Sha1>(),
                    DigestAlgorithm::Sha256 => Pkcs1v15Sign::new::<sha2::Sha256>(),
                    DigestAlgorithm::Sha384 => Pkcs1v15Sign::new::<sha2::Sha384>(),
                    DigestAlgorithm::Sha512 => Pkcs1v15Sign::new::<sha2::Sha512>(),
                };
                key.verify(scheme, &hashed, signature)
                    .map_err(|e| invalid(&e))
            }
            Self::P256(key) => {
                let sig = p256::ecdsa::Signature::from_der(signature).map_err(|e| invalid(&e))?;
                key.verify_prehash(&hashed, &sig).map_err(|e| invalid(&e))
            }
            Self::P384(key) => {
                let sig = p384::ecdsa::Signature::from_der(signature).map_err(|e| invalid(&e))?;
                key.verify_prehash(&hashed, &sig).map_err(|e| invalid(&e))
            }
        }
    }
}

/// Parse a single PEM certificate.
pub fn parse_pem_certificate(pem: &str) -> Result<Certificate, DocumentError> {
    Certificate::from_pem(pem.trim().as_bytes())
        .map_err(|e| DocumentError::MalformedCertificate(e.to_string()))
}

/// Certificate signature algorithms accepted on a trust chain.
const CERTIFICATE_SIGNATURE_SCHEMES: [(ObjectIdentifier, KeyKind, DigestAlgorithm); 8] = [
    (SHA1_WITH_RSA, KeyKind::Rsa, DigestAlgorithm::Sha1),
    (SHA256_WITH_RSA, KeyKind::Rsa, DigestAlgorithm::Sha256),
    (SHA384_WITH_RSA, KeyKind::Rsa, DigestAlgorithm::Sha384),
    (SHA512_WITH_RSA, KeyKind::Rsa, DigestAlgorithm::Sha512),
    (ECDSA_WITH_SHA1, KeyKind::Ecdsa, DigestAlgorithm::Sha1),
    (ECDSA_WITH_SHA256, KeyKind::Ecdsa, DigestAlgorithm::Sha256),
    (ECDSA_WITH_SHA384, KeyKind::Ecdsa, DigestAlgorithm::Sha384),
    (ECDSA_WITH_SHA512, KeyKind::Ecdsa, DigestAlgorithm::Sha512),
];

fn certificate_signature_scheme(
    oid: &ObjectIdentifier,
) -> Result<(KeyKind, DigestAlgorithm), DocumentError> {
    CERTIFICATE_SIGNATURE_SCHEMES
        .iter()
        .find(|(known, _, _)| known == oid)
        .map(|(_, kind, digest)| (*kind, *digest))
        .ok_or_else(|| {
            DocumentError::UntrustedCertificate(format!(
                "unsupported certificate signature algorithm {}",
                oid
            ))
        })
}

fn within_validity(cert: &Certificate, now: DateTime<Utc>) -> bool {
    let validity = &cert.tbs_certificate.validity;
    let now = now.timestamp();
    let not_before = validity.not_before.to_unix_duration().as_secs() as i64;
    let not_after = validity.not_after.to_unix_duration().as_secs() as i64;
    not_before <= now && now <= not_after
}

/// Trusted CSCA master certificates.
#[derive(Debug, Clone)]
pub struct TrustStore {
    masters: Vec<Certificate>,
}

impl TrustStore {
    /// Build a trust store from a PEM bundle of master certificates.
    pub fn from_pem_bundle(pem: &[u8]) -> Result<Self, DocumentError> {
        // load_pem_chain expects at least one byte after trimming.
        if pem.iter().all(u8::is_ascii_whitespace) {
            return Err(DocumentError::TrustStore(
                "master bundle contains no certificates".into(),
            ));
        }
        let masters = Certificate::load_pem_chain(pem)
            .map_err(|e| DocumentError::TrustStore(format!("invalid master bundle: {}", e)))?;

        if masters.is_empty() {
            return Err(DocumentError::TrustStore(
                "master bundle contains no certificates".into(),
            ));
        }
        tracing::info!(masters = masters.len(), "loaded CSCA trust store");
        Ok(Self { masters })
    }

    /// Load a PEM bundle from disk.
    pub fn load(path: &Path) -> Result<Self, DocumentError> {
        let pem = std::fs::read(path).map_err(|e| {
            DocumentError::TrustStore(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_pem_bundle(&pem)
    }

    pub fn len(&self) -> usize {
        self.masters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.masters.is_empty()
    }

    /// Check that `leaf` was issued and signed by a trusted master and that
    /// both are valid at `now`.
    pub fn verify_chain(&self, leaf: &Certificate, now: DateTime<Utc>) -> Result<(), DocumentError> {
        if !within_validity(leaf, now) {
            return Err(DocumentError::UntrustedCertificate(
                "document signer certificate is outside its validity period".into(),
            ));
        }

        let (kind, digest) = certificate_signature_scheme(&leaf.signature_algorithm.oid)?;
        let tbs = leaf
            .tbs_certificate
            .to_der()
            .map_err(|e| DocumentError::MalformedCertificate(e.to_string()))?;
        let signature = leaf.signature.raw_bytes();

        for master in &self.masters {
            if master.tbs_certificate.subject != leaf.tbs_certificate.issuer {
                continue;
            }
            if !within_validity(master, now) {
                tracing::debug!(
                    subject = %master.tbs_certificate.subject,
                    "skipping expired master certificate"
                );
                continue;
            }
            let key = match PublicKey::from_spki(&master.tbs_certificate.subject_public_key_info) {
                Ok(key) if key.kind() == kind => key,
                _ => continue,
            };
            if key.verify(digest, &tbs, signature).is_ok() {
                return Ok(());
            }
        }

        Err(DocumentError::UntrustedCertificate(format!(
            "no trusted master signed certificate issued by {}",
            leaf.tbs_certificate.issuer
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture(name: &str) -> serde_json::Value {
        let raw = match name {
            "ecdsa" => include_str!("../tests/fixtures/sod_sha256_ecdsa.json"),
            "rsa" => include_str!("../tests/fixtures/sod_sha256_rsa.json"),
            _ => include_str!("../tests/fixtures/sod_untrusted.json"),
        };
        serde_json::from_str(raw).unwrap()
    }

    fn now() -> DateTime<Utc> {
        use chrono::TimeZone;
        Utc.with_ymd_and_hms(2026, 10, 17, 12, 0, 0).unwrap()
    }

    fn store() -> TrustStore {
        TrustStore::from_pem_bundle(include_bytes!("../tests/fixtures/master_certs.pem")).unwrap()
    }

    fn leaf(name: &str) -> Certificate {
        parse_pem_certificate(fixture(name)["pem_file"].as_str().unwrap()).unwrap()
    }

    #[test]
    fn test_trust_store_loads_bundle() {
        assert_eq!(store().len(), 2);
    }

    #[test]
    fn test_empty_bundle_rejected() {
        assert!(matches!(
            TrustStore::from_pem_bundle(b""),
            Err(DocumentError::TrustStore(_))
        ));
    }

    #[test]
    fn test_bundle_edge_cases() {
        assert!(matches!(
            TrustStore::from_pem_bundle(b"\n\r\n"),
            Err(DocumentError::TrustStore(_))
        ));

        let bundle = include_str!("../tests/fixtures/master_certs.pem");
        let cut = bundle.rfind("-----END CERTIFICATE-----").unwrap();
        assert!(matches!(
            TrustStore::from_pem_bundle(bundle[..cut].as_bytes()),
            Err(DocumentError::TrustStore(_))
        ));
    }

    #[test]
    fn test_chain_ecdsa_signer() {
        store().verify_chain(&leaf("ecdsa"), now()).unwrap();
    }

    #[test]
    fn test_chain_rsa_signer() {
        store().verify_chain(&leaf("rsa"), now()).unwrap();
    }

    #[test]
    fn test_chain_untrusted_issuer() {
        let err = store().verify_chain(&leaf("untrusted"), now()).unwrap_err();
        assert!(matches!(err, DocumentError::UntrustedCertificate(_)));
    }

    #[test]
    fn test_chain_outside_validity() {
        let before_issue = DateTime::parse_from_rfc3339("2019-06-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let err = store().verify_chain(&leaf("ecdsa"), before_issue).unwrap_err();
        assert!(matches!(err, DocumentError::UntrustedCertificate(_)));
    }

    #[test]
    fn test_public_key_kinds() {
        let ec = leaf("ecdsa");
        let key = PublicKey::from_spki(&ec.tbs_certificate.subject_public_key_info).unwrap();
        assert!(matches!(key, PublicKey::P256(_)));

        let rsa = leaf("rsa");
        let key = PublicKey::from_spki(&rsa.tbs_certificate.subject_public_key_info).unwrap();
        assert_eq!(key.kind(), KeyKind::Rsa);
    }

    #[test]
    fn test_garbage_pem_rejected() {
        assert!(matches!(
            parse_pem_certificate("-----BEGIN CERTIFICATE-----\nAAAA\n-----END CERTIFICATE-----"),
            Err(DocumentError::MalformedCertificate(_))
        ));
    }
}
