//! Passid Document Layer
//!
//! Verifies the Security Object Document (SOD) of an ICAO 9303 passport:
//! - signature algorithm selection
//! - signed-attributes message digest over the LDS security object
//! - document signer signature (RSA PKCS#1 v1.5, ECDSA P-256/P-384)
//! - trust chain from the document signer to a configured CSCA master

pub mod algorithm;
pub mod certificate;
pub mod error;
pub mod sod;
pub mod verifier;

pub use algorithm::{DigestAlgorithm, SignatureAlgorithm};
pub use passid_core::HashFamily;
pub use certificate::{parse_pem_certificate, KeyKind, PublicKey, TrustStore};
pub use error::DocumentError;
pub use sod::{DataGroupHash, LdsSecurityObject};
pub use verifier::{DocumentVerifier, VerifiedDocument};
