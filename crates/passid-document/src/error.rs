/// Document verification errors. Every variant is a client-side failure
/// except `TrustStore`, which only occurs while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("malformed input: {0}")]
    MalformedInput(String),

    #[error("malformed ASN.1: {0}")]
    MalformedAsn1(String),

    #[error("malformed certificate: {0}")]
    MalformedCertificate(String),

    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("digest mismatch: {0}")]
    DigestMismatch(String),

    #[error("signature invalid: {0}")]
    SignatureInvalid(String),

    #[error("untrusted certificate: {0}")]
    UntrustedCertificate(String),

    #[error("trust store error: {0}")]
    TrustStore(String),
}
