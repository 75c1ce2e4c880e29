//! Passid Credentials: the external credential issuer and the secret stores
//! that hold the blinder and issuer credentials.

pub mod error;
pub mod issuer;
pub mod secrets;

pub use error::{IssuerError, SecretError};
pub use issuer::{
    idempotency_key, CredentialIssuer, CredentialRecord, HttpCredentialIssuer, IssueRequest,
    IssuerSettings,
};
pub use secrets::{IssuerCredentials, SecretStore, StaticSecretStore, VaultSecretStore};
