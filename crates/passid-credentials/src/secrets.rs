//! Secret material: the nullifier blinder and the issuer credentials.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use zeroize::Zeroizing;

use crate::error::SecretError;

/// Basic-auth credentials for the credential issuer.
#[derive(Clone)]
pub struct IssuerCredentials {
    pub login: String,
    pub password: Zeroizing<String>,
}

impl std::fmt::Debug for IssuerCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuerCredentials")
            .field("login", &self.login)
            .finish_non_exhaustive()
    }
}

/// Source of the service's secrets. Read once at startup.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// The nullifier blinder as a decimal string.
    async fn blinder(&self) -> Result<Zeroizing<String>, SecretError>;

    async fn issuer_credentials(&self) -> Result<IssuerCredentials, SecretError>;
}

/// Secrets supplied directly through configuration.
pub struct StaticSecretStore {
    blinder: Zeroizing<String>,
    credentials: IssuerCredentials,
}

impl StaticSecretStore {
    pub fn new(blinder: impl Into<String>, login: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            blinder: Zeroizing::new(blinder.into()),
            credentials: IssuerCredentials {
                login: login.into(),
                password: Zeroizing::new(password.into()),
            },
        }
    }
}

#[async_trait]
impl SecretStore for StaticSecretStore {
    async fn blinder(&self) -> Result<Zeroizing<String>, SecretError> {
        if self.blinder.is_empty() {
            return Err(SecretError::Missing {
                key: "blinder".into(),
                path: "config".into(),
            });
        }
        Ok(self.blinder.clone())
    }

    async fn issuer_credentials(&self) -> Result<IssuerCredentials, SecretError> {
        Ok(self.credentials.clone())
    }
}

#[derive(Deserialize)]
struct KvEnvelope {
    data: KvData,
}

#[derive(Deserialize)]
struct KvData {
    data: HashMap<String, serde_json::Value>,
}

/// HashiCorp Vault KV version 2 over its HTTP API.
pub struct VaultSecretStore {
    client: reqwest::Client,
    address: String,
    mount: String,
    token: Zeroizing<String>,
    issuer_path: String,
    verifier_path: String,
}

impl std::fmt::Debug for VaultSecretStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultSecretStore")
            .field("address", &self.address)
            .field("mount", &self.mount)
            .finish_non_exhaustive()
    }
}

impl VaultSecretStore {
    pub const DEFAULT_MOUNT: &'static str = "secret";
    pub const ISSUER_PATH: &'static str = "issuer";
    pub const VERIFIER_PATH: &'static str = "verifier";

    pub fn new(
        address: impl Into<String>,
        mount: impl Into<String>,
        token: Zeroizing<String>,
        timeout: Duration,
    ) -> Result<Self, SecretError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SecretError::Unavailable(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            address: address.into().trim_end_matches('/').to_string(),
            mount: mount.into().trim_matches('/').to_string(),
            token,
            issuer_path: Self::ISSUER_PATH.into(),
            verifier_path: Self::VERIFIER_PATH.into(),
        })
    }

    async fn read(&self, path: &str) -> Result<HashMap<String, serde_json::Value>, SecretError> {
        let url = format!("{}/v1/{}/data/{}", self.address, self.mount, path);
        let response = self
            .client
            .get(&url)
            .header("X-Vault-Token", self.token.as_str())
            .send()
            .await
            .map_err(|e| SecretError::Unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SecretError::Api {
                status: status.as_u16(),
                path: path.to_string(),
            });
        }

        let envelope: KvEnvelope = response
            .json()
            .await
            .map_err(|e| SecretError::Malformed(e.to_string()))?;
        tracing::debug!(mount = %self.mount, path, "secret read from vault");
        Ok(envelope.data.data)
    }

    fn field(
        data: &HashMap<String, serde_json::Value>,
        key: &str,
        path: &str,
    ) -> Result<Zeroizing<String>, SecretError> {
        match data.get(key) {
            Some(serde_json::Value::String(s)) if !s.is_empty() => Ok(Zeroizing::new(s.clone())),
            Some(serde_json::Value::Number(n)) => Ok(Zeroizing::new(n.to_string())),
            _ => Err(SecretError::Missing {
                key: key.to_string(),
                path: path.to_string(),
            }),
        }
    }
}

#[async_trait]
impl SecretStore for VaultSecretStore {
    async fn blinder(&self) -> Result<Zeroizing<String>, SecretError> {
        let data = self.read(&self.verifier_path).await?;
        Self::field(&data, "blinder", &self.verifier_path)
    }

    async fn issuer_credentials(&self) -> Result<IssuerCredentials, SecretError> {
        let data = self.read(&self.issuer_path).await?;
        let login = Self::field(&data, "login", &self.issuer_path)?;
        let password = Self::field(&data, "password", &self.issuer_path)?;
        Ok(IssuerCredentials {
            login: login.to_string(),
            password,
        })
    }
}
