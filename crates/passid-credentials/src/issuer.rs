use async_trait::async_trait;
use chrono::{DateTime, Utc};
use passid_core::Did;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::error::IssuerError;
use crate::secrets::IssuerCredentials;

/// Header carrying the deduplication key for credential issuance.
pub const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

/// Longest response body excerpt kept in an error.
const BODY_EXCERPT: usize = 1024;

/// Everything the issuer needs to mint an identity credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueRequest {
    pub subject: Did,
    pub is_adult: bool,
    pub issuing_authority: i64,
    pub document_nullifier: String,
    pub expiration: DateTime<Utc>,
    pub idempotency_key: String,
}

/// Credential as reported by the issuer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialRecord {
    pub id: String,
    #[serde(default)]
    pub revoked: bool,
    #[serde(default)]
    pub rev_nonce: i64,
    #[serde(default)]
    pub expired: bool,
    #[serde(default, rename = "userID")]
    pub user_id: String,
    #[serde(default)]
    pub schema_type: String,
}

/// Issues, inspects and revokes credentials at the external issuer.
#[async_trait]
pub trait CredentialIssuer: Send + Sync {
    /// Issue a credential and return the issuer-assigned claim id.
    async fn issue(&self, request: &IssueRequest) -> Result<Uuid, IssuerError>;

    async fn get_credential(&self, claim_id: Uuid) -> Result<CredentialRecord, IssuerError>;

    async fn revoke(&self, rev_nonce: i64) -> Result<(), IssuerError>;
}

/// Deduplication key for one registration: blake3 over the user DID and the
/// document hash, each prefixed with its length as a big-endian `u64`.
pub fn idempotency_key(user_did: &Did, document_hash: &str) -> String {
    let mut hasher = blake3::Hasher::new();
    for field in [user_did.uri().as_bytes(), document_hash.as_bytes()] {
        hasher.update(&(field.len() as u64).to_be_bytes());
        hasher.update(field);
    }
    hasher.finalize().to_hex().to_string()
}

/// Static parameters of the issuer integration.
#[derive(Debug, Clone)]
pub struct IssuerSettings {
    pub base_url: String,
    pub credential_schema: String,
    pub claim_type: String,
    pub timeout: Duration,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CredentialRequest<'a> {
    credential_schema: &'a str,
    #[serde(rename = "type")]
    claim_type: &'a str,
    credential_subject: CredentialSubject<'a>,
    expiration: DateTime<Utc>,
    mt_proof: bool,
    signature_proof: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CredentialSubject<'a> {
    id: &'a str,
    is_adult: bool,
    issuing_authority: i64,
    document_nullifier: &'a str,
}

#[derive(Deserialize)]
struct IdResponse {
    id: String,
}

/// HTTP client for the issuer's credential API, authenticated with basic auth.
pub struct HttpCredentialIssuer {
    client: reqwest::Client,
    base_url: String,
    credential_schema: String,
    claim_type: String,
    login: String,
    password: Zeroizing<String>,
}

impl std::fmt::Debug for HttpCredentialIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpCredentialIssuer")
            .field("base_url", &self.base_url)
            .field("claim_type", &self.claim_type)
            .field("login", &self.login)
            .finish_non_exhaustive()
    }
}

impl HttpCredentialIssuer {
    pub fn new(settings: IssuerSettings, credentials: IssuerCredentials) -> Result<Self, IssuerError> {
        if settings.base_url.is_empty() {
            return Err(IssuerError::Config("base_url is empty".into()));
        }
        let client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .user_agent(concat!("passid/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| IssuerError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            credential_schema: settings.credential_schema,
            claim_type: settings.claim_type,
            login: credentials.login,
            password: credentials.password,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        operation: &str,
    ) -> Result<reqwest::Response, IssuerError> {
        let response = request
            .basic_auth(&self.login, Some(self.password.as_str()))
            .send()
            .await?;

        let status = response.status().as_u16();
        if status > 299 {
            let body = response.text().await.unwrap_or_default();
            let body: String = body.chars().take(BODY_EXCERPT).collect();
            tracing::warn!(operation, status, "issuer rejected request");
            return Err(IssuerError::Api { status, body });
        }
        Ok(response)
    }
}

#[async_trait]
impl CredentialIssuer for HttpCredentialIssuer {
    async fn issue(&self, request: &IssueRequest) -> Result<Uuid, IssuerError> {
        let body = CredentialRequest {
            credential_schema: &self.credential_schema,
            claim_type: &self.claim_type,
            credential_subject: CredentialSubject {
                id: request.subject.uri(),
                is_adult: request.is_adult,
                issuing_authority: request.issuing_authority,
                document_nullifier: &request.document_nullifier,
            },
            expiration: request.expiration,
            mt_proof: true,
            signature_proof: true,
        };

        let response = self
            .send(
                self.client
                    .post(self.url("/credentials"))
                    .header(IDEMPOTENCY_HEADER, &request.idempotency_key)
                    .json(&body),
                "issue",
            )
            .await?;

        let id: IdResponse = response.json().await?;
        let claim_id = Uuid::parse_str(&id.id)
            .map_err(|e| IssuerError::InvalidResponse(format!("claim id {:?}: {}", id.id, e)))?;

        tracing::info!(
            subject = %request.subject,
            claim_id = %claim_id,
            issuing_authority = request.issuing_authority,
            "credential issued"
        );
        Ok(claim_id)
    }

    async fn get_credential(&self, claim_id: Uuid) -> Result<CredentialRecord, IssuerError> {
        let response = self
            .send(
                self.client.get(self.url(&format!("/credentials/{}", claim_id))),
                "get_credential",
            )
            .await?;
        Ok(response.json().await?)
    }

    async fn revoke(&self, rev_nonce: i64) -> Result<(), IssuerError> {
        self.send(
            self.client
                .post(self.url(&format!("/credentials/revoke/{}", rev_nonce))),
            "revoke",
        )
        .await?;
        tracing::info!(rev_nonce, "credential revoked");
        Ok(())
    }
}
