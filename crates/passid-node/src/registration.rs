//! Claim lifecycle orchestration for `create-identity`.
//!
//! A registration is validated before any storage work starts. The
//! transactional part then takes the user lock followed by the document lock,
//! applies the document policy, calls the issuer and writes the claim and
//! proof rows. Any failure before commit leaves storage untouched.

use ark_bn254::Fr;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use passid_core::{
    ClaimEvent, ClaimRecord, ClaimState, ClaimStateMachine, CoreError, Did, DocumentSod,
    IssuedClaim, ProofRecord, ZkProof,
};
use passid_credentials::{idempotency_key, CredentialIssuer, IssueRequest, IssuerError};
use passid_crypto::{field_to_decimal, registration_salt, CryptoError};
use passid_document::{DocumentError, DocumentVerifier};
use passid_proof::{ProofError, ProofValidator, ValidatedSignals};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::anti_sybil::{AntiSybilEngine, Verdict};
use crate::storage::{ClaimStore, ClaimTx, StorageError};
use crate::workers::{WorkerError, WorkerPool};

/// How a document that already backs other accounts is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentPolicy {
    /// Several accounts may share a document up to a randomized threshold.
    #[default]
    MultiAccount,
    /// A new registration revokes and replaces earlier claims for the document.
    Resubmission,
}

/// How an error is reported to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Validation,
    Conflict,
    Internal,
}

#[derive(Debug, thiserror::Error)]
pub enum RegistrationError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error(transparent)]
    Proof(#[from] ProofError),

    #[error("document is banned")]
    DocumentBanned,

    #[error("registration timed out after {0:?}")]
    Timeout(Duration),

    #[error("credential issuance failed: {0}")]
    IssuanceFailed(#[from] IssuerError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("hashing failed: {0}")]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Worker(#[from] WorkerError),

    #[error("claim state error: {0}")]
    State(#[from] CoreError),
}

impl RegistrationError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::InvalidRequest(_) => ErrorClass::Validation,
            Self::Document(DocumentError::TrustStore(_)) => ErrorClass::Internal,
            Self::Document(_) => ErrorClass::Validation,
            Self::Proof(e) if e.is_client_error() => ErrorClass::Validation,
            Self::DocumentBanned => ErrorClass::Conflict,
            _ => ErrorClass::Internal,
        }
    }
}

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A `create-identity` submission.
#[derive(Debug, Clone)]
pub struct RegistrationRequest {
    pub did: Did,
    pub proof: ZkProof,
    pub document_sod: DocumentSod,
}

/// Facts established by validation, consumed by the transactional part.
#[derive(Debug, Clone)]
pub struct ValidatedRegistration {
    pub signed_attributes: Vec<u8>,
    pub dg2_hash: Vec<u8>,
    pub signals: ValidatedSignals,
}

/// Validates a registration without side effects.
#[async_trait]
pub trait RegistrationVerifier: Send + Sync {
    async fn verify(
        &self,
        request: &RegistrationRequest,
        now: DateTime<Utc>,
    ) -> Result<ValidatedRegistration, RegistrationError>;
}

/// Document and proof verification on the worker pool.
pub struct PassportVerifier {
    documents: Arc<DocumentVerifier>,
    proofs: Arc<ProofValidator>,
    workers: WorkerPool,
}

impl PassportVerifier {
    pub fn new(documents: Arc<DocumentVerifier>, proofs: Arc<ProofValidator>, workers: WorkerPool) -> Self {
        Self {
            documents,
            proofs,
            workers,
        }
    }
}

#[async_trait]
impl RegistrationVerifier for PassportVerifier {
    async fn verify(
        &self,
        request: &RegistrationRequest,
        now: DateTime<Utc>,
    ) -> Result<ValidatedRegistration, RegistrationError> {
        let documents = self.documents.clone();
        let proofs = self.proofs.clone();
        let sod = request.document_sod.clone();
        let proof = request.proof.clone();

        self.workers
            .run_blocking(move || -> Result<ValidatedRegistration, RegistrationError> {
                let document = documents.verify_at(&sod, now)?;
                let signals = proofs.validate(
                    &proof,
                    document.algorithm.family(),
                    document.dg1_hash()?,
                    now.date_naive(),
                )?;
                let dg2_hash = document
                    .dg2_hash()
                    .ok_or_else(|| {
                        DocumentError::MalformedAsn1("security object has no DG2 hash".into())
                    })?
                    .to_vec();
                Ok(ValidatedRegistration {
                    signed_attributes: document.signed_attributes,
                    dg2_hash,
                    signals,
                })
            })
            .await?
    }
}

/// Static orchestration settings.
#[derive(Debug, Clone)]
pub struct RegistrationSettings {
    pub issuer_did: String,
    pub timeout: Duration,
    pub policy: DocumentPolicy,
}

struct DerivedHashes {
    document_hash: String,
    nullifier: String,
    document_nullifier: String,
    salt: u64,
}

pub struct ClaimLifecycleOrchestrator {
    store: Arc<dyn ClaimStore>,
    issuer: Arc<dyn CredentialIssuer>,
    verifier: Arc<dyn RegistrationVerifier>,
    anti_sybil: Arc<AntiSybilEngine>,
    workers: WorkerPool,
    clock: Arc<dyn Clock>,
    blinder: Fr,
    settings: RegistrationSettings,
}

impl ClaimLifecycleOrchestrator {
    pub fn new(
        store: Arc<dyn ClaimStore>,
        issuer: Arc<dyn CredentialIssuer>,
        verifier: Arc<dyn RegistrationVerifier>,
        anti_sybil: Arc<AntiSybilEngine>,
        workers: WorkerPool,
        blinder: Fr,
        settings: RegistrationSettings,
    ) -> Self {
        Self {
            store,
            issuer,
            verifier,
            anti_sybil,
            workers,
            clock: Arc::new(SystemClock),
            blinder,
            settings,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn issuer_did(&self) -> &str {
        &self.settings.issuer_did
    }

    /// Register `request`, bounded by the configured timeout.
    ///
    /// On timeout the open transaction is dropped and rolled back.
    pub async fn register(
        &self,
        request: RegistrationRequest,
    ) -> Result<IssuedClaim, RegistrationError> {
        match tokio::time::timeout(self.settings.timeout, self.register_inner(&request)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::error!(
                    user_did = %request.did,
                    timeout = ?self.settings.timeout,
                    "registration timed out"
                );
                Err(RegistrationError::Timeout(self.settings.timeout))
            }
        }
    }

    async fn register_inner(
        &self,
        request: &RegistrationRequest,
    ) -> Result<IssuedClaim, RegistrationError> {
        if let Some(existing) = self.store.claim_by_user(&request.did).await? {
            tracing::debug!(user_did = %request.did, claim_id = %existing.id, "claim already exists");
            return existing_outcome(&existing);
        }

        let now = self.clock.now();
        let validated = self.verifier.verify(request, now).await?;
        let hashes = self.derive_hashes(&validated, now).await?;

        let mut tx = self.store.begin().await?;
        tx.lock_user(&request.did).await?;
        tx.lock_document(&hashes.document_hash).await?;

        if let Some(existing) = tx.claim_by_user(&request.did).await? {
            return existing_outcome(&existing);
        }

        match self.settings.policy {
            DocumentPolicy::MultiAccount => {
                let verdict = self.anti_sybil.evaluate(&mut *tx, &hashes.document_hash).await?;
                match verdict {
                    Verdict::Permit { .. } => {}
                    Verdict::AlreadyBanned => return Err(RegistrationError::DocumentBanned),
                    Verdict::Banned { .. } => {
                        tx.commit().await?;
                        return Err(RegistrationError::DocumentBanned);
                    }
                }
            }
            DocumentPolicy::Resubmission => {
                self.revoke_outdated(&mut *tx, &hashes.document_hash).await?;
            }
        }

        let issue = IssueRequest {
            subject: request.did.clone(),
            is_adult: true,
            issuing_authority: validated.signals.issuing_authority,
            document_nullifier: hashes.document_nullifier.clone(),
            expiration: validated.signals.expiration,
            idempotency_key: idempotency_key(&request.did, &hashes.document_hash),
        };
        let claim_id = self.issuer.issue(&issue).await?;
        ClaimStateMachine::transition(ClaimState::None, ClaimEvent::Issue)?;

        let claim = ClaimRecord {
            id: claim_id,
            user_did: request.did.uri().to_string(),
            issuer_did: self.settings.issuer_did.clone(),
            nullifier: hashes.nullifier,
            salt: hashes.salt.to_string(),
            document_hash: hashes.document_hash,
            created_at: now,
            is_banned: false,
        };
        let proof = ProofRecord::new(&request.did, claim_id, &request.proof, &request.document_sod);

        if let Err(e) = persist(tx, &claim, &proof).await {
            tracing::error!(
                claim_id = %claim_id,
                user_did = %request.did,
                error = %e,
                "credential issued but claim was not persisted"
            );
            return Err(e.into());
        }

        tracing::info!(
            claim_id = %claim_id,
            user_did = %request.did,
            document_hash = %claim.document_hash,
            "identity registered"
        );
        Ok(claim.issued())
    }

    async fn derive_hashes(
        &self,
        validated: &ValidatedRegistration,
        now: DateTime<Utc>,
    ) -> Result<DerivedHashes, RegistrationError> {
        let blinder = self.blinder;
        let salt = registration_salt(now);
        let signed_attributes = validated.signed_attributes.clone();
        let dg2_hash = validated.dg2_hash.clone();

        let hashes = self
            .workers
            .run_blocking(move || -> Result<DerivedHashes, CryptoError> {
                let document_hash = passid_crypto::document_hash(&signed_attributes)?;
                let nullifier =
                    passid_crypto::nullifier(&document_hash, &blinder, &Fr::from(salt))?;
                let document_nullifier = passid_crypto::document_nullifier(&dg2_hash, &blinder)?;
                Ok(DerivedHashes {
                    document_hash: field_to_decimal(&document_hash),
                    nullifier: field_to_decimal(&nullifier),
                    document_nullifier: field_to_decimal(&document_nullifier),
                    salt,
                })
            })
            .await??;
        Ok(hashes)
    }

    /// Revoke and delete every earlier claim for the document.
    async fn revoke_outdated(
        &self,
        tx: &mut dyn ClaimTx,
        document_hash: &str,
    ) -> Result<(), RegistrationError> {
        for claim in tx.claims_by_document(document_hash).await? {
            if claim.is_banned {
                return Err(RegistrationError::DocumentBanned);
            }
            let revoked = ClaimStateMachine::transition(claim.state(), ClaimEvent::Revoke)?;

            let credential = self.issuer.get_credential(claim.id).await?;
            if !credential.revoked {
                self.issuer.revoke(credential.rev_nonce).await?;
            }
            ClaimStateMachine::transition(revoked, ClaimEvent::Delete)?;
            tx.delete_claim(claim.id).await?;

            tracing::info!(
                claim_id = %claim.id,
                user_did = %claim.user_did,
                document_hash,
                "outdated claim revoked"
            );
        }
        Ok(())
    }
}

fn existing_outcome(claim: &ClaimRecord) -> Result<IssuedClaim, RegistrationError> {
    if claim.is_banned {
        Err(RegistrationError::DocumentBanned)
    } else {
        Ok(claim.issued())
    }
}

async fn persist(
    mut tx: Box<dyn ClaimTx>,
    claim: &ClaimRecord,
    proof: &ProofRecord,
) -> Result<(), StorageError> {
    tx.insert_claim(claim).await?;
    tx.insert_proof(proof).await?;
    tx.commit().await
}
