//! The identity provider node.
//!
//! Loads secrets and verification material, opens storage, wires the
//! registration and uniqueness services and serves the HTTP API.

use passid_credentials::{
    HttpCredentialIssuer, IssuerError, IssuerSettings, SecretError, SecretStore,
    StaticSecretStore, VaultSecretStore,
};
use passid_crypto::{parse_field, CryptoError};
use passid_document::{DocumentError, DocumentVerifier, TrustStore};
use passid_proof::{CommandProver, Groth16Verifier, ProofError, ProofValidator, VerificationKeys};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::anti_sybil::AntiSybilEngine;
use crate::api::{self, AppState};
use crate::config::{ConfigError, NodeConfig, SecretsBackend, VaultConfig};
use crate::registration::{ClaimLifecycleOrchestrator, PassportVerifier, RegistrationSettings};
use crate::storage::{ClaimStore, MemoryClaimStore, PgClaimStore, StorageError};
use crate::uniqueness::UniquenessService;
use crate::workers::WorkerPool;

#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("secrets: {0}")]
    Secrets(#[from] SecretError),

    #[error("blinder: {0}")]
    Blinder(#[from] CryptoError),

    #[error("trust store: {0}")]
    TrustStore(#[from] DocumentError),

    #[error("verification key: {0}")]
    VerificationKey(#[from] ProofError),

    #[error("issuer: {0}")]
    Issuer(#[from] IssuerError),

    #[error("storage: {0}")]
    Storage(#[from] StorageError),

    #[error("server: {0}")]
    Server(#[from] std::io::Error),
}

/// A fully wired node, ready to serve.
pub struct IdentityProviderNode {
    config: NodeConfig,
    state: Arc<AppState>,
}

impl IdentityProviderNode {
    /// Build every service from `config`. Fails on the first missing or
    /// invalid dependency.
    pub async fn build(config: NodeConfig) -> Result<Self, NodeError> {
        config.validate()?;

        let secrets = open_secrets(&config)?;
        let blinder = {
            let raw = secrets.blinder().await?;
            parse_field(raw.trim())?
        };
        let credentials = secrets.issuer_credentials().await?;

        let trust_store = Arc::new(TrustStore::load(&config.verifier.master_certs_path)?);
        tracing::info!(
            path = %config.verifier.master_certs_path.display(),
            "trust store loaded"
        );
        let keys = VerificationKeys::new(
            Arc::new(Groth16Verifier::load(&config.verifier.sha1_verification_key_path)?),
            Arc::new(Groth16Verifier::load(&config.verifier.sha256_verification_key_path)?),
        )?;
        let uniqueness_key = Arc::new(Groth16Verifier::load(&config.prover.verification_key_path)?);

        let store = open_store(&config).await?;
        let workers = match config.workers.size {
            0 => WorkerPool::default(),
            n => WorkerPool::new(n),
        };
        tracing::info!(workers = workers.size(), "worker pool ready");

        let issuer = HttpCredentialIssuer::new(
            IssuerSettings {
                base_url: config.issuer.base_url.clone(),
                credential_schema: config.issuer.credential_schema.clone(),
                claim_type: config.issuer.claim_type.clone(),
                timeout: Duration::from_secs(config.issuer.timeout_secs),
            },
            credentials,
        )?;

        let verifier = PassportVerifier::new(
            Arc::new(DocumentVerifier::new(trust_store)),
            Arc::new(ProofValidator::new(keys, config.verifier.min_age)),
            workers.clone(),
        );
        let registration = ClaimLifecycleOrchestrator::new(
            store.clone(),
            Arc::new(issuer),
            Arc::new(verifier),
            Arc::new(AntiSybilEngine::from_entropy(config.multi_account_limits()?)),
            workers.clone(),
            blinder,
            RegistrationSettings {
                issuer_did: config.issuer.did.clone(),
                timeout: config.registration_timeout(),
                policy: config.verifier.document_policy,
            },
        );

        let mut prover = CommandProver::new(
            config.prover.witness_command.clone(),
            config.prover.prover_command.clone(),
            uniqueness_key,
        )?;
        if let Some(dir) = &config.prover.work_dir {
            prover = prover.with_work_dir(dir.clone());
        }
        let uniqueness = UniquenessService::new(
            store,
            Arc::new(prover),
            workers,
            config.tree_params()?,
            blinder,
        );

        let state = Arc::new(AppState {
            registration: Arc::new(registration),
            uniqueness: Arc::new(uniqueness),
            gist: None,
            blinder,
        });

        tracing::info!(
            issuer_did = %config.issuer.did,
            policy = ?config.verifier.document_policy,
            "identity provider node created"
        );
        Ok(Self { config, state })
    }

    pub fn state(&self) -> Arc<AppState> {
        self.state.clone()
    }

    /// Serve the HTTP API until `shutdown` resolves.
    pub async fn run(self, shutdown: impl Future<Output = ()> + Send + 'static) -> Result<(), NodeError> {
        let addr = self.config.api_addr()?;
        api::start_api_server(addr, self.state, shutdown).await?;
        Ok(())
    }
}

fn open_secrets(config: &NodeConfig) -> Result<Arc<dyn SecretStore>, NodeError> {
    match config.secrets.backend {
        SecretsBackend::Static => {
            tracing::warn!("using secrets from the config file; do not do this in production");
            Ok(Arc::new(StaticSecretStore::new(
                config.secrets.blinder.clone(),
                config.secrets.issuer_login.clone(),
                config.secrets.issuer_password.clone(),
            )))
        }
        SecretsBackend::Vault => {
            let vault = &config.secrets.vault;
            let store = VaultSecretStore::new(
                vault.address.clone(),
                vault.mount_path.clone(),
                VaultConfig::take_token()?,
                Duration::from_secs(vault.timeout_secs),
            )?;
            tracing::info!(address = %vault.address, mount = %vault.mount_path, "using vault secrets");
            Ok(Arc::new(store))
        }
    }
}

async fn open_store(config: &NodeConfig) -> Result<Arc<dyn ClaimStore>, NodeError> {
    if config.database.url.is_empty() {
        tracing::warn!("database.url is empty; claims are kept in memory and lost on restart");
        return Ok(Arc::new(MemoryClaimStore::new()));
    }
    let store = PgClaimStore::connect(
        &config.database.url,
        config.database.max_connections,
        Duration::from_secs(config.database.acquire_timeout_secs),
    )
    .await?;
    Ok(Arc::new(store))
}
