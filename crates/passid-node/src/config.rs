//! Node configuration loading, validation and management.

use passid_core::{Did, MultiAccountLimits, TreeParams};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use zeroize::Zeroizing;

use crate::registration::DocumentPolicy;

pub const VAULT_TOKEN_ENV: &str = "VAULT_TOKEN";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot access {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("cannot serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Full configuration for the identity provider node.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NodeConfig {
    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub verifier: VerifierConfig,

    #[serde(default)]
    pub anti_sybil: AntiSybilConfig,

    #[serde(default)]
    pub issuer: IssuerConfig,

    #[serde(default)]
    pub secrets: SecretsConfig,

    #[serde(default)]
    pub prover: ProverConfig,

    #[serde(default)]
    pub workers: WorkersConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_addr")]
    pub listen_addr: String,
    #[serde(default = "default_api_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Postgres connection URL. Empty selects the in-memory store.
    #[serde(default)]
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (text, json).
    #[serde(default = "default_log_format")]
    pub format: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifierConfig {
    /// PEM bundle of trusted CSCA master certificates.
    #[serde(default = "default_master_certs_path")]
    pub master_certs_path: PathBuf,
    /// Verification key of the SHA1-family passport circuit.
    #[serde(default = "default_sha1_key_path")]
    pub sha1_verification_key_path: PathBuf,
    /// Verification key of the SHA256-family passport circuit.
    #[serde(default = "default_sha256_key_path")]
    pub sha256_verification_key_path: PathBuf,
    #[serde(default = "default_min_age")]
    pub min_age: u32,
    #[serde(default = "default_registration_timeout_secs")]
    pub registration_timeout_secs: u64,
    #[serde(default)]
    pub document_policy: DocumentPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AntiSybilConfig {
    #[serde(default = "default_min_accounts")]
    pub min_accounts: u32,
    #[serde(default = "default_max_accounts")]
    pub max_accounts: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuerConfig {
    #[serde(default = "default_issuer_url")]
    pub base_url: String,
    /// DID reported to clients as the credential issuer.
    #[serde(default)]
    pub did: String,
    #[serde(default = "default_claim_type")]
    pub claim_type: String,
    #[serde(default = "default_credential_schema")]
    pub credential_schema: String,
    #[serde(default = "default_issuer_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecretsBackend {
    #[default]
    Static,
    Vault,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SecretsConfig {
    #[serde(default)]
    pub backend: SecretsBackend,
    /// Development secrets, used by the static backend.
    #[serde(default)]
    pub blinder: String,
    #[serde(default)]
    pub issuer_login: String,
    #[serde(default)]
    pub issuer_password: String,
    #[serde(default)]
    pub vault: VaultConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultConfig {
    #[serde(default = "default_vault_addr")]
    pub address: String,
    #[serde(default = "default_vault_mount")]
    pub mount_path: String,
    #[serde(default = "default_vault_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProverConfig {
    #[serde(default = "default_nullifiers_count")]
    pub nullifiers_count: usize,
    #[serde(default = "default_tree_depth")]
    pub tree_depth: u32,
    /// Verification key of the uniqueness circuit.
    #[serde(default = "default_uniqueness_key_path")]
    pub verification_key_path: PathBuf,
    /// Witness generator; invoked as `<command…> input.json witness.wtns`.
    #[serde(default = "default_witness_command")]
    pub witness_command: Vec<String>,
    /// Prover; invoked as `<command…> witness.wtns proof.json public.json`.
    #[serde(default = "default_prover_command")]
    pub prover_command: Vec<String>,
    #[serde(default)]
    pub work_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WorkersConfig {
    /// Concurrent CPU-bound jobs. Zero uses the available parallelism.
    #[serde(default)]
    pub size: usize,
}

// Default value functions
fn default_api_addr() -> String {
    "127.0.0.1".into()
}
fn default_api_port() -> u16 {
    8000
}
fn default_max_connections() -> u32 {
    10
}
fn default_acquire_timeout_secs() -> u64 {
    5
}
fn default_log_level() -> String {
    "info".into()
}
fn default_log_format() -> String {
    "text".into()
}
fn default_master_certs_path() -> PathBuf {
    PathBuf::from("./certs/master_certs.pem")
}
fn default_sha1_key_path() -> PathBuf {
    PathBuf::from("./keys/passport_sha1.json")
}
fn default_sha256_key_path() -> PathBuf {
    PathBuf::from("./keys/passport_sha256.json")
}
fn default_min_age() -> u32 {
    18
}
fn default_registration_timeout_secs() -> u64 {
    30
}
fn default_min_accounts() -> u32 {
    3
}
fn default_max_accounts() -> u32 {
    5
}
fn default_issuer_url() -> String {
    "http://127.0.0.1:3001/v1".into()
}
fn default_claim_type() -> String {
    "IdentityProviders".into()
}
fn default_credential_schema() -> String {
    "https://schemas.example.org/identity-providers.json".into()
}
fn default_issuer_timeout_secs() -> u64 {
    10
}
fn default_vault_addr() -> String {
    "http://127.0.0.1:8200".into()
}
fn default_vault_mount() -> String {
    "secret".into()
}
fn default_vault_timeout_secs() -> u64 {
    5
}
fn default_nullifiers_count() -> usize {
    10
}
fn default_tree_depth() -> u32 {
    4
}
fn default_uniqueness_key_path() -> PathBuf {
    PathBuf::from("./keys/uniqueness.json")
}
fn default_witness_command() -> Vec<String> {
    vec!["./circuits/uniqueness_witness".into()]
}
fn default_prover_command() -> Vec<String> {
    vec![
        "rapidsnark".into(),
        "./circuits/uniqueness.zkey".into(),
    ]
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_api_addr(),
            port: default_api_port(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: default_max_connections(),
            acquire_timeout_secs: default_acquire_timeout_secs(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            master_certs_path: default_master_certs_path(),
            sha1_verification_key_path: default_sha1_key_path(),
            sha256_verification_key_path: default_sha256_key_path(),
            min_age: default_min_age(),
            registration_timeout_secs: default_registration_timeout_secs(),
            document_policy: DocumentPolicy::default(),
        }
    }
}

impl Default for AntiSybilConfig {
    fn default() -> Self {
        Self {
            min_accounts: default_min_accounts(),
            max_accounts: default_max_accounts(),
        }
    }
}

impl Default for IssuerConfig {
    fn default() -> Self {
        Self {
            base_url: default_issuer_url(),
            did: String::new(),
            claim_type: default_claim_type(),
            credential_schema: default_credential_schema(),
            timeout_secs: default_issuer_timeout_secs(),
        }
    }
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            address: default_vault_addr(),
            mount_path: default_vault_mount(),
            timeout_secs: default_vault_timeout_secs(),
        }
    }
}

impl Default for ProverConfig {
    fn default() -> Self {
        Self {
            nullifiers_count: default_nullifiers_count(),
            tree_depth: default_tree_depth(),
            verification_key_path: default_uniqueness_key_path(),
            witness_command: default_witness_command(),
            prover_command: default_prover_command(),
            work_dir: None,
        }
    }
}

impl NodeConfig {
    /// Load config from a TOML file, falling back to defaults for missing fields.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            Ok(toml::from_str(&contents)?)
        } else {
            Ok(Self::default())
        }
    }

    /// Save the current config to a TOML file.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(self)?;
        let io = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io)?;
        }
        std::fs::write(path, contents).map_err(io)
    }

    /// Check every value that can be checked without touching the network
    /// or the filesystem.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.api_addr()?;
        let limits = self.multi_account_limits()?;
        let tree = self.tree_params()?;
        // Every account of a document must fit in one uniqueness tree.
        if limits.max as usize > tree.nullifiers_count {
            return Err(invalid(format!(
                "anti_sybil.max_accounts ({}) exceeds prover.nullifiers_count ({})",
                limits.max,
                tree.nullifiers_count
            )));
        }

        if !matches!(self.logging.format.as_str(), "text" | "json") {
            return Err(invalid(format!(
                "logging.format must be \"text\" or \"json\", got {:?}",
                self.logging.format
            )));
        }
        if self.database.max_connections == 0 {
            return Err(invalid("database.max_connections must be at least 1"));
        }
        if self.verifier.registration_timeout_secs == 0 {
            return Err(invalid("verifier.registration_timeout_secs must be at least 1"));
        }
        if self.issuer.base_url.is_empty() {
            return Err(invalid("issuer.base_url is required"));
        }
        Did::new(self.issuer.did.as_str())
            .map_err(|e| invalid(format!("issuer.did: {}", e)))?;
        if self.issuer.timeout_secs == 0 {
            return Err(invalid("issuer.timeout_secs must be at least 1"));
        }
        if self.prover.witness_command.is_empty() || self.prover.prover_command.is_empty() {
            return Err(invalid("prover.witness_command and prover.prover_command are required"));
        }
        match self.secrets.backend {
            SecretsBackend::Static if self.secrets.blinder.is_empty() => {
                return Err(invalid("secrets.blinder is required for the static backend"));
            }
            SecretsBackend::Vault if self.secrets.vault.address.is_empty() => {
                return Err(invalid("secrets.vault.address is required for the vault backend"));
            }
            _ => {}
        }
        Ok(())
    }

    pub fn api_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.api.listen_addr, self.api.port)
            .parse()
            .map_err(|e| invalid(format!("api.listen_addr: {}", e)))
    }

    pub fn multi_account_limits(&self) -> Result<MultiAccountLimits, ConfigError> {
        MultiAccountLimits::new(self.anti_sybil.min_accounts, self.anti_sybil.max_accounts)
            .map_err(|e| invalid(format!("anti_sybil: {}", e)))
    }

    pub fn tree_params(&self) -> Result<TreeParams, ConfigError> {
        TreeParams::new(self.prover.nullifiers_count, self.prover.tree_depth)
            .map_err(|e| invalid(format!("prover: {}", e)))
    }

    pub fn registration_timeout(&self) -> Duration {
        Duration::from_secs(self.verifier.registration_timeout_secs)
    }
}

impl VaultConfig {
    /// Read the Vault token from the environment and clear the variable so
    /// child processes do not inherit it.
    pub fn take_token() -> Result<Zeroizing<String>, ConfigError> {
        let token = std::env::var(VAULT_TOKEN_ENV)
            .map_err(|_| invalid(format!("{} is not set", VAULT_TOKEN_ENV)))?;
        std::env::remove_var(VAULT_TOKEN_ENV);
        Ok(Zeroizing::new(token))
    }
}

fn invalid(msg: impl Into<String>) -> ConfigError {
    ConfigError::Invalid(msg.into())
}
