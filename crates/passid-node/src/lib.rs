//! Passid node: the passport identity provider service.
//!
//! - `registration`: claim lifecycle for `create-identity`
//! - `anti_sybil`: per-document account limits
//! - `uniqueness`: nullifier-tree proofs per document
//! - `storage`: Postgres and in-memory claim stores
//! - `api`: HTTP routes and JSON:API envelopes

pub mod anti_sybil;
pub mod api;
pub mod config;
pub mod error;
pub mod gist;
pub mod node;
pub mod registration;
pub mod storage;
pub mod uniqueness;
pub mod workers;

pub use anti_sybil::{AntiSybilEngine, Verdict};
pub use api::{build_router, start_api_server, AppState, API_PREFIX};
pub use config::{ConfigError, NodeConfig};
pub use error::ApiError;
pub use gist::{GistData, GistDataSource, GistError, GistProof};
pub use node::{IdentityProviderNode, NodeError};
pub use registration::{
    ClaimLifecycleOrchestrator, Clock, DocumentPolicy, ErrorClass, PassportVerifier,
    RegistrationError, RegistrationRequest, RegistrationSettings, RegistrationVerifier,
    SystemClock, ValidatedRegistration,
};
pub use storage::{ClaimStore, ClaimTx, MemoryClaimStore, PgClaimStore, StorageError};
pub use uniqueness::{DocumentUniqueness, UniquenessError, UniquenessService};
pub use workers::{WorkerError, WorkerPool};
