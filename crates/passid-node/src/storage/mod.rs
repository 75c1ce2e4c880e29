//! Claim and proof persistence.
//!
//! Registration work happens inside a [`ClaimTx`]: locks taken through it are
//! held until the transaction commits or is dropped, and dropping an
//! uncommitted transaction discards everything it wrote.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use passid_core::{ClaimRecord, Did, PageParams, ProofRecord};
use uuid::Uuid;

pub use memory::MemoryClaimStore;
pub use postgres::PgClaimStore;

/// Storage errors.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("claim for {0} already exists")]
    DuplicateClaim(String),

    #[error("claim not found: {0}")]
    NotFound(Uuid),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Read access to claims plus the entry point for transactions.
#[async_trait]
pub trait ClaimStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn ClaimTx>, StorageError>;

    async fn claim_by_user(&self, user_did: &Did) -> Result<Option<ClaimRecord>, StorageError>;

    /// Distinct document hashes, ordered, for one page.
    async fn document_hashes(&self, page: PageParams) -> Result<Vec<String>, StorageError>;

    /// Salts of every claim for a document, oldest first.
    async fn salts_for_document(&self, document_hash: &str) -> Result<Vec<String>, StorageError>;
}

/// A unit of registration work.
#[async_trait]
pub trait ClaimTx: Send {
    /// Serialize all transactions touching `user_did`.
    async fn lock_user(&mut self, user_did: &Did) -> Result<(), StorageError>;

    /// Serialize all transactions touching `document_hash`.
    async fn lock_document(&mut self, document_hash: &str) -> Result<(), StorageError>;

    async fn claim_by_user(&mut self, user_did: &Did) -> Result<Option<ClaimRecord>, StorageError>;

    async fn claims_by_document(
        &mut self,
        document_hash: &str,
    ) -> Result<Vec<ClaimRecord>, StorageError>;

    /// Mark every claim for `document_hash` as banned. Returns the number of rows.
    async fn ban_document(&mut self, document_hash: &str) -> Result<u64, StorageError>;

    async fn delete_claim(&mut self, claim_id: Uuid) -> Result<(), StorageError>;

    async fn insert_claim(&mut self, claim: &ClaimRecord) -> Result<(), StorageError>;

    async fn insert_proof(&mut self, proof: &ProofRecord) -> Result<(), StorageError>;

    async fn commit(self: Box<Self>) -> Result<(), StorageError>;
}
