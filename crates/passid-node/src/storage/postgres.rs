//! PostgreSQL claim store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use passid_core::{ClaimRecord, Did, PageParams, ProofRecord};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;
use sqlx::{Postgres, Transaction};
use std::time::Duration;
use uuid::Uuid;

use super::{ClaimStore, ClaimTx, StorageError};

/// Advisory lock namespaces; the second key is `hashtext(<value>)`.
const USER_LOCK_NAMESPACE: i32 = 1;
const DOCUMENT_LOCK_NAMESPACE: i32 = 2;

pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

const SELECT_BY_USER: &str = "SELECT id, user_did, issuer_did, nullifier, salt, document_hash, \
     created_at, is_banned FROM claims WHERE user_did = $1";
const SELECT_BY_DOCUMENT: &str = "SELECT id, user_did, issuer_did, nullifier, salt, \
     document_hash, created_at, is_banned FROM claims WHERE document_hash = $1 \
     ORDER BY created_at, id FOR UPDATE";
const SELECT_DOCUMENT_HASHES: &str =
    "SELECT DISTINCT document_hash FROM claims ORDER BY document_hash LIMIT $1 OFFSET $2";
const SELECT_SALTS: &str =
    "SELECT salt FROM claims WHERE document_hash = $1 ORDER BY created_at, id";
const ADVISORY_LOCK: &str = "SELECT pg_advisory_xact_lock($1, hashtext($2))";
const BAN_DOCUMENT: &str = "UPDATE claims SET is_banned = TRUE WHERE document_hash = $1";
const DELETE_CLAIM: &str = "DELETE FROM claims WHERE id = $1";
const INSERT_CLAIM: &str = "INSERT INTO claims \
     (id, user_did, issuer_did, nullifier, salt, document_hash, created_at, is_banned) \
     VALUES ($1, $2, $3, $4, $5, $6, $7, $8)";
const INSERT_PROOF: &str = "INSERT INTO proofs \
     (id, did, claim_id, proof_data, public_signals, document_sod) \
     VALUES ($1, $2, $3, $4, $5, $6)";

#[derive(sqlx::FromRow)]
struct ClaimRow {
    id: Uuid,
    user_did: String,
    issuer_did: String,
    nullifier: String,
    salt: String,
    document_hash: String,
    created_at: DateTime<Utc>,
    is_banned: bool,
}

impl From<ClaimRow> for ClaimRecord {
    fn from(row: ClaimRow) -> Self {
        ClaimRecord {
            id: row.id,
            user_did: row.user_did,
            issuer_did: row.issuer_did,
            nullifier: row.nullifier,
            salt: row.salt,
            document_hash: row.document_hash,
            created_at: row.created_at,
            is_banned: row.is_banned,
        }
    }
}

fn map_insert_error(e: sqlx::Error, user_did: &str) -> StorageError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StorageError::DuplicateClaim(user_did.to_string())
        }
        _ => StorageError::Database(e),
    }
}

/// Claim store backed by a pooled PostgreSQL connection.
#[derive(Debug, Clone)]
pub struct PgClaimStore {
    pool: PgPool,
}

impl PgClaimStore {
    pub async fn connect(
        url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self, StorageError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect(url)
            .await?;
        tracing::info!(max_connections, "connected to PostgreSQL");
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply all pending migrations.
    pub async fn migrate_up(&self) -> Result<(), StorageError> {
        MIGRATOR.run(&self.pool).await?;
        tracing::info!("migrations applied");
        Ok(())
    }

    /// Revert every applied migration.
    pub async fn migrate_down(&self) -> Result<(), StorageError> {
        MIGRATOR.undo(&self.pool, 0).await?;
        tracing::info!("migrations reverted");
        Ok(())
    }
}

#[async_trait]
impl ClaimStore for PgClaimStore {
    async fn begin(&self) -> Result<Box<dyn ClaimTx>, StorageError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgClaimTx { tx }))
    }

    async fn claim_by_user(&self, user_did: &Did) -> Result<Option<ClaimRecord>, StorageError> {
        let row = sqlx::query_as::<_, ClaimRow>(SELECT_BY_USER)
            .bind(user_did.uri())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(ClaimRecord::from))
    }

    async fn document_hashes(&self, page: PageParams) -> Result<Vec<String>, StorageError> {
        let hashes = sqlx::query_scalar::<_, String>(SELECT_DOCUMENT_HASHES)
            .bind(page.limit as i64)
            .bind(page.offset() as i64)
            .fetch_all(&self.pool)
            .await?;
        Ok(hashes)
    }

    async fn salts_for_document(&self, document_hash: &str) -> Result<Vec<String>, StorageError> {
        let salts = sqlx::query_scalar::<_, String>(SELECT_SALTS)
            .bind(document_hash)
            .fetch_all(&self.pool)
            .await?;
        Ok(salts)
    }
}

/// A registration transaction on one pooled connection.
pub struct PgClaimTx {
    tx: Transaction<'static, Postgres>,
}

impl PgClaimTx {
    async fn advisory_lock(&mut self, namespace: i32, key: &str) -> Result<(), StorageError> {
        sqlx::query(ADVISORY_LOCK)
            .bind(namespace)
            .bind(key)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl ClaimTx for PgClaimTx {
    async fn lock_user(&mut self, user_did: &Did) -> Result<(), StorageError> {
        self.advisory_lock(USER_LOCK_NAMESPACE, user_did.uri()).await
    }

    async fn lock_document(&mut self, document_hash: &str) -> Result<(), StorageError> {
        self.advisory_lock(DOCUMENT_LOCK_NAMESPACE, document_hash).await
    }

    async fn claim_by_user(&mut self, user_did: &Did) -> Result<Option<ClaimRecord>, StorageError> {
        let row = sqlx::query_as::<_, ClaimRow>(SELECT_BY_USER)
            .bind(user_did.uri())
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(row.map(ClaimRecord::from))
    }

    async fn claims_by_document(
        &mut self,
        document_hash: &str,
    ) -> Result<Vec<ClaimRecord>, StorageError> {
        let rows = sqlx::query_as::<_, ClaimRow>(SELECT_BY_DOCUMENT)
            .bind(document_hash)
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(rows.into_iter().map(ClaimRecord::from).collect())
    }

    async fn ban_document(&mut self, document_hash: &str) -> Result<u64, StorageError> {
        let result = sqlx::query(BAN_DOCUMENT)
            .bind(document_hash)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_claim(&mut self, claim_id: Uuid) -> Result<(), StorageError> {
        let result = sqlx::query(DELETE_CLAIM)
            .bind(claim_id)
            .execute(&mut *self.tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound(claim_id));
        }
        Ok(())
    }

    async fn insert_claim(&mut self, claim: &ClaimRecord) -> Result<(), StorageError> {
        sqlx::query(INSERT_CLAIM)
            .bind(claim.id)
            .bind(&claim.user_did)
            .bind(&claim.issuer_did)
            .bind(&claim.nullifier)
            .bind(&claim.salt)
            .bind(&claim.document_hash)
            .bind(claim.created_at)
            .bind(claim.is_banned)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_insert_error(e, &claim.user_did))?;
        Ok(())
    }

    async fn insert_proof(&mut self, proof: &ProofRecord) -> Result<(), StorageError> {
        sqlx::query(INSERT_PROOF)
            .bind(proof.id)
            .bind(&proof.did)
            .bind(proof.claim_id)
            .bind(Json(&proof.proof_data))
            .bind(Json(&proof.public_signals))
            .bind(Json(&proof.document_sod))
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StorageError> {
        let PgClaimTx { tx } = *self;
        tx.commit().await?;
        Ok(())
    }
}
