//! In-memory claim store for development and tests.
//!
//! Transactions stage their writes and apply them atomically on commit.
//! Per-key locks come from a registry of async mutexes, so two transactions
//! locking the same user or document run one after the other.

use async_trait::async_trait;
use dashmap::DashMap;
use passid_core::{ClaimRecord, Did, PageParams, ProofRecord};
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use uuid::Uuid;

use super::{ClaimStore, ClaimTx, StorageError};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    claims: Vec<ClaimRecord>,
    proofs: Vec<ProofRecord>,
}

type LockRegistry = DashMap<String, Arc<Mutex<()>>>;

#[derive(Debug, Clone)]
enum StagedWrite {
    InsertClaim(ClaimRecord),
    InsertProof(ProofRecord),
    Ban(String),
    Delete(Uuid),
}

impl StagedWrite {
    fn apply(&self, state: &mut MemoryState) -> Result<(), StorageError> {
        match self {
            StagedWrite::InsertClaim(claim) => {
                if state.claims.iter().any(|c| c.user_did == claim.user_did) {
                    return Err(StorageError::DuplicateClaim(claim.user_did.clone()));
                }
                state.claims.push(claim.clone());
            }
            StagedWrite::InsertProof(proof) => {
                if !state.claims.iter().any(|c| c.id == proof.claim_id) {
                    return Err(StorageError::NotFound(proof.claim_id));
                }
                state.proofs.push(proof.clone());
            }
            StagedWrite::Ban(hash) => {
                for claim in state.claims.iter_mut().filter(|c| &c.document_hash == hash) {
                    claim.is_banned = true;
                }
            }
            StagedWrite::Delete(id) => {
                let before = state.claims.len();
                state.claims.retain(|c| c.id != *id);
                if state.claims.len() == before {
                    return Err(StorageError::NotFound(*id));
                }
                state.proofs.retain(|p| p.claim_id != *id);
            }
        }
        Ok(())
    }
}

/// Claim store holding everything in process memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryClaimStore {
    state: Arc<RwLock<MemoryState>>,
    locks: Arc<LockRegistry>,
}

impl MemoryClaimStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all committed claims.
    pub async fn claims(&self) -> Vec<ClaimRecord> {
        self.state.read().await.claims.clone()
    }

    /// Snapshot of all committed proofs.
    pub async fn proofs(&self) -> Vec<ProofRecord> {
        self.state.read().await.proofs.clone()
    }
}

#[async_trait]
impl ClaimStore for MemoryClaimStore {
    async fn begin(&self) -> Result<Box<dyn ClaimTx>, StorageError> {
        Ok(Box::new(MemoryClaimTx {
            state: self.state.clone(),
            locks: self.locks.clone(),
            guards: Vec::new(),
            staged: Vec::new(),
        }))
    }

    async fn claim_by_user(&self, user_did: &Did) -> Result<Option<ClaimRecord>, StorageError> {
        let state = self.state.read().await;
        Ok(state
            .claims
            .iter()
            .find(|c| c.user_did == user_did.uri())
            .cloned())
    }

    async fn document_hashes(&self, page: PageParams) -> Result<Vec<String>, StorageError> {
        let state = self.state.read().await;
        let hashes: BTreeSet<&String> = state.claims.iter().map(|c| &c.document_hash).collect();
        Ok(hashes
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit as usize)
            .cloned()
            .collect())
    }

    async fn salts_for_document(&self, document_hash: &str) -> Result<Vec<String>, StorageError> {
        let state = self.state.read().await;
        let mut claims: Vec<&ClaimRecord> = state
            .claims
            .iter()
            .filter(|c| c.document_hash == document_hash)
            .collect();
        claims.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));
        Ok(claims.into_iter().map(|c| c.salt.clone()).collect())
    }
}

/// Staged writes plus the key locks held by one transaction.
pub struct MemoryClaimTx {
    state: Arc<RwLock<MemoryState>>,
    locks: Arc<LockRegistry>,
    guards: Vec<OwnedMutexGuard<()>>,
    staged: Vec<StagedWrite>,
}

impl MemoryClaimTx {
    async fn lock_key(&mut self, key: String) {
        let mutex = self.locks.entry(key).or_default().clone();
        self.guards.push(mutex.lock_owned().await);
    }

    /// Committed state with this transaction's writes applied.
    async fn view(&self) -> Result<MemoryState, StorageError> {
        let mut view = self.state.read().await.clone();
        for write in &self.staged {
            write.apply(&mut view)?;
        }
        Ok(view)
    }

    async fn stage(&mut self, write: StagedWrite) -> Result<(), StorageError> {
        let mut view = self.view().await?;
        write.apply(&mut view)?;
        self.staged.push(write);
        Ok(())
    }
}

#[async_trait]
impl ClaimTx for MemoryClaimTx {
    async fn lock_user(&mut self, user_did: &Did) -> Result<(), StorageError> {
        self.lock_key(format!("user:{}", user_did.uri())).await;
        Ok(())
    }

    async fn lock_document(&mut self, document_hash: &str) -> Result<(), StorageError> {
        self.lock_key(format!("document:{}", document_hash)).await;
        Ok(())
    }

    async fn claim_by_user(&mut self, user_did: &Did) -> Result<Option<ClaimRecord>, StorageError> {
        let view = self.view().await?;
        Ok(view.claims.into_iter().find(|c| c.user_did == user_did.uri()))
    }

    async fn claims_by_document(
        &mut self,
        document_hash: &str,
    ) -> Result<Vec<ClaimRecord>, StorageError> {
        let view = self.view().await?;
        let mut claims: Vec<ClaimRecord> = view
            .claims
            .into_iter()
            .filter(|c| c.document_hash == document_hash)
            .collect();
        claims.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));
        Ok(claims)
    }

    async fn ban_document(&mut self, document_hash: &str) -> Result<u64, StorageError> {
        let affected = self
            .view()
            .await?
            .claims
            .iter()
            .filter(|c| c.document_hash == document_hash)
            .count() as u64;
        self.stage(StagedWrite::Ban(document_hash.to_string())).await?;
        Ok(affected)
    }

    async fn delete_claim(&mut self, claim_id: Uuid) -> Result<(), StorageError> {
        self.stage(StagedWrite::Delete(claim_id)).await
    }

    async fn insert_claim(&mut self, claim: &ClaimRecord) -> Result<(), StorageError> {
        self.stage(StagedWrite::InsertClaim(claim.clone())).await
    }

    async fn insert_proof(&mut self, proof: &ProofRecord) -> Result<(), StorageError> {
        self.stage(StagedWrite::InsertProof(proof.clone())).await
    }

    async fn commit(self: Box<Self>) -> Result<(), StorageError> {
        let mut state = self.state.write().await;
        let mut next = state.clone();
        for write in &self.staged {
            write.apply(&mut next)?;
        }
        *state = next;
        Ok(())
    }
}
