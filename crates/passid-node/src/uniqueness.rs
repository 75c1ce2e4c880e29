//! Uniqueness proofs over the accounts registered with each document.

use ark_bn254::Fr;
use futures::future::join_all;
use passid_core::{PageParams, TreeParams, ZkProof};
use passid_crypto::{parse_field, CryptoError};
use passid_proof::{CircuitInputs, CircuitProver, ProofError};
use std::sync::Arc;

use crate::storage::{ClaimStore, StorageError};
use crate::workers::{WorkerError, WorkerPool};

#[derive(Debug, thiserror::Error)]
pub enum UniquenessError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("stored value is not a field element: {0}")]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Proof(#[from] ProofError),

    #[error(transparent)]
    Worker(#[from] WorkerError),
}

impl UniquenessError {
    /// Errors caused by one document's stored data rather than the service.
    pub fn is_document_fault(&self) -> bool {
        matches!(
            self,
            Self::Crypto(_) | Self::Proof(ProofError::TooManySalts { .. })
        )
    }
}

/// A proof for one document hash.
#[derive(Debug, Clone)]
pub struct DocumentUniqueness {
    pub document_hash: String,
    pub root: Fr,
    pub proof: ZkProof,
}

pub struct UniquenessService {
    store: Arc<dyn ClaimStore>,
    prover: Arc<dyn CircuitProver>,
    workers: WorkerPool,
    params: TreeParams,
    blinder: Fr,
}

impl UniquenessService {
    pub fn new(
        store: Arc<dyn ClaimStore>,
        prover: Arc<dyn CircuitProver>,
        workers: WorkerPool,
        params: TreeParams,
        blinder: Fr,
    ) -> Self {
        Self {
            store,
            prover,
            workers,
            params,
            blinder,
        }
    }

    /// Prove uniqueness for every document hash on `page`, in hash order.
    ///
    /// A document whose stored data cannot be proven is logged and left out;
    /// storage, worker and prover failures fail the whole page.
    pub async fn proofs(&self, page: PageParams) -> Result<Vec<DocumentUniqueness>, UniquenessError> {
        let hashes = self.store.document_hashes(page).await?;
        tracing::debug!(
            page = page.number,
            limit = page.limit,
            documents = hashes.len(),
            "building uniqueness proofs"
        );
        let results = join_all(hashes.into_iter().map(|hash| async move {
            self.prove_document(hash.clone()).await.map_err(|err| (hash, err))
        }))
        .await;

        let mut proofs = Vec::with_capacity(results.len());
        for result in results {
            match result {
                Ok(proof) => proofs.push(proof),
                Err((document_hash, err)) if err.is_document_fault() => {
                    tracing::error!(
                        document_hash = %document_hash,
                        error = %err,
                        "skipping document in uniqueness page"
                    );
                }
                Err((_, err)) => return Err(err),
            }
        }
        Ok(proofs)
    }

    async fn prove_document(&self, document_hash: String) -> Result<DocumentUniqueness, UniquenessError> {
        let salts = self
            .store
            .salts_for_document(&document_hash)
            .await?
            .iter()
            .map(|s| parse_field(s))
            .collect::<Result<Vec<_>, _>>()?;
        let hash = parse_field(&document_hash)?;

        let params = self.params;
        let blinder = self.blinder;
        let inputs = self
            .workers
            .run_blocking(move || CircuitInputs::build(&params, &blinder, &hash, &salts))
            .await??;

        let proof = self.workers.run(self.prover.prove(&inputs)).await??;
        tracing::info!(document_hash = %document_hash, "uniqueness proof generated");

        Ok(DocumentUniqueness {
            document_hash,
            root: inputs.root,
            proof,
        })
    }
}
