//! Global identity state tree (GIST) data for a user.
//!
//! The data lives in an on-chain state contract. The node only routes the
//! request; an implementation of [`GistDataSource`] supplies the values.

use async_trait::async_trait;
use passid_core::Did;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum GistError {
    #[error("requested block {requested} is ahead of the latest block {latest}")]
    BlockAhead { requested: u64, latest: u64 },

    #[error("state source error: {0}")]
    Source(String),
}

/// Sparse Merkle proof of a user's entry in the GIST.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GistProof {
    pub root: String,
    pub existence: bool,
    pub siblings: Vec<String>,
    pub index: String,
    pub value: String,
    pub aux_existence: bool,
    pub aux_index: String,
    pub aux_value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GistData {
    pub gist_root: String,
    pub gist_proof: GistProof,
}

#[async_trait]
pub trait GistDataSource: Send + Sync {
    /// GIST proof for `user_did` at `block_number`, or at the latest block
    /// when `None`.
    async fn gist_data(&self, user_did: &Did, block_number: Option<u64>) -> Result<GistData, GistError>;
}
