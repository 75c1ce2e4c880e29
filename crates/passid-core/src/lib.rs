//! Passid Core: fundamental types, errors, and shared parameters for the
//! passport identity provider.

pub mod claim_state;
pub mod config;
pub mod error;
pub mod types;

pub use claim_state::{ClaimEvent, ClaimState, ClaimStateMachine};
pub use config::{MultiAccountLimits, TreeParams};
pub use error::CoreError;
pub use types::{
    ClaimRecord, Did, DocumentSod, HashFamily, IssuedClaim, PageParams, ProofPoints, ProofRecord,
    ZkProof,
};
