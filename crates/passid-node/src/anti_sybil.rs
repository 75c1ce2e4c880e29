//! Per-document account accounting.
//!
//! Each registration draws a fresh threshold from the configured limits. A
//! document already registered by at least that many accounts gets all of
//! its claims banned, and a banned document never registers again.

use passid_core::{ClaimEvent, ClaimStateMachine, MultiAccountLimits};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Mutex;

use crate::storage::{ClaimTx, StorageError};

/// Outcome of accounting for one registration attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// The document is under its threshold; issuance may proceed.
    Permit { existing: usize, threshold: u32 },
    /// This attempt pushed the document over its threshold. The ban is
    /// staged in the transaction and must be committed.
    Banned { existing: usize, threshold: u32 },
    /// The document was banned earlier.
    AlreadyBanned,
}

pub struct AntiSybilEngine {
    limits: MultiAccountLimits,
    rng: Mutex<StdRng>,
}

impl AntiSybilEngine {
    pub fn new(limits: MultiAccountLimits, rng: StdRng) -> Self {
        Self {
            limits,
            rng: Mutex::new(rng),
        }
    }

    /// Engine seeded from OS entropy.
    pub fn from_entropy(limits: MultiAccountLimits) -> Self {
        Self::new(limits, StdRng::from_entropy())
    }

    pub fn limits(&self) -> MultiAccountLimits {
        self.limits
    }

    /// Draw a threshold uniformly from `[min, max]`.
    pub fn draw_threshold(&self) -> u32 {
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        rng.gen_range(self.limits.min..=self.limits.max)
    }

    /// Account for a new registration of `document_hash`.
    ///
    /// Must run inside `tx` after the document lock is held.
    pub async fn evaluate(
        &self,
        tx: &mut dyn ClaimTx,
        document_hash: &str,
    ) -> Result<Verdict, StorageError> {
        let claims = tx.claims_by_document(document_hash).await?;
        if claims.iter().any(|c| c.is_banned) {
            tracing::info!(document_hash, "registration for banned document");
            return Ok(Verdict::AlreadyBanned);
        }

        let existing = claims.len();
        let threshold = self.draw_threshold();
        if (existing as u64) < u64::from(threshold) {
            tracing::debug!(document_hash, existing, threshold, "multi-account check passed");
            return Ok(Verdict::Permit {
                existing,
                threshold,
            });
        }

        for claim in &claims {
            if let Err(e) = ClaimStateMachine::transition(claim.state(), ClaimEvent::Ban) {
                tracing::warn!(claim_id = %claim.id, error = %e, "unexpected claim state during ban");
            }
        }
        let banned = tx.ban_document(document_hash).await?;
        tracing::warn!(
            document_hash,
            existing,
            threshold,
            banned,
            "multi-account threshold reached, document banned"
        );
        Ok(Verdict::Banned {
            existing,
            threshold,
        })
    }
}
