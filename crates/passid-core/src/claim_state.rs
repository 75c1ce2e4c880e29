use std::fmt;

use crate::error::CoreError;

/// Lifecycle states of a DID-scoped identity claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ClaimState {
    /// No claim exists for the DID.
    None,
    /// A credential was issued and the claim is live.
    Active,
    /// The document behind the claim exceeded its account limit. Final state.
    Banned,
    /// The external credential was revoked; the row is about to be deleted.
    Revoked,
}

impl ClaimState {
    /// Whether this is a final (terminal) state.
    pub fn is_final(&self) -> bool {
        matches!(self, Self::Banned)
    }
}

impl fmt::Display for ClaimState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "None"),
            Self::Active => write!(f, "Active"),
            Self::Banned => write!(f, "Banned"),
            Self::Revoked => write!(f, "Revoked"),
        }
    }
}

/// Events that trigger claim state transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimEvent {
    /// The issuer returned a credential and the claim row was written.
    Issue,
    /// Anti-Sybil accounting banned the document.
    Ban,
    /// A resubmitted document superseded this claim at the issuer.
    Revoke,
    /// The superseded row was removed.
    Delete,
}

/// Validates claim state transitions.
///
/// Valid transitions:
/// - None → Active (Issue)
/// - Active → Banned (Ban)
/// - Active → Revoked (Revoke)
/// - Revoked → None (Delete)
pub struct ClaimStateMachine;

impl ClaimStateMachine {
    /// Attempt a state transition based on an event.
    /// Returns the new state on success, or an error for invalid transitions.
    pub fn transition(current: ClaimState, event: ClaimEvent) -> Result<ClaimState, CoreError> {
        let new_state = match (current, event) {
            (ClaimState::None, ClaimEvent::Issue) => ClaimState::Active,
            (ClaimState::Active, ClaimEvent::Ban) => ClaimState::Banned,
            (ClaimState::Active, ClaimEvent::Revoke) => ClaimState::Revoked,
            (ClaimState::Revoked, ClaimEvent::Delete) => ClaimState::None,

            _ => {
                let target = match event {
                    ClaimEvent::Issue => ClaimState::Active,
                    ClaimEvent::Ban => ClaimState::Banned,
                    ClaimEvent::Revoke => ClaimState::Revoked,
                    ClaimEvent::Delete => ClaimState::None,
                };
                return Err(CoreError::InvalidStateTransition {
                    from: current,
                    to: target,
                });
            }
        };

        tracing::debug!(
            from = %current,
            to = %new_state,
            event = ?event,
            "claim state transition"
        );

        Ok(new_state)
    }

    /// Check if a transition is valid without performing it.
    pub fn can_transition(current: ClaimState, event: ClaimEvent) -> bool {
        Self::transition(current, event).is_ok()
    }
}
