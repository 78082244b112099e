//! The negotiation lifecycle state machine.

/// The lifecycle state of a negotiation.
///
/// Transitions are strictly ordered — no skipping states:
///
/// ```text
/// Requested → Agreed → Verified → Finalized
/// ```
///
/// - **Requested**: the counterparty asked for the exchange. This is the
///   guard checkpoint — the engine consults its [`PendingGuard`] before
///   leaving this state.
/// - **Agreed**: both sides accepted the terms.
/// - **Verified**: the agreement was confirmed by the counterparty.
/// - **Finalized**: terminal; the negotiation is complete.
///
/// [`PendingGuard`]: crate::PendingGuard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationState {
    Requested,
    Agreed,
    Verified,
    Finalized,
}

impl NegotiationState {
    /// Returns the next state in the strict order, or `None` from the
    /// terminal state.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Requested => Some(Self::Agreed),
            Self::Agreed => Some(Self::Verified),
            Self::Verified => Some(Self::Finalized),
            Self::Finalized => None,
        }
    }

    /// Whether the guard is consulted before leaving this state.
    pub fn is_checkpoint(self) -> bool {
        matches!(self, Self::Requested)
    }

    /// Whether this state ends the negotiation.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Finalized)
    }

    /// Returns `true` if transitioning to `target` is valid.
    pub fn can_transition_to(self, target: Self) -> bool {
        self.next() == Some(target)
    }
}

impl std::fmt::Display for NegotiationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Requested => write!(f, "Requested"),
            Self::Agreed => write!(f, "Agreed"),
            Self::Verified => write!(f, "Verified"),
            Self::Finalized => write!(f, "Finalized"),
        }
    }
}
