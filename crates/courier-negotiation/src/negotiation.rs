//! The negotiation record the engine owns and the guard observes.

use std::fmt;

use courier_transport::PeerAddress;

use crate::NegotiationState;

/// A unique identifier for a negotiation within one engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NegotiationId(pub u64);

impl fmt::Display for NegotiationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "N-{}", self.0)
    }
}

/// One negotiation: who it is with and where it stands.
///
/// This is the checkpoint context handed to
/// [`PendingGuard::test`](crate::PendingGuard::test) — the guard may
/// observe any of it but receives only a shared reference, so it cannot
/// mutate the machine.
#[derive(Debug, Clone)]
pub struct Negotiation {
    /// Engine-local identity.
    pub id: NegotiationId,
    /// The remote peer this negotiation is with.
    pub counterparty: PeerAddress,
    /// Current lifecycle state.
    pub state: NegotiationState,
    /// `true` while the guard holds the negotiation at the checkpoint.
    pub parked: bool,
}

impl Negotiation {
    pub(crate) fn new(id: NegotiationId, counterparty: PeerAddress) -> Self {
        Self {
            id,
            counterparty,
            state: NegotiationState::Requested,
            parked: false,
        }
    }

    /// Whether the guard currently holds this negotiation parked.
    pub fn is_parked(&self) -> bool {
        self.parked
    }
}
