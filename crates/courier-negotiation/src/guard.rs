//! The pending-guard hook.

use crate::Negotiation;

/// A predicate evaluated at the negotiation checkpoint.
///
/// Returning `true` parks the negotiation at the checkpoint instead of
/// letting it progress automatically; returning `false` lets the engine
/// proceed as if the hook did not exist. The guard must be side-effect
/// free from the state machine's point of view: it only observes the
/// negotiation and returns a decision, recomputed on every evaluation.
///
/// Any `Fn(&Negotiation) -> bool` closure is a guard:
///
/// ```rust
/// use courier_negotiation::{Negotiation, PendingGuard};
///
/// let hold_everything = |_: &Negotiation| true;
/// fn takes_guard(_g: impl PendingGuard) {}
/// takes_guard(hold_everything);
/// ```
pub trait PendingGuard: Send + Sync + 'static {
    /// Decides whether `negotiation` stays parked at the checkpoint.
    fn test(&self, negotiation: &Negotiation) -> bool;
}

/// The default guard: never interferes.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopGuard;

impl PendingGuard for NoopGuard {
    fn test(&self, _negotiation: &Negotiation) -> bool {
        false
    }
}

impl<F> PendingGuard for F
where
    F: Fn(&Negotiation) -> bool + Send + Sync + 'static,
{
    fn test(&self, negotiation: &Negotiation) -> bool {
        self(negotiation)
    }
}
