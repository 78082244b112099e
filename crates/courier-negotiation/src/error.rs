use crate::NegotiationId;

/// Errors that can occur in the negotiation layer.
#[derive(Debug, thiserror::Error)]
pub enum NegotiationError {
    /// No negotiation with this id exists in the engine.
    #[error("negotiation {0} not found")]
    NotFound(NegotiationId),

    /// Resume was requested for a negotiation the guard is not holding.
    #[error("negotiation {0} is not parked")]
    NotParked(NegotiationId),

    /// The engine task has stopped and can no longer answer.
    #[error("negotiation engine stopped")]
    EngineStopped,
}
