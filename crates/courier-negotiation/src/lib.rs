//! Negotiation state machine and the pending-guard hook for Courier.
//!
//! A negotiation normally progresses through its states automatically.
//! The one extension point is the [`PendingGuard`]: a side-effect-free
//! predicate the engine evaluates at the `Requested` checkpoint. When it
//! returns `true` the negotiation parks there instead of progressing —
//! which turns an otherwise racy, asynchronous protocol transition into
//! a deterministically controllable point. A test can force a
//! negotiation to park, assert on the parked state, and then release it
//! (or assert it never completes within a bounded wait).
//!
//! The default guard never interferes; guards are injected per engine at
//! construction time, so independent engines never affect each other.

mod engine;
mod error;
mod guard;
mod negotiation;
mod state;

pub use engine::{EngineConfig, NegotiationEngine};
pub use error::NegotiationError;
pub use guard::{NoopGuard, PendingGuard};
pub use negotiation::{Negotiation, NegotiationId};
pub use state::NegotiationState;
