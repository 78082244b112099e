//! Integration tests for the pending guard and the negotiation engine.
//!
//! Uses `tokio::time::pause()` (via `start_paused`) so the bounded-wait
//! assertions are deterministic: virtual time auto-advances, so "never
//! reaches the next state within the window" is an exact statement, not
//! a race.

use std::time::Duration;

use courier_negotiation::{
    EngineConfig, Negotiation, NegotiationEngine, NegotiationError,
    NegotiationId, NegotiationState, NoopGuard,
};
use courier_transport::PeerAddress;

// =========================================================================
// Helpers
// =========================================================================

fn fast_config() -> EngineConfig {
    EngineConfig {
        step_interval: Duration::from_millis(50),
    }
}

/// Polls the engine until `pred` holds or `window` elapses.
/// Returns `true` if the predicate held within the window.
async fn within<F>(
    engine: &NegotiationEngine,
    id: NegotiationId,
    window: Duration,
    pred: F,
) -> bool
where
    F: Fn(&Negotiation) -> bool,
{
    tokio::time::timeout(window, async {
        loop {
            let n = engine.get(id).await.expect("engine should be running");
            if pred(&n) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .is_ok()
}

const WINDOW: Duration = Duration::from_secs(5);

// =========================================================================
// Guard off: the hook must not interfere
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_noop_guard_does_not_interfere() {
    let engine = NegotiationEngine::spawn(NoopGuard, fast_config());
    let id = engine.open(PeerAddress::from("ws://provider")).await.unwrap();

    let finalized = within(&engine, id, WINDOW, |n| {
        n.state == NegotiationState::Finalized
    })
    .await;
    assert!(finalized, "negotiation should finalize within the window");

    let n = engine.get(id).await.unwrap();
    assert!(!n.is_parked());
}

// =========================================================================
// Guard on: the negotiation parks at the checkpoint
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_guard_parks_negotiation_at_checkpoint() {
    let engine =
        NegotiationEngine::spawn(|_: &Negotiation| true, fast_config());
    let id = engine.open(PeerAddress::from("ws://provider")).await.unwrap();

    // The guard decision becomes visible on the first step.
    let parked = within(&engine, id, WINDOW, |n| n.is_parked()).await;
    assert!(parked, "guard should park the negotiation");

    // Bounded wait: within the whole window the negotiation must never
    // leave the checkpoint.
    let advanced = within(&engine, id, WINDOW, |n| {
        n.state != NegotiationState::Requested
    })
    .await;
    assert!(!advanced, "parked negotiation must stay at the checkpoint");

    let n = engine.get(id).await.unwrap();
    assert_eq!(n.state, NegotiationState::Requested);
    assert!(n.is_parked());
}

#[tokio::test(start_paused = true)]
async fn test_guard_observes_checkpoint_context() {
    // Park only negotiations with one specific counterparty.
    let held = PeerAddress::from("ws://held-peer");
    let held_for_guard = held.clone();
    let guard =
        move |n: &Negotiation| n.counterparty == held_for_guard;

    let engine = NegotiationEngine::spawn(guard, fast_config());
    let parked_id = engine.open(held).await.unwrap();
    let free_id = engine.open(PeerAddress::from("ws://other")).await.unwrap();

    assert!(
        within(&engine, free_id, WINDOW, |n| {
            n.state == NegotiationState::Finalized
        })
        .await,
        "unguarded counterparty should finalize"
    );

    let n = engine.get(parked_id).await.unwrap();
    assert_eq!(n.state, NegotiationState::Requested);
}

// =========================================================================
// Release
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_resume_releases_a_parked_negotiation() {
    let engine =
        NegotiationEngine::spawn(|_: &Negotiation| true, fast_config());
    let id = engine.open(PeerAddress::from("ws://provider")).await.unwrap();

    assert!(within(&engine, id, WINDOW, |n| n.is_parked()).await);

    engine.resume(id).await.unwrap();

    // Past the checkpoint the guard has no say; the negotiation runs to
    // its terminal state.
    let finalized = within(&engine, id, WINDOW, |n| {
        n.state == NegotiationState::Finalized
    })
    .await;
    assert!(finalized, "released negotiation should finalize");
}

#[tokio::test(start_paused = true)]
async fn test_resume_of_unparked_negotiation_is_an_error() {
    let engine = NegotiationEngine::spawn(NoopGuard, fast_config());
    let id = engine.open(PeerAddress::from("ws://provider")).await.unwrap();

    let err = engine.resume(id).await.unwrap_err();
    assert!(matches!(
        err,
        NegotiationError::NotParked(_) | NegotiationError::NotFound(_)
    ));
}

#[tokio::test(start_paused = true)]
async fn test_get_unknown_negotiation_is_not_found() {
    let engine = NegotiationEngine::spawn(NoopGuard, fast_config());
    let err = engine.get(NegotiationId(999)).await.unwrap_err();
    assert!(matches!(err, NegotiationError::NotFound(_)));
}

// =========================================================================
// Isolation between engines
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_independent_engines_do_not_interfere() {
    // One engine holds everything, the other holds nothing. The guard
    // is injected per engine — no global state to leak between them.
    let holding =
        NegotiationEngine::spawn(|_: &Negotiation| true, fast_config());
    let open = NegotiationEngine::spawn(NoopGuard, fast_config());

    let held_id = holding.open(PeerAddress::from("ws://p")).await.unwrap();
    let free_id = open.open(PeerAddress::from("ws://p")).await.unwrap();

    assert!(
        within(&open, free_id, WINDOW, |n| {
            n.state == NegotiationState::Finalized
        })
        .await
    );

    let held = holding.get(held_id).await.unwrap();
    assert_eq!(held.state, NegotiationState::Requested);
    assert!(held.is_parked());
}
