//! End-to-end messenger tests over the in-process loopback transport.
//!
//! Loopback keeps these deterministic: no sockets, no OS scheduling in
//! the delivery path, and the timeout tests can run under
//! `tokio::time::pause()`.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use courier::{CourierError, Messenger, MessengerConfig};
use courier_protocol::{JsonCodec, TypedMessage};
use courier_registry::HandlerRegistry;
use courier_transport::{LoopbackNetwork, LoopbackTransport, PeerAddress, Transport};

// =========================================================================
// Fixtures
// =========================================================================

#[derive(Serialize, Deserialize)]
struct Addition {
    op1: i64,
    op2: i64,
}

impl TypedMessage for Addition {
    const TYPE: &'static str = "add";
}

#[derive(Serialize, Deserialize)]
struct Multiplication {
    op1: i64,
    op2: i64,
}

impl TypedMessage for Multiplication {
    const TYPE: &'static str = "mul";
}

// Deliberately reuses the "add" tag with a shape the receiver's
// handler cannot decode.
#[derive(Serialize, Deserialize)]
struct WrongShape {
    text: String,
}

impl TypedMessage for WrongShape {
    const TYPE: &'static str = "add";
}

#[derive(Serialize, Deserialize)]
struct Unsupported {
    anything: i64,
}

impl TypedMessage for Unsupported {
    const TYPE: &'static str = "unsupported";
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct Answer {
    answer: i64,
}

type LoopbackMessenger = Messenger<LoopbackTransport, JsonCodec>;

fn endpoint(network: &LoopbackNetwork, addr: &str) -> LoopbackMessenger {
    Messenger::spawn(
        network.endpoint(addr),
        Arc::new(HandlerRegistry::new()),
        JsonCodec,
        MessengerConfig::default(),
    )
}

/// A sender plus a receiver with `add` and `mul` handlers bound.
fn arithmetic_pair(
    network: &LoopbackNetwork,
) -> (LoopbackMessenger, LoopbackMessenger) {
    let sender = endpoint(network, "loopback://sender");
    let receiver = endpoint(network, "loopback://receiver");
    receiver.registry().register("add", |m: Addition| Answer {
        answer: m.op1 + m.op2,
    });
    receiver
        .registry()
        .register("mul", |m: Multiplication| Answer {
            answer: m.op1 * m.op2,
        });
    (sender, receiver)
}

// =========================================================================
// Happy path
// =========================================================================

#[tokio::test]
async fn test_addition_request_resolves_to_typed_answer() {
    let network = LoopbackNetwork::new();
    let (sender, receiver) = arithmetic_pair(&network);

    let answer: Answer = sender
        .send(&receiver.local_addr(), &Addition { op1: 20, op2: 30 })
        .await
        .unwrap()
        .wait()
        .await
        .unwrap();
    assert_eq!(answer, Answer { answer: 50 });
    assert_eq!(sender.pending_requests(), 0);
}

#[tokio::test]
async fn test_distinct_tags_dispatch_to_distinct_handlers() {
    let network = LoopbackNetwork::new();
    let (sender, receiver) = arithmetic_pair(&network);
    let target = receiver.local_addr();

    let sum: Answer = sender
        .send(&target, &Addition { op1: 20, op2: 30 })
        .await
        .unwrap()
        .wait()
        .await
        .unwrap();
    let product: Answer = sender
        .send(&target, &Multiplication { op1: 20, op2: 30 })
        .await
        .unwrap()
        .wait()
        .await
        .unwrap();

    assert_eq!(sum.answer, 50);
    assert_eq!(product.answer, 600);
}

#[tokio::test]
async fn test_peers_can_request_in_both_directions() {
    let network = LoopbackNetwork::new();
    let (sender, receiver) = arithmetic_pair(&network);
    sender.registry().register("mul", |m: Multiplication| Answer {
        answer: m.op1 * m.op2,
    });

    let from_sender: Answer = sender
        .send(&receiver.local_addr(), &Addition { op1: 1, op2: 2 })
        .await
        .unwrap()
        .wait()
        .await
        .unwrap();
    let from_receiver: Answer = receiver
        .send(&sender.local_addr(), &Multiplication { op1: 3, op2: 4 })
        .await
        .unwrap()
        .wait()
        .await
        .unwrap();

    assert_eq!(from_sender.answer, 3);
    assert_eq!(from_receiver.answer, 12);
}

// =========================================================================
// Failure propagation
// =========================================================================

#[tokio::test]
async fn test_missing_handler_fails_with_exact_message() {
    let network = LoopbackNetwork::new();
    let (sender, receiver) = arithmetic_pair(&network);

    let err = sender
        .send::<Answer, _>(
            &receiver.local_addr(),
            &Unsupported { anything: 1 },
        )
        .await
        .unwrap()
        .wait()
        .await
        .unwrap_err();

    assert!(matches!(err, CourierError::NoHandler(_)));
    assert_eq!(err.to_string(), "No handler for message type unsupported");
}

#[tokio::test]
async fn test_handler_failure_travels_back_to_sender() {
    let network = LoopbackNetwork::new();
    let sender = endpoint(&network, "loopback://sender");
    let receiver = endpoint(&network, "loopback://receiver");
    receiver
        .registry()
        .register_fallible("add", |m: Addition| -> Result<Answer, String> {
            Err(format!("cannot add {} and {}", m.op1, m.op2))
        });

    let err = sender
        .send::<Answer, _>(&receiver.local_addr(), &Addition { op1: 1, op2: 2 })
        .await
        .unwrap()
        .wait()
        .await
        .unwrap_err();

    assert!(matches!(err, CourierError::Handler(_)));
    assert!(err.to_string().contains("cannot add 1 and 2"));
}

#[tokio::test]
async fn test_shape_mismatch_is_rejected_not_defaulted() {
    let network = LoopbackNetwork::new();
    let (sender, receiver) = arithmetic_pair(&network);

    let err = sender
        .send::<Answer, _>(
            &receiver.local_addr(),
            &WrongShape { text: "hi".into() },
        )
        .await
        .unwrap()
        .wait()
        .await
        .unwrap_err();

    assert!(matches!(err, CourierError::BadRequest(_)));
}

#[tokio::test]
async fn test_send_to_unknown_peer_fails_without_leaking_an_entry() {
    let network = LoopbackNetwork::new();
    let sender = endpoint(&network, "loopback://sender");

    let err = sender
        .send::<Answer, _>(
            &PeerAddress::from("loopback://nobody"),
            &Addition { op1: 1, op2: 2 },
        )
        .await
        .unwrap_err();

    assert!(matches!(err, CourierError::Transport(_)));
    assert_eq!(sender.pending_requests(), 0);
}

// =========================================================================
// Replacement
// =========================================================================

#[tokio::test]
async fn test_rebinding_a_tag_routes_to_the_new_handler() {
    let network = LoopbackNetwork::new();
    let (sender, receiver) = arithmetic_pair(&network);
    let target = receiver.local_addr();

    let sum: Answer = sender
        .send(&target, &Addition { op1: 20, op2: 30 })
        .await
        .unwrap()
        .wait()
        .await
        .unwrap();
    assert_eq!(sum.answer, 50);

    let replaced = receiver.registry().register("add", |m: Addition| Answer {
        answer: m.op1 * m.op2,
    });
    assert!(replaced);

    let product: Answer = sender
        .send(&target, &Addition { op1: 20, op2: 30 })
        .await
        .unwrap()
        .wait()
        .await
        .unwrap();
    assert_eq!(product.answer, 600);
}

// =========================================================================
// Correlation
// =========================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_replies_correlate_even_when_they_arrive_out_of_order() {
    let network = LoopbackNetwork::new();
    let sender = endpoint(&network, "loopback://sender");
    let receiver = endpoint(&network, "loopback://receiver");

    // The multiplication handler stalls, so its reply arrives after the
    // addition reply even though its request was sent first. Each reply
    // must still resolve its own request.
    receiver
        .registry()
        .register("mul", |m: Multiplication| {
            std::thread::sleep(Duration::from_millis(200));
            Answer {
                answer: m.op1 * m.op2,
            }
        });
    receiver.registry().register("add", |m: Addition| Answer {
        answer: m.op1 + m.op2,
    });
    let target = receiver.local_addr();

    let slow = sender
        .send::<Answer, _>(&target, &Multiplication { op1: 20, op2: 30 })
        .await
        .unwrap();
    let fast = sender
        .send::<Answer, _>(&target, &Addition { op1: 20, op2: 30 })
        .await
        .unwrap();
    assert_eq!(sender.pending_requests(), 2);

    let started = std::time::Instant::now();
    let fast_answer = fast.wait().await.unwrap();
    let fast_elapsed = started.elapsed();
    let slow_answer = slow.wait().await.unwrap();
    let slow_elapsed = started.elapsed();

    assert_eq!(fast_answer.answer, 50);
    assert_eq!(slow_answer.answer, 600);
    assert!(
        fast_elapsed < slow_elapsed,
        "the unstalled reply should resolve first"
    );
    assert_eq!(sender.pending_requests(), 0);
}

// =========================================================================
// Timeout and shutdown
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_silent_peer_times_out_and_clears_the_pending_entry() {
    let network = LoopbackNetwork::new();
    let sender = endpoint(&network, "loopback://sender");
    // A bare endpoint that queues requests but never dispatches them.
    let sink = network.endpoint("loopback://sink");

    let pending = sender
        .send::<Answer, _>(&sink.local_addr(), &Addition { op1: 1, op2: 2 })
        .await
        .unwrap();
    assert_eq!(sender.pending_requests(), 1);

    let err = pending.wait_for(Duration::from_secs(1)).await.unwrap_err();
    assert!(matches!(err, CourierError::Timeout));
    assert_eq!(err.to_string(), "timed out waiting for a reply");

    // The entry is gone, so a reply arriving now has nothing to wake.
    assert_eq!(sender.pending_requests(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_default_reply_window_comes_from_the_config() {
    let network = LoopbackNetwork::new();
    let sender = Messenger::spawn(
        network.endpoint("loopback://sender"),
        Arc::new(HandlerRegistry::new()),
        JsonCodec,
        MessengerConfig {
            reply_timeout: Duration::from_millis(250),
        },
    );
    let sink = network.endpoint("loopback://sink");

    let err = sender
        .send::<Answer, _>(&sink.local_addr(), &Addition { op1: 1, op2: 2 })
        .await
        .unwrap()
        .wait()
        .await
        .unwrap_err();
    assert!(matches!(err, CourierError::Timeout));
}

#[tokio::test]
async fn test_shutdown_fails_outstanding_requests_with_stopped() {
    let network = LoopbackNetwork::new();
    let sender = endpoint(&network, "loopback://sender");
    let sink = network.endpoint("loopback://sink");

    let pending = sender
        .send::<Answer, _>(&sink.local_addr(), &Addition { op1: 1, op2: 2 })
        .await
        .unwrap();

    sender.shutdown().await.unwrap();

    let err = pending.wait().await.unwrap_err();
    assert!(matches!(err, CourierError::Stopped));
}

#[tokio::test]
async fn test_dropping_the_pending_reply_clears_the_entry() {
    let network = LoopbackNetwork::new();
    let sender = endpoint(&network, "loopback://sender");
    let sink = network.endpoint("loopback://sink");

    let pending = sender
        .send::<Answer, _>(&sink.local_addr(), &Addition { op1: 1, op2: 2 })
        .await
        .unwrap();
    assert_eq!(sender.pending_requests(), 1);

    drop(pending);
    assert_eq!(sender.pending_requests(), 0);
}
