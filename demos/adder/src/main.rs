//! Two-peer arithmetic demo.
//!
//! Starts a calculator peer with `add` and `mul` handlers and a client
//! peer with none, then sends correlated requests from the client and
//! prints the typed answers. Run with `RUST_LOG=debug` to watch the
//! envelopes flow.

use std::time::Duration;

use courier::prelude::*;
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

// ---------------------------------------------------------------------------
// Message types
// ---------------------------------------------------------------------------

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

#[derive(Serialize, Deserialize)]
struct Unsupported;

impl TypedMessage for Unsupported {
    const TYPE: &'static str = "unsupported";
}

#[derive(Serialize, Deserialize, Debug)]
struct Answer {
    answer: i64,
}

// ---------------------------------------------------------------------------
// Bootstrap
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let calculator = CourierBuilder::new().bind("127.0.0.1:0").build().await?;
    calculator.registry().register("add", |m: Addition| Answer {
        answer: m.op1 + m.op2,
    });
    calculator
        .registry()
        .register("mul", |m: Multiplication| Answer {
            answer: m.op1 * m.op2,
        });
    let target = calculator.local_addr();
    println!("calculator listening at {target}");

    let client = CourierBuilder::new()
        .bind("127.0.0.1:0")
        .reply_timeout(Duration::from_secs(5))
        .build()
        .await?;

    let sum: Answer = client
        .send(&target, &Addition { op1: 20, op2: 30 })
        .await?
        .wait()
        .await?;
    println!("20 + 30 = {}", sum.answer);

    let product: Answer = client
        .send(&target, &Multiplication { op1: 20, op2: 30 })
        .await?
        .wait()
        .await?;
    println!("20 * 30 = {}", product.answer);

    // An unbound tag comes back as a typed failure, not a hang.
    let err = client
        .send::<Answer, _>(&target, &Unsupported)
        .await?
        .wait()
        .await
        .unwrap_err();
    println!("unsupported request failed as expected: {err}");

    client.shutdown().await?;
    calculator.shutdown().await?;
    Ok(())
}
