//! # Courier
//!
//! Type-discriminated request/response messaging between async peers.
//!
//! A [`Messenger`] is one endpoint of the messaging layer. It binds a
//! handler registry (type tag → typed handler) for inbound requests and
//! offers a correlated `send` for outbound ones: each request travels
//! in a self-describing envelope, and the caller gets a
//! [`PendingReply`] that resolves to a typed answer or a typed failure.
//! No silent defaults, no indefinite hangs.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use courier::prelude::*;
//! # use serde::{Deserialize, Serialize};
//! # #[derive(Serialize, Deserialize)]
//! # struct Add { a: i64, b: i64 }
//! # impl TypedMessage for Add { const TYPE: &'static str = "add"; }
//!
//! # async fn demo() -> Result<(), CourierError> {
//! let receiver = CourierBuilder::new().bind("127.0.0.1:0").build().await?;
//! receiver.registry().register("add", |m: Add| m.a + m.b);
//!
//! let sender = CourierBuilder::new().bind("127.0.0.1:0").build().await?;
//! let answer: i64 = sender
//!     .send(&receiver.local_addr(), &Add { a: 20, b: 30 })
//!     .await?
//!     .wait()
//!     .await?;
//! assert_eq!(answer, 50);
//! # Ok(())
//! # }
//! ```

mod builder;
mod dispatch;
mod error;
mod messenger;

pub use builder::CourierBuilder;
pub use error::CourierError;
pub use messenger::{Messenger, MessengerConfig, PendingReply};

pub use courier_negotiation as negotiation;
pub use courier_protocol as protocol;
pub use courier_registry as registry;
pub use courier_transport as transport;

/// Common imports for messenger users.
pub mod prelude {
    pub use crate::{CourierBuilder, CourierError, Messenger, PendingReply};
    pub use courier_protocol::{JsonCodec, MessageType, TypedMessage};
    pub use courier_registry::HandlerRegistry;
    pub use courier_transport::PeerAddress;
}
