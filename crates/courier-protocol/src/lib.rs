//! Wire protocol for Courier.
//!
//! This crate defines the "language" that peers speak:
//!
//! - **Types** ([`Envelope`], [`Header`], [`MessageType`],
//!   [`CorrelationId`], etc.) — the structures that travel on the wire.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) — how those structures
//!   are converted to/from bytes.
//! - **Errors** ([`ProtocolError`]) — what can go wrong during
//!   encoding/decoding.
//!
//! # Architecture
//!
//! The protocol layer sits between transport (raw bytes) and messenger
//! (correlation, dispatch). It doesn't know about handlers or pending
//! requests — it only knows the shape of an envelope.
//!
//! ```text
//! Transport (bytes) → Protocol (Envelope) → Messenger (dispatch)
//! ```
//!
//! # Wire contract
//!
//! The envelope field names in [`wire`] are a fixed, versioned contract.
//! Renaming any of them is a breaking protocol change — both peers must
//! agree on them out of band, just like they agree on type tags.

mod codec;
mod error;
mod types;

pub use codec::{from_document, to_document, Codec, JsonCodec};
pub use error::ProtocolError;
pub use types::{
    no_handler_message, wire, CorrelationId, Envelope, ErrorBody, Header,
    MessageType, ReplyStatus, TypedMessage,
};
