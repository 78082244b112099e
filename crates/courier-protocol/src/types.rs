//! Core protocol types for Courier's wire format.
//!
//! Everything here gets serialized to a structured document, sent over
//! the transport, and deserialized on the other side. The envelope is
//! deliberately dumb: a type tag plus two opaque sub-documents. Type
//! safety is recovered only after the body is decoded against the shape
//! registered for the tag.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use courier_transport::PeerAddress;

/// The fixed field names of the wire contract.
///
/// These are part of the versioned protocol. Changing any of them breaks
/// every peer on the old contract, so they live here as named constants
/// and the tests pin the exact JSON shapes.
pub mod wire {
    /// Envelope discriminant field.
    pub const TYPE: &str = "type";
    /// Envelope header sub-document.
    pub const HEADER: &str = "header";
    /// Envelope body sub-document.
    pub const BODY: &str = "body";
    /// Correlation identity, inside the header.
    pub const CORRELATION_ID: &str = "correlation-id";
    /// Reply address, inside a request header.
    pub const REPLY_TO: &str = "reply-to";
    /// Reply status, inside a reply header.
    pub const STATUS: &str = "status";
    /// Failure detail, inside a failure body.
    pub const MESSAGE: &str = "message";
}

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A unique string tag identifying a message kind (e.g. `"add"`).
///
/// Newtype over `String` so a type tag can't be confused with any other
/// string. At most one handler is bound to a tag at a time; sender and
/// receiver agree on the tag→shape mapping out of band via
/// [`TypedMessage`].
///
/// `#[serde(transparent)]` keeps the wire form a bare string, and
/// `Display` prints the raw tag — failure messages embed it verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageType(String);

impl MessageType {
    /// Creates a type tag from any string-like value.
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    /// Returns the tag as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for MessageType {
    fn from(tag: &str) -> Self {
        Self(tag.to_string())
    }
}

/// Prints the raw tag with no decoration — the no-handler failure
/// message embeds it byte-for-byte.
impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The opaque correlation identity carried in every envelope header.
///
/// Generated locally by the sender; a reply carrying the same identity
/// resolves the matching pending request. 128 random bits, hex-encoded —
/// collisions within one process's outstanding requests are not a
/// practical concern.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// Draws a fresh random identity.
    pub fn generate() -> Self {
        use rand::Rng;
        Self(format!("{:032x}", rand::rng().random::<u128>()))
    }

    /// Returns the identity as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for CorrelationId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// TypedMessage — the payload→tag mapping
// ---------------------------------------------------------------------------

/// A payload type with a wire type tag.
///
/// This is the out-of-band agreement between sender and receiver: the
/// sender derives the envelope discriminant from `TYPE`, the receiver
/// registers a handler under the same tag. The mapping is not
/// negotiated at runtime.
///
/// ```rust
/// use courier_protocol::TypedMessage;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize, Deserialize)]
/// struct Addition { op1: i64, op2: i64 }
///
/// impl TypedMessage for Addition {
///     const TYPE: &'static str = "add";
/// }
///
/// assert_eq!(Addition::message_type().as_str(), "add");
/// ```
pub trait TypedMessage: Serialize + serde::de::DeserializeOwned {
    /// The wire type tag for this payload.
    const TYPE: &'static str;

    /// The tag as a [`MessageType`].
    fn message_type() -> MessageType {
        MessageType::from(Self::TYPE)
    }
}

// ---------------------------------------------------------------------------
// Header — the messenger's view of the opaque header document
// ---------------------------------------------------------------------------

/// The outcome a reply header reports.
///
/// Presence of a status is also what marks an envelope as a reply —
/// request headers carry no `status` field at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReplyStatus {
    /// The handler ran; the body is its encoded result.
    Ok,
    /// No handler bound for the request's type tag. The body is an
    /// [`ErrorBody`] with the fixed [`no_handler_message`] text.
    NoHandler,
    /// The handler itself failed; the body carries the failure detail.
    HandlerFailed,
    /// The request body did not decode against the registered shape.
    BadRequest,
}

impl ReplyStatus {
    /// Whether this status represents a successful exchange.
    pub fn is_ok(self) -> bool {
        matches!(self, Self::Ok)
    }
}

/// The structured content the messenger puts into the opaque `header`
/// sub-document.
///
/// The envelope itself stores the header as an untyped document; this
/// type is decoded from it on arrival. Extra fields other layers stash
/// in the header are ignored here and preserved on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    /// The correlation identity. Always present.
    #[serde(rename = "correlation-id")]
    pub correlation_id: CorrelationId,

    /// Where the receiver should send the reply. Requests only.
    #[serde(
        rename = "reply-to",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub reply_to: Option<PeerAddress>,

    /// The reply outcome. Replies only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ReplyStatus>,
}

impl Header {
    /// Builds a request header.
    pub fn request(correlation_id: CorrelationId, reply_to: PeerAddress) -> Self {
        Self {
            correlation_id,
            reply_to: Some(reply_to),
            status: None,
        }
    }

    /// Builds a reply header echoing the request's correlation identity.
    pub fn reply(correlation_id: CorrelationId, status: ReplyStatus) -> Self {
        Self {
            correlation_id,
            reply_to: None,
            status: Some(status),
        }
    }

    /// Whether this header marks a reply envelope.
    pub fn is_reply(&self) -> bool {
        self.status.is_some()
    }
}

// ---------------------------------------------------------------------------
// Envelope — the top-level wire format
// ---------------------------------------------------------------------------

/// The wire unit. Every payload on the transport is one `Envelope`.
///
/// ```text
/// ┌──────────────────────────────────────────┐
/// │ type: "add"                              │  ← handler dispatch key
/// │ ┌──────────────────────────────────────┐ │
/// │ │ header: { "correlation-id": …,       │ │  ← messenger metadata
/// │ │           "reply-to": … }            │ │
/// │ └──────────────────────────────────────┘ │
/// │ ┌──────────────────────────────────────┐ │
/// │ │ body: { "op1": 20, "op2": 30 }       │ │  ← opaque typed payload
/// │ └──────────────────────────────────────┘ │
/// └──────────────────────────────────────────┘
/// ```
///
/// Header and body are opaque documents; the envelope does not interpret
/// them. Decoding fails when the discriminant or either sub-document is
/// missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// The discriminant string the receiver dispatches on.
    #[serde(rename = "type")]
    pub message_type: MessageType,

    /// Opaque header document. Must contain a correlation identity.
    pub header: Value,

    /// Opaque body document: the typed payload, or an [`ErrorBody`] on
    /// failure replies.
    pub body: Value,
}

impl Envelope {
    /// Assembles an envelope from its three wire parts.
    pub fn new(message_type: MessageType, header: Value, body: Value) -> Self {
        Self {
            message_type,
            header,
            body,
        }
    }
}

// ---------------------------------------------------------------------------
// Failure body
// ---------------------------------------------------------------------------

/// The body shape of every failure reply: `{ "message": "…" }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Human-readable failure detail.
    pub message: String,
}

impl ErrorBody {
    /// Wraps a failure detail.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// The fixed-format text a receiver reports for an unmatched type tag.
///
/// Compatibility contract: senders and tests match this byte-for-byte,
/// so the format must never change.
pub fn no_handler_message(message_type: &MessageType) -> String {
    format!("No handler for message type {message_type}")
}

// =========================================================================
// Tests
// =========================================================================
