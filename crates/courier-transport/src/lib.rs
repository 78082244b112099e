//! Transport abstraction layer for Courier.
//!
//! A transport moves opaque byte payloads between named peers. It knows
//! nothing about envelopes, type tags, or correlation — that is the
//! protocol layer's job. The contract is deliberately narrow:
//!
//! - [`Transport::transmit`] — fire-and-forget delivery of one payload
//!   to a [`PeerAddress`]. No reply semantics at this level.
//! - [`Transport::recv`] — the stream of payloads other peers sent us.
//!
//! Delivery reliability, retries, and authentication are entirely the
//! transport implementation's concern.
//!
//! # Feature Flags
//!
//! - `websocket` (default) — WebSocket transport via `tokio-tungstenite`
//!
//! The in-process [`LoopbackNetwork`] is always available; it backs the
//! test suite and single-process deployments.

#![allow(async_fn_in_trait)]

mod error;
mod loopback;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
pub use loopback::{LoopbackNetwork, LoopbackTransport};
#[cfg(feature = "websocket")]
pub use websocket::WebSocketTransport;

use std::fmt;

use serde::{Deserialize, Serialize};

/// The address of a remote peer, e.g. `"ws://127.0.0.1:9000"`.
///
/// A newtype wrapper over `String` so an address can't be confused with
/// any other string flowing through the system. The scheme and meaning
/// of the address are owned by the transport implementation — the
/// loopback transport treats it as an opaque registry key, the WebSocket
/// transport dials it as a URL.
///
/// `#[serde(transparent)]` keeps the wire representation a plain JSON
/// string, so addresses embed cleanly in envelope headers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerAddress(String);

impl PeerAddress {
    /// Creates an address from any string-like value.
    pub fn new(addr: impl Into<String>) -> Self {
        Self(addr.into())
    }

    /// Returns the address as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PeerAddress {
    fn from(addr: &str) -> Self {
        Self(addr.to_string())
    }
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A bidirectional peer endpoint: send-and-forget out, payload stream in.
///
/// `Send + Sync + 'static` because one endpoint is shared between the
/// sender half (any caller task) and the inbound loop task. `recv` takes
/// `&self` for the same reason — implementations guard their inbound
/// queue internally.
pub trait Transport: Send + Sync + 'static {
    /// Delivers one payload to the peer at `target`.
    ///
    /// Returns as soon as the payload is handed to the network; there is
    /// no acknowledgement. # Errors: [`TransportError`] when the peer is
    /// unknown or the underlying connection fails.
    fn transmit(
        &self,
        target: &PeerAddress,
        data: &[u8],
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Waits for the next payload delivered to this endpoint.
    ///
    /// Returns `Ok(None)` when the transport has shut down and no more
    /// payloads will arrive.
    fn recv(&self) -> impl Future<Output = Result<Option<Vec<u8>>, TransportError>> + Send;

    /// The address remote peers should use to reach this endpoint.
    fn local_addr(&self) -> PeerAddress;

    /// Shuts the endpoint down. After this, `recv` drains and returns
    /// `Ok(None)`; transmissions to this endpoint fail at the sender.
    fn shutdown(&self) -> impl Future<Output = Result<(), TransportError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peer_address_new_and_as_str() {
        let addr = PeerAddress::new("ws://127.0.0.1:9000");
        assert_eq!(addr.as_str(), "ws://127.0.0.1:9000");
    }

    #[test]
    fn test_peer_address_display_is_raw() {
        let addr = PeerAddress::from("loopback://emitter");
        assert_eq!(addr.to_string(), "loopback://emitter");
    }

    #[test]
    fn test_peer_address_serializes_as_plain_string() {
        // `#[serde(transparent)]` — the header stores a bare string,
        // not a wrapper object.
        let addr = PeerAddress::from("ws://host:1");
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, "\"ws://host:1\"");
    }

    #[test]
    fn test_peer_address_hash_works_as_map_key() {
        use std::collections::HashMap;
        let mut map = HashMap::new();
        map.insert(PeerAddress::from("a"), 1);
        map.insert(PeerAddress::from("b"), 2);
        assert_eq!(map[&PeerAddress::from("a")], 1);
    }
}
