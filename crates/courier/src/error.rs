//! Unified error type for the Courier messenger.

use courier_protocol::ProtocolError;
use courier_transport::TransportError;

/// Every failure a sender can observe, delivered through the pending
/// reply — a caller never gets a silent default or a hang.
///
/// The first three variants are failures the *receiver* reported back
/// in a failure reply; the rest are local.
#[derive(Debug, thiserror::Error)]
pub enum CourierError {
    /// The receiver has no handler bound for the request's type tag.
    /// Displays the remote failure message verbatim
    /// (`"No handler for message type <type>"`).
    #[error("{0}")]
    NoHandler(String),

    /// The receiver's handler ran and failed.
    #[error("handler failed: {0}")]
    Handler(String),

    /// The receiver could not decode the request body against the
    /// registered input shape.
    #[error("receiver rejected request body: {0}")]
    BadRequest(String),

    /// A local encode/decode error (outbound request or inbound reply).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A transport-level error while transmitting.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// No reply arrived within the allotted window. Says nothing about
    /// remote state — the receiver may still reply late, and that late
    /// reply is dropped.
    #[error("timed out waiting for a reply")]
    Timeout,

    /// The messenger shut down before the reply arrived.
    #[error("messenger stopped before the reply arrived")]
    Stopped,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_handler_displays_remote_message_verbatim() {
        let err = CourierError::NoHandler(
            "No handler for message type unsupported".into(),
        );
        assert_eq!(
            err.to_string(),
            "No handler for message type unsupported"
        );
    }

    #[test]
    fn test_from_transport_error() {
        let err: CourierError = TransportError::UnknownPeer("x".into()).into();
        assert!(matches!(err, CourierError::Transport(_)));
        assert!(err.to_string().contains("x"));
    }

    #[test]
    fn test_from_protocol_error() {
        let bad: Result<courier_protocol::Envelope, _> =
            serde_json::from_slice(b"garbage");
        let err: CourierError = match bad {
            Err(e) => ProtocolError::Decode(e).into(),
            Ok(_) => unreachable!("garbage must not parse"),
        };
        assert!(matches!(err, CourierError::Protocol(_)));
    }
}
