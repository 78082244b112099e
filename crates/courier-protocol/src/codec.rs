//! Codec trait and implementations for serializing/deserializing wire
//! structures.
//!
//! A codec converts between Rust types and raw transport bytes. The
//! protocol layer doesn't care HOW an envelope is serialized — it only
//! needs something implementing the [`Codec`] trait, so a binary codec
//! can replace [`JsonCodec`] later without touching the messenger.
//!
//! Separately from the byte boundary, [`to_document`]/[`from_document`]
//! convert typed values to and from the *opaque sub-documents* inside an
//! envelope (header and body). Those stay structured documents end to
//! end; only the outermost envelope crosses the byte boundary.

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use crate::ProtocolError;

/// A codec that can encode wire structures to bytes and decode them back.
///
/// `Send + Sync + 'static` because one codec instance is shared between
/// the send path and the inbound dispatch task.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Encode`] if serialization fails.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Decode`] if the bytes are malformed,
    /// truncated, or don't match the expected shape — a missing
    /// discriminant or sub-document surfaces here.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

/// Encodes a typed value into an opaque structured document.
pub fn to_document<T: Serialize>(value: &T) -> Result<Value, ProtocolError> {
    serde_json::to_value(value).map_err(ProtocolError::Encode)
}

/// Decodes an opaque structured document against an expected shape.
///
/// This is where type safety is recovered: the registry validates a
/// request body against the registered input shape, and the sender
/// validates a reply body against the expected response shape.
pub fn from_document<T: DeserializeOwned>(document: &Value) -> Result<T, ProtocolError> {
    serde_json::from_value(document.clone()).map_err(ProtocolError::Decode)
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses JSON via `serde_json`.
///
/// Human-readable, which makes envelope flow easy to inspect in logs
/// and network captures. A compact binary codec can be swapped in for
/// production traffic without changing the wire *structure* — the field
/// names of the contract stay the same.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{wire, Envelope, MessageType};
    use serde_json::json;

    #[test]
    fn test_json_codec_envelope_round_trip() {
        let codec = JsonCodec;
        let envelope = Envelope::new(
            MessageType::from("add"),
            json!({ wire::CORRELATION_ID: "cid" }),
            json!({ "op1": 20, "op2": 30 }),
        );

        let bytes = codec.encode(&envelope).unwrap();
        let decoded: Envelope = codec.decode(&bytes).unwrap();
        assert_eq!(envelope, decoded);
    }

    #[test]
    fn test_json_codec_decode_garbage_is_decode_error() {
        let codec = JsonCodec;
        let result: Result<Envelope, _> = codec.decode(b"\xff\xfe");
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }

    #[test]
    fn test_document_round_trip_recovers_typed_value() {
        #[derive(serde::Serialize, serde::Deserialize, PartialEq, Debug)]
        struct Addition {
            op1: i64,
            op2: i64,
        }

        let doc = to_document(&Addition { op1: 20, op2: 30 }).unwrap();
        assert_eq!(doc, json!({ "op1": 20, "op2": 30 }));

        let back: Addition = from_document(&doc).unwrap();
        assert_eq!(back, Addition { op1: 20, op2: 30 });
    }

    #[test]
    fn test_from_document_shape_mismatch_is_decode_error() {
        #[derive(serde::Deserialize, serde::Serialize)]
        struct Addition {
            op1: i64,
            op2: i64,
        }

        let doc = json!({ "op1": "twenty" });
        let result: Result<Addition, _> = from_document(&doc);
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }
}
