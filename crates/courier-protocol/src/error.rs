//! Error types for the protocol layer.

/// Errors that can occur while encoding or decoding wire structures.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a value into bytes or a document).
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed (malformed bytes, missing envelope fields,
    /// or a document that doesn't match the expected shape).
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The envelope parsed but violates the protocol contract — e.g. a
    /// header without a correlation identity, or a request without a
    /// reply address.
    #[error("invalid envelope: {0}")]
    InvalidEnvelope(String),
}
