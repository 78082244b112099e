/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// No peer is reachable at the given address.
    #[error("unknown peer: {0}")]
    UnknownPeer(String),

    /// Dialing a remote peer failed.
    #[error("connect failed: {0}")]
    ConnectFailed(#[source] std::io::Error),

    /// Sending a payload failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Receiving a payload failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// Binding or accepting connections failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] std::io::Error),

    /// The transport was shut down.
    #[error("transport shut down")]
    Shutdown,
}
