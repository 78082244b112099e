//! `Messenger` builder for the common WebSocket + JSON deployment.
//!
//! Library users who need a different transport or codec can call
//! [`Messenger::spawn`](crate::Messenger::spawn) directly; the builder
//! just wires the defaults.

use std::sync::Arc;
use std::time::Duration;

use courier_protocol::JsonCodec;
use courier_registry::HandlerRegistry;
use courier_transport::WebSocketTransport;

use crate::messenger::{Messenger, MessengerConfig};
use crate::CourierError;

/// Builder for a messenger endpoint listening on a WebSocket address.
///
/// # Example
///
/// ```rust,ignore
/// let messenger = CourierBuilder::new()
///     .bind("127.0.0.1:9000")
///     .reply_timeout(Duration::from_secs(5))
///     .build()
///     .await?;
/// ```
pub struct CourierBuilder {
    bind_addr: String,
    registry: Arc<HandlerRegistry>,
    config: MessengerConfig,
}

impl CourierBuilder {
    /// Creates a builder with default settings: bind on an ephemeral
    /// local port, empty registry, 30-second reply timeout.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:0".to_string(),
            registry: Arc::new(HandlerRegistry::new()),
            config: MessengerConfig::default(),
        }
    }

    /// Sets the TCP address the WebSocket endpoint listens on.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Uses an already-populated handler registry instead of the empty
    /// default.
    pub fn registry(mut self, registry: Arc<HandlerRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// Sets the default window replies are waited for.
    pub fn reply_timeout(mut self, timeout: Duration) -> Self {
        self.config.reply_timeout = timeout;
        self
    }

    /// Binds the WebSocket transport and spawns the messenger.
    pub async fn build(
        self,
    ) -> Result<Messenger<WebSocketTransport, JsonCodec>, CourierError> {
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;
        Ok(Messenger::spawn(
            transport,
            self.registry,
            JsonCodec,
            self.config,
        ))
    }
}

impl Default for CourierBuilder {
    fn default() -> Self {
        Self::new()
    }
}
