//! The messenger: correlated, type-safe send over an envelope transport.
//!
//! `send` encodes a typed payload into a request envelope, registers a
//! pending entry under a fresh correlation identity, and hands the
//! envelope to the transport. The returned [`PendingReply`] resolves
//! when a reply carrying the same identity arrives — or fails with a
//! typed error (no handler, handler failure, decode failure, timeout).
//! It never hangs and never resolves silently to a default.

use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::oneshot;

use courier_protocol::{
    from_document, to_document, Codec, CorrelationId, Envelope, Header,
    TypedMessage,
};
use courier_registry::HandlerRegistry;
use courier_transport::{PeerAddress, Transport};

use crate::dispatch;
use crate::CourierError;

/// The table of outstanding requests, keyed by correlation identity.
///
/// A `std::sync::Mutex` rather than Tokio's: every access is a short
/// insert/remove, and [`PendingReply`]'s `Drop` needs to lock it
/// synchronously.
pub(crate) type PendingTable =
    Mutex<HashMap<CorrelationId, oneshot::Sender<Result<Value, CourierError>>>>;

/// Messenger configuration.
#[derive(Debug, Clone)]
pub struct MessengerConfig {
    /// Default window [`PendingReply::wait`] allows for a reply.
    pub reply_timeout: Duration,
}

impl Default for MessengerConfig {
    fn default() -> Self {
        Self {
            reply_timeout: Duration::from_secs(30),
        }
    }
}

/// Shared messenger state, used by the send path and the inbound loop.
pub(crate) struct MessengerState<T: Transport, C: Codec> {
    pub(crate) transport: T,
    pub(crate) registry: Arc<HandlerRegistry>,
    pub(crate) codec: C,
    pub(crate) pending: Arc<PendingTable>,
    pub(crate) local_addr: PeerAddress,
    reply_timeout: Duration,
}

/// A peer endpoint of the messaging layer.
///
/// One messenger per transport endpoint; cloning shares the endpoint.
/// Construction spawns the inbound dispatch loop, so a messenger both
/// sends requests and serves its registry's handlers.
pub struct Messenger<T: Transport, C: Codec> {
    state: Arc<MessengerState<T, C>>,
}

impl<T: Transport, C: Codec> Clone for Messenger<T, C> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<T: Transport, C: Codec> Messenger<T, C> {
    /// Wires a messenger onto a transport endpoint and spawns its
    /// inbound dispatch loop.
    pub fn spawn(
        transport: T,
        registry: Arc<HandlerRegistry>,
        codec: C,
        config: MessengerConfig,
    ) -> Self {
        let local_addr = transport.local_addr();
        let state = Arc::new(MessengerState {
            transport,
            registry,
            codec,
            pending: Arc::new(Mutex::new(HashMap::new())),
            local_addr: local_addr.clone(),
            reply_timeout: config.reply_timeout,
        });
        tokio::spawn(dispatch::run_inbound(Arc::clone(&state)));
        tracing::info!(addr = %local_addr, "messenger started");
        Self { state }
    }

    /// The handler registry this messenger dispatches inbound requests
    /// against.
    pub fn registry(&self) -> &Arc<HandlerRegistry> {
        &self.state.registry
    }

    /// The address remote peers reach this messenger at.
    pub fn local_addr(&self) -> PeerAddress {
        self.state.local_addr.clone()
    }

    /// Number of requests still waiting for a reply.
    pub fn pending_requests(&self) -> usize {
        self.state
            .pending
            .lock()
            .expect("pending table poisoned")
            .len()
    }

    /// Sends `payload` to the peer at `target` and returns a handle to
    /// the eventual typed reply.
    ///
    /// The envelope's type tag comes from `M::TYPE`; the receiver must
    /// have a handler bound under the same tag (agreed out of band).
    /// This call only waits for the transport to accept the envelope —
    /// the reply is awaited separately via [`PendingReply::wait`].
    ///
    /// # Errors
    /// Fails immediately on local encode errors or when the transport
    /// rejects the transmission; in both cases no pending entry is left
    /// behind.
    pub async fn send<R, M>(
        &self,
        target: &PeerAddress,
        payload: &M,
    ) -> Result<PendingReply<R>, CourierError>
    where
        R: DeserializeOwned,
        M: TypedMessage,
    {
        let correlation_id = CorrelationId::generate();
        let header =
            Header::request(correlation_id.clone(), self.local_addr());
        let envelope = Envelope::new(
            M::message_type(),
            to_document(&header)?,
            to_document(payload)?,
        );
        let bytes = self.state.codec.encode(&envelope)?;

        let (tx, rx) = oneshot::channel();
        self.state
            .pending
            .lock()
            .expect("pending table poisoned")
            .insert(correlation_id.clone(), tx);

        if let Err(e) = self.state.transport.transmit(target, &bytes).await {
            self.state
                .pending
                .lock()
                .expect("pending table poisoned")
                .remove(&correlation_id);
            return Err(e.into());
        }

        tracing::debug!(
            %target,
            message_type = M::TYPE,
            %correlation_id,
            "request sent"
        );

        Ok(PendingReply {
            correlation_id,
            rx,
            pending: Arc::clone(&self.state.pending),
            timeout: self.state.reply_timeout,
            _expects: PhantomData,
        })
    }

    /// Shuts the messenger down: the transport closes, the inbound loop
    /// drains and exits, and every outstanding [`PendingReply`] fails
    /// with [`CourierError::Stopped`].
    pub async fn shutdown(&self) -> Result<(), CourierError> {
        self.state.transport.shutdown().await?;
        Ok(())
    }
}

/// A handle to one outstanding request's eventual reply.
///
/// Resolved at most once, by the first matching reply or by a terminal
/// failure. Dropping the handle (or timing out) removes the pending
/// entry, so a late reply for it is dropped rather than resurrected.
#[derive(Debug)]
pub struct PendingReply<R> {
    correlation_id: CorrelationId,
    rx: oneshot::Receiver<Result<Value, CourierError>>,
    pending: Arc<PendingTable>,
    timeout: Duration,
    _expects: PhantomData<fn() -> R>,
}

impl<R: DeserializeOwned> PendingReply<R> {
    /// The correlation identity this request is waiting on.
    pub fn correlation_id(&self) -> &CorrelationId {
        &self.correlation_id
    }

    /// Waits for the reply with the messenger's default timeout.
    pub async fn wait(self) -> Result<R, CourierError> {
        let timeout = self.timeout;
        self.wait_for(timeout).await
    }

    /// Waits for the reply, bounding the wait to `timeout`.
    ///
    /// A reply body that arrives is decoded against `R`; a decode
    /// mismatch surfaces as [`CourierError::Protocol`].
    pub async fn wait_for(mut self, timeout: Duration) -> Result<R, CourierError> {
        match tokio::time::timeout(timeout, &mut self.rx).await {
            Ok(Ok(Ok(body))) => Ok(from_document(&body)?),
            Ok(Ok(Err(failure))) => Err(failure),
            // Sender half dropped without resolving: messenger stopped.
            Ok(Err(_)) => Err(CourierError::Stopped),
            Err(_) => {
                tracing::debug!(
                    correlation_id = %self.correlation_id,
                    "reply window elapsed"
                );
                // Drop (below) removes the pending entry, so a late
                // reply finds nothing to resolve.
                Err(CourierError::Timeout)
            }
        }
    }
}

impl<R> Drop for PendingReply<R> {
    fn drop(&mut self) {
        if let Ok(mut pending) = self.pending.lock() {
            pending.remove(&self.correlation_id);
        }
    }
}
