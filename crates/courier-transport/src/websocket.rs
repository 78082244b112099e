//! WebSocket transport implementation using `tokio-tungstenite`.
//!
//! Each endpoint listens for inbound connections on its own TCP port and
//! dials outbound connections on demand. Outbound connections are cached
//! per target address so a request/reply pair does not pay two TCP
//! handshakes; a dead cached connection is redialed once.

use std::collections::HashMap;
use std::io;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;

use crate::{PeerAddress, Transport, TransportError};

type ServerWs = tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>;
type ClientWs = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

/// A WebSocket-based [`Transport`].
///
/// Listens on one address, dials any number of remote peers.
pub struct WebSocketTransport {
    local_addr: PeerAddress,
    /// Payloads forwarded from every accepted connection.
    inbound: Mutex<mpsc::UnboundedReceiver<Vec<u8>>>,
    /// Cached outbound connections, keyed by target address.
    outbound: Mutex<HashMap<PeerAddress, Arc<Mutex<ClientWs>>>>,
    accept_task: JoinHandle<()>,
    /// Flipped to `true` on shutdown. `recv` watches this so a blocked
    /// receiver wakes up without `shutdown` needing the inbound lock
    /// the receiver is holding.
    closing: watch::Sender<bool>,
}

impl WebSocketTransport {
    /// Binds a new WebSocket transport to the given `host:port` address.
    ///
    /// Use port 0 to let the OS pick one; [`Transport::local_addr`]
    /// reports the actual bound address as a `ws://` URL.
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::AcceptFailed)?;
        let bound = listener
            .local_addr()
            .map_err(TransportError::AcceptFailed)?;
        let local_addr = PeerAddress::new(format!("ws://{bound}"));
        tracing::info!(addr = %local_addr, "WebSocket transport listening");

        let (tx, rx) = mpsc::unbounded_channel();
        let accept_task = tokio::spawn(accept_loop(listener, tx));
        let (closing, _) = watch::channel(false);

        Ok(Self {
            local_addr,
            inbound: Mutex::new(rx),
            outbound: Mutex::new(HashMap::new()),
            accept_task,
            closing,
        })
    }

    /// Dials `target`, reusing a cached connection when one is alive.
    async fn connection_to(
        &self,
        target: &PeerAddress,
    ) -> Result<Arc<Mutex<ClientWs>>, TransportError> {
        let mut cache = self.outbound.lock().await;
        if let Some(ws) = cache.get(target) {
            return Ok(Arc::clone(ws));
        }
        let (ws, _) = tokio_tungstenite::connect_async(target.as_str())
            .await
            .map_err(|e| {
                TransportError::ConnectFailed(io::Error::new(
                    io::ErrorKind::ConnectionRefused,
                    e,
                ))
            })?;
        tracing::debug!(%target, "dialed WebSocket peer");
        let ws = Arc::new(Mutex::new(ws));
        cache.insert(target.clone(), Arc::clone(&ws));
        Ok(ws)
    }

    async fn send_on(
        ws: &Arc<Mutex<ClientWs>>,
        data: &[u8],
    ) -> Result<(), TransportError> {
        let msg = Message::Binary(data.to_vec().into());
        ws.lock().await.send(msg).await.map_err(|e| {
            TransportError::SendFailed(io::Error::new(
                io::ErrorKind::BrokenPipe,
                e,
            ))
        })
    }
}

impl Transport for WebSocketTransport {
    async fn transmit(
        &self,
        target: &PeerAddress,
        data: &[u8],
    ) -> Result<(), TransportError> {
        let ws = self.connection_to(target).await?;
        match Self::send_on(&ws, data).await {
            Ok(()) => Ok(()),
            Err(e) => {
                // Cached connection went stale — evict and redial once.
                tracing::debug!(%target, error = %e, "cached connection dead, redialing");
                self.outbound.lock().await.remove(target);
                let ws = self.connection_to(target).await?;
                Self::send_on(&ws, data).await
            }
        }
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, TransportError> {
        let mut closing = self.closing.subscribe();
        let mut inbound = self.inbound.lock().await;
        tokio::select! {
            payload = inbound.recv() => Ok(payload),
            _ = closing.changed() => Ok(None),
        }
    }

    fn local_addr(&self) -> PeerAddress {
        self.local_addr.clone()
    }

    async fn shutdown(&self) -> Result<(), TransportError> {
        self.accept_task.abort();
        // Wake any receiver blocked inside `recv` first; it holds the
        // inbound lock across its await, so closing the channel has to
        // wait until it lets go.
        let _ = self.closing.send(true);
        self.inbound.lock().await.close();
        self.outbound.lock().await.clear();
        tracing::info!(addr = %self.local_addr, "WebSocket transport shut down");
        Ok(())
    }
}

impl Drop for WebSocketTransport {
    fn drop(&mut self) {
        self.accept_task.abort();
    }
}

/// Accepts inbound connections and spawns a reader task per connection.
async fn accept_loop(
    listener: TcpListener,
    inbound: mpsc::UnboundedSender<Vec<u8>>,
) {
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                tracing::error!(error = %e, "accept failed");
                continue;
            }
        };
        let inbound = inbound.clone();
        tokio::spawn(async move {
            let ws = match tokio_tungstenite::accept_async(stream).await {
                Ok(ws) => ws,
                Err(e) => {
                    tracing::debug!(%peer, error = %e, "WebSocket handshake failed");
                    return;
                }
            };
            tracing::debug!(%peer, "accepted WebSocket connection");
            read_loop(ws, inbound).await;
        });
    }
}

/// Forwards every data frame from one connection into the inbound queue.
async fn read_loop(mut ws: ServerWs, inbound: mpsc::UnboundedSender<Vec<u8>>) {
    while let Some(msg) = ws.next().await {
        match msg {
            Ok(Message::Binary(data)) => {
                if inbound.send(data.into()).is_err() {
                    break; // transport shut down
                }
            }
            Ok(Message::Text(text)) => {
                if inbound.send(text.as_bytes().to_vec()).is_err() {
                    break;
                }
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => continue, // ping/pong/frame
            Err(e) => {
                tracing::debug!(error = %e, "WebSocket read error");
                break;
            }
        }
    }
}
