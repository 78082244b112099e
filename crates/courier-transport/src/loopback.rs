//! In-process loopback transport.
//!
//! A [`LoopbackNetwork`] is a shared routing table mapping addresses to
//! inbound queues. Every [`LoopbackTransport`] created from the same
//! network can reach every other by address, with no sockets involved.
//! This is the transport the test suite runs on — it is deterministic
//! and works under `tokio::time::pause()`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use crate::{PeerAddress, Transport, TransportError};

/// A shared in-process "network" of loopback endpoints.
///
/// Cheap to clone — all clones share the same routing table.
#[derive(Clone, Default)]
pub struct LoopbackNetwork {
    peers: Arc<Mutex<HashMap<PeerAddress, mpsc::UnboundedSender<Vec<u8>>>>>,
}

impl LoopbackNetwork {
    /// Creates an empty network.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new endpoint on this network at the given address.
    ///
    /// Re-using an address replaces the previous endpoint's route; the
    /// old endpoint keeps whatever it already received but gets nothing
    /// new.
    pub fn endpoint(&self, addr: impl Into<PeerAddress>) -> LoopbackTransport {
        let addr = addr.into();
        let (tx, rx) = mpsc::unbounded_channel();
        let replaced = self
            .peers
            .lock()
            .expect("loopback routing table poisoned")
            .insert(addr.clone(), tx)
            .is_some();
        if replaced {
            tracing::warn!(%addr, "loopback endpoint replaced");
        } else {
            tracing::debug!(%addr, "loopback endpoint created");
        }
        LoopbackTransport {
            addr,
            network: self.clone(),
            inbound: tokio::sync::Mutex::new(rx),
        }
    }

    fn route(&self, target: &PeerAddress) -> Option<mpsc::UnboundedSender<Vec<u8>>> {
        self.peers
            .lock()
            .expect("loopback routing table poisoned")
            .get(target)
            .cloned()
    }

    fn remove(&self, addr: &PeerAddress) {
        self.peers
            .lock()
            .expect("loopback routing table poisoned")
            .remove(addr);
    }
}

/// One endpoint on a [`LoopbackNetwork`].
pub struct LoopbackTransport {
    addr: PeerAddress,
    network: LoopbackNetwork,
    /// Tokio mutex because `recv` holds the lock across an await.
    inbound: tokio::sync::Mutex<mpsc::UnboundedReceiver<Vec<u8>>>,
}

impl Transport for LoopbackTransport {
    async fn transmit(
        &self,
        target: &PeerAddress,
        data: &[u8],
    ) -> Result<(), TransportError> {
        let Some(route) = self.network.route(target) else {
            return Err(TransportError::UnknownPeer(target.to_string()));
        };
        route
            .send(data.to_vec())
            .map_err(|_| TransportError::UnknownPeer(target.to_string()))?;
        tracing::trace!(from = %self.addr, to = %target, bytes = data.len(), "loopback transmit");
        Ok(())
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, TransportError> {
        Ok(self.inbound.lock().await.recv().await)
    }

    fn local_addr(&self) -> PeerAddress {
        self.addr.clone()
    }

    async fn shutdown(&self) -> Result<(), TransportError> {
        self.network.remove(&self.addr);
        // Senders holding a route clone can still enqueue until they
        // observe the removal; recv drains and then returns None once
        // the routing table entry (the last sender) is gone.
        self.inbound.lock().await.close();
        Ok(())
    }
}
