//! Negotiation engine: an isolated Tokio task that drives negotiations
//! through their states.
//!
//! The engine runs in its own task, communicating with the outside
//! world through an mpsc channel — no shared mutable state, just
//! message passing. An internal step timer advances every live
//! negotiation one state per step; the guard is consulted each time a
//! negotiation tries to leave the checkpoint.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::MissedTickBehavior;

use crate::{
    Negotiation, NegotiationError, NegotiationId, PendingGuard,
};

/// Configuration for a [`NegotiationEngine`].
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// How often the engine attempts to advance live negotiations.
    pub step_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            step_interval: Duration::from_millis(50),
        }
    }
}

/// Commands sent to the engine actor through its channel.
enum EngineCommand {
    /// Start a new negotiation with a counterparty.
    Open {
        counterparty: courier_transport::PeerAddress,
        reply: oneshot::Sender<NegotiationId>,
    },
    /// Snapshot one negotiation.
    Get {
        id: NegotiationId,
        reply: oneshot::Sender<Option<Negotiation>>,
    },
    /// Manually release a parked negotiation past the checkpoint.
    Resume {
        id: NegotiationId,
        reply: oneshot::Sender<Result<(), NegotiationError>>,
    },
    /// Stop the engine.
    Shutdown,
}

/// Handle to a running negotiation engine. Cheap to clone.
#[derive(Clone)]
pub struct NegotiationEngine {
    sender: mpsc::Sender<EngineCommand>,
}

impl NegotiationEngine {
    /// Spawns an engine task with the given guard.
    ///
    /// The guard is fixed for the engine's lifetime and scoped to this
    /// engine only — two engines with different guards never interfere.
    pub fn spawn(guard: impl PendingGuard, config: EngineConfig) -> Self {
        let (tx, rx) = mpsc::channel(64);
        let actor = EngineActor {
            guard: Arc::new(guard),
            negotiations: HashMap::new(),
            next_id: 1,
            receiver: rx,
        };
        tokio::spawn(actor.run(config.step_interval));
        Self { sender: tx }
    }

    /// Opens a new negotiation; it starts at the checkpoint state.
    pub async fn open(
        &self,
        counterparty: courier_transport::PeerAddress,
    ) -> Result<NegotiationId, NegotiationError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(EngineCommand::Open {
                counterparty,
                reply: reply_tx,
            })
            .await
            .map_err(|_| NegotiationError::EngineStopped)?;
        reply_rx.await.map_err(|_| NegotiationError::EngineStopped)
    }

    /// Returns a snapshot of the negotiation's current record.
    pub async fn get(
        &self,
        id: NegotiationId,
    ) -> Result<Negotiation, NegotiationError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(EngineCommand::Get { id, reply: reply_tx })
            .await
            .map_err(|_| NegotiationError::EngineStopped)?;
        reply_rx
            .await
            .map_err(|_| NegotiationError::EngineStopped)?
            .ok_or(NegotiationError::NotFound(id))
    }

    /// Releases a parked negotiation past the checkpoint.
    ///
    /// This is the manual-intervention path: the guard is NOT consulted
    /// again for the released transition.
    pub async fn resume(
        &self,
        id: NegotiationId,
    ) -> Result<(), NegotiationError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(EngineCommand::Resume { id, reply: reply_tx })
            .await
            .map_err(|_| NegotiationError::EngineStopped)?;
        reply_rx.await.map_err(|_| NegotiationError::EngineStopped)?
    }

    /// Stops the engine task.
    pub async fn shutdown(&self) -> Result<(), NegotiationError> {
        self.sender
            .send(EngineCommand::Shutdown)
            .await
            .map_err(|_| NegotiationError::EngineStopped)
    }
}

/// The internal engine state. Runs inside a Tokio task.
struct EngineActor {
    guard: Arc<dyn PendingGuard>,
    negotiations: HashMap<NegotiationId, Negotiation>,
    next_id: u64,
    receiver: mpsc::Receiver<EngineCommand>,
}

impl EngineActor {
    async fn run(mut self, step_interval: Duration) {
        tracing::info!("negotiation engine started");

        let mut steps = tokio::time::interval(step_interval);
        steps.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                cmd = self.receiver.recv() => match cmd {
                    Some(EngineCommand::Open { counterparty, reply }) => {
                        let id = self.handle_open(counterparty);
                        let _ = reply.send(id);
                    }
                    Some(EngineCommand::Get { id, reply }) => {
                        let _ = reply.send(self.negotiations.get(&id).cloned());
                    }
                    Some(EngineCommand::Resume { id, reply }) => {
                        let _ = reply.send(self.handle_resume(id));
                    }
                    Some(EngineCommand::Shutdown) | None => break,
                },
                _ = steps.tick() => self.step_all(),
            }
        }

        tracing::info!("negotiation engine stopped");
    }

    fn handle_open(
        &mut self,
        counterparty: courier_transport::PeerAddress,
    ) -> NegotiationId {
        let id = NegotiationId(self.next_id);
        self.next_id += 1;
        tracing::info!(%id, %counterparty, "negotiation opened");
        self.negotiations
            .insert(id, Negotiation::new(id, counterparty));
        id
    }

    fn handle_resume(
        &mut self,
        id: NegotiationId,
    ) -> Result<(), NegotiationError> {
        let negotiation = self
            .negotiations
            .get_mut(&id)
            .ok_or(NegotiationError::NotFound(id))?;
        if !negotiation.parked {
            return Err(NegotiationError::NotParked(id));
        }
        negotiation.parked = false;
        // Manual release: step past the checkpoint without asking the
        // guard again.
        if let Some(next) = negotiation.state.next() {
            negotiation.state = next;
        }
        tracing::info!(%id, state = %negotiation.state, "negotiation resumed");
        Ok(())
    }

    /// Advances every live negotiation one state, consulting the guard
    /// at the checkpoint.
    fn step_all(&mut self) {
        for negotiation in self.negotiations.values_mut() {
            if negotiation.state.is_terminal() {
                continue;
            }

            if negotiation.state.is_checkpoint()
                && self.guard.test(negotiation)
            {
                if !negotiation.parked {
                    negotiation.parked = true;
                    tracing::info!(
                        id = %negotiation.id,
                        state = %negotiation.state,
                        "negotiation parked by guard"
                    );
                }
                continue;
            }

            // The guard may stop holding a parked negotiation between
            // evaluations; the park flag clears the moment it lets go.
            negotiation.parked = false;

            if let Some(next) = negotiation.state.next() {
                tracing::debug!(
                    id = %negotiation.id,
                    from = %negotiation.state,
                    to = %next,
                    "negotiation advanced"
                );
                negotiation.state = next;
            }
        }
    }
}
