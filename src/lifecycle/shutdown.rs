//! Termination coordination for the agent.

use tokio::sync::broadcast;

use crate::lifecycle::signals::TerminationSignal;

/// Coordinator for agent termination.
///
/// Provides a broadcast channel that long-running tasks subscribe to.
/// This is about stopping the agent, not powering off the host.
#[derive(Clone)]
pub struct Shutdown {
    /// Broadcast channel sender.
    tx: broadcast::Sender<TerminationSignal>,
}

impl Shutdown {
    /// Create a new termination coordinator.
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    /// Subscribe to the termination signal.
    pub fn subscribe(&self) -> broadcast::Receiver<TerminationSignal> {
        self.tx.subscribe()
    }

    /// Ask every subscriber to stop.
    pub fn trigger(&self, signal: TerminationSignal) {
        let _ = self.tx.send(signal);
    }

    /// Get the number of active subscribers (tasks still running).
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
