//! OS signal handling.
//!
//! # Responsibilities
//! - Register handlers for SIGINT and SIGTERM
//! - Translate the first one received into a [`Shutdown`] trigger
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - Handlers are registered before the listener task starts, so a
//!   registration failure surfaces at startup

use tokio::signal::unix::{signal, SignalKind};
use tokio::task::JoinHandle;

use crate::lifecycle::shutdown::Shutdown;

/// A request from outside to stop the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationSignal {
    Interrupt,
    Terminate,
}

impl TerminationSignal {
    pub fn name(&self) -> &'static str {
        match self {
            TerminationSignal::Interrupt => "SIGINT",
            TerminationSignal::Terminate => "SIGTERM",
        }
    }
}

impl std::fmt::Display for TerminationSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Forward the first SIGINT or SIGTERM to `shutdown`.
pub fn listen(shutdown: Shutdown) -> std::io::Result<JoinHandle<()>> {
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    Ok(tokio::spawn(async move {
        let received = tokio::select! {
            _ = sigint.recv() => TerminationSignal::Interrupt,
            _ = sigterm.recv() => TerminationSignal::Terminate,
        };
        tracing::debug!(signal = %received, "Termination signal caught");
        shutdown.trigger(received);
    }))
}
