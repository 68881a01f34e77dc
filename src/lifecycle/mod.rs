//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Resolve identity → Init logging → Connect store → Build loop
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     Trigger → control loop cancels context and returns → drain audit queue → exit 0
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then logging, then the store
//! - Terminating the agent never interrupts a running power-off command

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use signals::TerminationSignal;
