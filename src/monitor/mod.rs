//! Monitoring subsystem.
//!
//! # Data Flow
//! ```text
//! startup ──▶ cycle ──▶ wait ◀──────────────┐
//!                        │ tick             │
//!                        ▼                  │
//!              SignalWatcher::check ────────┤ not detected / error
//!                        │ detected         │
//!                        ▼                  │
//!         ShutdownOrchestrator::execute ────┘ (success or failure logged)
//!
//!   wait ── termination signal ──▶ cancel context ──▶ return
//! ```
//!
//! # Design Decisions
//! - Two states, Running and Terminating; only a termination signal leaves Running
//! - Cycle errors are logged, never fatal
//! - A failed shutdown is not retried until a new trigger appears

pub mod control_loop;

pub use control_loop::{ControlLoop, CycleOutcome, LoopSummary};
