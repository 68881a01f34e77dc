//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce tracing events
//!     → logging.rs (global subscriber: env filter + console)
//!     → audit.rs (bounded queue → single task → OpenSearch index)
//!     → metrics.rs (counters, optional Prometheus endpoint)
//!
//! identity.rs resolves hostname/service/key once at startup
//! and stamps them onto every audit document.
//! ```
//!
//! # Design Decisions
//! - The console write is synchronous and ordered; the remote copy is not
//! - The remote sink is best effort: never retried, never blocks the caller
//! - Metrics are cheap (atomic increments)

pub mod audit;
pub mod identity;
pub mod logging;
pub mod metrics;
