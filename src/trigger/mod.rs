//! Trigger detection subsystem.
//!
//! # Data Flow
//! ```text
//! External writer sets key
//!     → store.rs / redis.rs (GET, then DEL when present)
//!     → watcher.rs (detected = key was present and is now gone)
//!     → control loop
//! ```
//!
//! # Design Decisions
//! - Only presence of the key matters; the value is never inspected
//! - Detection and consumption are one step so the next tick cannot see the same trigger
//! - Absence is the steady state and is not an error
//! - A failed DEL leaves the key in place: at-least-once, not exactly-once

pub mod redis;
pub mod store;
pub mod watcher;

pub use self::redis::RedisStore;
pub use store::{MemoryStore, SignalStore, StoreError};
pub use watcher::{CheckError, SignalWatcher};
