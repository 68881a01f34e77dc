//! signalmice: powers the host off when a trigger key appears in Redis.

pub mod config;
pub mod lifecycle;
pub mod monitor;
pub mod observability;
pub mod shutdown;
pub mod trigger;

pub use config::AgentConfig;
pub use lifecycle::Shutdown;
pub use monitor::ControlLoop;
pub use shutdown::ShutdownOrchestrator;
pub use trigger::SignalWatcher;
