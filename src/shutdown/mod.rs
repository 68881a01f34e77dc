//! Host shutdown subsystem.
//!
//! # Data Flow
//! ```text
//! Trigger detected
//!     → orchestrator.rs (priority list, first success wins)
//!     → methods.rs (nsenter → sysrq-trigger → direct-command)
//!     → command.rs (spawn external command, capture output)
//! ```
//!
//! # Design Decisions
//! - Cleanest method first: nsenter performs an orderly host shutdown
//! - A method failure is a warning, never fatal to the run
//! - Success means the request was accepted; we cannot observe power-down
//! - Commands are not killed once spawned

pub mod command;
pub mod methods;
pub mod orchestrator;
pub mod types;

pub use command::{CommandError, CommandOutput, CommandRunner, SystemCommandRunner};
pub use methods::{
    DirectCommand, FsTriggerWriter, NsenterPoweroff, ShutdownAction, ShutdownMethod, SysrqTrigger,
    TriggerWriter,
};
pub use orchestrator::ShutdownOrchestrator;
pub use types::{MethodError, ShutdownAttemptResult, ShutdownError, ShutdownReport};
