//! Shutdown result types and error definitions.

use std::path::PathBuf;

use thiserror::Error;

use crate::shutdown::command::CommandError;

/// Why a single shutdown method did not go through.
#[derive(Debug, Error)]
pub enum MethodError {
    /// An external command failed.
    #[error(transparent)]
    Command(#[from] CommandError),

    /// Both the primary and fallback commands failed.
    #[error("shutdown commands failed: {primary}; fallback: {fallback}")]
    CommandsExhausted {
        primary: CommandError,
        #[source]
        fallback: CommandError,
    },

    /// The host procfs is not visible at the configured path.
    #[error("host proc path not mounted: {}", path.display())]
    NotMounted { path: PathBuf },

    /// Writing the power-off request to the control file failed.
    #[error("failed to write to {}: {source}", path.display())]
    TriggerWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Outcome of a whole orchestration run that did not power off.
#[derive(Debug, Error)]
pub enum ShutdownError {
    #[error("no shutdown methods configured")]
    NoMethods,

    /// Every method was tried; `source` is the last method's error.
    #[error("all shutdown methods failed, last error: {source}")]
    AllMethodsFailed {
        attempts: Vec<ShutdownAttemptResult>,
        #[source]
        source: MethodError,
    },
}

impl ShutdownError {
    /// Attempts made before giving up, in priority order.
    pub fn attempts(&self) -> &[ShutdownAttemptResult] {
        match self {
            ShutdownError::NoMethods => &[],
            ShutdownError::AllMethodsFailed { attempts, .. } => attempts,
        }
    }
}

/// One method's result within an orchestration run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShutdownAttemptResult {
    pub method_name: String,
    pub succeeded: bool,
    /// Rendered error for failed attempts.
    pub error: Option<String>,
}

impl ShutdownAttemptResult {
    pub fn success(method_name: &str) -> Self {
        Self {
            method_name: method_name.to_string(),
            succeeded: true,
            error: None,
        }
    }

    pub fn failure(method_name: &str, error: &MethodError) -> Self {
        Self {
            method_name: method_name.to_string(),
            succeeded: false,
            error: Some(error.to_string()),
        }
    }
}

/// A run in which some method accepted the power-off request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Name of the method that succeeded.
    pub method: String,
    /// Every attempt, the successful one last.
    pub attempts: Vec<ShutdownAttemptResult>,
}
