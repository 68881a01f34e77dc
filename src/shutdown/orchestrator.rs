//! Ordered fallback across shutdown methods.
//!
//! # Responsibilities
//! - Try each configured method in priority order
//! - Stop at the first method that is accepted
//! - Keep going past individual failures, reporting the last one if all fail

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::HostConfig;
use crate::observability::metrics;
use crate::shutdown::command::CommandRunner;
use crate::shutdown::methods::ShutdownMethod;
use crate::shutdown::types::{ShutdownAttemptResult, ShutdownError, ShutdownReport};

/// Runs shutdown methods until one succeeds.
#[derive(Debug)]
pub struct ShutdownOrchestrator {
    methods: Vec<ShutdownMethod>,
}

impl ShutdownOrchestrator {
    /// Create an orchestrator over `methods`, highest priority first.
    pub fn new(methods: Vec<ShutdownMethod>) -> Self {
        Self { methods }
    }

    /// Build the configured built-in methods in configured order.
    pub fn from_config(config: &HostConfig, runner: Arc<dyn CommandRunner>) -> Self {
        let methods = config
            .methods
            .iter()
            .map(|kind| ShutdownMethod::builtin(*kind, config, runner.clone()))
            .collect();
        Self::new(methods)
    }

    /// Method names in the order they will be tried.
    pub fn method_names(&self) -> Vec<&str> {
        self.methods.iter().map(ShutdownMethod::name).collect()
    }

    /// One orchestration run.
    ///
    /// Methods after the first success are never attempted. When every
    /// method fails the returned error wraps the last method's error;
    /// earlier errors are only logged and kept in the attempt list.
    pub async fn execute(&self, ctx: &CancellationToken) -> Result<ShutdownReport, ShutdownError> {
        tracing::info!(methods = ?self.method_names(), "Initiating host machine shutdown");

        let mut attempts = Vec::with_capacity(self.methods.len());
        let mut last_error = None;

        for method in &self.methods {
            let name = method.name();
            tracing::info!(method = %name, "Attempting shutdown via {}", name);

            match method.attempt(ctx).await {
                Ok(()) => {
                    tracing::info!(method = %name, "Shutdown initiated successfully via {}", name);
                    metrics::record_shutdown_attempt(name, true);
                    attempts.push(ShutdownAttemptResult::success(name));
                    return Ok(ShutdownReport {
                        method: name.to_string(),
                        attempts,
                    });
                }
                Err(e) => {
                    tracing::warn!(method = %name, error = %e, "Shutdown via {} failed", name);
                    metrics::record_shutdown_attempt(name, false);
                    attempts.push(ShutdownAttemptResult::failure(name, &e));
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(source) => Err(ShutdownError::AllMethodsFailed { attempts, source }),
            None => Err(ShutdownError::NoMethods),
        }
    }
}
