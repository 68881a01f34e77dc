//! Startup assembly.
//!
//! # Responsibilities
//! - Connect the signal store (fatal on failure)
//! - Build the shutdown chain from configuration
//! - Assemble the control loop
//!
//! # Design Decisions
//! - Fail fast: a store that cannot be reached at startup ends the process
//! - The command runner is injected so the assembled loop can be tested

use std::sync::Arc;
use std::time::Duration;

use crate::config::AgentConfig;
use crate::monitor::ControlLoop;
use crate::shutdown::{CommandRunner, ShutdownOrchestrator, SystemCommandRunner};
use crate::trigger::{RedisStore, SignalStore, SignalWatcher, StoreError};

/// Open the Redis connection described by `config`.
pub async fn connect_store(config: &AgentConfig) -> Result<Arc<dyn SignalStore>, StoreError> {
    let store = RedisStore::connect(&config.redis).await?;
    Ok(Arc::new(store))
}

/// The runner used outside tests.
pub fn system_runner(config: &AgentConfig) -> Arc<dyn CommandRunner> {
    Arc::new(SystemCommandRunner::new(Duration::from_secs(
        config.host.command_timeout_secs,
    )))
}

/// Wire watcher, orchestrator and loop together.
pub fn build_control_loop(
    config: &AgentConfig,
    store: Arc<dyn SignalStore>,
    runner: Arc<dyn CommandRunner>,
) -> ControlLoop {
    let watcher = SignalWatcher::new(store, config.monitor.key.clone());
    let orchestrator = ShutdownOrchestrator::from_config(&config.host, runner);
    ControlLoop::new(
        watcher,
        orchestrator,
        Duration::from_secs(config.monitor.check_interval_secs),
    )
}
