//! signalmice host agent.
//!
//! # Architecture Overview
//!
//! ```text
//!   ┌──────────────────────────────────────────────────────────────┐
//!   │                         SIGNALMICE                           │
//!   │                                                              │
//!   │  ┌─────────┐  tick   ┌──────────────┐  GET/DEL  ┌─────────┐  │
//!   │  │ monitor │────────▶│   trigger    │──────────▶│  Redis  │──┼── external writer
//!   │  │  loop   │◀────────│   watcher    │◀──────────│         │  │
//!   │  └────┬────┘detected └──────────────┘           └─────────┘  │
//!   │       │                                                      │
//!   │       ▼                                                      │
//!   │  ┌──────────────┐   nsenter → sysrq-trigger → direct-command │
//!   │  │   shutdown   │──────────────────────────────────────────▶ │── host power-off
//!   │  │ orchestrator │                                            │
//!   │  └──────────────┘                                            │
//!   │                                                              │
//!   │  Cross-cutting: config · lifecycle (signals) · observability │
//!   │                 (console + OpenSearch audit + metrics)       │
//!   └──────────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use signalmice::config;
use signalmice::lifecycle::{self, Shutdown};
use signalmice::observability::{self, identity::Identity};

const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "signalmice")]
#[command(about = "Powers the host off when a trigger key appears in Redis", long_about = None)]
#[command(version)]
struct Cli {
    /// TOML configuration file. Environment variables override its values.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match config::loader::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("signalmice: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let identity = Arc::new(Identity::resolve(config.monitor.key.clone()));
    let audit = observability::logging::init(&config, identity.clone());

    tracing::info!(
        version = APP_VERSION,
        check_interval_secs = config.monitor.check_interval_secs,
        redis_key = %config.monitor.key,
        hostname = %identity.hostname,
        "signalmice starting"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                if let Err(e) = observability::metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics endpoint");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let store = match lifecycle::startup::connect_store(&config).await {
        Ok(store) => store,
        Err(e) => {
            tracing::error!(error = %e, "Failed to connect to Redis");
            close_audit(audit, &config).await;
            return ExitCode::FAILURE;
        }
    };

    let shutdown = Shutdown::new();
    // Subscribe first so a signal caught right away is not lost.
    let termination = shutdown.subscribe();
    if let Err(e) = lifecycle::signals::listen(shutdown.clone()) {
        tracing::error!(error = %e, "Failed to install signal handlers");
        close_audit(audit, &config).await;
        return ExitCode::FAILURE;
    }

    let runner = lifecycle::startup::system_runner(&config);
    let control = lifecycle::startup::build_control_loop(&config, store, runner);
    control.run(termination).await;

    close_audit(audit, &config).await;
    ExitCode::SUCCESS
}

async fn close_audit(audit: Option<observability::audit::AuditHandle>, config: &config::AgentConfig) {
    if let Some(handle) = audit {
        handle
            .close(Duration::from_secs(config.audit.drain_timeout_secs))
            .await;
    }
}
