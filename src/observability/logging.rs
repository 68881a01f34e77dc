//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the global tracing subscriber
//! - Always log to the console
//! - Attach the audit layer when the remote sink is enabled
//!
//! # Design Decisions
//! - `RUST_LOG` wins over the configured level
//! - A broken audit configuration degrades to console-only logging

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::AgentConfig;
use crate::observability::audit::{self, AuditHandle};
use crate::observability::identity::Identity;

/// Install the global subscriber. Returns the audit delivery handle, if any.
///
/// Must be called from within a Tokio runtime when auditing is enabled.
pub fn init(config: &AgentConfig, identity: Arc<Identity>) -> Option<AuditHandle> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.observability.log_level));

    let (audit_layer, handle, setup_error) = if config.audit.enabled {
        match audit::pipeline(&config.audit, identity) {
            Ok((layer, handle)) => (Some(layer), Some(handle), None),
            Err(e) => (None, None, Some(e)),
        }
    } else {
        (None, None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(audit_layer)
        .init();

    if let Some(e) = setup_error {
        tracing::warn!(error = %e, "Audit sink unavailable, logging to console only");
    }

    handle
}
