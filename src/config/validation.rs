//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (intervals and timeouts > 0, ports valid)
//! - Reject ambiguous shutdown method lists
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AgentConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;

use thiserror::Error;

use crate::config::schema::AgentConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} must not be empty")]
    Empty { field: &'static str },

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("audit.url '{url}' is not a valid http(s) URL")]
    InvalidUrl { url: String },

    #[error("host.methods lists '{method}' more than once")]
    DuplicateMethod { method: String },
}

/// Check every semantic rule and collect the failures.
pub fn validate_config(config: &AgentConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.monitor.key.is_empty() {
        errors.push(ValidationError::Empty { field: "monitor.key" });
    }
    if config.monitor.check_interval_secs == 0 {
        errors.push(ValidationError::Zero { field: "monitor.check_interval_secs" });
    }

    if config.redis.host.is_empty() {
        errors.push(ValidationError::Empty { field: "redis.host" });
    }
    if config.redis.port == 0 {
        errors.push(ValidationError::Zero { field: "redis.port" });
    }
    if config.redis.timeout_secs == 0 {
        errors.push(ValidationError::Zero { field: "redis.timeout_secs" });
    }

    if config.audit.enabled {
        match url::Url::parse(&config.audit.url) {
            Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
            _ => errors.push(ValidationError::InvalidUrl { url: config.audit.url.clone() }),
        }
        if config.audit.index.is_empty() {
            errors.push(ValidationError::Empty { field: "audit.index" });
        }
        if config.audit.queue_capacity == 0 {
            errors.push(ValidationError::Zero { field: "audit.queue_capacity" });
        }
        if config.audit.request_timeout_secs == 0 {
            errors.push(ValidationError::Zero { field: "audit.request_timeout_secs" });
        }
    }

    if config.host.target_pid == 0 {
        errors.push(ValidationError::Zero { field: "host.target_pid" });
    }
    if config.host.command_timeout_secs == 0 {
        errors.push(ValidationError::Zero { field: "host.command_timeout_secs" });
    }
    if config.host.methods.is_empty() {
        errors.push(ValidationError::Empty { field: "host.methods" });
    }
    let mut seen = HashSet::new();
    for method in &config.host.methods {
        if !seen.insert(*method) {
            errors.push(ValidationError::DuplicateMethod { method: method.to_string() });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
