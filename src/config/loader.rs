//! Configuration loading from disk and environment.

use std::path::Path;
use std::fs;
use std::str::FromStr;
use crate::config::schema::AgentConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Env { var: &'static str, value: String },
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Env { var, value } => {
                write!(f, "Invalid value '{}' for environment variable {}", value, var)
            }
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load configuration from an optional TOML file, apply environment
/// overrides from the process environment, and validate.
pub fn load(path: Option<&Path>) -> Result<AgentConfig, ConfigError> {
    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
            toml::from_str(&content).map_err(ConfigError::Parse)?
        }
        None => AgentConfig::default(),
    };

    apply_env_overrides(&mut config, |var| std::env::var(var).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<AgentConfig, ConfigError> {
    load(Some(path))
}

/// Overlay the deployment environment variables onto `config`.
///
/// `lookup` resolves a variable name to its value, so callers can supply
/// something other than the process environment.
pub fn apply_env_overrides<F>(config: &mut AgentConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = lookup("REDIS_HOST") {
        config.redis.host = v;
    }
    if let Some(v) = lookup("REDIS_PORT") {
        config.redis.port = parse_env("REDIS_PORT", v)?;
    }
    if let Some(v) = lookup("REDIS_PASSWORD") {
        config.redis.password = v;
    }
    if let Some(v) = lookup("REDIS_DB") {
        config.redis.db = parse_env("REDIS_DB", v)?;
    }

    if let Some(v) = lookup("OPENSEARCH_URL") {
        config.audit.url = v;
    }
    if let Some(v) = lookup("OPENSEARCH_USERNAME") {
        config.audit.username = v;
    }
    if let Some(v) = lookup("OPENSEARCH_PASSWORD") {
        config.audit.password = v;
    }
    if let Some(v) = lookup("OPENSEARCH_INDEX") {
        config.audit.index = v;
    }
    if let Some(v) = lookup("OPENSEARCH_USE_DAILY_INDEX") {
        config.audit.use_daily_index = parse_bool(&v);
    }

    if let Some(v) = lookup("SIGNALMICE_KEY") {
        config.monitor.key = v;
    }
    if let Some(v) = lookup("SIGNALMICE_CHECK_INTERVAL") {
        config.monitor.check_interval_secs = parse_env("SIGNALMICE_CHECK_INTERVAL", v)?;
    }

    if let Some(v) = lookup("HOST_PROC_PATH") {
        config.host.proc_path = v;
    }
    if let Some(v) = lookup("LOG_LEVEL") {
        config.observability.log_level = v;
    }

    Ok(())
}

fn parse_env<T: FromStr>(var: &'static str, value: String) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Env { var, value })
}

/// `true`, `1` and `yes` are true; anything else is false.
fn parse_bool(value: &str) -> bool {
    matches!(value, "true" | "1" | "yes")
}
