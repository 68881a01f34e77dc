//! Who is logging: resolved once at startup and handed to the audit layer.

/// Service name stamped on every audit event.
pub const SERVICE_NAME: &str = "signalmice";

/// Identity attached to every audit event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub hostname: String,
    pub service: String,
    /// The trigger key this agent watches.
    pub monitored_key: String,
}

impl Identity {
    pub fn new(hostname: impl Into<String>, monitored_key: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            service: SERVICE_NAME.to_string(),
            monitored_key: monitored_key.into(),
        }
    }

    /// Look up the hostname of the machine (or container) we run on.
    pub fn resolve(monitored_key: impl Into<String>) -> Self {
        let hostname = nix::unistd::gethostname()
            .ok()
            .and_then(|name| name.into_string().ok())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| "unknown".to_string());
        Self::new(hostname, monitored_key)
    }
}
