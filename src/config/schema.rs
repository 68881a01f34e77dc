//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the agent.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Key watched when nothing else is configured.
pub const DEFAULT_SIGNAL_KEY: &str = "signalmice:00000000-0000-0000-0000-000000000000";

/// Root configuration for the agent.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AgentConfig {
    /// Trigger key and polling cadence.
    pub monitor: MonitorConfig,

    /// Redis connection used as the signal store.
    pub redis: RedisConfig,

    /// Remote audit log (OpenSearch).
    pub audit: AuditConfig,

    /// Host power-off settings.
    pub host: HostConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Trigger detection configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Key whose presence means "shut down now".
    pub key: String,

    /// Polling interval in seconds.
    pub check_interval_secs: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            key: DEFAULT_SIGNAL_KEY.to_string(),
            check_interval_secs: 60,
        }
    }
}

/// Redis connection configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    /// Empty means no AUTH.
    pub password: String,
    pub db: i64,
    /// Deadline for each GET/DEL round trip in seconds.
    pub timeout_secs: u64,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 6379,
            password: String::new(),
            db: 0,
            timeout_secs: 5,
        }
    }
}

impl RedisConfig {
    /// Address in `host:port` form.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Audit sink configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Forward events to OpenSearch. The console is always written.
    pub enabled: bool,

    /// Base URL of the OpenSearch cluster.
    pub url: String,

    /// Basic auth user. Empty disables auth.
    pub username: String,

    pub password: String,

    /// Index name, or index prefix when `use_daily_index` is set.
    pub index: String,

    /// Suffix the index with the UTC day (`-YYYY-MM-DD`).
    pub use_daily_index: bool,

    /// Accept self-signed cluster certificates.
    pub accept_invalid_certs: bool,

    /// Events buffered between the logger and the delivery task.
    pub queue_capacity: usize,

    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,

    /// How long process exit waits for queued events to flush.
    pub drain_timeout_secs: u64,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: "http://localhost:9200".to_string(),
            username: String::new(),
            password: String::new(),
            index: "signalmice-logs".to_string(),
            use_daily_index: true,
            accept_invalid_certs: true,
            queue_capacity: 1024,
            request_timeout_secs: 5,
            drain_timeout_secs: 5,
        }
    }
}

/// Built-in shutdown methods, named as they appear in config files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum MethodKind {
    /// Enter the host namespaces through PID 1 and run `poweroff`.
    Nsenter,
    /// Write to the host's `/proc/sysrq-trigger`.
    SysrqTrigger,
    /// Run `poweroff` / `shutdown -h now` in our own namespace.
    DirectCommand,
}

impl MethodKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MethodKind::Nsenter => "nsenter",
            MethodKind::SysrqTrigger => "sysrq-trigger",
            MethodKind::DirectCommand => "direct-command",
        }
    }
}

impl std::fmt::Display for MethodKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Host power-off configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HostConfig {
    /// Where the host's procfs is mounted inside the container.
    pub proc_path: String,

    /// Process whose namespaces nsenter joins.
    pub target_pid: u32,

    /// Deadline for each external command in seconds.
    pub command_timeout_secs: u64,

    /// Methods in priority order.
    pub methods: Vec<MethodKind>,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            proc_path: "/host/proc".to_string(),
            target_pid: 1,
            command_timeout_secs: 30,
            methods: vec![
                MethodKind::Nsenter,
                MethodKind::SysrqTrigger,
                MethodKind::DirectCommand,
            ],
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
