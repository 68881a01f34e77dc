//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → loader.rs (environment overrides: REDIS_*, OPENSEARCH_*, SIGNALMICE_*)
//!     → validation.rs (semantic checks)
//!     → AgentConfig (validated, immutable)
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::ConfigError;
pub use schema::AgentConfig;
pub use schema::AuditConfig;
pub use schema::HostConfig;
pub use schema::MethodKind;
pub use schema::MonitorConfig;
pub use schema::ObservabilityConfig;
pub use schema::RedisConfig;
