//! Ambient runtime pieces shared by the OpenID provider crates: layered
//! configuration, health probes and tracing setup.

pub mod config;
pub mod health;
pub mod layers;

pub use config::{ConfigError, ConfigValidationDetail, ConfigValue, FromConfigValue, OpConfig};
pub use health::{HealthIndicator, HealthRegistry, HealthResponse, HealthStatus};
pub use layers::{catch_panic_layer, default_trace, init_tracing, LogFormat};
