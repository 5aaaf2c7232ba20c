//! Liveness/readiness probes for the provider.
//!
//! # Endpoints
//!
//! | Path                | Description                                   |
//! |---------------------|-----------------------------------------------|
//! | `GET /health`       | Aggregated status, 200 if UP, 503 if DOWN     |
//! | `GET /health/live`  | Liveness probe, always 200                    |
//! | `GET /health/ready` | Readiness probe, 200 if readiness checks pass |
//!
//! # Example
//!
//! ```ignore
//! use oidc_op_core::health::{HealthIndicator, HealthRegistry, HealthStatus};
//!
//! struct KeyVault;
//!
//! impl HealthIndicator for KeyVault {
//!     fn name(&self) -> &str { "vault" }
//!     async fn check(&self) -> HealthStatus { HealthStatus::Up }
//! }
//!
//! let routes = HealthRegistry::new().check(KeyVault).router();
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

/// Result of a single health check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    Up,
    Down(String),
}

impl HealthStatus {
    pub fn is_up(&self) -> bool {
        matches!(self, HealthStatus::Up)
    }
}

/// A named check contributing to `/health` and, by default, `/health/ready`.
pub trait HealthIndicator: Send + Sync + 'static {
    /// The name reported in the response (e.g. `"signer"`).
    fn name(&self) -> &str;

    fn check(&self) -> impl Future<Output = HealthStatus> + Send;

    /// Whether a DOWN result fails the readiness probe (default: `true`).
    fn affects_readiness(&self) -> bool {
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HealthCheckStatus {
    Up,
    Down,
}

/// One entry of a [`HealthResponse`].
#[derive(Debug, Clone, Serialize)]
pub struct HealthCheck {
    pub name: String,
    pub status: HealthCheckStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub duration_ms: u64,
}

/// Aggregated health response body.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: HealthCheckStatus,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub checks: Vec<HealthCheck>,
    pub uptime_seconds: u64,
}

impl HealthResponse {
    pub fn is_up(&self) -> bool {
        self.status == HealthCheckStatus::Up
    }
}

#[doc(hidden)]
pub trait HealthIndicatorErased: Send + Sync + 'static {
    fn name(&self) -> &str;
    fn check(&self) -> Pin<Box<dyn Future<Output = HealthStatus> + Send + '_>>;
    fn affects_readiness(&self) -> bool;
}

impl<T: HealthIndicator> HealthIndicatorErased for T {
    fn name(&self) -> &str {
        HealthIndicator::name(self)
    }

    fn check(&self) -> Pin<Box<dyn Future<Output = HealthStatus> + Send + '_>> {
        Box::pin(HealthIndicator::check(self))
    }

    fn affects_readiness(&self) -> bool {
        HealthIndicator::affects_readiness(self)
    }
}

/// Collection of health indicators, served through [`HealthRegistry::router`].
pub struct HealthRegistry {
    checks: Vec<Box<dyn HealthIndicatorErased>>,
    started: Instant,
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self {
            checks: Vec::new(),
            started: Instant::now(),
        }
    }

    /// Register a health check.
    pub fn check<H: HealthIndicator>(mut self, indicator: H) -> Self {
        self.checks.push(Box::new(indicator));
        self
    }

    /// Run every check.
    pub async fn aggregate(&self) -> HealthResponse {
        self.run(|_| true).await
    }

    /// Run only the checks that affect readiness.
    pub async fn aggregate_readiness(&self) -> HealthResponse {
        self.run(|indicator| indicator.affects_readiness()).await
    }

    async fn run(&self, include: impl Fn(&dyn HealthIndicatorErased) -> bool) -> HealthResponse {
        let mut checks = Vec::with_capacity(self.checks.len());
        for indicator in &self.checks {
            if !include(&**indicator) {
                continue;
            }
            let start = Instant::now();
            let status = indicator.check().await;
            let (status, reason) = match status {
                HealthStatus::Up => (HealthCheckStatus::Up, None),
                HealthStatus::Down(reason) => (HealthCheckStatus::Down, Some(reason)),
            };
            checks.push(HealthCheck {
                name: indicator.name().to_string(),
                status,
                reason,
                duration_ms: start.elapsed().as_millis() as u64,
            });
        }

        let status = if checks.iter().all(|c| c.status == HealthCheckStatus::Up) {
            HealthCheckStatus::Up
        } else {
            HealthCheckStatus::Down
        };
        HealthResponse {
            status,
            checks,
            uptime_seconds: self.started.elapsed().as_secs(),
        }
    }

    /// Routes for `/health`, `/health/live` and `/health/ready`.
    pub fn router(self) -> Router {
        Router::new()
            .route("/health", get(health_handler))
            .route("/health/live", get(liveness_handler))
            .route("/health/ready", get(readiness_handler))
            .with_state(Arc::new(self))
    }
}

impl Default for HealthRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn into_http(response: HealthResponse) -> impl IntoResponse {
    let code = if response.is_up() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(response))
}

async fn health_handler(State(registry): State<Arc<HealthRegistry>>) -> impl IntoResponse {
    into_http(registry.aggregate().await)
}

async fn liveness_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn readiness_handler(State(registry): State<Arc<HealthRegistry>>) -> impl IntoResponse {
    into_http(registry.aggregate_readiness().await)
}
