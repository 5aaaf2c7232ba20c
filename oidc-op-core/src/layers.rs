use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::classify::{ServerErrorsAsFailures, SharedClassifier};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use crate::config::{ConfigError, OpConfig};

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl LogFormat {
    /// Read `log.format` (`pretty` or `json`, default `pretty`).
    pub fn from_config(config: &OpConfig) -> Result<Self, ConfigError> {
        let raw: String = config.get_or("log.format", "pretty".to_string())?;
        match raw.to_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(ConfigError::invalid(
                "log.format",
                format!("expected 'pretty' or 'json', got '{other}'"),
            )),
        }
    }
}

/// Initialise the global `tracing` subscriber.
///
/// Respects `RUST_LOG`, falling back to `info,tower_http=debug`. Call once,
/// at the very start of `main`.
pub fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Pretty => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

/// `TraceLayer` for HTTP request/response spans.
pub fn default_trace() -> TraceLayer<SharedClassifier<ServerErrorsAsFailures>> {
    TraceLayer::new_for_http()
}

/// Converts handler panics into JSON 500 responses instead of dropped connections.
pub fn catch_panic_layer() -> CatchPanicLayer<fn(Box<dyn std::any::Any + Send>) -> Response> {
    CatchPanicLayer::custom(panic_handler as fn(_) -> _)
}

fn panic_handler(_err: Box<dyn std::any::Any + Send>) -> Response {
    let body = serde_json::json!({
        "error": "server_error",
        "error_description": "internal server error",
    });
    (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(body)).into_response()
}
