use std::time::Duration;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// A malformed endpoint path or URL, caught when the configuration is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndpointError {
    InvalidPath { path: String, reason: &'static str },
    InvalidUrl { url: String, reason: String },
}

impl std::fmt::Display for EndpointError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EndpointError::InvalidPath { path, reason } => {
                write!(f, "invalid endpoint path '{path}': {reason}")
            }
            EndpointError::InvalidUrl { url, reason } => {
                write!(f, "invalid endpoint url '{url}': {reason}")
            }
        }
    }
}

impl std::error::Error for EndpointError {}

/// Signer availability and construction errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignerError {
    /// No signer is active.
    NoSigner,
    /// The active snapshot has no signature algorithm.
    NoAlgorithm,
    /// The algorithm identifier is not a JWS algorithm we can sign with.
    UnsupportedAlgorithm(String),
    /// The key material does not belong to the algorithm's family.
    KeyMismatch {
        algorithm: String,
        material: &'static str,
    },
    /// An HMAC algorithm with a zero-length secret.
    EmptySecret,
    /// The key material could not be parsed.
    InvalidKey(String),
    /// Signing itself failed.
    Sign(String),
}

impl std::fmt::Display for SignerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignerError::NoSigner => write!(f, "no signer"),
            SignerError::NoAlgorithm => write!(f, "no signing algorithm"),
            SignerError::UnsupportedAlgorithm(alg) => {
                write!(f, "unsupported signing algorithm '{alg}'")
            }
            SignerError::KeyMismatch {
                algorithm,
                material,
            } => write!(f, "{material} key material cannot be used with {algorithm}"),
            SignerError::EmptySecret => write!(f, "HMAC secret is empty"),
            SignerError::InvalidKey(msg) => write!(f, "invalid signing key: {msg}"),
            SignerError::Sign(msg) => write!(f, "failed to sign token: {msg}"),
        }
    }
}

impl std::error::Error for SignerError {}

/// Listener failures.
#[derive(Debug)]
pub enum ServeError {
    /// The listen address could not be bound.
    Bind {
        addr: String,
        source: std::io::Error,
    },
    /// The accept/serve loop failed after binding.
    Serve(std::io::Error),
    /// In-flight requests did not drain within the grace period.
    ShutdownTimeout(Duration),
}

impl ServeError {
    /// Whether the error ends serving abnormally (as opposed to a late shutdown).
    pub fn is_fatal(&self) -> bool {
        matches!(self, ServeError::Bind { .. } | ServeError::Serve(_))
    }
}

impl std::fmt::Display for ServeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServeError::Bind { addr, source } => write!(f, "failed to bind {addr}: {source}"),
            ServeError::Serve(e) => write!(f, "serve failed: {e}"),
            ServeError::ShutdownTimeout(grace) => {
                write!(f, "graceful shutdown did not finish within {grace:?}")
            }
        }
    }
}

impl std::error::Error for ServeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ServeError::Bind { source, .. } => Some(source),
            ServeError::Serve(e) => Some(e),
            ServeError::ShutdownTimeout(_) => None,
        }
    }
}

/// OAuth 2.0 error response per RFC 6749 Section 5.2.
#[derive(Debug, Serialize)]
pub struct OidcErrorBody {
    pub error: &'static str,
    pub error_description: String,
}

/// Protocol error returned by provider handlers.
#[derive(Debug)]
pub enum OidcError {
    /// Missing or malformed request parameters.
    InvalidRequest(String),
    /// Invalid authorization code, credentials or request id.
    InvalidGrant(String),
    /// Unsupported grant type.
    UnsupportedGrantType(String),
    /// Unknown client or bad client credentials.
    InvalidClient(String),
    /// Missing or invalid bearer token.
    Unauthorized(String),
    /// No usable signing key right now; retry later.
    TemporarilyUnavailable(String),
    /// Internal server error.
    Internal(String),
}

impl OidcError {
    fn error_code(&self) -> &'static str {
        match self {
            OidcError::InvalidRequest(_) => "invalid_request",
            OidcError::InvalidGrant(_) => "invalid_grant",
            OidcError::UnsupportedGrantType(_) => "unsupported_grant_type",
            OidcError::InvalidClient(_) => "invalid_client",
            OidcError::Unauthorized(_) => "invalid_token",
            OidcError::TemporarilyUnavailable(_) => "temporarily_unavailable",
            OidcError::Internal(_) => "server_error",
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            OidcError::InvalidRequest(_)
            | OidcError::InvalidGrant(_)
            | OidcError::UnsupportedGrantType(_) => StatusCode::BAD_REQUEST,
            OidcError::InvalidClient(_) | OidcError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            OidcError::TemporarilyUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            OidcError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn description(&self) -> &str {
        match self {
            OidcError::InvalidRequest(s)
            | OidcError::InvalidGrant(s)
            | OidcError::UnsupportedGrantType(s)
            | OidcError::InvalidClient(s)
            | OidcError::Unauthorized(s)
            | OidcError::TemporarilyUnavailable(s)
            | OidcError::Internal(s) => s,
        }
    }
}

impl From<SignerError> for OidcError {
    fn from(err: SignerError) -> Self {
        match err {
            SignerError::NoSigner | SignerError::NoAlgorithm => {
                OidcError::TemporarilyUnavailable(err.to_string())
            }
            other => OidcError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for OidcError {
    fn into_response(self) -> Response {
        let body = OidcErrorBody {
            error: self.error_code(),
            error_description: self.description().to_string(),
        };
        (self.status_code(), Json(body)).into_response()
    }
}

impl std::fmt::Display for OidcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error_code(), self.description())
    }
}

impl std::error::Error for OidcError {}
