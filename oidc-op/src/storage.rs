use std::future::Future;

/// Failure reported by an [`AuthStorage`] backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageError(pub String);

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "storage error: {}", self.0)
    }
}

impl std::error::Error for StorageError {}

/// Persistence behind the provider (authorization requests, tokens, clients).
///
/// Only the part the serving core needs is modelled here; the provider's
/// handlers talk to their concrete storage type directly.
pub trait AuthStorage: Send + Sync + 'static {
    /// Whether the backend can currently serve requests.
    fn health(&self) -> impl Future<Output = Result<(), StorageError>> + Send;
}
