//! Health indicators for the provider's own moving parts.

use std::sync::Arc;

use oidc_op_core::health::{HealthIndicator, HealthStatus};

use crate::signer::Signer;
use crate::storage::AuthStorage;

/// DOWN while no usable signing key is active.
pub struct SignerProbe<G> {
    signer: G,
}

impl<G: Signer> SignerProbe<G> {
    pub fn new(signer: G) -> Self {
        Self { signer }
    }
}

impl<G: Signer> HealthIndicator for SignerProbe<G> {
    fn name(&self) -> &str {
        "signer"
    }

    async fn check(&self) -> HealthStatus {
        match self.signer.health() {
            Ok(()) => HealthStatus::Up,
            Err(e) => HealthStatus::Down(e.to_string()),
        }
    }
}

/// Reports [`AuthStorage::health`].
pub struct StorageProbe<S> {
    storage: Arc<S>,
}

impl<S: AuthStorage> StorageProbe<S> {
    pub fn new(storage: Arc<S>) -> Self {
        Self { storage }
    }
}

impl<S: AuthStorage> HealthIndicator for StorageProbe<S> {
    fn name(&self) -> &str {
        "storage"
    }

    async fn check(&self) -> HealthStatus {
        match self.storage.health().await {
            Ok(()) => HealthStatus::Up,
            Err(e) => HealthStatus::Down(e.to_string()),
        }
    }
}
