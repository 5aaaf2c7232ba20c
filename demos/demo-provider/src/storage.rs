use std::collections::HashMap;

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use oidc_op::{AuthStorage, StorageError};

/// OAuth clients allowed to use the `client_credentials` grant.
///
/// Secrets are kept as argon2 hashes.
#[derive(Default)]
pub struct MemoryStorage {
    clients: HashMap<String, String>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_client(
        mut self,
        client_id: impl Into<String>,
        client_secret: &str,
    ) -> Result<Self, argon2::password_hash::Error> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(client_secret.as_bytes(), &salt)?
            .to_string();
        self.clients.insert(client_id.into(), hash);
        Ok(self)
    }

    /// Check client credentials off the async workers.
    pub async fn validate_client(&self, client_id: &str, client_secret: &str) -> bool {
        let Some(hash) = self.clients.get(client_id).cloned() else {
            return false;
        };
        let secret = client_secret.to_string();
        tokio::task::spawn_blocking(move || {
            let Ok(parsed) = PasswordHash::new(&hash) else {
                return false;
            };
            Argon2::default()
                .verify_password(secret.as_bytes(), &parsed)
                .is_ok()
        })
        .await
        .unwrap_or(false)
    }
}

impl AuthStorage for MemoryStorage {
    async fn health(&self) -> Result<(), StorageError> {
        if self.clients.is_empty() {
            return Err(StorageError("no clients registered".into()));
        }
        Ok(())
    }
}
