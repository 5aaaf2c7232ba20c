//! Token signing: the read-side [`Signer`] facade and the background key
//! rotation that keeps it current.
//!
//! Keys arrive on a stream from whatever manages them (a KMS poller, a
//! rotation schedule, a test). Each message replaces the active signer as a
//! whole, so concurrent token issuance never sees an algorithm paired with
//! another key's signer.
//!
//! ```ignore
//! let (tx, rx) = tokio::sync::mpsc::channel(4);
//! let signer = new_signer(token.clone(), storage, ReceiverStream::new(rx), SignerOptions::default());
//! tx.send(SigningKey::new("RS256", KeyMaterial::Pem(pem))).await?;
//! ```

mod rotator;

use std::str::FromStr;
use std::sync::Arc;

use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use oidc_op_core::config::{ConfigError, OpConfig};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_stream::Stream;
use tokio_util::sync::CancellationToken;

use crate::error::SignerError;
use crate::storage::AuthStorage;

use rotator::KeyRotator;

/// Raw key material as delivered by key management.
#[derive(Clone, PartialEq, Eq)]
pub enum KeyMaterial {
    /// Shared secret for the HS* algorithms.
    Secret(Vec<u8>),
    /// PEM-encoded private key (RSA, EC or Ed25519).
    Pem(Vec<u8>),
}

impl KeyMaterial {
    fn kind(&self) -> &'static str {
        match self {
            KeyMaterial::Secret(_) => "secret",
            KeyMaterial::Pem(_) => "PEM",
        }
    }
}

impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "KeyMaterial::{}(<redacted>)", self.kind())
    }
}

/// One message on the key stream.
///
/// An empty algorithm or missing material means "no usable key right now"
/// and deactivates the current signer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SigningKey {
    pub algorithm: String,
    pub key: Option<KeyMaterial>,
    /// Overrides [`SignerOptions::key_id`] in the JWS header when set.
    pub key_id: Option<String>,
}

impl SigningKey {
    pub fn new(algorithm: impl Into<String>, key: KeyMaterial) -> Self {
        Self {
            algorithm: algorithm.into(),
            key: Some(key),
            key_id: None,
        }
    }

    /// The deactivation signal.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_key_id(mut self, kid: impl Into<String>) -> Self {
        self.key_id = Some(kid.into());
        self
    }

    pub(crate) fn is_usable(&self) -> bool {
        !self.algorithm.is_empty() && self.key.is_some()
    }
}

/// Header defaults applied to every token signed by a rotated-in key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignerOptions {
    pub key_id: Option<String>,
    pub typ: Option<String>,
    pub content_type: Option<String>,
}

impl Default for SignerOptions {
    fn default() -> Self {
        Self {
            key_id: None,
            typ: Some("JWT".into()),
            content_type: None,
        }
    }
}

impl SignerOptions {
    /// Read `oidc.signer.kid`, `oidc.signer.typ` and `oidc.signer.cty`.
    pub fn from_config(config: &OpConfig) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            key_id: config.get_or("oidc.signer.kid", defaults.key_id)?,
            typ: config.get_or("oidc.signer.typ", defaults.typ)?,
            content_type: config.get_or("oidc.signer.cty", defaults.content_type)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyFamily {
    Hmac,
    Rsa,
    Ec,
    Ed,
}

fn family(alg: Algorithm) -> Option<KeyFamily> {
    use Algorithm::*;
    if matches!(alg, HS256 | HS384 | HS512) {
        Some(KeyFamily::Hmac)
    } else if matches!(alg, RS256 | RS384 | RS512 | PS256 | PS384 | PS512) {
        Some(KeyFamily::Rsa)
    } else if matches!(alg, ES256 | ES384) {
        Some(KeyFamily::Ec)
    } else if matches!(alg, EdDSA) {
        Some(KeyFamily::Ed)
    } else {
        None
    }
}

/// The signing capability: one key, one algorithm, a fixed header template.
pub struct JwtSigner {
    algorithm: Algorithm,
    key: EncodingKey,
    header: Header,
}

impl JwtSigner {
    /// Build a signer from a key message and the process-wide options.
    pub fn new(key: &SigningKey, options: &SignerOptions) -> Result<Self, SignerError> {
        let algorithm = Algorithm::from_str(&key.algorithm)
            .map_err(|_| SignerError::UnsupportedAlgorithm(key.algorithm.clone()))?;
        let family =
            family(algorithm).ok_or_else(|| SignerError::UnsupportedAlgorithm(key.algorithm.clone()))?;
        let material = key.key.as_ref().ok_or(SignerError::NoSigner)?;

        let invalid = |e: jsonwebtoken::errors::Error| SignerError::InvalidKey(e.to_string());
        let encoding_key = match (family, material) {
            (KeyFamily::Hmac, KeyMaterial::Secret(secret)) if secret.is_empty() => {
                return Err(SignerError::EmptySecret)
            }
            (KeyFamily::Hmac, KeyMaterial::Secret(secret)) => EncodingKey::from_secret(secret),
            (KeyFamily::Rsa, KeyMaterial::Pem(pem)) => EncodingKey::from_rsa_pem(pem).map_err(invalid)?,
            (KeyFamily::Ec, KeyMaterial::Pem(pem)) => EncodingKey::from_ec_pem(pem).map_err(invalid)?,
            (KeyFamily::Ed, KeyMaterial::Pem(pem)) => EncodingKey::from_ed_pem(pem).map_err(invalid)?,
            (_, material) => {
                return Err(SignerError::KeyMismatch {
                    algorithm: key.algorithm.clone(),
                    material: material.kind(),
                })
            }
        };

        let mut header = Header::new(algorithm);
        header.kid = key.key_id.clone().or_else(|| options.key_id.clone());
        header.typ = options.typ.clone();
        header.cty = options.content_type.clone();

        Ok(Self {
            algorithm,
            key: encoding_key,
            header,
        })
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// The `kid` placed in the header of every token this signer issues.
    pub fn key_id(&self) -> Option<&str> {
        self.header.kid.as_deref()
    }

    /// Sign `claims` into a compact JWS.
    pub fn sign<T: Serialize>(&self, claims: &T) -> Result<String, SignerError> {
        encode(&self.header, claims, &self.key).map_err(|e| SignerError::Sign(e.to_string()))
    }
}

impl std::fmt::Debug for JwtSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtSigner")
            .field("algorithm", &self.algorithm)
            .field("kid", &self.header.kid)
            .finish_non_exhaustive()
    }
}

/// The published `{signer, algorithm}` pair. Always replaced as a whole.
#[derive(Debug, Clone, Default)]
pub struct ActiveSigner {
    signer: Option<Arc<JwtSigner>>,
    algorithm: Option<Algorithm>,
}

impl ActiveSigner {
    /// The "no signer" state.
    pub fn none() -> Self {
        Self::default()
    }

    pub(crate) fn active(signer: JwtSigner) -> Self {
        Self {
            algorithm: Some(signer.algorithm()),
            signer: Some(Arc::new(signer)),
        }
    }

    pub fn signer(&self) -> Option<&Arc<JwtSigner>> {
        self.signer.as_ref()
    }

    pub fn algorithm(&self) -> Option<Algorithm> {
        self.algorithm
    }

    pub fn is_active(&self) -> bool {
        self.signer.is_some() && self.algorithm.is_some()
    }

    /// `Ok` when both halves are present.
    pub fn health(&self) -> Result<(), SignerError> {
        if self.signer.is_none() {
            return Err(SignerError::NoSigner);
        }
        if self.algorithm.is_none() {
            return Err(SignerError::NoAlgorithm);
        }
        Ok(())
    }
}

/// Read side of token signing, shared by every token-issuing handler.
///
/// Every method is a snapshot read; none waits for a rotation in progress.
pub trait Signer: Send + Sync + 'static {
    /// `NoSigner` or `NoAlgorithm` while no usable key is active.
    ///
    /// Takes no request context: the check reads the current snapshot and
    /// returns at once, so there is nothing to cancel or time out.
    fn health(&self) -> Result<(), SignerError>;

    fn signer(&self) -> Option<Arc<JwtSigner>>;

    /// Consistent with [`Signer::signer`] unless a rotation lands between the
    /// two calls. Use [`TokenSigner::snapshot`] to read both at once.
    fn signature_algorithm(&self) -> Option<Algorithm>;
}

/// [`Signer`] fed by a background [`KeyRotator`] task.
pub struct TokenSigner<S> {
    active: watch::Receiver<Arc<ActiveSigner>>,
    storage: Arc<S>,
}

impl<S: AuthStorage> TokenSigner<S> {
    /// Start key rotation and return the facade together with the rotation
    /// task's handle. The facade starts in the "no signer" state.
    ///
    /// The task ends when `token` is cancelled or `keys` is exhausted; the
    /// last published signer stays readable afterwards.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    pub fn spawn<K>(
        token: CancellationToken,
        storage: Arc<S>,
        keys: K,
        options: SignerOptions,
    ) -> (Self, JoinHandle<()>)
    where
        K: Stream<Item = SigningKey> + Send + Unpin + 'static,
    {
        let (rotator, active) = KeyRotator::new(options);
        let task = tokio::spawn(rotator.run(token, keys));
        (Self { active, storage }, task)
    }

    /// The storage handle this signer was created with.
    pub fn storage(&self) -> &Arc<S> {
        &self.storage
    }
}

impl<S> TokenSigner<S> {
    /// The current `{signer, algorithm}` pair, read in one step.
    pub fn snapshot(&self) -> Arc<ActiveSigner> {
        Arc::clone(&self.active.borrow())
    }

    /// Wait until a usable signer is published.
    ///
    /// Fails with [`SignerError::NoSigner`] if rotation stops first.
    pub async fn wait_until_ready(&self) -> Result<Arc<ActiveSigner>, SignerError> {
        let mut rx = self.active.clone();
        let ready = rx
            .wait_for(|active| active.is_active())
            .await
            .map(|active| Arc::clone(&active));
        ready.map_err(|_| SignerError::NoSigner)
    }
}

impl<S> Clone for TokenSigner<S> {
    fn clone(&self) -> Self {
        Self {
            active: self.active.clone(),
            storage: Arc::clone(&self.storage),
        }
    }
}

impl<S: Send + Sync + 'static> Signer for TokenSigner<S> {
    fn health(&self) -> Result<(), SignerError> {
        self.active.borrow().health()
    }

    fn signer(&self) -> Option<Arc<JwtSigner>> {
        self.active.borrow().signer().cloned()
    }

    fn signature_algorithm(&self) -> Option<Algorithm> {
        self.active.borrow().algorithm()
    }
}

/// Start key rotation in the background and return the [`Signer`] facade
/// immediately, before the first key has necessarily arrived.
///
/// # Panics
///
/// Panics when called outside a Tokio runtime.
pub fn new_signer<S, K>(
    token: CancellationToken,
    storage: Arc<S>,
    keys: K,
    options: SignerOptions,
) -> TokenSigner<S>
where
    S: AuthStorage,
    K: Stream<Item = SigningKey> + Send + Unpin + 'static,
{
    TokenSigner::spawn(token, storage, keys, options).0
}
