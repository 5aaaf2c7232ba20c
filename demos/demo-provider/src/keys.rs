use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use dashmap::DashMap;
use jsonwebtoken::DecodingKey;
use oidc_op::{KeyMaterial, SigningKey};
use rand::rngs::OsRng;
use rsa::pkcs8::{DecodePrivateKey, EncodePrivateKey, LineEnding};
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// A single RSA public key in JWKS form.
#[derive(Debug, Clone, Serialize)]
pub struct Jwk {
    kty: &'static str,
    alg: &'static str,
    #[serde(rename = "use")]
    use_: &'static str,
    kid: String,
    n: String,
    e: String,
}

/// JWKS response body.
#[derive(Serialize)]
pub struct JwkSet {
    keys: Vec<Jwk>,
}

/// Public halves of the keys handed to the rotator.
///
/// The most recent `retain` generations stay published so tokens signed
/// just before a rotation still verify.
pub struct PublishedKeys {
    keys: DashMap<String, (u64, Jwk)>,
    generation: AtomicU64,
    retain: u64,
}

impl PublishedKeys {
    pub fn new(retain: u64) -> Self {
        Self {
            keys: DashMap::new(),
            generation: AtomicU64::new(0),
            retain: retain.max(1),
        }
    }

    /// Publish `jwk` as the newest generation.
    pub fn publish(&self, jwk: Jwk) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.keys.insert(jwk.kid.clone(), (generation, jwk));
        let retain = self.retain;
        self.keys.retain(|_, (g, _)| *g + retain > generation);
    }

    pub fn jwks(&self) -> JwkSet {
        let mut entries: Vec<(u64, Jwk)> = self.keys.iter().map(|e| e.value().clone()).collect();
        entries.sort_by(|a, b| b.0.cmp(&a.0));
        JwkSet {
            keys: entries.into_iter().map(|(_, jwk)| jwk).collect(),
        }
    }

    pub fn decoding_key(&self, kid: &str) -> Option<DecodingKey> {
        let entry = self.keys.get(kid)?;
        let (_, jwk) = entry.value();
        DecodingKey::from_rsa_components(&jwk.n, &jwk.e).ok()
    }
}

#[derive(Debug)]
pub struct KeyGenError(String);

impl std::fmt::Display for KeyGenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "key generation failed: {}", self.0)
    }
}

impl std::error::Error for KeyGenError {}

/// Generate an RSA-2048 key pair as an RS256 [`SigningKey`] plus its JWK.
pub fn generate_rsa(kid: &str) -> Result<(SigningKey, Jwk), KeyGenError> {
    let private_key =
        RsaPrivateKey::new(&mut OsRng, 2048).map_err(|e| KeyGenError(e.to_string()))?;
    let pem = private_key
        .to_pkcs8_pem(LineEnding::LF)
        .map_err(|e| KeyGenError(e.to_string()))?;
    Ok(key_pair(kid, &private_key, pem.as_bytes()))
}

/// Load an RS256 [`SigningKey`] and its JWK from a PKCS#8 PEM private key.
pub fn rsa_from_pem(kid: &str, pem: &str) -> Result<(SigningKey, Jwk), KeyGenError> {
    let private_key = RsaPrivateKey::from_pkcs8_pem(pem).map_err(|e| KeyGenError(e.to_string()))?;
    Ok(key_pair(kid, &private_key, pem.as_bytes()))
}

fn key_pair(kid: &str, private_key: &RsaPrivateKey, pem: &[u8]) -> (SigningKey, Jwk) {
    let public_key = RsaPublicKey::from(private_key);
    let jwk = Jwk {
        kty: "RSA",
        alg: "RS256",
        use_: "sig",
        kid: kid.to_string(),
        n: URL_SAFE_NO_PAD.encode(public_key.n().to_bytes_be()),
        e: URL_SAFE_NO_PAD.encode(public_key.e().to_bytes_be()),
    };
    let key = SigningKey::new("RS256", KeyMaterial::Pem(pem.to_vec())).with_key_id(kid);
    (key, jwk)
}

/// Feed a fresh key into `keys` every `every`, starting immediately.
///
/// The public key is published before the signer switches to it.
pub async fn rotate_keys(
    token: CancellationToken,
    keys: mpsc::Sender<SigningKey>,
    published: Arc<PublishedKeys>,
    every: Duration,
) {
    let mut ticker = tokio::time::interval(every.max(Duration::from_secs(1)));
    let mut counter = 0u64;
    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => {
                debug!("Key source stopped");
                return;
            }
            _ = ticker.tick() => {}
        }

        counter += 1;
        let kid = format!("key-{counter}");
        let generated = tokio::task::spawn_blocking({
            let kid = kid.clone();
            move || generate_rsa(&kid)
        })
        .await;

        let (key, jwk) = match generated {
            Ok(Ok(pair)) => pair,
            Ok(Err(e)) => {
                error!(error = %e, %kid, "Failed to generate signing key");
                continue;
            }
            Err(e) => {
                error!(error = %e, "Key generation task failed");
                return;
            }
        };

        published.publish(jwk);
        if keys.send(key).await.is_err() {
            debug!("Key rotation no longer listening");
            return;
        }
        info!(%kid, "Generated signing key");
    }
}
