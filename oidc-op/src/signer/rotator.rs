use std::sync::Arc;

use tokio::sync::watch;
use tokio_stream::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{ActiveSigner, JwtSigner, SignerOptions, SigningKey};

/// Single writer of the active signer snapshot.
pub(crate) struct KeyRotator {
    options: SignerOptions,
    active: watch::Sender<Arc<ActiveSigner>>,
}

impl KeyRotator {
    pub(crate) fn new(options: SignerOptions) -> (Self, watch::Receiver<Arc<ActiveSigner>>) {
        let (active, rx) = watch::channel(Arc::new(ActiveSigner::none()));
        (Self { options, active }, rx)
    }

    /// Apply key messages until `token` is cancelled or `keys` ends.
    pub(crate) async fn run<K>(self, token: CancellationToken, mut keys: K)
    where
        K: Stream<Item = SigningKey> + Unpin,
    {
        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => {
                    debug!("Signing key rotation stopped");
                    return;
                }
                next = keys.next() => match next {
                    Some(key) => self.apply(key),
                    None => {
                        warn!("Signing key stream closed, keeping last signer");
                        return;
                    }
                },
            }
        }
    }

    pub(crate) fn apply(&self, key: SigningKey) {
        if !key.is_usable() {
            self.active.send_replace(Arc::new(ActiveSigner::none()));
            warn!(algorithm = %key.algorithm, "signer has no key");
            return;
        }

        match JwtSigner::new(&key, &self.options) {
            Ok(signer) => {
                let algorithm = signer.algorithm();
                let kid = signer.key_id().map(str::to_owned);
                self.active.send_replace(Arc::new(ActiveSigner::active(signer)));
                info!(?algorithm, ?kid, "signer exchanged signing key");
            }
            Err(e) => {
                error!(error = %e, algorithm = %key.algorithm, "error creating signer");
            }
        }
    }
}
