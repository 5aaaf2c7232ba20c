use std::sync::Arc;
use std::time::Duration;

use oidc_op::prelude::*;
use oidc_op_core::{init_tracing, LogFormat};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{error, info};

use demo_provider::keys::{rotate_keys, PublishedKeys};
use demo_provider::provider::DemoProvider;
use demo_provider::storage::MemoryStorage;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = OpConfig::load("dev")?;
    init_tracing(LogFormat::from_config(&config)?);

    let provider_config = ProviderConfig::from_config(&config)?;
    let options = SignerOptions::from_config(&config)?;
    let audience: String = config.get_or("demo.audience", "demo-api".to_string())?;
    let token_ttl: Duration = config.get_or("demo.token.ttl", Duration::from_secs(3600))?;
    let rotate_every: Duration = config.get_or("demo.keys.rotate", Duration::from_secs(3600))?;
    let retain: u64 = config.get_or("demo.keys.retain", 2)?;
    let client_id: String = config.get_or("demo.client.id", "demo-client".to_string())?;
    let client_secret: String = config.get_or("demo.client.secret", "demo-secret".to_string())?;

    let token = CancellationToken::new();
    let storage = Arc::new(MemoryStorage::new().add_client(client_id, &client_secret)?);
    let published = Arc::new(PublishedKeys::new(retain));

    let (tx, rx) = mpsc::channel(4);
    let key_source = tokio::spawn(rotate_keys(
        token.clone(),
        tx,
        Arc::clone(&published),
        rotate_every,
    ));
    let signer = new_signer(token.clone(), storage, ReceiverStream::new(rx), options);

    info!(profile = config.profile(), issuer = %provider_config.issuer, "Starting demo provider");
    let provider = Arc::new(DemoProvider::new(
        provider_config,
        signer,
        published,
        audience,
        token_ttl,
    ));
    let handle = start(token.clone(), provider);

    tokio::spawn({
        let token = token.clone();
        async move {
            shutdown_signal().await;
            token.cancel();
        }
    });

    let served = handle.wait().await;
    token.cancel();
    let _ = key_source.await;
    served?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown");
}
