//! Serving core of an OpenID Connect provider.
//!
//! Routes the five protocol endpoints to a provider's handlers, keeps the
//! token signing key current from a key stream, and runs the HTTP listener
//! with graceful shutdown driven by a `CancellationToken`.
//!
//! # Example
//!
//! ```ignore
//! use oidc_op::prelude::*;
//!
//! let token = CancellationToken::new();
//! let config = ProviderConfig::from_config(&OpConfig::load("dev")?)?;
//! let signer = new_signer(token.clone(), storage, ReceiverStream::new(keys), SignerOptions::default());
//!
//! let provider = Arc::new(MyProvider {
//!     server: AxumServer::from_config(&config),
//!     config,
//!     signer,
//! });
//!
//! start(token.clone(), provider).wait().await?;
//! ```

pub mod config;
pub mod endpoint;
pub mod error;
pub mod probes;
pub mod provider;
pub mod router;
pub mod server;
pub mod signer;
pub mod storage;

pub use config::{Configuration, ProviderConfig};
pub use endpoint::Endpoint;
pub use error::{EndpointError, OidcError, ServeError, SignerError};
pub use probes::{SignerProbe, StorageProbe};
pub use provider::OpenIdProvider;
pub use router::{create_router, DISCOVERY_ENDPOINT};
pub use server::{start, AxumServer, HttpServer, ServerHandle, ServerState};
pub use signer::{
    new_signer, ActiveSigner, JwtSigner, KeyMaterial, Signer, SignerOptions, SigningKey,
    TokenSigner,
};
pub use storage::{AuthStorage, StorageError};

pub mod prelude {
    //! Everything needed to implement and start a provider.
    pub use crate::{
        create_router, new_signer, start, AuthStorage, AxumServer, Configuration, Endpoint,
        HttpServer, KeyMaterial, OidcError, OpenIdProvider, ProviderConfig, ServeError, Signer,
        SignerOptions, SigningKey, StorageError, TokenSigner,
    };
    pub use oidc_op_core::{HealthRegistry, OpConfig};
    pub use tokio_util::sync::CancellationToken;
}
