use std::future::Future;

use axum::extract::Request;
use axum::response::Response;
use axum::Router;

use crate::config::Configuration;
use crate::server::HttpServer;

/// The capability set of an OpenID provider: its endpoint configuration, one
/// handler per protocol endpoint and the listener that serves them.
///
/// Handlers receive the raw request and own the protocol logic (method
/// checks, parameter parsing, storage access). The router only decides which
/// handler a path reaches.
///
/// ```ignore
/// struct MyProvider { config: ProviderConfig, server: AxumServer, signer: TokenSigner<Db> }
///
/// impl OpenIdProvider for MyProvider {
///     type Config = ProviderConfig;
///     type Server = AxumServer;
///     fn config(&self) -> &ProviderConfig { &self.config }
///     fn http_server(&self) -> &AxumServer { &self.server }
///     async fn handle_discovery(&self, _req: Request) -> Response { /* ... */ }
///     // ...
/// }
///
/// let handle = oidc_op::start(token.clone(), Arc::new(provider));
/// ```
pub trait OpenIdProvider: Send + Sync + 'static {
    type Config: Configuration;
    type Server: HttpServer;

    fn config(&self) -> &Self::Config;

    fn http_server(&self) -> &Self::Server;

    /// `/.well-known/openid-configuration`
    fn handle_discovery(&self, req: Request) -> impl Future<Output = Response> + Send;

    /// The authorization endpoint.
    fn handle_authorize(&self, req: Request) -> impl Future<Output = Response> + Send;

    /// `{authorization endpoint}/{id}`: resumes the authorization request `id`
    /// (e.g. after login or consent).
    fn handle_authorize_callback(
        &self,
        id: String,
        req: Request,
    ) -> impl Future<Output = Response> + Send;

    /// The token endpoint.
    fn handle_exchange(&self, req: Request) -> impl Future<Output = Response> + Send;

    /// The userinfo endpoint.
    fn handle_userinfo(&self, req: Request) -> impl Future<Output = Response> + Send;

    /// Routes the provider serves next to the protocol endpoints (health,
    /// JWKS, login pages). Empty by default.
    fn additional_routes(&self) -> Router {
        Router::new()
    }
}
