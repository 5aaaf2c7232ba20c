use std::sync::Arc;

use axum::extract::{Path, Request, State};
use axum::response::Response;
use axum::routing::any;
use axum::Router;

use crate::config::Configuration;
use crate::endpoint::Endpoint;
use crate::provider::OpenIdProvider;

/// Where the discovery document is served, independent of configuration.
pub const DISCOVERY_ENDPOINT: &str = "/.well-known/openid-configuration";

/// Build the route table for the five protocol endpoints.
///
/// | Path                                   | Handler                     |
/// |----------------------------------------|-----------------------------|
/// | `/.well-known/openid-configuration`    | `handle_discovery`          |
/// | authorization endpoint                 | `handle_authorize`          |
/// | authorization endpoint + `/{id}`       | `handle_authorize_callback` |
/// | token endpoint                         | `handle_exchange`           |
/// | userinfo endpoint                      | `handle_userinfo`           |
///
/// Every method is routed; handlers enforce their own method policy. Nothing
/// else is registered. The result depends only on the provider's endpoint
/// configuration.
pub fn create_router<P: OpenIdProvider>(provider: Arc<P>) -> Router {
    let config = provider.config();
    let authorize = config.authorization_endpoint().relative().to_string();
    let callback = callback_path(config.authorization_endpoint());
    let token = config.token_endpoint().relative().to_string();
    let userinfo = config.userinfo_endpoint().relative().to_string();

    Router::new()
        .route(DISCOVERY_ENDPOINT, any(discovery::<P>))
        .route(&authorize, any(authorize_handler::<P>))
        .route(&callback, any(authorize_callback::<P>))
        .route(&token, any(exchange::<P>))
        .route(&userinfo, any(userinfo_handler::<P>))
        .with_state(provider)
}

/// The callback route: the authorization path plus one opaque id segment.
pub fn callback_path(authorization: &Endpoint) -> String {
    format!("{}/{{id}}", authorization.relative())
}

async fn discovery<P: OpenIdProvider>(State(provider): State<Arc<P>>, req: Request) -> Response {
    provider.handle_discovery(req).await
}

async fn authorize_handler<P: OpenIdProvider>(
    State(provider): State<Arc<P>>,
    req: Request,
) -> Response {
    provider.handle_authorize(req).await
}

async fn authorize_callback<P: OpenIdProvider>(
    State(provider): State<Arc<P>>,
    Path(id): Path<String>,
    req: Request,
) -> Response {
    provider.handle_authorize_callback(id, req).await
}

async fn exchange<P: OpenIdProvider>(State(provider): State<Arc<P>>, req: Request) -> Response {
    provider.handle_exchange(req).await
}

async fn userinfo_handler<P: OpenIdProvider>(
    State(provider): State<Arc<P>>,
    req: Request,
) -> Response {
    provider.handle_userinfo(req).await
}
