use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::extract::Request;
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Router;
use oidc_op::{
    create_router, Endpoint, HttpServer, OpenIdProvider, ProviderConfig, ServeError,
    DISCOVERY_ENDPOINT,
};
use tower::ServiceExt;

/// Never serves; routing is exercised in-process.
struct NoServer;

impl HttpServer for NoServer {
    async fn listen_and_serve(&self, _app: Router) -> Result<(), ServeError> {
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), ServeError> {
        Ok(())
    }
}

struct Recording {
    config: ProviderConfig,
    server: NoServer,
    calls: Mutex<Vec<String>>,
}

impl Recording {
    fn new(config: ProviderConfig) -> Arc<Self> {
        Arc::new(Self {
            config,
            server: NoServer,
            calls: Mutex::new(Vec::new()),
        })
    }

    fn record(&self, call: String) -> Response {
        self.calls.lock().unwrap().push(call.clone());
        call.into_response()
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl OpenIdProvider for Recording {
    type Config = ProviderConfig;
    type Server = NoServer;

    fn config(&self) -> &ProviderConfig {
        &self.config
    }

    fn http_server(&self) -> &NoServer {
        &self.server
    }

    async fn handle_discovery(&self, req: Request) -> Response {
        self.record(format!("discovery {}", req.method()))
    }

    async fn handle_authorize(&self, req: Request) -> Response {
        self.record(format!("authorize {}", req.method()))
    }

    async fn handle_authorize_callback(&self, id: String, req: Request) -> Response {
        self.record(format!("callback {} {id}", req.method()))
    }

    async fn handle_exchange(&self, req: Request) -> Response {
        self.record(format!("exchange {}", req.method()))
    }

    async fn handle_userinfo(&self, req: Request) -> Response {
        self.record(format!("userinfo {}", req.method()))
    }
}

async fn call(app: &Router, method: Method, uri: &str) -> (StatusCode, String) {
    let req = axum::http::Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

#[tokio::test]
async fn each_endpoint_reaches_its_handler() {
    let provider = Recording::new(ProviderConfig::default());
    let app = create_router(Arc::clone(&provider));

    assert_eq!(
        call(&app, Method::GET, DISCOVERY_ENDPOINT).await,
        (StatusCode::OK, "discovery GET".into())
    );
    assert_eq!(
        call(&app, Method::GET, "/authorize").await,
        (StatusCode::OK, "authorize GET".into())
    );
    assert_eq!(
        call(&app, Method::GET, "/authorize/req-42").await,
        (StatusCode::OK, "callback GET req-42".into())
    );
    assert_eq!(
        call(&app, Method::POST, "/oauth/token").await,
        (StatusCode::OK, "exchange POST".into())
    );
    assert_eq!(
        call(&app, Method::GET, "/userinfo").await,
        (StatusCode::OK, "userinfo GET".into())
    );
    assert_eq!(provider.calls().len(), 5);
}

#[tokio::test]
async fn every_method_is_routed() {
    let provider = Recording::new(ProviderConfig::default());
    let app = create_router(Arc::clone(&provider));

    for method in [Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::PATCH] {
        let (status, body) = call(&app, method.clone(), "/oauth/token").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, format!("exchange {method}"));
    }
}

#[tokio::test]
async fn configured_paths_are_honored() {
    let config = ProviderConfig::default()
        .with_authorization_endpoint(Endpoint::new("/connect/authorize").unwrap())
        .with_token_endpoint(Endpoint::new("connect/token").unwrap())
        .with_userinfo_endpoint(Endpoint::new("/me").unwrap());
    let provider = Recording::new(config);
    let app = create_router(Arc::clone(&provider));

    assert_eq!(call(&app, Method::GET, "/connect/authorize").await.1, "authorize GET");
    assert_eq!(
        call(&app, Method::POST, "/connect/authorize/abc").await.1,
        "callback POST abc"
    );
    assert_eq!(call(&app, Method::POST, "/connect/token").await.1, "exchange POST");
    assert_eq!(call(&app, Method::GET, "/me").await.1, "userinfo GET");

    assert_eq!(call(&app, Method::GET, "/authorize").await.0, StatusCode::NOT_FOUND);
    assert_eq!(call(&app, Method::GET, "/oauth/token").await.0, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn nothing_else_is_routed() {
    let provider = Recording::new(ProviderConfig::default());
    let app = create_router(Arc::clone(&provider));

    for uri in [
        "/",
        "/unknown",
        "/.well-known/jwks.json",
        "/authorize/a/b",
        "/oauth",
        "/userinfo/extra",
    ] {
        let (status, _) = call(&app, Method::GET, uri).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
    }
    assert!(provider.calls().is_empty());
}

#[tokio::test]
async fn routers_built_from_the_same_provider_agree() {
    let provider = Recording::new(ProviderConfig::default());
    let first = create_router(Arc::clone(&provider));
    let second = create_router(Arc::clone(&provider));

    for uri in [DISCOVERY_ENDPOINT, "/authorize", "/authorize/x", "/oauth/token", "/userinfo", "/nope"] {
        assert_eq!(
            call(&first, Method::GET, uri).await,
            call(&second, Method::GET, uri).await,
            "{uri}"
        );
    }
}
