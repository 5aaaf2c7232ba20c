use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::Request;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use oidc_op::{
    start, AxumServer, HttpServer, OpenIdProvider, ProviderConfig, ServeError, ServerState,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

struct TestProvider<H> {
    config: ProviderConfig,
    server: H,
    entered: Notify,
}

impl<H: HttpServer> TestProvider<H> {
    fn new(server: H) -> Arc<Self> {
        Arc::new(Self {
            config: ProviderConfig::default().with_listen_addr("127.0.0.1:0"),
            server,
            entered: Notify::new(),
        })
    }
}

impl<H: HttpServer> OpenIdProvider for TestProvider<H> {
    type Config = ProviderConfig;
    type Server = H;

    fn config(&self) -> &ProviderConfig {
        &self.config
    }

    fn http_server(&self) -> &H {
        &self.server
    }

    async fn handle_discovery(&self, _req: Request) -> Response {
        r#"{"issuer":"http://localhost:9998"}"#.into_response()
    }

    async fn handle_authorize(&self, _req: Request) -> Response {
        "authorize".into_response()
    }

    async fn handle_authorize_callback(&self, id: String, _req: Request) -> Response {
        if id == "stuck" {
            self.entered.notify_one();
            return std::future::pending().await;
        }
        id.into_response()
    }

    async fn handle_exchange(&self, _req: Request) -> Response {
        self.entered.notify_one();
        tokio::time::sleep(Duration::from_millis(300)).await;
        "slow".into_response()
    }

    async fn handle_userinfo(&self, _req: Request) -> Response {
        panic!("userinfo handler exploded")
    }

    fn additional_routes(&self) -> Router {
        Router::new().route("/extra", get(|| async { "extra" }))
    }
}

async fn http_get(addr: SocketAddr, path: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!("GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n");
    stream.write_all(request.as_bytes()).await.unwrap();
    let mut buf = Vec::new();
    stream.read_to_end(&mut buf).await.unwrap();
    String::from_utf8_lossy(&buf).into_owned()
}

fn axum_provider() -> Arc<TestProvider<AxumServer>> {
    TestProvider::new(AxumServer::new("127.0.0.1:0", Duration::from_secs(5)))
}

#[tokio::test]
async fn serves_until_cancelled_then_stops() {
    let token = CancellationToken::new();
    let provider = axum_provider();
    let handle = start(token.clone(), Arc::clone(&provider));

    let addr = tokio::time::timeout(Duration::from_secs(5), provider.http_server().ready())
        .await
        .unwrap()
        .expect("server did not bind");
    assert_eq!(provider.http_server().state(), ServerState::Serving);

    let response = http_get(addr, "/.well-known/openid-configuration").await;
    assert!(response.starts_with("HTTP/1.1 200"), "{response}");
    assert!(response.contains(r#"{"issuer":"http://localhost:9998"}"#));

    let response = http_get(addr, "/authorize/req-7").await;
    assert!(response.ends_with("req-7"), "{response}");

    let response = http_get(addr, "/extra").await;
    assert!(response.ends_with("extra"), "{response}");

    token.cancel();
    token.cancel();
    let result = tokio::time::timeout(Duration::from_secs(5), handle.wait())
        .await
        .expect("server did not stop");
    assert!(result.is_ok(), "{result:?}");
    assert_eq!(provider.http_server().state(), ServerState::Stopped);
    assert!(TcpStream::connect(addr).await.is_err());
}

#[tokio::test]
async fn in_flight_requests_finish_during_shutdown() {
    let token = CancellationToken::new();
    let provider = axum_provider();
    let handle = start(token.clone(), Arc::clone(&provider));
    let addr = provider.http_server().ready().await.unwrap();

    let client = tokio::spawn(async move { http_get(addr, "/oauth/token").await });
    provider.entered.notified().await;
    token.cancel();

    let response = client.await.unwrap();
    assert!(response.starts_with("HTTP/1.1 200"), "{response}");
    assert!(response.ends_with("slow"), "{response}");
    handle.wait().await.unwrap();
}

#[tokio::test]
async fn stuck_request_cannot_hold_shutdown_past_the_grace() {
    let token = CancellationToken::new();
    let provider = TestProvider::new(AxumServer::new("127.0.0.1:0", Duration::from_millis(200)));
    let handle = start(token.clone(), Arc::clone(&provider));
    let addr = provider.http_server().ready().await.unwrap();

    let client = tokio::spawn(async move { http_get(addr, "/authorize/stuck").await });
    provider.entered.notified().await;
    token.cancel();

    let result = tokio::time::timeout(Duration::from_secs(3), handle.wait())
        .await
        .expect("shutdown was not bounded by the grace period");
    assert!(result.is_ok(), "{result:?}");
    assert_eq!(provider.http_server().state(), ServerState::Stopped);
    assert!(TcpStream::connect(addr).await.is_err());
    client.abort();
}

#[tokio::test]
async fn handler_panic_becomes_a_500() {
    let token = CancellationToken::new();
    let provider = axum_provider();
    let handle = start(token.clone(), Arc::clone(&provider));
    let addr = provider.http_server().ready().await.unwrap();

    let response = http_get(addr, "/userinfo").await;
    assert!(response.starts_with("HTTP/1.1 500"), "{response}");
    assert!(response.contains("server_error"), "{response}");

    // Still serving after the panic.
    let response = http_get(addr, "/authorize").await;
    assert!(response.starts_with("HTTP/1.1 200"), "{response}");

    token.cancel();
    handle.wait().await.unwrap();
}

#[tokio::test]
async fn bind_failure_is_reported() {
    let occupied = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = occupied.local_addr().unwrap();

    let token = CancellationToken::new();
    let provider = TestProvider::new(AxumServer::new(addr.to_string(), Duration::from_secs(1)));
    let handle = start(token.clone(), Arc::clone(&provider));

    let err = tokio::time::timeout(Duration::from_secs(5), handle.wait())
        .await
        .expect("bind failure did not end serving")
        .unwrap_err();
    assert!(matches!(err, ServeError::Bind { .. }), "{err:?}");
    assert!(err.is_fatal());
    assert_eq!(provider.http_server().state(), ServerState::Stopped);
    assert!(provider.http_server().ready().await.is_none());
}

/// Serves until shut down; counts shutdown calls.
#[derive(Default)]
struct CountingServer {
    stop: CancellationToken,
    shutdowns: AtomicUsize,
    fail_shutdown: bool,
    fail_serve: bool,
}

impl HttpServer for CountingServer {
    async fn listen_and_serve(&self, _app: Router) -> Result<(), ServeError> {
        if self.fail_serve {
            return Err(ServeError::Serve(std::io::Error::other("accept failed")));
        }
        self.stop.cancelled().await;
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), ServeError> {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
        self.stop.cancel();
        if self.fail_shutdown {
            Err(ServeError::ShutdownTimeout(Duration::from_millis(1)))
        } else {
            Ok(())
        }
    }
}

#[tokio::test]
async fn start_returns_before_serving_ends() {
    let token = CancellationToken::new();
    let provider = TestProvider::new(CountingServer::default());
    let handle = start(token.clone(), Arc::clone(&provider));

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!handle.is_finished());
    assert_eq!(provider.http_server().shutdowns.load(Ordering::SeqCst), 0);

    token.cancel();
    handle.wait().await.unwrap();
}

#[tokio::test]
async fn shutdown_runs_exactly_once() {
    let token = CancellationToken::new();
    let provider = TestProvider::new(CountingServer::default());
    let handle = start(token.clone(), Arc::clone(&provider));

    token.cancel();
    token.cancel();
    handle.wait().await.unwrap();
    token.cancel();

    assert_eq!(provider.http_server().shutdowns.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn failed_shutdown_does_not_fail_serving() {
    let token = CancellationToken::new();
    let provider = TestProvider::new(CountingServer {
        fail_shutdown: true,
        ..CountingServer::default()
    });
    let handle = start(token.clone(), Arc::clone(&provider));

    token.cancel();
    handle.wait().await.unwrap();
    assert_eq!(provider.http_server().shutdowns.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn serve_failure_skips_shutdown() {
    let token = CancellationToken::new();
    let provider = TestProvider::new(CountingServer {
        fail_serve: true,
        ..CountingServer::default()
    });
    let handle = start(token.clone(), Arc::clone(&provider));

    let err = handle.wait().await.unwrap_err();
    assert!(matches!(err, ServeError::Serve(_)), "{err:?}");

    token.cancel();
    tokio::task::yield_now().await;
    assert_eq!(provider.http_server().shutdowns.load(Ordering::SeqCst), 0);
}
