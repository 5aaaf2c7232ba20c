use axum::body::Body;
use axum::http::{Request, StatusCode};
use oidc_op_core::health::{HealthCheckStatus, HealthIndicator, HealthRegistry, HealthStatus};
use tower::ServiceExt;

struct AlwaysUp;
impl HealthIndicator for AlwaysUp {
    fn name(&self) -> &str {
        "up-check"
    }
    fn check(&self) -> impl std::future::Future<Output = HealthStatus> + Send {
        async { HealthStatus::Up }
    }
}

struct AlwaysDown;
impl HealthIndicator for AlwaysDown {
    fn name(&self) -> &str {
        "down-check"
    }
    fn check(&self) -> impl std::future::Future<Output = HealthStatus> + Send {
        async { HealthStatus::Down("broken".into()) }
    }
}

/// Down, but only informational: must not fail readiness.
struct LivenessOnly;
impl HealthIndicator for LivenessOnly {
    fn name(&self) -> &str {
        "disk"
    }
    fn check(&self) -> impl std::future::Future<Output = HealthStatus> + Send {
        async { HealthStatus::Down("nearly full".into()) }
    }
    fn affects_readiness(&self) -> bool {
        false
    }
}

async fn body_json(resp: axum::http::Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[test]
fn health_status_is_up() {
    assert!(HealthStatus::Up.is_up());
    assert!(!HealthStatus::Down("db unreachable".into()).is_up());
}

#[tokio::test]
async fn aggregate_reports_each_check() {
    let registry = HealthRegistry::new().check(AlwaysUp).check(AlwaysDown);
    let response = registry.aggregate().await;

    assert_eq!(response.status, HealthCheckStatus::Down);
    assert_eq!(response.checks.len(), 2);
    assert_eq!(response.checks[0].status, HealthCheckStatus::Up);
    assert_eq!(response.checks[1].reason.as_deref(), Some("broken"));
}

#[tokio::test]
async fn readiness_skips_liveness_only_checks() {
    let registry = HealthRegistry::new().check(AlwaysUp).check(LivenessOnly);

    assert!(!registry.aggregate().await.is_up());
    let ready = registry.aggregate_readiness().await;
    assert!(ready.is_up());
    assert_eq!(ready.checks.len(), 1);
}

#[tokio::test]
async fn empty_registry_is_up() {
    assert!(HealthRegistry::default().aggregate().await.is_up());
}

#[tokio::test]
async fn health_endpoint_returns_503_when_down() {
    let app = HealthRegistry::new().check(AlwaysDown).router();
    let resp = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    let json = body_json(resp).await;
    assert_eq!(json["status"], "DOWN");
    assert_eq!(json["checks"][0]["name"], "down-check");
}

#[tokio::test]
async fn liveness_endpoint_is_always_ok() {
    let app = HealthRegistry::new().check(AlwaysDown).router();
    let resp = app
        .oneshot(Request::get("/health/live").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn readiness_endpoint_ok_when_ready() {
    let app = HealthRegistry::new().check(AlwaysUp).router();
    let resp = app
        .oneshot(Request::get("/health/ready").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["status"], "UP");
}
