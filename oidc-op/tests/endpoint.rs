use oidc_op::{Endpoint, EndpointError};

#[test]
fn relative_is_the_routed_path() {
    let endpoint = Endpoint::new("/oauth/token").unwrap();
    assert_eq!(endpoint.relative(), "/oauth/token");
}

#[test]
fn relative_paths_are_normalized() {
    assert_eq!(Endpoint::new("authorize").unwrap().relative(), "/authorize");
    assert_eq!(Endpoint::new("/userinfo/").unwrap().relative(), "/userinfo");
    assert_eq!(
        Endpoint::new("oauth/v2/token").unwrap(),
        Endpoint::new("/oauth/v2/token").unwrap()
    );
}

#[test]
fn absolute_joins_issuer_and_path() {
    let endpoint = Endpoint::new("/userinfo").unwrap();
    assert_eq!(
        endpoint.absolute("https://op.example.com"),
        "https://op.example.com/userinfo"
    );
    assert_eq!(
        endpoint.absolute("https://op.example.com/"),
        "https://op.example.com/userinfo"
    );
}

#[test]
fn explicit_url_is_advertised_as_is() {
    let endpoint =
        Endpoint::with_url("/token", "https://edge.example.com/auth/token").unwrap();
    assert_eq!(endpoint.relative(), "/token");
    assert_eq!(
        endpoint.absolute("https://op.example.com"),
        "https://edge.example.com/auth/token"
    );
}

#[test]
fn malformed_paths_are_rejected() {
    for path in ["", "/", "//", "/a//b", "/authorize/{id}", "/files/*rest", "/a b", "/q?x=1"] {
        let err = Endpoint::new(path).unwrap_err();
        assert!(
            matches!(err, EndpointError::InvalidPath { .. }),
            "{path:?} should be rejected, got {err:?}"
        );
    }
}

#[test]
fn malformed_urls_are_rejected() {
    let err = Endpoint::with_url("/token", "not a url").unwrap_err();
    assert!(matches!(err, EndpointError::InvalidUrl { .. }));

    let err = Endpoint::with_url("/token", "mailto:op@example.com").unwrap_err();
    assert!(matches!(err, EndpointError::InvalidUrl { .. }));
}

#[test]
fn only_http_urls_are_advertised() {
    for url in ["ftp://files.example.com/token", "file:///etc/token", "ws://example.com/token"] {
        let err = Endpoint::with_url("/token", url).unwrap_err();
        assert!(
            matches!(&err, EndpointError::InvalidUrl { reason, .. } if reason.contains("http(s)")),
            "{url}: {err:?}"
        );
    }
    assert!(Endpoint::with_url("/token", "http://localhost:9998/token").is_ok());
}

#[test]
fn error_names_the_offending_path() {
    let err = Endpoint::new("/authorize/{id}").unwrap_err();
    assert_eq!(
        err.to_string(),
        "invalid endpoint path '/authorize/{id}': path segments must be literal"
    );
}
