use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::extract::{FromRequest, Request, State};
use axum::http::{header, HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Form, Json, Router};
use jsonwebtoken::{decode, decode_header, Algorithm, Validation};
use oidc_op::prelude::*;
use oidc_op::{SignerProbe, StorageProbe};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

use crate::keys::PublishedKeys;
use crate::storage::MemoryStorage;

const JWKS_PATH: &str = "/.well-known/jwks.json";

const TOKEN_HEADERS: [(header::HeaderName, &str); 2] = [
    (header::CACHE_CONTROL, "no-store"),
    (header::PRAGMA, "no-cache"),
];

/// A provider issuing client-credentials access tokens signed with rotating
/// RSA keys.
pub struct DemoProvider {
    config: ProviderConfig,
    server: AxumServer,
    signer: TokenSigner<MemoryStorage>,
    keys: Arc<PublishedKeys>,
    audience: String,
    token_ttl: Duration,
}

impl DemoProvider {
    pub fn new(
        config: ProviderConfig,
        signer: TokenSigner<MemoryStorage>,
        keys: Arc<PublishedKeys>,
        audience: String,
        token_ttl: Duration,
    ) -> Self {
        Self {
            server: AxumServer::from_config(&config),
            config,
            signer,
            keys,
            audience,
            token_ttl,
        }
    }

    async fn exchange(&self, req: Request) -> Result<Response, OidcError> {
        let Form(form) = Form::<TokenRequest>::from_request(req, &())
            .await
            .map_err(|rejection| OidcError::InvalidRequest(rejection.body_text()))?;

        if form.grant_type != "client_credentials" {
            return Err(OidcError::UnsupportedGrantType(format!(
                "grant_type '{}' is not supported",
                form.grant_type
            )));
        }
        let client_id = form
            .client_id
            .ok_or_else(|| OidcError::InvalidRequest("missing 'client_id' parameter".into()))?;
        let client_secret = form
            .client_secret
            .ok_or_else(|| OidcError::InvalidRequest("missing 'client_secret' parameter".into()))?;

        debug!(%client_id, "Processing client_credentials grant");
        if !self
            .signer
            .storage()
            .validate_client(&client_id, &client_secret)
            .await
        {
            warn!(%client_id, "Invalid client credentials");
            return Err(OidcError::InvalidClient("invalid client credentials".into()));
        }

        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| OidcError::Internal(format!("system clock error: {e}")))?
            .as_secs();
        let claims = json!({
            "iss": self.config.issuer,
            "sub": client_id,
            "aud": self.audience,
            "iat": now,
            "exp": now + self.token_ttl.as_secs(),
        });

        let active = self.signer.snapshot();
        active.health()?;
        let signer = active
            .signer()
            .ok_or_else(|| OidcError::TemporarilyUnavailable("no signer".into()))?;
        let access_token = signer.sign(&claims)?;

        let body = TokenResponse {
            access_token,
            token_type: "Bearer",
            expires_in: self.token_ttl.as_secs(),
        };
        Ok((TOKEN_HEADERS, Json(body)).into_response())
    }

    fn userinfo(&self, headers: &HeaderMap) -> Result<Response, OidcError> {
        let token = bearer_token(headers)?;
        let header = decode_header(token)
            .map_err(|e| OidcError::Unauthorized(format!("invalid token: {e}")))?;
        let kid = header
            .kid
            .ok_or_else(|| OidcError::Unauthorized("token has no 'kid'".into()))?;
        let key = self
            .keys
            .decoding_key(&kid)
            .ok_or_else(|| OidcError::Unauthorized(format!("unknown key '{kid}'")))?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[&self.config.issuer]);
        validation.set_audience(&[&self.audience]);
        let data = decode::<Claims>(token, &key, &validation)
            .map_err(|e| OidcError::Unauthorized(format!("invalid token: {e}")))?;

        Ok(Json(json!({ "sub": data.claims.sub })).into_response())
    }
}

#[derive(Debug, Deserialize)]
struct TokenRequest {
    grant_type: String,
    client_id: Option<String>,
    client_secret: Option<String>,
}

#[derive(Serialize)]
struct TokenResponse {
    access_token: String,
    token_type: &'static str,
    expires_in: u64,
}

#[derive(Deserialize)]
struct Claims {
    sub: String,
}

#[derive(Serialize)]
struct DiscoveryDocument {
    issuer: String,
    authorization_endpoint: String,
    token_endpoint: String,
    userinfo_endpoint: String,
    jwks_uri: String,
    grant_types_supported: Vec<&'static str>,
    response_types_supported: Vec<&'static str>,
    subject_types_supported: Vec<&'static str>,
    id_token_signing_alg_values_supported: Vec<Algorithm>,
}

fn bearer_token(headers: &HeaderMap) -> Result<&str, OidcError> {
    let auth = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| OidcError::Unauthorized("missing Authorization header".into()))?;
    auth.strip_prefix("Bearer ")
        .ok_or_else(|| OidcError::Unauthorized("expected Bearer token".into()))
}

fn method_not_allowed() -> Response {
    StatusCode::METHOD_NOT_ALLOWED.into_response()
}

async fn jwks(State(keys): State<Arc<PublishedKeys>>) -> impl IntoResponse {
    Json(keys.jwks())
}

impl OpenIdProvider for DemoProvider {
    type Config = ProviderConfig;
    type Server = AxumServer;

    fn config(&self) -> &ProviderConfig {
        &self.config
    }

    fn http_server(&self) -> &AxumServer {
        &self.server
    }

    async fn handle_discovery(&self, req: Request) -> Response {
        if req.method() != Method::GET {
            return method_not_allowed();
        }
        let issuer = self.config.issuer();
        let doc = DiscoveryDocument {
            issuer: issuer.to_string(),
            authorization_endpoint: self.config.authorization_endpoint().absolute(issuer),
            token_endpoint: self.config.token_endpoint().absolute(issuer),
            userinfo_endpoint: self.config.userinfo_endpoint().absolute(issuer),
            jwks_uri: format!("{}{JWKS_PATH}", issuer.trim_end_matches('/')),
            grant_types_supported: vec!["client_credentials"],
            response_types_supported: vec!["token"],
            subject_types_supported: vec!["public"],
            id_token_signing_alg_values_supported: self
                .signer
                .signature_algorithm()
                .into_iter()
                .collect(),
        };
        Json(doc).into_response()
    }

    async fn handle_authorize(&self, _req: Request) -> Response {
        OidcError::InvalidRequest("only the client_credentials grant is supported".into())
            .into_response()
    }

    async fn handle_authorize_callback(&self, id: String, _req: Request) -> Response {
        OidcError::InvalidGrant(format!("unknown authorization request '{id}'")).into_response()
    }

    async fn handle_exchange(&self, req: Request) -> Response {
        if req.method() != Method::POST {
            return method_not_allowed();
        }
        self.exchange(req).await.unwrap_or_else(IntoResponse::into_response)
    }

    async fn handle_userinfo(&self, req: Request) -> Response {
        if req.method() != Method::GET && req.method() != Method::POST {
            return method_not_allowed();
        }
        self.userinfo(req.headers())
            .unwrap_or_else(IntoResponse::into_response)
    }

    fn additional_routes(&self) -> Router {
        let health = HealthRegistry::new()
            .check(SignerProbe::new(self.signer.clone()))
            .check(StorageProbe::new(Arc::clone(self.signer.storage())))
            .router();
        Router::new()
            .route(JWKS_PATH, get(jwks))
            .with_state(Arc::clone(&self.keys))
            .merge(health)
    }
}
