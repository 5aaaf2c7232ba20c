use std::time::Duration;

use oidc_op_core::config::{ConfigError, ConfigValidationDetail, OpConfig};

use crate::endpoint::Endpoint;
use crate::router::DISCOVERY_ENDPOINT;

/// Endpoint configuration a provider exposes to the router and to discovery.
pub trait Configuration: Send + Sync + 'static {
    /// The issuer identifier (`iss`), also the base of absolute endpoint URLs.
    fn issuer(&self) -> &str;
    fn authorization_endpoint(&self) -> &Endpoint;
    fn token_endpoint(&self) -> &Endpoint;
    fn userinfo_endpoint(&self) -> &Endpoint;
    /// The socket address the listener binds (e.g. `0.0.0.0:9998`).
    fn listen_addr(&self) -> &str;
}

/// Provider configuration with defaults for every setting.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub issuer: String,
    pub listen_addr: String,
    pub authorization_endpoint: Endpoint,
    pub token_endpoint: Endpoint,
    pub userinfo_endpoint: Endpoint,
    /// Upper bound on draining in-flight requests once shutdown starts.
    pub shutdown_grace: Duration,
}

const DEFAULT_AUTHORIZATION_PATH: &str = "/authorize";
const DEFAULT_TOKEN_PATH: &str = "/oauth/token";
const DEFAULT_USERINFO_PATH: &str = "/userinfo";

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            issuer: "http://localhost:9998".into(),
            listen_addr: "0.0.0.0:9998".into(),
            authorization_endpoint: Endpoint::literal(DEFAULT_AUTHORIZATION_PATH),
            token_endpoint: Endpoint::literal(DEFAULT_TOKEN_PATH),
            userinfo_endpoint: Endpoint::literal(DEFAULT_USERINFO_PATH),
            shutdown_grace: Duration::from_secs(10),
        }
    }
}

impl ProviderConfig {
    /// Read the `oidc.*` section, falling back to the defaults key by key.
    ///
    /// | Key                             | Default                 |
    /// |---------------------------------|-------------------------|
    /// | `oidc.issuer`                   | `http://localhost:9998` |
    /// | `oidc.server.addr`              | `0.0.0.0:9998`          |
    /// | `oidc.server.grace`             | `10` (seconds)          |
    /// | `oidc.endpoints.authorization`  | `/authorize`            |
    /// | `oidc.endpoints.token`          | `/oauth/token`          |
    /// | `oidc.endpoints.userinfo`       | `/userinfo`             |
    pub fn from_config(config: &OpConfig) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let provider = Self {
            issuer: config.get_or("oidc.issuer", defaults.issuer)?,
            listen_addr: config.get_or("oidc.server.addr", defaults.listen_addr)?,
            authorization_endpoint: endpoint(
                config,
                "oidc.endpoints.authorization",
                defaults.authorization_endpoint,
            )?,
            token_endpoint: endpoint(config, "oidc.endpoints.token", defaults.token_endpoint)?,
            userinfo_endpoint: endpoint(
                config,
                "oidc.endpoints.userinfo",
                defaults.userinfo_endpoint,
            )?,
            shutdown_grace: config.get_or("oidc.server.grace", defaults.shutdown_grace)?,
        };
        provider.validate()?;
        Ok(provider)
    }

    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = issuer.into();
        self
    }

    pub fn with_listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.listen_addr = addr.into();
        self
    }

    pub fn with_authorization_endpoint(mut self, endpoint: Endpoint) -> Self {
        self.authorization_endpoint = endpoint;
        self
    }

    pub fn with_token_endpoint(mut self, endpoint: Endpoint) -> Self {
        self.token_endpoint = endpoint;
        self
    }

    pub fn with_userinfo_endpoint(mut self, endpoint: Endpoint) -> Self {
        self.userinfo_endpoint = endpoint;
        self
    }

    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// Reject route tables that would collide when the router is built.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut details = Vec::new();
        if url::Url::parse(&self.issuer).is_err() {
            details.push(ConfigValidationDetail {
                key: "oidc.issuer".into(),
                message: format!("'{}' is not an absolute URL", self.issuer),
            });
        }

        let routes = [
            ("oidc.endpoints.authorization", self.authorization_endpoint.relative()),
            ("oidc.endpoints.token", self.token_endpoint.relative()),
            ("oidc.endpoints.userinfo", self.userinfo_endpoint.relative()),
        ];
        for (i, (key, path)) in routes.iter().enumerate() {
            if *path == DISCOVERY_ENDPOINT {
                details.push(ConfigValidationDetail {
                    key: (*key).into(),
                    message: format!("'{path}' is reserved for discovery"),
                });
            }
            if routes[..i].iter().any(|(_, other)| other == path) {
                details.push(ConfigValidationDetail {
                    key: (*key).into(),
                    message: format!("'{path}' is already used by another endpoint"),
                });
            }
        }

        if details.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(details))
        }
    }
}

fn endpoint(config: &OpConfig, key: &str, default: Endpoint) -> Result<Endpoint, ConfigError> {
    match config.get_or::<Option<String>>(key, None)? {
        Some(path) => Endpoint::new(&path).map_err(|e| ConfigError::invalid(key, e.to_string())),
        None => Ok(default),
    }
}

impl Configuration for ProviderConfig {
    fn issuer(&self) -> &str {
        &self.issuer
    }

    fn authorization_endpoint(&self) -> &Endpoint {
        &self.authorization_endpoint
    }

    fn token_endpoint(&self) -> &Endpoint {
        &self.token_endpoint
    }

    fn userinfo_endpoint(&self) -> &Endpoint {
        &self.userinfo_endpoint
    }

    fn listen_addr(&self) -> &str {
        &self.listen_addr
    }
}
