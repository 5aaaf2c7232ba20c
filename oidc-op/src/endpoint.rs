use url::Url;

use crate::error::EndpointError;

/// One protocol endpoint: the path it is routed at, and optionally the
/// absolute URL it is advertised under when that differs from `issuer + path`
/// (e.g. behind a path-rewriting proxy).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    path: String,
    url: Option<Url>,
}

impl Endpoint {
    /// Create an endpoint from a relative path.
    ///
    /// A missing leading slash is added and trailing slashes are dropped, so
    /// `"oauth/token"` and `"/oauth/token/"` both route at `/oauth/token`.
    pub fn new(path: &str) -> Result<Self, EndpointError> {
        Ok(Self {
            path: normalize(path)?,
            url: None,
        })
    }

    /// Built-in defaults, already normalized.
    pub(crate) fn literal(path: &'static str) -> Self {
        Self {
            path: path.to_string(),
            url: None,
        }
    }

    /// Create an endpoint advertised under an explicit absolute URL.
    pub fn with_url(path: &str, url: &str) -> Result<Self, EndpointError> {
        let parsed = Url::parse(url).map_err(|e| EndpointError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        if parsed.cannot_be_a_base() || !matches!(parsed.scheme(), "http" | "https") {
            return Err(EndpointError::InvalidUrl {
                url: url.to_string(),
                reason: "not an absolute http(s) URL".into(),
            });
        }
        Ok(Self {
            path: normalize(path)?,
            url: Some(parsed),
        })
    }

    /// The path the router binds this endpoint at.
    pub fn relative(&self) -> &str {
        &self.path
    }

    /// The absolute URL advertised for this endpoint under `issuer`.
    pub fn absolute(&self, issuer: &str) -> String {
        match &self.url {
            Some(url) => url.to_string(),
            None => format!("{}{}", issuer.trim_end_matches('/'), self.path),
        }
    }
}

fn normalize(raw: &str) -> Result<String, EndpointError> {
    let trimmed = raw.trim_matches('/');
    if trimmed.is_empty() {
        return Err(EndpointError::InvalidPath {
            path: raw.to_string(),
            reason: "path is empty",
        });
    }
    for segment in trimmed.split('/') {
        if segment.is_empty() {
            return Err(EndpointError::InvalidPath {
                path: raw.to_string(),
                reason: "path contains an empty segment",
            });
        }
        if segment.starts_with(['{', '*', ':']) || segment.contains(['{', '}']) {
            return Err(EndpointError::InvalidPath {
                path: raw.to_string(),
                reason: "path segments must be literal",
            });
        }
        if segment.contains(|c: char| c.is_whitespace() || c == '?' || c == '#') {
            return Err(EndpointError::InvalidPath {
                path: raw.to_string(),
                reason: "path contains whitespace, a query or a fragment",
            });
        }
    }
    Ok(format!("/{trimmed}"))
}
