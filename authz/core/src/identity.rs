use http::{header, HeaderMap, HeaderName};
use std::{fmt, sync::Arc};

const X_FORWARDED_AUTHORIZATION: HeaderName =
    HeaderName::from_static("x-forwarded-authorization");

const BEARER_PREFIX: &str = "Bearer ";

/// The authenticated caller on whose behalf access is reviewed.
///
/// An identity without a token stands for the process' own service account.
/// The token is forwarded to the Kubernetes API and used to key cached
/// results; it is never logged.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct Identity(Option<Arc<str>>);

// === impl Identity ===

impl Identity {
    pub fn anonymous() -> Self {
        Self(None)
    }

    /// An empty token is the same as no token.
    pub fn bearer(token: impl AsRef<str>) -> Self {
        let token = token.as_ref();
        if token.is_empty() {
            return Self::anonymous();
        }
        Self(Some(token.into()))
    }

    /// Reads the bearer token from `X-Forwarded-Authorization`, falling back
    /// to `Authorization`.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let value = headers
            .get(X_FORWARDED_AUTHORIZATION)
            .filter(|v| !v.is_empty())
            .or_else(|| headers.get(header::AUTHORIZATION));

        value
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix(BEARER_PREFIX))
            .map(Self::bearer)
            .unwrap_or_default()
    }

    pub fn token(&self) -> Option<&str> {
        self.0.as_deref()
    }

    pub fn is_anonymous(&self) -> bool {
        self.0.is_none()
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(_) => f.write_str("Identity(Bearer <redacted>)"),
            None => f.write_str("Identity(Anonymous)"),
        }
    }
}
