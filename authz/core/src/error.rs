use http::StatusCode;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors returned while resolving a caller's namespaces.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The caller may not access the requested namespace(s).
    ///
    /// Safe to relay to end users.
    #[error("forbidden")]
    Forbidden,

    /// The Kubernetes API could not answer. Never cached.
    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error("request cancelled")]
    Cancelled,

    #[error("deadline exceeded")]
    DeadlineExceeded,
}

/// A failed call to the Kubernetes API (network, authentication, or server
/// side).
#[derive(Debug, thiserror::Error)]
#[error("{context}: {source}")]
pub struct UpstreamError {
    context: &'static str,
    #[source]
    source: BoxError,
}

// === impl Error ===

impl Error {
    pub fn is_forbidden(&self) -> bool {
        matches!(self, Self::Forbidden)
    }

    /// The status an HTTP-facing caller should answer with.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
            Self::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
        }
    }
}

// === impl UpstreamError ===

impl UpstreamError {
    pub fn new(context: &'static str, source: impl Into<BoxError>) -> Self {
        Self {
            context,
            source: source.into(),
        }
    }

    pub fn context(&self) -> &'static str {
        self.context
    }
}
