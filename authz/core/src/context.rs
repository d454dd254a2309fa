use crate::{Error, Identity};
use std::future::Future;
use tokio::time;
use tokio_util::sync::CancellationToken;

/// Per-request state passed alongside every lookup: who is asking, and when
/// to stop trying.
#[derive(Clone, Debug, Default)]
pub struct RequestContext {
    identity: Identity,
    cancel: CancellationToken,
    deadline: Option<time::Instant>,
}

// === impl RequestContext ===

impl RequestContext {
    pub fn new(identity: Identity) -> Self {
        Self {
            identity,
            ..Self::default()
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_deadline(mut self, deadline: time::Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(self, timeout: time::Duration) -> Self {
        self.with_deadline(time::Instant::now() + timeout)
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Drives `fut` until it completes, the request is cancelled, or the
    /// deadline passes. On cancellation or timeout, `fut` is dropped, aborting
    /// any in-flight API calls it owns.
    pub async fn run<F, T>(&self, fut: F) -> Result<T, Error>
    where
        F: Future<Output = Result<T, Error>>,
    {
        let deadline = async {
            match self.deadline {
                Some(deadline) => time::sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Error::Cancelled),
            _ = deadline => Err(Error::DeadlineExceeded),
            res = fut => res,
        }
    }
}
