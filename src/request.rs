//! Per-call cancellation and timeout options threaded through every upstream request.

use reqwest::{RequestBuilder, Response};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Caller-controlled bounds for a single pipeline operation.
///
/// The token is checked by every external call (embedding, generation); the optional timeout is
/// applied per HTTP request on top of the client-wide default.
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    /// Token that aborts in-flight upstream requests when cancelled.
    pub cancel: CancellationToken,
    /// Per-request timeout overriding the client default.
    pub timeout: Option<Duration>,
}

impl CallOptions {
    /// Options bound to an existing cancellation token.
    pub fn with_token(cancel: CancellationToken) -> Self {
        Self {
            cancel,
            timeout: None,
        }
    }

    /// Attach a per-request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Whether the caller already gave up on the operation.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Apply the timeout (if any) to an outgoing request.
    pub(crate) fn apply(&self, request: RequestBuilder) -> RequestBuilder {
        match self.timeout {
            Some(timeout) => request.timeout(timeout),
            None => request,
        }
    }

    /// Send a request, racing it against the cancellation token.
    pub(crate) async fn send(
        &self,
        request: RequestBuilder,
    ) -> Result<reqwest::Result<Response>, Cancelled> {
        if self.is_cancelled() {
            return Err(Cancelled);
        }
        let request = self.apply(request);
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Cancelled),
            result = request.send() => Ok(result),
        }
    }
}

/// Marker returned when the caller cancelled an in-flight request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Cancelled;
