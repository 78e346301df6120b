use std::{future::Future, time::Duration};

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::rpc::RpcError;

/// Cancellation signal and deadline shared by everything running on behalf of one scrape
///
/// Cancellation is cooperative: remote calls made through [`ScrapeContext::run`] give up as soon
/// as the context is cancelled or its deadline passes, and producers are expected to stop at the
/// next call boundary.
#[derive(Debug, Clone)]
pub struct ScrapeContext {
    token: CancellationToken,
    deadline: Instant,
}

impl ScrapeContext {
    /// A fresh context expiring `timeout` from now
    pub fn new(timeout: Duration) -> Self {
        Self { token: CancellationToken::new(), deadline: Instant::now() + timeout }
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Time left until the deadline, zero once it passed
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once the context is cancelled
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }

    /// Drive `fut` to completion unless the context is cancelled or expires first
    pub async fn run<T, F>(&self, fut: F) -> Result<T, RpcError>
    where
        F: Future<Output = Result<T, RpcError>>,
    {
        if self.token.is_cancelled() {
            return Err(RpcError::Cancelled);
        }

        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(RpcError::Cancelled),
            _ = tokio::time::sleep_until(self.deadline) => Err(RpcError::DeadlineExceeded),
            res = fut => res,
        }
    }
}
