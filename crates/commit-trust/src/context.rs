//! Per-request cancellation and deadline.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{TrustError, TrustResult};

/// Cancellation signal and optional deadline for one verification request.
///
/// Every store lookup runs through [`RequestContext::run`], so a cancelled or
/// expired request surfaces as an error instead of an empty result.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl RequestContext {
    /// Context without deadline that is never cancelled unless asked to.
    pub fn new() -> Self {
        Self::default()
    }

    /// Context tied to an existing cancellation token.
    pub fn with_token(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    /// Set a deadline relative to now.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    /// Set an absolute deadline.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Fail fast if the request is already cancelled or past its deadline.
    pub fn check(&self) -> TrustResult<()> {
        if self.token.is_cancelled() {
            return Err(TrustError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(TrustError::DeadlineExceeded),
            _ => Ok(()),
        }
    }

    /// Run a lookup, racing it against cancellation and the deadline.
    pub async fn run<T, F>(&self, lookup: F) -> TrustResult<T>
    where
        F: Future<Output = TrustResult<T>>,
    {
        self.check()?;
        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(TrustError::Cancelled),
            _ = sleep_until(self.deadline) => Err(TrustError::DeadlineExceeded),
            result = lookup => result,
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending::<()>().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_passes_through() {
        let ctx = RequestContext::new();
        let value = ctx.run(async { Ok::<_, TrustError>(42) }).await.unwrap();
        assert_eq!(value, 42);
    }

    #[tokio::test]
    async fn test_cancelled_before_lookup() {
        let ctx = RequestContext::new();
        ctx.cancel();
        let result = ctx.run(async { Ok::<_, TrustError>(1) }).await;
        assert!(matches!(result, Err(TrustError::Cancelled)));
    }

    #[tokio::test]
    async fn test_cancelled_during_lookup() {
        let ctx = RequestContext::new();
        let token = ctx.token().clone();
        let result = ctx
            .run(async move {
                token.cancel();
                std::future::pending::<TrustResult<()>>().await
            })
            .await;
        assert!(matches!(result, Err(TrustError::Cancelled)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_exceeded() {
        let ctx = RequestContext::new().with_timeout(Duration::from_millis(50));
        let result = ctx
            .run(async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok::<_, TrustError>(())
            })
            .await;
        assert!(matches!(result, Err(TrustError::DeadlineExceeded)));
    }

    #[tokio::test]
    async fn test_expired_deadline_fails_check() {
        let ctx = RequestContext::new().with_deadline(Instant::now());
        assert!(matches!(ctx.check(), Err(TrustError::DeadlineExceeded)));
    }
}
