//! Bounded execution of backend calls.
//!
//! Every call into a shared backend runs under a deadline. Callers may pass
//! their own deadline and a cancellation token through [`OpContext`]; when they
//! pass nothing, the component's default timeout applies so an unreachable
//! backend never blocks the caller indefinitely.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Reasons a bounded call did not complete.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundError {
    /// The deadline elapsed before the call finished
    #[error("Operation timed out after {0:?}")]
    TimedOut(Duration),

    /// The caller cancelled the call
    #[error("Operation cancelled")]
    Cancelled,
}

/// Per-call deadline and cancellation signal.
#[derive(Debug, Clone, Default)]
pub struct OpContext {
    /// Absolute deadline for the whole operation
    pub deadline: Option<Instant>,
    /// Caller-owned cancellation signal
    pub cancel: Option<CancellationToken>,
}

impl OpContext {
    /// Context with no deadline and no cancellation.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a deadline relative to now.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    /// Set an absolute deadline.
    #[must_use]
    pub const fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Attach a cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Whether the attached token has already fired.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled)
    }

    /// Resolve the effective deadline, falling back to `now + default_timeout`.
    #[must_use]
    pub fn effective_deadline(&self, default_timeout: Duration) -> Instant {
        self.deadline
            .unwrap_or_else(|| Instant::now() + default_timeout)
    }
}

/// Run `fut` until it completes, the deadline passes, or the caller cancels.
///
/// The deadline is taken from `ctx` when present and is otherwise
/// `now + default_timeout`. Cancellation wins over a simultaneous timeout.
///
/// # Errors
///
/// Returns [`BoundError::Cancelled`] when the token fires (including when it
/// fired before the call) and [`BoundError::TimedOut`] when the deadline passes.
pub async fn run_bounded<F, T>(
    ctx: &OpContext,
    default_timeout: Duration,
    fut: F,
) -> Result<T, BoundError>
where
    F: Future<Output = T>,
{
    if ctx.is_cancelled() {
        return Err(BoundError::Cancelled);
    }

    let deadline = ctx.effective_deadline(default_timeout);
    let budget = deadline.saturating_duration_since(Instant::now());
    let bounded = tokio::time::timeout_at(deadline, fut);

    match &ctx.cancel {
        Some(token) => tokio::select! {
            biased;
            () = token.cancelled() => Err(BoundError::Cancelled),
            res = bounded => res.map_err(|_| BoundError::TimedOut(budget)),
        },
        None => bounded.await.map_err(|_| BoundError::TimedOut(budget)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_completes_within_budget() {
        let ctx = OpContext::new();
        let res = run_bounded(&ctx, Duration::from_secs(1), async { 7 }).await;
        assert_eq!(res, Ok(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_default_timeout_applies() {
        let ctx = OpContext::new();
        let res = run_bounded(&ctx, Duration::from_secs(3), async {
            tokio::time::sleep(Duration::from_secs(10)).await;
        })
        .await;
        assert_eq!(res, Err(BoundError::TimedOut(Duration::from_secs(3))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_caller_deadline_overrides_default() {
        let ctx = OpContext::new().with_timeout(Duration::from_secs(20));
        let res = run_bounded(&ctx, Duration::from_secs(3), async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            "done"
        })
        .await;
        assert_eq!(res, Ok("done"));
    }

    #[tokio::test]
    async fn test_already_cancelled() {
        let token = CancellationToken::new();
        token.cancel();
        let ctx = OpContext::new().with_cancellation(token);

        let res = run_bounded(&ctx, Duration::from_secs(3), async { 1 }).await;
        assert_eq!(res, Err(BoundError::Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_call() {
        let token = CancellationToken::new();
        let ctx = OpContext::new().with_cancellation(token.clone());

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            token.cancel();
        });

        let res = run_bounded(&ctx, Duration::from_secs(3), async {
            tokio::time::sleep(Duration::from_secs(2)).await;
        })
        .await;

        canceller.await.unwrap();
        assert_eq!(res, Err(BoundError::Cancelled));
    }
}
