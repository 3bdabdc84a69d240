//! Per-call deadline and cancellation.

use crate::error::{AncientError, AncientResult};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Deadline and cancellation carried by every store call.
///
/// The default context never expires and cannot be canceled. Engines check
/// the context before starting work; the remote client also bounds the
/// network round trip by it and forwards the remaining time to the server.
///
/// # Example
///
/// ```rust
/// use ancient_store::CallContext;
/// use std::time::Duration;
///
/// let ctx = CallContext::background().with_timeout(Duration::from_secs(5));
/// assert!(ctx.remaining().unwrap() <= Duration::from_secs(5));
/// assert!(ctx.check().is_ok());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    deadline: Option<Instant>,
    cancel: Option<CancellationToken>,
}

impl CallContext {
    /// Creates a context without deadline or cancellation.
    #[must_use]
    pub fn background() -> Self {
        Self::default()
    }

    /// Sets an absolute deadline.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Sets a deadline relative to now.
    #[must_use]
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Attaches a cancellation token.
    #[must_use]
    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Returns a copy whose deadline is the earlier of the current one and
    /// `now + timeout`.
    #[must_use]
    pub fn bounded_by(&self, timeout: Duration) -> Self {
        let limit = Instant::now() + timeout;
        let deadline = match self.deadline {
            Some(current) if current < limit => current,
            _ => limit,
        };
        Self {
            deadline: Some(deadline),
            cancel: self.cancel.clone(),
        }
    }

    /// Returns the deadline, if any.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns the cancellation token, if any.
    #[must_use]
    pub fn cancel_token(&self) -> Option<&CancellationToken> {
        self.cancel.as_ref()
    }

    /// Returns the time left before the deadline (zero once it passed).
    #[must_use]
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Returns true if the attached token has been canceled.
    #[must_use]
    pub fn is_canceled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }

    /// Fails with `Canceled` or `DeadlineExceeded` if the call must not
    /// proceed.
    pub fn check(&self) -> AncientResult<()> {
        if self.is_canceled() {
            return Err(AncientError::Canceled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(AncientError::DeadlineExceeded),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn background_never_expires() {
        let ctx = CallContext::background();
        assert!(ctx.deadline().is_none());
        assert!(ctx.remaining().is_none());
        assert!(ctx.check().is_ok());
    }

    #[test]
    fn expired_deadline_fails_check() {
        let ctx = CallContext::background().with_deadline(Instant::now());
        assert!(matches!(ctx.check(), Err(AncientError::DeadlineExceeded)));
        assert_eq!(ctx.remaining(), Some(Duration::ZERO));
    }

    #[test]
    fn canceled_token_fails_check() {
        let token = CancellationToken::new();
        let ctx = CallContext::background().with_cancel(token.clone());
        assert!(ctx.check().is_ok());

        token.cancel();
        assert!(ctx.is_canceled());
        assert!(matches!(ctx.check(), Err(AncientError::Canceled)));
    }

    #[test]
    fn bounded_by_keeps_earlier_deadline() {
        let ctx = CallContext::background().with_timeout(Duration::from_millis(10));
        let bounded = ctx.bounded_by(Duration::from_secs(60));
        assert_eq!(bounded.deadline(), ctx.deadline());

        let unbounded = CallContext::background().bounded_by(Duration::from_secs(1));
        assert!(unbounded.remaining().unwrap() <= Duration::from_secs(1));
    }
}
