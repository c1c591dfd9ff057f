//! Lifecycle notifications for retry calls.

use std::fmt;
use std::time::Duration;

use crate::classify::Mode;

/// Emitted once when a retry call begins.
#[derive(Debug, Clone, Copy)]
pub struct StartEvent<'a> {
    /// Call id from the options.
    pub id: &'a str,
    /// Whether the operation was declared idempotent.
    pub idempotent: bool,
}

/// Emitted after each failed attempt that will be retried, once the backoff wait is
/// over.
#[derive(Clone, Copy)]
pub struct RetryEvent<'a> {
    /// Call id from the options.
    pub id: &'a str,
    /// Which attempt failed (1-indexed, counted over the whole call).
    pub attempt: u32,
    /// Attempt index within the current failure category; drives backoff growth.
    pub local_attempt: u32,
    /// The error from the failed attempt.
    pub error: &'a dyn fmt::Display,
    /// How the error was classified.
    pub mode: Mode,
    /// The backoff that was waited before the next attempt.
    pub delay: Duration,
    /// Time since the call started.
    pub elapsed: Duration,
}

impl fmt::Debug for RetryEvent<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryEvent")
            .field("id", &self.id)
            .field("attempt", &self.attempt)
            .field("local_attempt", &self.local_attempt)
            .field("error", &format_args!("{}", self.error))
            .field("mode", &self.mode)
            .field("delay", &self.delay)
            .field("elapsed", &self.elapsed)
            .finish()
    }
}

/// Emitted once when a retry call returns.
#[derive(Clone, Copy)]
pub struct FinishEvent<'a> {
    /// Call id from the options.
    pub id: &'a str,
    /// Total attempts recorded.
    pub attempts: u32,
    /// The terminal error, or `None` on success.
    pub error: Option<&'a dyn fmt::Display>,
    /// Time since the call started.
    pub elapsed: Duration,
}

impl fmt::Debug for FinishEvent<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FinishEvent")
            .field("id", &self.id)
            .field("attempts", &self.attempts)
            .field("error", &self.error.map(|e| e.to_string()))
            .field("elapsed", &self.elapsed)
            .finish()
    }
}

/// Receives retry lifecycle events.
///
/// Observers only watch: nothing they do changes what the loop decides. Callbacks run
/// inline on the retrying task and should not block.
pub trait RetryObserver: Send + Sync {
    /// A call started.
    fn on_start(&self, _event: &StartEvent<'_>) {}

    /// An attempt failed and the loop is about to try again.
    fn on_retry(&self, _event: &RetryEvent<'_>) {}

    /// The call finished.
    fn on_finish(&self, _event: &FinishEvent<'_>) {}
}

/// Ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl RetryObserver for NoopObserver {}

/// Logs every event through `tracing`. This is the default observer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl RetryObserver for TracingObserver {
    fn on_start(&self, event: &StartEvent<'_>) {
        tracing::debug!(id = event.id, idempotent = event.idempotent, "retry started");
    }

    fn on_retry(&self, event: &RetryEvent<'_>) {
        tracing::debug!(
            id = event.id,
            attempt = event.attempt,
            local_attempt = event.local_attempt,
            status_code = event.mode.status_code(),
            backoff = %event.mode.backoff(),
            delete_session = event.mode.delete_session(),
            delay = ?event.delay,
            error = %event.error,
            "retrying after failure"
        );
    }

    fn on_finish(&self, event: &FinishEvent<'_>) {
        match event.error {
            Some(error) => tracing::warn!(
                id = event.id,
                attempts = event.attempts,
                elapsed = ?event.elapsed,
                error = %error,
                "retry gave up"
            ),
            None => tracing::debug!(
                id = event.id,
                attempts = event.attempts,
                elapsed = ?event.elapsed,
                "retry succeeded"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backoff::BackoffKind;
    use crate::classify::RetryClass;
    use tracing_test::traced_test;

    fn retry_event(error: &dyn fmt::Display) -> RetryEvent<'_> {
        RetryEvent {
            id: "orders",
            attempt: 2,
            local_attempt: 1,
            error,
            mode: Mode::new(400060, RetryClass::Retryable, BackoffKind::Slow, false),
            delay: Duration::from_millis(250),
            elapsed: Duration::from_secs(1),
        }
    }

    #[traced_test]
    #[test]
    fn test_tracing_observer_logs_retry() {
        let error = "shard overloaded";
        TracingObserver.on_retry(&retry_event(&error));

        assert!(logs_contain("retrying after failure"));
        assert!(logs_contain("shard overloaded"));
        assert!(logs_contain("backoff=slow"));
    }

    #[traced_test]
    #[test]
    fn test_tracing_observer_logs_failure_as_warning() {
        let error = "gave up";
        TracingObserver.on_finish(&FinishEvent {
            id: "orders",
            attempts: 4,
            error: Some(&error),
            elapsed: Duration::from_secs(2),
        });

        assert!(logs_contain("WARN"));
        assert!(logs_contain("retry gave up"));
    }

    #[test]
    fn test_event_debug_renders_error() {
        let error = "boom";
        let debug = format!("{:?}", retry_event(&error));
        assert!(debug.contains("RetryEvent"));
        assert!(debug.contains("boom"));
    }

    #[test]
    fn test_noop_observer_accepts_everything() {
        let error = "ignored";
        let observer = NoopObserver;
        observer.on_start(&StartEvent {
            id: "",
            idempotent: true,
        });
        observer.on_retry(&retry_event(&error));
        observer.on_finish(&FinishEvent {
            id: "",
            attempts: 1,
            error: None,
            elapsed: Duration::ZERO,
        });
    }
}
