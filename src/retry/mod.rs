//! The retry loop.
//!
//! [`retry`] runs an operation until it succeeds, fails with an error that must not be
//! retried, or the [`Context`] is done. Between attempts it waits on the backoff policy
//! the failure's [`Mode`](crate::Mode) asks for.
//!
//! # Quick Start
//!
//! ```rust
//! use persevere::{retry, Context, Failure, RetryOptions};
//! use std::sync::atomic::{AtomicU32, Ordering};
//!
//! # tokio_test::block_on(async {
//! let calls = AtomicU32::new(0);
//!
//! let value = retry(&Context::new(), &RetryOptions::new(), |_ctx| {
//!     let n = calls.fetch_add(1, Ordering::SeqCst);
//!     async move {
//!         if n < 2 {
//!             Err(Failure::retryable("not yet"))
//!         } else {
//!             Ok(n)
//!         }
//!     }
//! })
//! .await
//! .unwrap();
//!
//! assert_eq!(value, 2);
//! # });
//! ```
//!
//! # Attempt counting
//!
//! Every iteration counts as one attempt, including one that finds the context already
//! done. Backoff growth is tracked separately per failure category: when the status
//! code of a failure differs from the previous one, the backoff starts over from its
//! first slot.
//!
//! # Lifetime
//!
//! A failure that stays retryable is retried forever. Bound the call with a cancellable
//! or deadline-carrying [`Context`].

mod observer;
mod options;

use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use tokio::time::Instant;

use crate::classify::Classify;
use crate::context::Context;
use crate::error::{FaultPayload, RetryError, RetryErrorKind};
use crate::wait::wait;

pub use observer::{
    FinishEvent, NoopObserver, RetryEvent, RetryObserver, StartEvent, TracingObserver,
};
pub use options::{FaultHook, RetryOptions};

/// Counters of one retry call.
#[derive(Debug, Default)]
struct LoopState {
    local_attempt: u32,
    total_attempts: u32,
    last_status_code: Option<i64>,
}

impl LoopState {
    fn begin_attempt(&mut self) {
        self.total_attempts = self.total_attempts.saturating_add(1);
        self.local_attempt = self.local_attempt.saturating_add(1);
    }

    /// Returns true when `status_code` starts a new failure category.
    fn observe_status(&mut self, status_code: i64) -> bool {
        let changed = self.last_status_code != Some(status_code);
        if changed {
            self.local_attempt = 0;
        }
        changed
    }

    fn record_status(&mut self, status_code: i64) {
        self.last_status_code = Some(status_code);
    }
}

enum Invocation<T, E> {
    Finished(Result<T, E>),
    Fault(FaultPayload),
}

/// Run `operation` until it succeeds, hits a non-retryable error, or `ctx` is done.
///
/// Each attempt receives a clone of `ctx`. Errors are classified through [`Classify`];
/// retryable ones are retried after the backoff their classification asks for.
///
/// # Errors
///
/// - [`RetryErrorKind::Interrupted`]: `ctx` was done before an attempt could start.
/// - [`RetryErrorKind::NonRetryable`]: the last error must not be retried given
///   [`RetryOptions::idempotent`].
/// - [`RetryErrorKind::Abandoned`]: `ctx` was done during the backoff wait. The last
///   operation error is returned, not the cancellation.
/// - [`RetryErrorKind::Fault`]: the operation panicked and a fault hook was configured.
///
/// # Panics
///
/// Panics raised by `operation` propagate unless
/// [`RetryOptions::with_fault_hook`] is set.
pub async fn retry<T, E, F, Fut>(
    ctx: &Context,
    options: &RetryOptions,
    mut operation: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut(Context) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Classify + fmt::Display,
{
    let start = Instant::now();
    let observer = options.observer();
    observer.on_start(&StartEvent {
        id: options.id(),
        idempotent: options.idempotent(),
    });

    let mut state = LoopState::default();
    let outcome = run_loop(ctx, options, &mut operation, &mut state, start).await;

    observer.on_finish(&FinishEvent {
        id: options.id(),
        attempts: state.total_attempts,
        error: outcome.as_ref().err().map(|e| e as &dyn fmt::Display),
        elapsed: start.elapsed(),
    });
    outcome
}

async fn run_loop<T, E, F, Fut>(
    ctx: &Context,
    options: &RetryOptions,
    operation: &mut F,
    state: &mut LoopState,
    start: Instant,
) -> Result<T, RetryError<E>>
where
    F: FnMut(Context) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Classify + fmt::Display,
{
    let id = options.id();
    let stop = |kind: RetryErrorKind<E>, attempts: u32| {
        Err(RetryError::new(kind, id, attempts, start.elapsed()))
    };

    loop {
        state.begin_attempt();
        let attempt = state.total_attempts;

        if let Some(reason) = ctx.err() {
            tracing::trace!(id, attempt, %reason, "context done before attempt");
            return stop(RetryErrorKind::Interrupted(reason), attempt);
        }

        let error = match invoke(ctx, options, operation).await {
            Invocation::Finished(Ok(value)) => return Ok(value),
            Invocation::Finished(Err(error)) => error,
            Invocation::Fault(payload) => {
                tracing::trace!(id, attempt, %payload, "operation fault contained");
                return stop(RetryErrorKind::Fault(payload), attempt);
            }
        };

        let mode = error.classify();
        if state.observe_status(mode.status_code()) {
            tracing::trace!(
                id,
                attempt,
                status_code = mode.status_code(),
                "new failure category, backoff restarted"
            );
        }

        if !mode.must_retry(options.idempotent()) {
            tracing::trace!(
                id,
                attempt,
                status_code = mode.status_code(),
                %error,
                "error is not retryable"
            );
            return stop(RetryErrorKind::NonRetryable { error, mode }, attempt);
        }

        let delay = match wait(
            ctx,
            options.fast_backoff(),
            options.slow_backoff(),
            mode.backoff(),
            state.local_attempt,
        )
        .await
        {
            Ok(delay) => delay,
            Err(interrupted) => {
                tracing::trace!(id, attempt, %interrupted, %error, "context done during backoff");
                return stop(RetryErrorKind::Abandoned { error, interrupted }, attempt);
            }
        };

        state.record_status(mode.status_code());
        options.observer().on_retry(&RetryEvent {
            id,
            attempt,
            local_attempt: state.local_attempt,
            error: &error,
            mode,
            delay,
            elapsed: start.elapsed(),
        });
    }
}

async fn invoke<T, E, F, Fut>(
    ctx: &Context,
    options: &RetryOptions,
    operation: &mut F,
) -> Invocation<T, E>
where
    F: FnMut(Context) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let Some(hook) = options.fault_hook() else {
        return Invocation::Finished(operation(ctx.clone()).await);
    };

    // The operation can panic while building its future or while it is polled.
    let caught = match std::panic::catch_unwind(AssertUnwindSafe(|| operation(ctx.clone()))) {
        Ok(fut) => AssertUnwindSafe(fut).catch_unwind().await,
        Err(payload) => Err(payload),
    };

    match caught {
        Ok(result) => Invocation::Finished(result),
        Err(payload) => {
            let payload = FaultPayload::new(payload);
            hook(&payload);
            Invocation::Fault(payload)
        }
    }
}
