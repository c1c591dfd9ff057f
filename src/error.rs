//! Error types produced and consumed by the retry loop.
//!
//! - [`RetryableError`]: caller-side marker that makes any error retryable.
//! - [`Failure`]: a closed union of error shapes the classifier understands, with an
//!   [`Failure::Opaque`] arm for everything else.
//! - [`RetryError`]: what [`retry`](crate::retry) returns when it gives up, annotated
//!   with the call id, the attempt count and the elapsed time.

use std::any::Any;
use std::fmt;
use std::time::Duration;

use crate::backoff::BackoffKind;
use crate::classify::{Mode, OperationError, TransportError};

/// Why a [`Context`](crate::Context) is done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
pub enum Interrupted {
    /// The cancellation token fired.
    #[error("context cancelled")]
    Cancelled,
    /// The deadline passed.
    #[error("context deadline exceeded")]
    DeadlineExceeded,
}

/// An error explicitly marked as retryable by the caller.
///
/// Retryable errors are retried regardless of idempotency. By default they retry
/// immediately; use [`with_backoff`](Self::with_backoff) to wait between attempts.
///
/// # Examples
///
/// ```rust
/// use persevere::{BackoffKind, Classify, RetryableError};
///
/// let err = RetryableError::new("lock contention")
///     .with_backoff(BackoffKind::Fast)
///     .with_delete_session();
///
/// let mode = err.classify();
/// assert!(mode.must_retry(false));
/// assert_eq!(mode.backoff(), BackoffKind::Fast);
/// assert!(mode.delete_session());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryableError<E> {
    error: E,
    backoff: BackoffKind,
    delete_session: bool,
}

impl<E> RetryableError<E> {
    /// Mark `error` as retryable with no backoff and no session invalidation.
    pub fn new(error: E) -> Self {
        Self {
            error,
            backoff: BackoffKind::None,
            delete_session: false,
        }
    }

    /// Choose the backoff policy to wait on before the next attempt.
    pub fn with_backoff(mut self, backoff: BackoffKind) -> Self {
        self.backoff = backoff;
        self
    }

    /// Ask for the underlying session to be discarded before the next attempt.
    pub fn with_delete_session(mut self) -> Self {
        self.delete_session = true;
        self
    }

    /// The requested backoff.
    pub fn backoff(&self) -> BackoffKind {
        self.backoff
    }

    /// Whether the session should be discarded.
    pub fn delete_session(&self) -> bool {
        self.delete_session
    }

    /// The wrapped error.
    pub fn inner(&self) -> &E {
        &self.error
    }

    /// Unwrap the marker.
    pub fn into_inner(self) -> E {
        self.error
    }
}

impl<E: fmt::Display> fmt::Display for RetryableError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)
    }
}

impl<E: std::error::Error + 'static> std::error::Error for RetryableError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// Mark an error retryable and lift it into a [`Failure`].
///
/// `backoff` defaults to [`BackoffKind::None`] when not given.
pub fn mark_retryable<E>(
    error: E,
    backoff: Option<BackoffKind>,
    delete_session: bool,
) -> Failure<E> {
    let mut marked = RetryableError::new(error).with_backoff(backoff.unwrap_or_default());
    if delete_session {
        marked = marked.with_delete_session();
    }
    Failure::Retryable(marked)
}

/// Error shapes the classifier knows how to read.
///
/// Operations that talk to the remote service can use `Failure<E>` as their error type:
/// statuses reported by the service, connectivity problems and caller-marked errors all
/// classify precisely, while anything else goes into [`Failure::Opaque`] and is never
/// retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Failure<E> {
    /// Marked retryable by the caller.
    Retryable(RetryableError<E>),
    /// The remote service answered with a non-success status.
    Operation(OperationError),
    /// The request never got a proper answer.
    Transport(TransportError),
    /// The operation itself observed cancellation.
    Interrupted(Interrupted),
    /// Anything else. Not retried.
    Opaque(E),
}

impl<E> Failure<E> {
    /// Wrap an error the classifier knows nothing about.
    pub fn opaque(error: E) -> Self {
        Failure::Opaque(error)
    }

    /// Wrap an error as retryable with default options.
    pub fn retryable(error: E) -> Self {
        Failure::Retryable(RetryableError::new(error))
    }
}

impl<E> From<RetryableError<E>> for Failure<E> {
    fn from(err: RetryableError<E>) -> Self {
        Failure::Retryable(err)
    }
}

impl<E> From<OperationError> for Failure<E> {
    fn from(err: OperationError) -> Self {
        Failure::Operation(err)
    }
}

impl<E> From<TransportError> for Failure<E> {
    fn from(err: TransportError) -> Self {
        Failure::Transport(err)
    }
}

impl<E> From<Interrupted> for Failure<E> {
    fn from(err: Interrupted) -> Self {
        Failure::Interrupted(err)
    }
}

impl<E> From<std::io::Error> for Failure<E> {
    fn from(err: std::io::Error) -> Self {
        Failure::Transport(err.into())
    }
}

impl<E: fmt::Display> fmt::Display for Failure<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Failure::Retryable(e) => write!(f, "{}", e),
            Failure::Operation(e) => write!(f, "{}", e),
            Failure::Transport(e) => write!(f, "{}", e),
            Failure::Interrupted(e) => write!(f, "{}", e),
            Failure::Opaque(e) => write!(f, "{}", e),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for Failure<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Failure::Retryable(e) => Some(e),
            Failure::Operation(e) => Some(e),
            Failure::Transport(e) => Some(e),
            Failure::Interrupted(e) => Some(e),
            Failure::Opaque(e) => Some(e),
        }
    }
}

/// Payload of a panic caught while running an operation.
pub struct FaultPayload(Box<dyn Any + Send>);

impl FaultPayload {
    pub(crate) fn new(payload: Box<dyn Any + Send>) -> Self {
        Self(payload)
    }

    /// The panic message, when the payload is a string.
    pub fn message(&self) -> Option<&str> {
        if let Some(s) = self.0.downcast_ref::<&'static str>() {
            Some(*s)
        } else {
            self.0.downcast_ref::<String>().map(String::as_str)
        }
    }

    /// The raw payload, e.g. for [`std::panic::resume_unwind`].
    pub fn into_inner(self) -> Box<dyn Any + Send> {
        self.0
    }
}

impl fmt::Debug for FaultPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("FaultPayload")
            .field(&self.message().unwrap_or("<non-string payload>"))
            .finish()
    }
}

impl fmt::Display for FaultPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.message() {
            Some(msg) => write!(f, "operation panicked: {}", msg),
            None => write!(f, "operation panicked"),
        }
    }
}

/// Why the retry loop stopped without a value.
#[derive(Debug)]
pub enum RetryErrorKind<E> {
    /// The context was done before the next attempt could start.
    Interrupted(Interrupted),
    /// The classifier ruled the error out for retry.
    NonRetryable {
        /// The error from the last attempt.
        error: E,
        /// How it was classified.
        mode: Mode,
    },
    /// The error was retryable but the context was done during the backoff wait.
    /// The operation error is kept as the root cause.
    Abandoned {
        /// The error from the last attempt.
        error: E,
        /// What cut the wait short.
        interrupted: Interrupted,
    },
    /// The operation panicked and the fault hook contained it.
    Fault(FaultPayload),
}

/// Terminal error of a [`retry`](crate::retry) call.
///
/// Wraps a [`RetryErrorKind`] with diagnostics. The underlying operation error stays
/// reachable through [`error`](Self::error) and [`into_inner`](Self::into_inner).
#[derive(Debug)]
pub struct RetryError<E> {
    kind: RetryErrorKind<E>,
    id: String,
    attempts: u32,
    elapsed: Duration,
}

impl<E> RetryError<E> {
    pub(crate) fn new(
        kind: RetryErrorKind<E>,
        id: &str,
        attempts: u32,
        elapsed: Duration,
    ) -> Self {
        Self {
            kind,
            id: id.to_owned(),
            attempts,
            elapsed,
        }
    }

    /// What went wrong.
    pub fn kind(&self) -> &RetryErrorKind<E> {
        &self.kind
    }

    /// Consume into the kind, dropping diagnostics.
    pub fn into_kind(self) -> RetryErrorKind<E> {
        self.kind
    }

    /// The call id from [`RetryOptions`](crate::RetryOptions).
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Attempts recorded, including one that was interrupted before it started.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Time spent in the retry loop.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// The last operation error, if the loop stopped on one.
    pub fn error(&self) -> Option<&E> {
        match &self.kind {
            RetryErrorKind::NonRetryable { error, .. }
            | RetryErrorKind::Abandoned { error, .. } => Some(error),
            RetryErrorKind::Interrupted(_) | RetryErrorKind::Fault(_) => None,
        }
    }

    /// Extract the last operation error, if any.
    pub fn into_inner(self) -> Option<E> {
        match self.kind {
            RetryErrorKind::NonRetryable { error, .. }
            | RetryErrorKind::Abandoned { error, .. } => Some(error),
            RetryErrorKind::Interrupted(_) | RetryErrorKind::Fault(_) => None,
        }
    }

    /// The cancellation signal involved, if any.
    pub fn interrupted(&self) -> Option<Interrupted> {
        match &self.kind {
            RetryErrorKind::Interrupted(reason) => Some(*reason),
            RetryErrorKind::Abandoned { interrupted, .. } => Some(*interrupted),
            RetryErrorKind::NonRetryable { .. } | RetryErrorKind::Fault(_) => None,
        }
    }

    /// Returns true if the loop stopped on a non-retryable error.
    pub fn is_non_retryable(&self) -> bool {
        matches!(self.kind, RetryErrorKind::NonRetryable { .. })
    }

    /// Returns true if the loop stopped because of a contained panic.
    pub fn is_fault(&self) -> bool {
        matches!(self.kind, RetryErrorKind::Fault(_))
    }
}

impl<E: fmt::Display> fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "retry")?;
        if !self.id.is_empty() {
            write!(f, " '{}'", self.id)?;
        }
        let plural = if self.attempts == 1 { "" } else { "s" };
        write!(f, " stopped after {} attempt{} ({:?}): ", self.attempts, plural, self.elapsed)?;
        match &self.kind {
            RetryErrorKind::Interrupted(reason) => write!(f, "{}", reason),
            RetryErrorKind::NonRetryable { error, mode } => {
                write!(f, "non-retryable error (status {}): {}", mode.status_code(), error)
            }
            RetryErrorKind::Abandoned { error, interrupted } => {
                write!(f, "{} while waiting to retry: {}", interrupted, error)
            }
            RetryErrorKind::Fault(payload) => write!(f, "{}", payload),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for RetryError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.kind {
            RetryErrorKind::Interrupted(reason) => Some(reason),
            RetryErrorKind::NonRetryable { error, .. }
            | RetryErrorKind::Abandoned { error, .. } => Some(error),
            RetryErrorKind::Fault(_) => None,
        }
    }
}
