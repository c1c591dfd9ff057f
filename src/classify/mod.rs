//! Error classification.
//!
//! The retry loop never inspects errors directly. It asks them for a [`Mode`] through
//! the [`Classify`] capability and acts on that: retry or stop, which backoff to wait
//! on, and whether the session should be thrown away.
//!
//! Built-in classifications:
//!
//! - [`OperationError`]: statuses reported by the remote service
//! - [`TransportError`] and [`std::io::Error`]: connectivity failures
//! - [`RetryableError`]: caller-marked errors, always retried
//! - [`Interrupted`]: cancellation observed by the operation, never retried
//! - [`Failure`]: dispatches to the above; [`Failure::Opaque`] is never retried
//!
//! # Examples
//!
//! ```rust
//! use persevere::{classify, BackoffKind, OperationError, OperationStatus};
//!
//! let err = OperationError::new(OperationStatus::Overloaded, "too many requests");
//! let mode = classify(&err);
//!
//! assert!(mode.must_retry(false));
//! assert_eq!(mode.backoff(), BackoffKind::Slow);
//! ```

mod operation;
mod transport;

use std::sync::Arc;

use crate::backoff::BackoffKind;
use crate::error::{Failure, Interrupted, RetryableError};

pub use operation::{OperationError, OperationStatus};
pub use transport::{TransportCode, TransportError};

/// Status code shared by every caller-marked [`RetryableError`].
pub const STATUS_RETRYABLE: i64 = -1;
/// Status code of a cancellation observed by the operation.
pub const STATUS_INTERRUPTED: i64 = -2;
/// Status code of errors the classifier does not understand.
pub const STATUS_UNKNOWN: i64 = -3;

/// How far retry eligibility extends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RetryClass {
    /// Safe to retry whether or not the operation is idempotent.
    Retryable,
    /// Retrying might repeat a side effect; only idempotent operations retry.
    Conditional,
    /// Never retried.
    NotRetryable,
}

/// Classification of a single failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Mode {
    status_code: i64,
    must_retry_idempotent: bool,
    must_retry_non_idempotent: bool,
    backoff: BackoffKind,
    delete_session: bool,
}

impl Mode {
    /// Build a mode from a retry class.
    pub fn new(
        status_code: i64,
        class: RetryClass,
        backoff: BackoffKind,
        delete_session: bool,
    ) -> Self {
        let (idempotent, non_idempotent) = match class {
            RetryClass::Retryable => (true, true),
            RetryClass::Conditional => (true, false),
            RetryClass::NotRetryable => (false, false),
        };
        Self {
            status_code,
            must_retry_idempotent: idempotent,
            must_retry_non_idempotent: non_idempotent,
            backoff,
            delete_session,
        }
    }

    /// Mode of an error nobody knows how to read: never retried, no backoff.
    pub fn opaque() -> Self {
        Self::new(STATUS_UNKNOWN, RetryClass::NotRetryable, BackoffKind::None, false)
    }

    /// Identifies the failure category. Only compared for equality.
    pub fn status_code(&self) -> i64 {
        self.status_code
    }

    /// Whether an operation with the given idempotency should be retried.
    pub fn must_retry(&self, idempotent: bool) -> bool {
        if idempotent {
            self.must_retry_idempotent
        } else {
            self.must_retry_non_idempotent
        }
    }

    /// Retry eligibility for idempotent operations.
    pub fn must_retry_idempotent(&self) -> bool {
        self.must_retry_idempotent
    }

    /// Retry eligibility for non-idempotent operations.
    pub fn must_retry_non_idempotent(&self) -> bool {
        self.must_retry_non_idempotent
    }

    /// Which backoff to wait on.
    pub fn backoff(&self) -> BackoffKind {
        self.backoff
    }

    /// Whether the session should be discarded before the next attempt.
    pub fn delete_session(&self) -> bool {
        self.delete_session
    }
}

/// Capability of an error to describe how it should be retried.
///
/// Implementations must be pure: the same error always yields the same [`Mode`].
pub trait Classify {
    /// Classify this error.
    fn classify(&self) -> Mode;
}

/// Classify an error. Equivalent to `err.classify()`.
pub fn classify<E: Classify + ?Sized>(err: &E) -> Mode {
    err.classify()
}

impl<E> Classify for RetryableError<E> {
    fn classify(&self) -> Mode {
        Mode::new(
            STATUS_RETRYABLE,
            RetryClass::Retryable,
            self.backoff(),
            self.delete_session(),
        )
    }
}

impl Classify for Interrupted {
    fn classify(&self) -> Mode {
        Mode::new(STATUS_INTERRUPTED, RetryClass::NotRetryable, BackoffKind::None, false)
    }
}

impl Classify for std::io::Error {
    fn classify(&self) -> Mode {
        TransportError::from_io(self).classify()
    }
}

impl<E> Classify for Failure<E> {
    fn classify(&self) -> Mode {
        match self {
            Failure::Retryable(e) => e.classify(),
            Failure::Operation(e) => e.classify(),
            Failure::Transport(e) => e.classify(),
            Failure::Interrupted(e) => e.classify(),
            Failure::Opaque(_) => Mode::opaque(),
        }
    }
}

impl<T: Classify + ?Sized> Classify for &T {
    fn classify(&self) -> Mode {
        (**self).classify()
    }
}

impl<T: Classify + ?Sized> Classify for Box<T> {
    fn classify(&self) -> Mode {
        (**self).classify()
    }
}

impl<T: Classify + ?Sized> Classify for Arc<T> {
    fn classify(&self) -> Mode {
        (**self).classify()
    }
}
