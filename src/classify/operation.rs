//! Statuses reported by the remote service.

use std::fmt;

use super::{Classify, Mode, RetryClass};
use crate::backoff::BackoffKind;

/// Non-success status returned by the remote service.
///
/// Discriminants are the wire values of the status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum OperationStatus {
    /// Malformed request.
    BadRequest = 400010,
    /// Credentials rejected.
    Unauthorized = 400020,
    /// Server-side bug.
    InternalError = 400030,
    /// Transaction lost a conflict.
    Aborted = 400040,
    /// Part of the service is briefly out of reach.
    Unavailable = 400050,
    /// Too much load; the service asks clients to back off.
    Overloaded = 400060,
    /// Schema mismatch.
    SchemeError = 400070,
    /// Unclassified failure.
    GenericError = 400080,
    /// The operation ran out of its server-side time budget.
    Timeout = 400090,
    /// The session is unknown or broken.
    BadSession = 400100,
    /// A precondition did not hold.
    PreconditionFailed = 400120,
    /// The object already exists.
    AlreadyExists = 400130,
    /// The object does not exist.
    NotFound = 400140,
    /// The session timed out on the server.
    SessionExpired = 400150,
    /// The operation was cancelled on the server.
    Cancelled = 400160,
    /// The outcome is unknown; the operation may or may not have been applied.
    Undetermined = 400170,
    /// Not supported by the server.
    Unsupported = 400180,
    /// The session is handling another request.
    SessionBusy = 400190,
}

impl OperationStatus {
    const ALL: [OperationStatus; 18] = [
        OperationStatus::BadRequest,
        OperationStatus::Unauthorized,
        OperationStatus::InternalError,
        OperationStatus::Aborted,
        OperationStatus::Unavailable,
        OperationStatus::Overloaded,
        OperationStatus::SchemeError,
        OperationStatus::GenericError,
        OperationStatus::Timeout,
        OperationStatus::BadSession,
        OperationStatus::PreconditionFailed,
        OperationStatus::AlreadyExists,
        OperationStatus::NotFound,
        OperationStatus::SessionExpired,
        OperationStatus::Cancelled,
        OperationStatus::Undetermined,
        OperationStatus::Unsupported,
        OperationStatus::SessionBusy,
    ];

    /// Wire value.
    pub fn code(self) -> i64 {
        self as i64
    }

    /// Look a status up by wire value.
    pub fn from_code(code: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.code() == code)
    }

    /// Every known status.
    pub fn all() -> &'static [OperationStatus] {
        &Self::ALL
    }

    fn retry_class(self) -> RetryClass {
        match self {
            OperationStatus::Aborted
            | OperationStatus::Unavailable
            | OperationStatus::Overloaded
            | OperationStatus::BadSession
            | OperationStatus::SessionBusy
            | OperationStatus::SessionExpired => RetryClass::Retryable,
            OperationStatus::Undetermined => RetryClass::Conditional,
            _ => RetryClass::NotRetryable,
        }
    }

    fn backoff(self) -> BackoffKind {
        match self {
            OperationStatus::Overloaded => BackoffKind::Slow,
            OperationStatus::Unavailable
            | OperationStatus::SessionBusy
            | OperationStatus::Undetermined => BackoffKind::Fast,
            _ => BackoffKind::None,
        }
    }

    fn delete_session(self) -> bool {
        matches!(
            self,
            OperationStatus::BadSession
                | OperationStatus::SessionBusy
                | OperationStatus::SessionExpired
        )
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OperationStatus::BadRequest => "BAD_REQUEST",
            OperationStatus::Unauthorized => "UNAUTHORIZED",
            OperationStatus::InternalError => "INTERNAL_ERROR",
            OperationStatus::Aborted => "ABORTED",
            OperationStatus::Unavailable => "UNAVAILABLE",
            OperationStatus::Overloaded => "OVERLOADED",
            OperationStatus::SchemeError => "SCHEME_ERROR",
            OperationStatus::GenericError => "GENERIC_ERROR",
            OperationStatus::Timeout => "TIMEOUT",
            OperationStatus::BadSession => "BAD_SESSION",
            OperationStatus::PreconditionFailed => "PRECONDITION_FAILED",
            OperationStatus::AlreadyExists => "ALREADY_EXISTS",
            OperationStatus::NotFound => "NOT_FOUND",
            OperationStatus::SessionExpired => "SESSION_EXPIRED",
            OperationStatus::Cancelled => "CANCELLED",
            OperationStatus::Undetermined => "UNDETERMINED",
            OperationStatus::Unsupported => "UNSUPPORTED",
            OperationStatus::SessionBusy => "SESSION_BUSY",
        };
        write!(f, "{}", name)
    }
}

/// The remote service rejected the operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("operation failed with status {status} ({code}): {message}", code = .status.code())]
pub struct OperationError {
    status: OperationStatus,
    message: String,
}

impl OperationError {
    /// Create an error for `status`.
    pub fn new(status: OperationStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// The reported status.
    pub fn status(&self) -> OperationStatus {
        self.status
    }

    /// Server-provided details.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Classify for OperationError {
    fn classify(&self) -> Mode {
        Mode::new(
            self.status.code(),
            self.status.retry_class(),
            self.status.backoff(),
            self.status.delete_session(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mode(status: OperationStatus) -> Mode {
        OperationError::new(status, "").classify()
    }

    #[test]
    fn test_overloaded_backs_off_slowly() {
        let m = mode(OperationStatus::Overloaded);
        assert!(m.must_retry(false));
        assert_eq!(m.backoff(), BackoffKind::Slow);
        assert!(!m.delete_session());
    }

    #[test]
    fn test_unavailable_backs_off_quickly() {
        let m = mode(OperationStatus::Unavailable);
        assert!(m.must_retry(false));
        assert_eq!(m.backoff(), BackoffKind::Fast);
    }

    #[test]
    fn test_undetermined_needs_idempotency() {
        let m = mode(OperationStatus::Undetermined);
        assert!(!m.must_retry(false));
        assert!(m.must_retry(true));
    }

    #[test]
    fn test_session_statuses_invalidate_session() {
        for status in [
            OperationStatus::BadSession,
            OperationStatus::SessionBusy,
            OperationStatus::SessionExpired,
        ] {
            let m = mode(status);
            assert!(m.delete_session(), "{} should delete the session", status);
            assert!(m.must_retry(false));
        }
    }

    #[test]
    fn test_logic_errors_are_final() {
        for status in [
            OperationStatus::BadRequest,
            OperationStatus::Unauthorized,
            OperationStatus::SchemeError,
            OperationStatus::PreconditionFailed,
            OperationStatus::AlreadyExists,
            OperationStatus::NotFound,
            OperationStatus::Unsupported,
        ] {
            let m = mode(status);
            assert!(!m.must_retry(true), "{} must not retry", status);
            assert_eq!(m.backoff(), BackoffKind::None);
        }
    }

    #[test]
    fn test_status_code_is_wire_value() {
        assert_eq!(mode(OperationStatus::Aborted).status_code(), 400040);
        assert_eq!(OperationStatus::from_code(400060), Some(OperationStatus::Overloaded));
        assert_eq!(OperationStatus::from_code(1), None);
        for status in OperationStatus::all() {
            assert_eq!(OperationStatus::from_code(status.code()), Some(*status));
        }
    }

    #[test]
    fn test_display() {
        let err = OperationError::new(OperationStatus::Overloaded, "shard 7 is hot");
        assert_eq!(
            err.to_string(),
            "operation failed with status OVERLOADED (400060): shard 7 is hot"
        );
        assert_eq!(err.message(), "shard 7 is hot");
        assert_eq!(err.status(), OperationStatus::Overloaded);
    }
}
