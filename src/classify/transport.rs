//! Connectivity failures between the client and the remote service.

use std::fmt;
use std::io;

use super::{Classify, Mode, RetryClass};
use crate::backoff::BackoffKind;

/// Transport-level failure code. Discriminants follow the gRPC status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum TransportCode {
    /// The call was cancelled, usually by the peer.
    Canceled = 1,
    /// Unknown error.
    Unknown = 2,
    /// The request was rejected as invalid.
    InvalidArgument = 3,
    /// The call ran out of time before completing.
    DeadlineExceeded = 4,
    /// Requested entity was not found.
    NotFound = 5,
    /// Entity already exists.
    AlreadyExists = 6,
    /// Caller lacks permission.
    PermissionDenied = 7,
    /// Quota or capacity exhausted.
    ResourceExhausted = 8,
    /// System not in the required state.
    FailedPrecondition = 9,
    /// The call was aborted.
    Aborted = 10,
    /// Out of valid range.
    OutOfRange = 11,
    /// Not implemented by the peer.
    Unimplemented = 12,
    /// Internal transport error.
    Internal = 13,
    /// The connection is unavailable or was reset.
    Unavailable = 14,
    /// Unrecoverable data loss.
    DataLoss = 15,
    /// Missing or invalid credentials.
    Unauthenticated = 16,
}

impl TransportCode {
    /// Numeric value.
    pub fn code(self) -> i64 {
        self as i64
    }

    /// Map an I/O error kind onto a transport code.
    pub fn from_io_kind(kind: io::ErrorKind) -> Self {
        match kind {
            io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionRefused
            | io::ErrorKind::NotConnected
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::UnexpectedEof => TransportCode::Unavailable,
            io::ErrorKind::TimedOut => TransportCode::DeadlineExceeded,
            io::ErrorKind::PermissionDenied => TransportCode::PermissionDenied,
            io::ErrorKind::InvalidInput | io::ErrorKind::InvalidData => {
                TransportCode::InvalidArgument
            }
            _ => TransportCode::Unknown,
        }
    }

    fn retry_class(self) -> RetryClass {
        match self {
            TransportCode::ResourceExhausted | TransportCode::OutOfRange => RetryClass::Retryable,
            TransportCode::Unavailable
            | TransportCode::Internal
            | TransportCode::Canceled
            | TransportCode::DeadlineExceeded
            | TransportCode::Aborted
            | TransportCode::Unknown
            | TransportCode::DataLoss => RetryClass::Conditional,
            _ => RetryClass::NotRetryable,
        }
    }

    fn backoff(self) -> BackoffKind {
        match self {
            TransportCode::ResourceExhausted
            | TransportCode::Internal
            | TransportCode::Canceled => BackoffKind::Slow,
            TransportCode::Unavailable
            | TransportCode::DeadlineExceeded
            | TransportCode::Aborted
            | TransportCode::Unknown
            | TransportCode::DataLoss => BackoffKind::Fast,
            _ => BackoffKind::None,
        }
    }

    // A connection that failed mid-call cannot be trusted for the next one.
    fn delete_session(self) -> bool {
        self.retry_class() == RetryClass::Conditional
    }
}

impl fmt::Display for TransportCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// The request failed below the application protocol.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("transport error {code}: {message}")]
pub struct TransportError {
    code: TransportCode,
    message: String,
}

impl TransportError {
    /// Create a transport error.
    pub fn new(code: TransportCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Build from an I/O error without consuming it.
    pub fn from_io(err: &io::Error) -> Self {
        Self::new(TransportCode::from_io_kind(err.kind()), err.to_string())
    }

    /// The failure code.
    pub fn code(&self) -> TransportCode {
        self.code
    }

    /// Details.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<io::Error> for TransportError {
    fn from(err: io::Error) -> Self {
        Self::from_io(&err)
    }
}

impl Classify for TransportError {
    fn classify(&self) -> Mode {
        Mode::new(
            self.code.code(),
            self.code.retry_class(),
            self.code.backoff(),
            self.code.delete_session(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_exhausted_is_slow_and_always_retried() {
        let m = TransportError::new(TransportCode::ResourceExhausted, "quota").classify();
        assert!(m.must_retry(false));
        assert_eq!(m.backoff(), BackoffKind::Slow);
        assert!(!m.delete_session());
    }

    #[test]
    fn test_unavailable_is_conditional_and_fast() {
        let m = TransportError::new(TransportCode::Unavailable, "reset").classify();
        assert!(!m.must_retry(false));
        assert!(m.must_retry(true));
        assert_eq!(m.backoff(), BackoffKind::Fast);
        assert!(m.delete_session());
    }

    #[test]
    fn test_caller_mistakes_are_final() {
        for code in [
            TransportCode::InvalidArgument,
            TransportCode::NotFound,
            TransportCode::PermissionDenied,
            TransportCode::Unauthenticated,
            TransportCode::Unimplemented,
        ] {
            let m = TransportError::new(code, "").classify();
            assert!(!m.must_retry(true), "{} must not retry", code);
            assert_eq!(m.backoff(), BackoffKind::None);
        }
    }

    #[test]
    fn test_io_connection_reset_maps_to_unavailable() {
        let io = io::Error::new(io::ErrorKind::ConnectionReset, "connection reset by peer");
        let err = TransportError::from(io);
        assert_eq!(err.code(), TransportCode::Unavailable);
        assert!(err.message().contains("reset by peer"));
    }

    #[test]
    fn test_io_error_classifies_directly() {
        let io = io::Error::new(io::ErrorKind::TimedOut, "slow link");
        let m = io.classify();
        assert_eq!(m.status_code(), TransportCode::DeadlineExceeded.code());
        assert_eq!(m.backoff(), BackoffKind::Fast);
    }

    #[test]
    fn test_transport_codes_do_not_collide_with_sentinels() {
        let m = TransportError::new(TransportCode::Canceled, "").classify();
        assert!(m.status_code() > 0);
    }

    #[test]
    fn test_display() {
        let err = TransportError::new(TransportCode::Unavailable, "no route");
        assert_eq!(err.to_string(), "transport error Unavailable: no route");
    }
}
