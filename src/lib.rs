//! # Persevere
//!
//! Retry orchestration for calls against a remote database.
//!
//! A retried call is driven by four pieces:
//!
//! - [`BackoffPolicy`]: exponential delays with bounded jitter.
//! - [`Classify`]: maps an error to a [`Mode`] deciding whether, and how, to retry.
//! - [`wait`]: sleeps for a computed delay unless the [`Context`] is done first.
//! - [`retry`]: the loop tying them together.
//!
//! ## Quick Example
//!
//! ```rust
//! use persevere::{retry, Context, Failure, OperationError, OperationStatus, RetryOptions};
//! use std::time::Duration;
//!
//! # tokio_test::block_on(async {
//! let ctx = Context::new().with_timeout(Duration::from_secs(5));
//! let options = RetryOptions::new().with_id("read-user").with_idempotent(true);
//!
//! let mut failures = 1;
//! let user = retry(&ctx, &options, |_ctx| {
//!     let outcome = if failures > 0 {
//!         failures -= 1;
//!         Err(Failure::<String>::from(OperationError::new(
//!             OperationStatus::Unavailable,
//!             "node restarting",
//!         )))
//!     } else {
//!         Ok("alice")
//!     };
//!     async move { outcome }
//! })
//! .await
//! .unwrap();
//!
//! assert_eq!(user, "alice");
//! # });
//! ```
//!
//! ## Errors
//!
//! Operation errors implement [`Classify`]. Wrap foreign error types in [`Failure`] to
//! pick one of the built-in categories, or implement [`Classify`] directly.
//!
//! ## Logging
//!
//! By default every retry call reports its lifecycle through [`tracing`] via
//! [`TracingObserver`]. Install any subscriber to see it, or replace the observer with
//! [`RetryOptions::with_observer`].

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod backoff;
pub mod classify;
pub mod config;
pub mod context;
pub mod error;
pub mod retry;
pub mod wait;

// Re-exports
pub use backoff::{BackoffKind, BackoffPolicy};
pub use classify::{
    classify, Classify, Mode, OperationError, OperationStatus, RetryClass, TransportCode,
    TransportError, STATUS_INTERRUPTED, STATUS_RETRYABLE, STATUS_UNKNOWN,
};
pub use config::RetryConfig;
pub use context::Context;
pub use error::{
    mark_retryable, Failure, FaultPayload, Interrupted, RetryError, RetryErrorKind,
    RetryableError,
};
pub use retry::{
    retry, FaultHook, FinishEvent, NoopObserver, RetryEvent, RetryObserver, RetryOptions,
    StartEvent, TracingObserver,
};
pub use wait::{sleep, wait};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::backoff::{BackoffKind, BackoffPolicy};
    pub use crate::classify::{Classify, Mode, RetryClass};
    pub use crate::context::Context;
    pub use crate::error::{Failure, Interrupted, RetryError, RetryErrorKind, RetryableError};
    pub use crate::retry::{retry, RetryOptions};
}
