//! Per-call retry options.

use std::fmt;
use std::sync::Arc;

use super::observer::{RetryObserver, TracingObserver};
use crate::backoff::BackoffPolicy;
use crate::config::RetryConfig;
use crate::error::FaultPayload;

/// Callback receiving the payload of a contained panic.
pub type FaultHook = Arc<dyn Fn(&FaultPayload) + Send + Sync>;

/// Options for a single [`retry`](crate::retry) call.
///
/// Built once, then read-only for the duration of the call. Cloning is cheap: hooks are
/// shared through `Arc`.
///
/// # Examples
///
/// ```rust
/// use persevere::{BackoffPolicy, RetryOptions};
/// use std::time::Duration;
///
/// let options = RetryOptions::new()
///     .with_id("load-profile")
///     .with_idempotent(true)
///     .with_slow_backoff(BackoffPolicy::new(Duration::from_millis(500), 4, 0.5));
///
/// assert_eq!(options.id(), "load-profile");
/// assert!(options.idempotent());
/// assert_eq!(options.slow_backoff().ceiling(), 4);
/// ```
#[derive(Clone)]
pub struct RetryOptions {
    id: String,
    idempotent: bool,
    fast: BackoffPolicy,
    slow: BackoffPolicy,
    fault_hook: Option<FaultHook>,
    observer: Arc<dyn RetryObserver>,
}

impl Default for RetryOptions {
    fn default() -> Self {
        RetryConfig::default().into()
    }
}

impl RetryOptions {
    /// Default options: non-idempotent, default fast and slow policies, panics are not
    /// contained, events go to [`TracingObserver`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the id used to correlate log lines and errors.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Declare whether the operation is idempotent.
    pub fn with_idempotent(mut self, idempotent: bool) -> Self {
        self.idempotent = idempotent;
        self
    }

    /// Replace the fast backoff policy.
    pub fn with_fast_backoff(mut self, policy: BackoffPolicy) -> Self {
        self.fast = policy;
        self
    }

    /// Replace the slow backoff policy.
    pub fn with_slow_backoff(mut self, policy: BackoffPolicy) -> Self {
        self.slow = policy;
        self
    }

    /// Contain panics raised by the operation.
    ///
    /// The hook sees the payload, then the call stops with
    /// [`RetryErrorKind::Fault`](crate::RetryErrorKind::Fault). Without a hook, panics
    /// propagate to the caller.
    pub fn with_fault_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(&FaultPayload) + Send + Sync + 'static,
    {
        self.fault_hook = Some(Arc::new(hook));
        self
    }

    /// Replace the observer.
    pub fn with_observer<O>(mut self, observer: O) -> Self
    where
        O: RetryObserver + 'static,
    {
        self.observer = Arc::new(observer);
        self
    }

    /// Replace the observer with a shared one.
    pub fn with_shared_observer(mut self, observer: Arc<dyn RetryObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// The call id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Whether the operation is idempotent.
    pub fn idempotent(&self) -> bool {
        self.idempotent
    }

    /// Policy for [`BackoffKind::Fast`](crate::BackoffKind::Fast) failures.
    pub fn fast_backoff(&self) -> &BackoffPolicy {
        &self.fast
    }

    /// Policy for [`BackoffKind::Slow`](crate::BackoffKind::Slow) failures.
    pub fn slow_backoff(&self) -> &BackoffPolicy {
        &self.slow
    }

    /// The fault hook, if any.
    pub fn fault_hook(&self) -> Option<&FaultHook> {
        self.fault_hook.as_ref()
    }

    /// The observer.
    pub fn observer(&self) -> &dyn RetryObserver {
        self.observer.as_ref()
    }
}

impl From<RetryConfig> for RetryOptions {
    fn from(config: RetryConfig) -> Self {
        Self {
            id: config.id,
            idempotent: config.idempotent,
            fast: config.fast,
            slow: config.slow,
            fault_hook: None,
            observer: Arc::new(TracingObserver),
        }
    }
}

impl fmt::Debug for RetryOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryOptions")
            .field("id", &self.id)
            .field("idempotent", &self.idempotent)
            .field("fast", &self.fast)
            .field("slow", &self.slow)
            .field("fault_hook", &self.fault_hook.is_some())
            .finish_non_exhaustive()
    }
}
