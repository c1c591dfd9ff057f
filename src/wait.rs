//! Cancellation-aware backoff waits.

use std::time::Duration;

use crate::backoff::{BackoffKind, BackoffPolicy};
use crate::context::Context;
use crate::error::Interrupted;

/// Wait out the backoff a failure asked for.
///
/// [`BackoffKind::None`] returns at once. Otherwise the matching policy computes the
/// delay for `attempt`, and the wait races it against `ctx`. Returns the delay that was
/// waited, or why the context cut the wait short.
///
/// # Examples
///
/// ```rust
/// use persevere::{wait, BackoffKind, BackoffPolicy, Context};
/// use std::time::Duration;
///
/// # tokio_test::block_on(async {
/// let fast = BackoffPolicy::new(Duration::from_millis(1), 2, 0.0);
/// let slow = BackoffPolicy::new(Duration::from_millis(50), 2, 0.0);
///
/// let waited = wait(&Context::new(), &fast, &slow, BackoffKind::Fast, 1).await;
/// assert_eq!(waited, Ok(Duration::from_millis(2)));
/// # });
/// ```
pub async fn wait(
    ctx: &Context,
    fast: &BackoffPolicy,
    slow: &BackoffPolicy,
    kind: BackoffKind,
    attempt: u32,
) -> Result<Duration, Interrupted> {
    let policy = match kind {
        BackoffKind::None => return Ok(Duration::ZERO),
        BackoffKind::Fast => fast,
        BackoffKind::Slow => slow,
    };
    let delay = policy.delay(attempt);
    sleep(ctx, delay).await?;
    Ok(delay)
}

/// Sleep for `delay` unless `ctx` is done first.
pub async fn sleep(ctx: &Context, delay: Duration) -> Result<(), Interrupted> {
    tokio::select! {
        biased;
        reason = ctx.done() => Err(reason),
        () = tokio::time::sleep(delay) => Ok(()),
    }
}
