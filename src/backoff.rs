//! Backoff policies and jittered delay computation.
//!
//! A [`BackoffPolicy`] is plain data: a slot duration, a ceiling on the exponent and a
//! jitter limit. The delay for attempt `n` (0-indexed) is
//!
//! ```text
//! base  = slot_duration * 2^min(n, ceiling)
//! delay = uniform [base * (1 - jitter_limit), base * (1 + jitter_limit)]
//! ```
//!
//! Because the base is derived from the attempt number alone, jitter never feeds back
//! into later delays.
//!
//! # Examples
//!
//! ```rust
//! use persevere::BackoffPolicy;
//! use std::time::Duration;
//!
//! let policy = BackoffPolicy::new(Duration::from_millis(10), 3, 0.0);
//!
//! assert_eq!(policy.delay(0), Duration::from_millis(10));
//! assert_eq!(policy.delay(1), Duration::from_millis(20));
//! assert_eq!(policy.delay(3), Duration::from_millis(80));
//! // The ceiling stops the growth.
//! assert_eq!(policy.delay(10), Duration::from_millis(80));
//! ```

use std::fmt;
use std::time::Duration;

use rand::Rng;

const NANOS_PER_SEC: u128 = 1_000_000_000;

/// Which backoff policy a failure asks for.
///
/// This is a closed set: a failure either waits on the fast policy, the slow policy,
/// or not at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BackoffKind {
    /// Retry immediately.
    #[default]
    None,
    /// Short delays, for connectivity blips.
    Fast,
    /// Long delays, for an overloaded remote side.
    Slow,
}

impl fmt::Display for BackoffKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackoffKind::None => write!(f, "none"),
            BackoffKind::Fast => write!(f, "fast"),
            BackoffKind::Slow => write!(f, "slow"),
        }
    }
}

/// Exponential backoff with multiplicative jitter.
///
/// Policies are immutable and `Copy`; share them freely between concurrent retry
/// loops.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(from = "BackoffFields")
)]
pub struct BackoffPolicy {
    slot_duration: Duration,
    ceiling: u32,
    jitter_limit: f64,
}

impl BackoffPolicy {
    /// Create a policy.
    ///
    /// `jitter_limit` is clamped into `[0, 1]`; a NaN limit is treated as `0`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persevere::BackoffPolicy;
    /// use std::time::Duration;
    ///
    /// let policy = BackoffPolicy::new(Duration::from_millis(100), 4, 1.5);
    /// assert_eq!(policy.jitter_limit(), 1.0);
    /// ```
    pub fn new(slot_duration: Duration, ceiling: u32, jitter_limit: f64) -> Self {
        let jitter_limit = if jitter_limit.is_nan() {
            0.0
        } else {
            jitter_limit.clamp(0.0, 1.0)
        };
        Self {
            slot_duration,
            ceiling,
            jitter_limit,
        }
    }

    /// The no-backoff policy: every delay is zero.
    pub fn none() -> Self {
        Self::new(Duration::ZERO, 0, 0.0)
    }

    /// Duration of a single slot (the delay of attempt 0 before jitter).
    pub fn slot_duration(&self) -> Duration {
        self.slot_duration
    }

    /// Highest exponent applied to the slot duration.
    pub fn ceiling(&self) -> u32 {
        self.ceiling
    }

    /// Relative jitter, in `[0, 1]`.
    pub fn jitter_limit(&self) -> f64 {
        self.jitter_limit
    }

    /// Delay before jitter for the given attempt.
    ///
    /// Saturates at `Duration::MAX` instead of overflowing.
    pub fn base(&self, attempt: u32) -> Duration {
        let exp = attempt.min(self.ceiling);
        let factor = 1u128.checked_shl(exp).unwrap_or(u128::MAX);
        from_nanos(nanos(self.slot_duration).saturating_mul(factor))
    }

    /// Largest delay this policy can ever produce.
    pub fn upper_bound(&self) -> Duration {
        let base = nanos(self.base(self.ceiling));
        from_nanos(base.saturating_add(self.spread(base)))
    }

    /// Jittered delay for the given attempt, drawn from the thread-local RNG.
    pub fn delay(&self, attempt: u32) -> Duration {
        self.delay_with(attempt, &mut rand::rng())
    }

    /// Jittered delay for the given attempt, drawn from `rng`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persevere::BackoffPolicy;
    /// use rand::SeedableRng;
    /// use std::time::Duration;
    ///
    /// let policy = BackoffPolicy::new(Duration::from_millis(100), 5, 0.25);
    /// let mut rng = rand::rngs::StdRng::seed_from_u64(7);
    ///
    /// let delay = policy.delay_with(2, &mut rng);
    /// assert!(delay >= Duration::from_millis(300));
    /// assert!(delay <= Duration::from_millis(500));
    /// ```
    pub fn delay_with<R: Rng + ?Sized>(&self, attempt: u32, rng: &mut R) -> Duration {
        let base = nanos(self.base(attempt));
        let spread = self.spread(base);
        if spread == 0 {
            return from_nanos(base);
        }
        let offset = rng.random_range(0..=spread.saturating_mul(2));
        from_nanos(base - spread + offset)
    }

    // Whole nanoseconds of jitter on each side of `base`; never more than `base * J`.
    fn spread(&self, base: u128) -> u128 {
        ((base as f64 * self.jitter_limit).floor() as u128).min(base)
    }
}

// Deserialization goes through `new` so the jitter limit is clamped.
#[cfg(feature = "serde")]
#[derive(serde::Deserialize)]
struct BackoffFields {
    slot_duration: Duration,
    ceiling: u32,
    jitter_limit: f64,
}

#[cfg(feature = "serde")]
impl From<BackoffFields> for BackoffPolicy {
    fn from(fields: BackoffFields) -> Self {
        Self::new(fields.slot_duration, fields.ceiling, fields.jitter_limit)
    }
}

fn nanos(d: Duration) -> u128 {
    d.as_nanos()
}

fn from_nanos(n: u128) -> Duration {
    let secs = n / NANOS_PER_SEC;
    if secs > u64::MAX as u128 {
        return Duration::MAX;
    }
    Duration::new(secs as u64, (n % NANOS_PER_SEC) as u32)
}
