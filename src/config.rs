//! Shipped defaults and loadable configuration.
//!
//! Nothing here is global: every default is a plain constructor, so each caller gets its
//! own copy.

use std::time::Duration;

use crate::backoff::BackoffPolicy;

/// Slot of the default fast policy.
pub const FAST_SLOT: Duration = Duration::from_millis(5);
/// Slot of the default slow policy.
pub const SLOW_SLOT: Duration = Duration::from_secs(1);
/// Ceiling of both default policies.
pub const DEFAULT_CEILING: u32 = 6;
/// Jitter limit of both default policies.
pub const DEFAULT_JITTER_LIMIT: f64 = 0.5;

impl BackoffPolicy {
    /// Default policy for connectivity blips: 5ms slot, ceiling 6 (at most 320ms before
    /// jitter).
    pub fn fast() -> Self {
        Self::new(FAST_SLOT, DEFAULT_CEILING, DEFAULT_JITTER_LIMIT)
    }

    /// Default policy for an overloaded service: 1s slot, ceiling 6 (at most 64s before
    /// jitter).
    pub fn slow() -> Self {
        Self::new(SLOW_SLOT, DEFAULT_CEILING, DEFAULT_JITTER_LIMIT)
    }
}

/// Serializable subset of [`RetryOptions`](crate::RetryOptions).
///
/// With the `serde` feature enabled this can be read from configuration files; missing
/// fields fall back to the defaults.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct RetryConfig {
    /// Call id.
    pub id: String,
    /// Whether the operation is idempotent.
    pub idempotent: bool,
    /// Fast backoff policy.
    pub fast: BackoffPolicy,
    /// Slow backoff policy.
    pub slow: BackoffPolicy,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            id: String::new(),
            idempotent: false,
            fast: BackoffPolicy::fast(),
            slow: BackoffPolicy::slow(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policies() {
        let fast = BackoffPolicy::fast();
        assert_eq!(fast.slot_duration(), Duration::from_millis(5));
        assert_eq!(fast.base(10), Duration::from_millis(320));

        let slow = BackoffPolicy::slow();
        assert_eq!(slow.base(10), Duration::from_secs(64));
        assert_eq!(slow.upper_bound(), Duration::from_secs(96));
    }

    #[test]
    fn test_default_config() {
        let config = RetryConfig::default();
        assert!(config.id.is_empty());
        assert!(!config.idempotent);
        assert_eq!(config.fast, BackoffPolicy::fast());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_partial_config_from_json() {
        let config: RetryConfig = serde_json::from_str(
            r#"{
                "id": "ingest",
                "idempotent": true,
                "slow": {
                    "slot_duration": { "secs": 2, "nanos": 0 },
                    "ceiling": 3,
                    "jitter_limit": 7.0
                }
            }"#,
        )
        .unwrap();

        assert_eq!(config.id, "ingest");
        assert!(config.idempotent);
        assert_eq!(config.fast, BackoffPolicy::fast());
        assert_eq!(config.slow.slot_duration(), Duration::from_secs(2));
        assert_eq!(config.slow.jitter_limit(), 1.0);
    }
}
