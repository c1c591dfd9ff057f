//! Property-based tests for backoff delays and error classification

use persevere::{
    classify, BackoffKind, BackoffPolicy, Mode, OperationError, OperationStatus, RetryClass,
    TransportCode, TransportError,
};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::time::Duration;

fn retry_class() -> impl Strategy<Value = RetryClass> {
    prop_oneof![
        Just(RetryClass::Retryable),
        Just(RetryClass::Conditional),
        Just(RetryClass::NotRetryable),
    ]
}

fn backoff_kind() -> impl Strategy<Value = BackoffKind> {
    prop_oneof![
        Just(BackoffKind::None),
        Just(BackoffKind::Fast),
        Just(BackoffKind::Slow),
    ]
}

fn operation_status() -> impl Strategy<Value = OperationStatus> {
    prop::sample::select(OperationStatus::all().to_vec())
}

fn transport_code() -> impl Strategy<Value = TransportCode> {
    prop::sample::select(vec![
        TransportCode::Canceled,
        TransportCode::Unknown,
        TransportCode::InvalidArgument,
        TransportCode::DeadlineExceeded,
        TransportCode::NotFound,
        TransportCode::AlreadyExists,
        TransportCode::PermissionDenied,
        TransportCode::ResourceExhausted,
        TransportCode::FailedPrecondition,
        TransportCode::Aborted,
        TransportCode::OutOfRange,
        TransportCode::Unimplemented,
        TransportCode::Internal,
        TransportCode::Unavailable,
        TransportCode::DataLoss,
        TransportCode::Unauthenticated,
    ])
}

proptest! {
    #[test]
    fn prop_delay_within_jitter_bounds(
        slot_ms in 0u64..10_000,
        ceiling in 0u32..16,
        jitter in 0.0f64..=1.0,
        attempt in 0u32..64,
        seed in any::<u64>(),
    ) {
        let policy = BackoffPolicy::new(Duration::from_millis(slot_ms), ceiling, jitter);
        let mut rng = StdRng::seed_from_u64(seed);

        let base = policy.base(attempt);
        let delay = policy.delay_with(attempt, &mut rng);

        let slack = Duration::from_micros(1);
        prop_assert!(delay >= base.mul_f64(1.0 - jitter).saturating_sub(slack));
        prop_assert!(delay <= base.mul_f64(1.0 + jitter) + slack);
        prop_assert!(delay <= policy.upper_bound());
    }

    #[test]
    fn prop_base_is_capped_at_ceiling(
        slot_ns in 1u64..1_000,
        ceiling in 0u32..48,
        extra in 0u32..1_000,
    ) {
        let policy = BackoffPolicy::new(Duration::from_nanos(slot_ns), ceiling, 0.5);

        prop_assert_eq!(policy.base(ceiling + extra), policy.base(ceiling));
        prop_assert_eq!(
            policy.base(ceiling),
            Duration::from_nanos(slot_ns << ceiling)
        );
    }

    #[test]
    fn prop_base_never_decreases(
        slot_ms in 0u64..1_000,
        ceiling in 0u32..32,
        attempt in 0u32..100,
    ) {
        let policy = BackoffPolicy::new(Duration::from_millis(slot_ms), ceiling, 0.0);
        prop_assert!(policy.base(attempt + 1) >= policy.base(attempt));
    }

    #[test]
    fn prop_zero_jitter_is_deterministic(
        slot_ms in 0u64..10_000,
        ceiling in 0u32..16,
        attempt in 0u32..64,
    ) {
        let policy = BackoffPolicy::new(Duration::from_millis(slot_ms), ceiling, 0.0);
        prop_assert_eq!(policy.delay(attempt), policy.base(attempt));
    }

    #[test]
    fn prop_jitter_limit_always_in_unit_range(jitter in any::<f64>()) {
        let policy = BackoffPolicy::new(Duration::from_millis(1), 1, jitter);
        prop_assert!((0.0..=1.0).contains(&policy.jitter_limit()));
    }

    #[test]
    fn prop_must_retry_follows_class(
        status in any::<i64>(),
        class in retry_class(),
        backoff in backoff_kind(),
        delete_session in any::<bool>(),
    ) {
        let mode = Mode::new(status, class, backoff, delete_session);

        let (idempotent, non_idempotent) = match class {
            RetryClass::Retryable => (true, true),
            RetryClass::Conditional => (true, false),
            RetryClass::NotRetryable => (false, false),
        };
        prop_assert_eq!(mode.must_retry(true), idempotent);
        prop_assert_eq!(mode.must_retry(false), non_idempotent);
        prop_assert!(!mode.must_retry(false) || mode.must_retry(true));
    }

    #[test]
    fn prop_operation_classification_is_stable(
        status in operation_status(),
        message in ".*",
    ) {
        let first = classify(&OperationError::new(status, message.clone()));
        let second = classify(&OperationError::new(status, "different text"));

        prop_assert_eq!(first, second);
        prop_assert_eq!(first.status_code(), status.code());
        prop_assert_eq!(OperationStatus::from_code(status.code()), Some(status));
    }

    #[test]
    fn prop_transport_delete_session_matches_conditional(code in transport_code()) {
        let mode = classify(&TransportError::new(code, "lost"));

        prop_assert_eq!(mode.status_code(), code.code());
        prop_assert_eq!(
            mode.delete_session(),
            mode.must_retry(true) && !mode.must_retry(false)
        );
    }
}
