//! Retrying reads and writes against a simulated flaky database
//!
//! Run with: cargo run --example flaky_service

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use persevere::{
    retry, BackoffPolicy, Context, Failure, OperationError, OperationStatus, RetryErrorKind,
    RetryOptions, TransportCode, TransportError,
};

// ============================================================================
// Simulated service
// ============================================================================

#[derive(Debug, Default)]
struct FlakyDatabase {
    requests: AtomicU32,
}

type DbResult<T> = Result<T, Failure<String>>;

impl FlakyDatabase {
    /// Fails with a rotating set of errors on the first few requests.
    async fn read_user(&self, id: u32) -> DbResult<String> {
        tokio::time::sleep(Duration::from_millis(2)).await;
        match self.requests.fetch_add(1, Ordering::SeqCst) {
            0 => Err(TransportError::new(TransportCode::Unavailable, "connection reset").into()),
            1 => Err(OperationError::new(OperationStatus::Overloaded, "too many requests").into()),
            2 => Err(OperationError::new(OperationStatus::SessionBusy, "session busy").into()),
            _ => Ok(format!("user-{}", id)),
        }
    }

    /// Every write lands in an undetermined state.
    async fn write_user(&self, _name: &str) -> DbResult<()> {
        tokio::time::sleep(Duration::from_millis(2)).await;
        Err(OperationError::new(OperationStatus::Undetermined, "commit outcome unknown").into())
    }

    /// Validation always fails.
    async fn drop_table(&self) -> DbResult<()> {
        Err(OperationError::new(OperationStatus::SchemeError, "table is referenced").into())
    }
}

// ============================================================================
// Scenarios
// ============================================================================

async fn idempotent_read(db: Arc<FlakyDatabase>) {
    let options = RetryOptions::new()
        .with_id("read-user")
        .with_idempotent(true)
        .with_slow_backoff(BackoffPolicy::new(Duration::from_millis(100), 3, 0.5));

    let ctx = Context::new().with_timeout(Duration::from_secs(5));
    match retry(&ctx, &options, |_ctx| {
        let db = db.clone();
        async move { db.read_user(42).await }
    })
    .await
    {
        Ok(user) => tracing::info!(%user, "read succeeded"),
        Err(e) => tracing::error!("read failed: {}", e),
    }
}

async fn non_idempotent_write(db: Arc<FlakyDatabase>) {
    let options = RetryOptions::new().with_id("write-user");

    let err = match retry(&Context::new(), &options, |_ctx| {
        let db = db.clone();
        async move { db.write_user("alice").await }
    })
    .await
    {
        Ok(()) => return,
        Err(e) => e,
    };

    if err.is_non_retryable() {
        tracing::warn!(
            attempts = err.attempts(),
            "write not retried, outcome must be checked by the caller: {}",
            err
        );
    }
}

async fn bounded_by_deadline(db: Arc<FlakyDatabase>) {
    let options = RetryOptions::new().with_id("write-user-idempotent").with_idempotent(true);
    let ctx = Context::new().with_timeout(Duration::from_millis(50));

    let err = match retry(&ctx, &options, |_ctx| {
        let db = db.clone();
        async move { db.write_user("bob").await }
    })
    .await
    {
        Ok(()) => return,
        Err(e) => e,
    };

    if let RetryErrorKind::Abandoned { error, interrupted } = err.kind() {
        tracing::warn!(%interrupted, "gave up after {} attempts: {}", err.attempts(), error);
    }
}

async fn contained_panic(db: Arc<FlakyDatabase>) {
    let options = RetryOptions::new()
        .with_id("drop-table")
        .with_fault_hook(|payload| tracing::error!("operation panicked: {}", payload));

    let outcome = retry(&Context::new(), &options, |_ctx| {
        let db = db.clone();
        async move {
            if db.requests.load(Ordering::SeqCst) > 100 {
                panic!("request budget exhausted");
            }
            db.drop_table().await
        }
    })
    .await;

    if let Err(err) = outcome {
        tracing::info!(fault = err.is_fault(), "drop table stopped: {}", err);
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .init();

    let db = Arc::new(FlakyDatabase::default());

    tracing::info!("Scenario 1: idempotent read over a flaky connection");
    idempotent_read(db.clone()).await;

    tracing::info!("Scenario 2: non-idempotent write with an undetermined outcome");
    non_idempotent_write(db.clone()).await;

    tracing::info!("Scenario 3: idempotent write bounded by a deadline");
    bounded_by_deadline(db.clone()).await;

    tracing::info!("Scenario 4: schema error with a fault hook installed");
    db.requests.store(1_000, Ordering::SeqCst);
    contained_panic(db).await;
}
