use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use flowpool::{Manager, Pool, PoolConfig, PoolError};

#[derive(Debug, thiserror::Error)]
#[error("allocator failed")]
struct CreateError;

#[derive(Default)]
struct Counters {
    create: AtomicUsize,
    release: AtomicUsize,
    destroy: AtomicUsize,
}

struct TestManager {
    counters: Arc<Counters>,
    fail_create_call: Option<usize>,
    always_fail: bool,
    invalidate_next: Arc<AtomicBool>,
    create_delay: Option<Duration>,
}

impl TestManager {
    fn plain(counters: Arc<Counters>) -> Self {
        Self {
            counters,
            fail_create_call: None,
            always_fail: false,
            invalidate_next: Arc::new(AtomicBool::new(false)),
            create_delay: None,
        }
    }
}

#[async_trait]
impl Manager for TestManager {
    type Resource = usize;
    type Error = CreateError;

    async fn create(&self) -> Result<usize, CreateError> {
        if let Some(delay) = self.create_delay {
            tokio::time::sleep(delay).await;
        }
        let n = self.counters.create.fetch_add(1, Ordering::SeqCst) + 1;
        if self.always_fail || self.fail_create_call == Some(n) {
            return Err(CreateError);
        }
        Ok(n)
    }

    async fn release(&self, _resource: &mut usize) -> Result<(), CreateError> {
        self.counters.release.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn is_invalid(&self, _resource: &usize) -> bool {
        self.invalidate_next.swap(false, Ordering::SeqCst)
    }

    async fn destroy(&self, _resource: &mut usize) {
        self.counters.destroy.fetch_add(1, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn warm_pool_delivers_without_allocating() {
    let counters = Arc::new(Counters::default());
    let manager = TestManager::plain(counters.clone());
    let config = PoolConfig::builder(2).min_size(2).build().unwrap();
    let pool = Pool::new(manager, config).await.unwrap();
    assert_eq!(counters.create.load(Ordering::SeqCst), 2);

    let a = pool.borrow().await.unwrap();
    let b = pool.borrow().await.unwrap();
    assert_eq!(counters.create.load(Ordering::SeqCst), 2);

    a.release().await.unwrap();
    b.release().await.unwrap();
}

#[tokio::test]
async fn cold_allocation_delivers_to_waiting_borrower() {
    let counters = Arc::new(Counters::default());
    let manager = TestManager::plain(counters.clone());
    let config = PoolConfig::builder(1).build().unwrap();
    let pool = Pool::new(manager, config).await.unwrap();
    assert_eq!(counters.create.load(Ordering::SeqCst), 0);

    let conn = tokio::time::timeout(Duration::from_secs(1), pool.borrow())
        .await
        .expect("borrow timed out")
        .unwrap();
    assert_eq!(counters.create.load(Ordering::SeqCst), 1);
    conn.release().await.unwrap();
}

#[tokio::test]
async fn released_resource_is_reused_by_next_borrower() {
    let counters = Arc::new(Counters::default());
    let manager = TestManager::plain(counters.clone());
    let config = PoolConfig::builder(1).build().unwrap();
    let pool = Pool::new(manager, config).await.unwrap();

    let first = pool.borrow().await.unwrap();

    let pool2 = pool.clone();
    let second_task = tokio::spawn(async move { pool2.borrow().await });
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!second_task.is_finished(), "second borrower should still be waiting");

    first.release().await.unwrap();
    let second = tokio::time::timeout(Duration::from_secs(1), second_task)
        .await
        .expect("second borrow timed out")
        .unwrap()
        .unwrap();

    assert_eq!(counters.create.load(Ordering::SeqCst), 1);
    assert_eq!(counters.release.load(Ordering::SeqCst), 1);
    second.release().await.unwrap();
}

#[tokio::test]
async fn invalid_resource_is_destroyed_and_replaced() {
    let counters = Arc::new(Counters::default());
    let invalidate_next = Arc::new(AtomicBool::new(false));
    let manager = TestManager {
        counters: counters.clone(),
        fail_create_call: None,
        always_fail: false,
        invalidate_next: invalidate_next.clone(),
        create_delay: None,
    };
    let config = PoolConfig::builder(1).min_size(1).build().unwrap();
    let pool = Pool::new(manager, config).await.unwrap();
    assert_eq!(counters.create.load(Ordering::SeqCst), 1);

    invalidate_next.store(true, Ordering::SeqCst);
    let conn = pool.borrow().await.unwrap();
    conn.release().await.unwrap();

    assert_eq!(counters.destroy.load(Ordering::SeqCst), 1);
    assert_eq!(counters.release.load(Ordering::SeqCst), 0);

    let conn2 = tokio::time::timeout(Duration::from_secs(1), pool.borrow())
        .await
        .expect("replacement borrow timed out")
        .unwrap();
    assert_eq!(counters.create.load(Ordering::SeqCst), 2);
    conn2.release().await.unwrap();
}

#[tokio::test]
async fn dispose_fails_pending_and_preserves_on_loan_resource() {
    let counters = Arc::new(Counters::default());
    let manager = TestManager::plain(counters.clone());
    let config = PoolConfig::builder(1).min_size(1).build().unwrap();
    let pool = Pool::new(manager, config).await.unwrap();

    let on_loan = pool.borrow().await.unwrap();

    let pool2 = pool.clone();
    let pending = tokio::spawn(async move { pool2.borrow().await });
    tokio::time::sleep(Duration::from_millis(20)).await;

    pool.dispose().await;
    assert!(pool.is_disposed());

    let pending_result = tokio::time::timeout(Duration::from_secs(1), pending)
        .await
        .expect("pending borrow did not resolve")
        .unwrap();
    match pending_result {
        Err(err) => assert!(err.is_shutdown()),
        Ok(_) => panic!("pending borrower should have been failed by dispose"),
    }

    assert_eq!(counters.destroy.load(Ordering::SeqCst), 0, "on-loan resource must survive dispose");

    let _ = on_loan.release().await;
    assert_eq!(counters.destroy.load(Ordering::SeqCst), 1, "returning after dispose destroys instead of recycling");
}

#[tokio::test]
async fn dropping_borrow_in_scope_mid_flight_returns_resource() {
    let counters = Arc::new(Counters::default());
    let manager = TestManager::plain(counters.clone());
    let config = PoolConfig::builder(1).min_size(1).build().unwrap();
    let pool = Pool::new(manager, config).await.unwrap();

    let pool2 = pool.clone();
    let handle = tokio::spawn(async move {
        pool2
            .borrow_in_scope(|_resource| async {
                tokio::time::sleep(Duration::from_secs(60)).await;
            })
            .await
    });

    tokio::time::sleep(Duration::from_millis(20)).await;
    handle.abort();
    let _ = handle.await;

    let recovered = tokio::time::timeout(Duration::from_secs(1), pool.borrow())
        .await
        .expect("resource was not reclaimed after cancellation")
        .unwrap();
    assert_eq!(counters.create.load(Ordering::SeqCst), 1);
    recovered.release().await.unwrap();
}

#[tokio::test]
async fn constructor_failure_tears_down_partial_warm_set() {
    let counters = Arc::new(Counters::default());
    let manager = TestManager {
        counters: counters.clone(),
        fail_create_call: Some(2),
        always_fail: false,
        invalidate_next: Arc::new(AtomicBool::new(false)),
        create_delay: None,
    };
    let config = PoolConfig::builder(3).min_size(3).build().unwrap();

    let result = Pool::new(manager, config).await;
    assert!(result.is_err());
    assert_eq!(counters.create.load(Ordering::SeqCst), 2);
    assert_eq!(counters.destroy.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn post_construction_allocator_failure_routes_to_borrower() {
    let counters = Arc::new(Counters::default());
    let manager = TestManager {
        counters: counters.clone(),
        fail_create_call: None,
        always_fail: true,
        invalidate_next: Arc::new(AtomicBool::new(false)),
        create_delay: None,
    };
    let config = PoolConfig::builder(1).build().unwrap();
    let pool = Pool::new(manager, config).await.unwrap();

    let result = tokio::time::timeout(Duration::from_secs(1), pool.borrow())
        .await
        .expect("borrow did not resolve");
    match result {
        Err(PoolError::Allocator(_)) => {}
        other => panic!("expected allocator error, got {other:?}"),
    }
}

#[cfg(feature = "rt_tokio_1")]
#[tokio::test]
async fn delivery_is_scheduled_on_configured_runtime() {
    let counters = Arc::new(Counters::default());
    let manager = TestManager::plain(counters.clone());
    let config = PoolConfig::builder(1)
        .min_size(1)
        .delivery_context(flowpool::Runtime::Tokio1)
        .build()
        .unwrap();
    let pool = Pool::new(manager, config).await.unwrap();
    assert_eq!(counters.create.load(Ordering::SeqCst), 1);

    let first = pool.borrow().await.unwrap();

    let pool2 = pool.clone();
    let second_task = tokio::spawn(async move { pool2.borrow().await });
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!second_task.is_finished(), "second borrower should still be waiting");

    first.release().await.unwrap();
    let second = tokio::time::timeout(Duration::from_secs(1), second_task)
        .await
        .expect("second borrow via delivery_context timed out")
        .unwrap()
        .unwrap();

    assert_eq!(counters.create.load(Ordering::SeqCst), 1);
    second.release().await.unwrap();
}

/// Spec scenario 7: a borrower sitting in the pending queue is cancelled
/// while its matching allocation is still in flight. Whichever side wins
/// the race, no resource is leaked: either the allocation never happens
/// (the cancelled entry is skipped and no slot was reserved for it), or it
/// does and the delivered-but-unwanted resource is reclaimed and destroyed.
#[tokio::test]
async fn cancelling_pending_borrow_during_inflight_allocation_does_not_leak() {
    let counters = Arc::new(Counters::default());
    let manager = TestManager {
        counters: counters.clone(),
        fail_create_call: None,
        always_fail: false,
        invalidate_next: Arc::new(AtomicBool::new(false)),
        create_delay: Some(Duration::from_millis(50)),
    };
    let config = PoolConfig::builder(1).build().unwrap();
    let pool = Pool::new(manager, config).await.unwrap();

    let pool2 = pool.clone();
    let borrow_fut = tokio::spawn(async move { pool2.borrow().await });
    tokio::time::sleep(Duration::from_millis(10)).await;
    borrow_fut.abort();
    let _ = borrow_fut.await;

    // Let the in-flight allocation (if any) finish and any reclaim settle.
    tokio::time::sleep(Duration::from_millis(100)).await;

    pool.dispose().await;
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(
        counters.destroy.load(Ordering::SeqCst),
        counters.create.load(Ordering::SeqCst),
        "every constructed resource must eventually be destroyed, none leaked"
    );
}

#[tokio::test]
async fn status_reports_occupancy() {
    let counters = Arc::new(Counters::default());
    let manager = TestManager::plain(counters.clone());
    let config = PoolConfig::builder(2).min_size(1).build().unwrap();
    let pool = Pool::new(manager, config).await.unwrap();

    let status = pool.status();
    assert_eq!(status.max_size, 2);
    assert_eq!(status.size, 1);
    assert_eq!(status.available, 1);
    assert_eq!(status.pending, 0);

    let conn = pool.borrow().await.unwrap();
    let status = pool.status();
    assert_eq!(status.available, 0);
    conn.release().await.unwrap();
}
