//! End-to-end scenarios against the in-memory store, driven through the
//! public `Locker` interface with compressed timings.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use lockgate::{
    store_key_name, AcquireOptions, BackendTimeouts, DistributedLocker, InMemoryStore,
    LockError, LockLeaseRecord, Locker, LockerTimeouts, OptimisticLockingStore,
    OptimisticLockingStoreBackend,
};

fn locker(
    store: InMemoryStore,
    lease_ttl: Duration,
    lease_renew_period: Duration,
) -> DistributedLocker<OptimisticLockingStoreBackend<InMemoryStore>> {
    let backend = OptimisticLockingStoreBackend::with_timeouts(
        store,
        BackendTimeouts {
            lease_ttl,
            optimistic_retry_period: Duration::from_millis(10),
        },
    );
    DistributedLocker::with_timeouts(
        backend,
        LockerTimeouts {
            poll_retry_period: Duration::from_millis(100),
            lease_renew_period,
        },
    )
}

async fn stored_lease(store: &InMemoryStore, lock_name: &str) -> Option<LockLeaseRecord> {
    let value = store
        .get_value(&store_key_name(lock_name))
        .await
        .unwrap();
    LockLeaseRecord::decode(&value.data).unwrap()
}

/// Scenario 1: exclusive happy path.
#[tokio::test]
async fn exclusive_happy_path() {
    let locker = locker(
        InMemoryStore::new(),
        Duration::from_secs(10),
        Duration::from_secs(3),
    );

    let h1 = locker
        .acquire("job-A", AcquireOptions::new())
        .await
        .unwrap()
        .expect("first acquire succeeds");

    let miss = locker
        .acquire("job-A", AcquireOptions::new().non_blocking())
        .await
        .unwrap();
    assert!(miss.is_none(), "non-blocking miss has no handle, no error");

    locker.release(h1.clone()).await.unwrap();

    let h2 = locker
        .acquire("job-A", AcquireOptions::new().non_blocking())
        .await
        .unwrap()
        .expect("acquire after release succeeds");
    assert_ne!(h2.id, h1.id);
    locker.release(h2).await.unwrap();
}

/// Scenario 2: shared coalescing.
#[tokio::test]
async fn shared_coalescing() {
    let store = InMemoryStore::new();
    let locker = Arc::new(locker(
        store.clone(),
        Duration::from_secs(10),
        Duration::from_secs(3),
    ));

    let (first, second) = tokio::join!(
        {
            let locker = Arc::clone(&locker);
            async move { locker.acquire("read", AcquireOptions::new().shared()).await }
        },
        {
            let locker = Arc::clone(&locker);
            async move { locker.acquire("read", AcquireOptions::new().shared()).await }
        },
    );
    let first = first.unwrap().unwrap();
    let second = second.unwrap().unwrap();
    assert_eq!(first.id, second.id);

    let lease = stored_lease(&store, "read").await.unwrap();
    assert_eq!(lease.shared_holders_count, 2);

    locker.release(first).await.unwrap();
    locker.release(second).await.unwrap();
    assert!(stored_lease(&store, "read").await.is_none());
}

/// Scenario 3: take-over on expiry after the holder stops renewing.
#[tokio::test]
async fn take_over_on_expiry() {
    let store = InMemoryStore::new();
    // The crashed holder's renewal period is far beyond the TTL, which is
    // the same as its renewal being dead.
    let crashed = locker(store.clone(), Duration::from_secs(1), Duration::from_secs(30));
    let survivor = locker(store.clone(), Duration::from_secs(30), Duration::from_secs(3));

    let old = crashed
        .acquire("job", AcquireOptions::new())
        .await
        .unwrap()
        .unwrap();

    tokio::time::sleep(Duration::from_millis(2200)).await;

    let new = survivor
        .acquire("job", AcquireOptions::new().acquirer_id("B"))
        .await
        .unwrap()
        .unwrap();
    assert_ne!(new.id, old.id);
    survivor.release(new).await.unwrap();
}

/// Scenario 4: fair queue, waiters win in arrival order.
#[tokio::test]
async fn fair_queue_rotation_order() {
    let store = InMemoryStore::new();
    let locker = locker(
        store.clone(),
        Duration::from_secs(5),
        Duration::from_millis(500),
    );

    let a = locker
        .acquire("fair", AcquireOptions::new().acquirer_id("A"))
        .await
        .unwrap()
        .unwrap();

    // B then C queue up behind the held lock, a second apart so their
    // queue positions differ at unix-seconds resolution.
    let opts_b = AcquireOptions::new().acquirer_id("B").non_blocking();
    assert!(locker.acquire("fair", opts_b.clone()).await.unwrap().is_none());
    tokio::time::sleep(Duration::from_millis(1100)).await;
    let opts_c = AcquireOptions::new().acquirer_id("C").non_blocking();
    assert!(locker.acquire("fair", opts_c.clone()).await.unwrap().is_none());

    locker.release(a).await.unwrap();

    // C polls first and must keep waiting; B is next in line.
    assert!(locker.acquire("fair", opts_c.clone()).await.unwrap().is_none());
    let b = locker
        .acquire("fair", opts_b)
        .await
        .unwrap()
        .expect("B is first in line");

    locker.release(b).await.unwrap();
    let c = locker
        .acquire("fair", opts_c)
        .await
        .unwrap()
        .expect("C follows B");
    locker.release(c).await.unwrap();
}

/// Scenario 5: the wait callback fires exactly once and resolves.
#[tokio::test]
async fn wait_callback_fires_once() {
    let store = InMemoryStore::new();
    let locker = Arc::new(locker(
        store.clone(),
        Duration::from_secs(30),
        Duration::from_secs(3),
    ));

    let holder = locker
        .acquire("guarded", AcquireOptions::new())
        .await
        .unwrap()
        .unwrap();

    let wait_calls = Arc::new(AtomicUsize::new(0));
    let waiter = {
        let locker = Arc::clone(&locker);
        let wait_calls = Arc::clone(&wait_calls);
        tokio::spawn(async move {
            let opts = AcquireOptions::new().on_wait(move |name, do_wait| {
                let wait_calls = Arc::clone(&wait_calls);
                async move {
                    assert_eq!(name, "guarded");
                    wait_calls.fetch_add(1, Ordering::SeqCst);
                    let result = do_wait().await;
                    assert!(result.is_ok(), "do_wait resolves once the lock frees up");
                    result
                }
            });
            locker.acquire("guarded", opts).await
        })
    };

    tokio::time::sleep(Duration::from_millis(300)).await;
    locker.release(holder).await.unwrap();

    let acquired = tokio::time::timeout(Duration::from_secs(5), waiter)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert!(acquired.is_some());
    assert_eq!(wait_calls.load(Ordering::SeqCst), 1);
    locker.release(acquired.unwrap()).await.unwrap();
}

/// Scenario 6: blocking acquire times out in about the requested time.
#[tokio::test]
async fn timeout_within_poll_period_slack() {
    let locker = locker(
        InMemoryStore::new(),
        Duration::from_secs(30),
        Duration::from_secs(3),
    );

    let _holder = locker
        .acquire("forever", AcquireOptions::new())
        .await
        .unwrap()
        .unwrap();

    let started = std::time::Instant::now();
    let err = locker
        .acquire(
            "forever",
            AcquireOptions::new().timeout(Duration::from_millis(500)),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, LockError::Timeout(_)));

    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(500));
    assert!(elapsed < Duration::from_millis(1200), "timeout is bounded by poll-period slack");
}
