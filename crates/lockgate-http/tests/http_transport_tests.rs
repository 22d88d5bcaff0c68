//! End-to-end tests: lock server over a real TCP socket, exercised
//! through the HTTP client backend and raw requests.

use std::sync::Arc;
use std::time::Duration;

use lockgate_core::{AcquireOptions, Locker};
use lockgate_distributed::{
    AcquireParams, BackendTimeouts, DistributedLocker, DistributedLockerBackend, InMemoryStore,
    LockerTimeouts, OptimisticLockingStoreBackend,
};
use lockgate_http::{backend_router, HttpBackend};

/// Binds port 0 and serves an in-memory-store backend; returns the base URL.
async fn start_lock_server(lease_ttl: Duration) -> String {
    let backend = Arc::new(OptimisticLockingStoreBackend::with_timeouts(
        InMemoryStore::new(),
        BackendTimeouts {
            lease_ttl,
            optimistic_retry_period: Duration::from_millis(10),
        },
    ));
    let app = backend_router(backend);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn remote_locker(endpoint: &str) -> DistributedLocker<HttpBackend> {
    DistributedLocker::with_timeouts(
        HttpBackend::new(endpoint),
        LockerTimeouts {
            poll_retry_period: Duration::from_millis(100),
            lease_renew_period: Duration::from_millis(500),
        },
    )
}

#[tokio::test]
async fn acquire_release_round_trip_over_http() {
    let base = start_lock_server(Duration::from_secs(10)).await;
    let locker = remote_locker(&base);

    let handle = locker
        .acquire("remote-job", AcquireOptions::new())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(handle.lock_name, "remote-job");

    // A second client sees the lock as held.
    let other = remote_locker(&base);
    let miss = other
        .acquire("remote-job", AcquireOptions::new().non_blocking())
        .await
        .unwrap();
    assert!(miss.is_none());

    locker.release(handle).await.unwrap();

    let taken = other
        .acquire("remote-job", AcquireOptions::new().non_blocking())
        .await
        .unwrap();
    assert!(taken.is_some());
    other.release(taken.unwrap()).await.unwrap();
}

#[tokio::test]
async fn client_side_renewal_keeps_a_remote_lease_alive() {
    let base = start_lock_server(Duration::from_secs(1)).await;
    let locker = remote_locker(&base);

    let handle = locker
        .acquire("renewed-remotely", AcquireOptions::new())
        .await
        .unwrap()
        .unwrap();

    // Far beyond the server-side TTL: only client renewal keeps it held.
    tokio::time::sleep(Duration::from_millis(2500)).await;

    let other = remote_locker(&base);
    let miss = other
        .acquire("renewed-remotely", AcquireOptions::new().non_blocking())
        .await
        .unwrap();
    assert!(miss.is_none(), "client-side renewal must keep the lease");

    locker.release(handle).await.unwrap();
}

#[tokio::test]
async fn shared_holders_coalesce_across_clients() {
    let base = start_lock_server(Duration::from_secs(10)).await;
    let a = remote_locker(&base);
    let b = remote_locker(&base);

    let first = a
        .acquire("shared-remote", AcquireOptions::new().shared())
        .await
        .unwrap()
        .unwrap();
    let second = b
        .acquire("shared-remote", AcquireOptions::new().shared())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first.id, second.id);

    a.release(first).await.unwrap();
    b.release(second).await.unwrap();
}

#[tokio::test]
async fn canonical_error_strings_cross_the_wire() {
    let base = start_lock_server(Duration::from_secs(10)).await;
    let backend = HttpBackend::new(&base);

    let handle = backend
        .acquire("wire-errors", AcquireParams::default())
        .await
        .unwrap();

    // A contender is told, in so many words, to wait.
    let err = backend
        .acquire("wire-errors", AcquireParams::default())
        .await
        .unwrap_err();
    assert!(err.is_should_wait());
    assert_eq!(err.to_string(), "should wait");

    // A handle for a lock with no lease record.
    let ghost = lockgate_core::LockHandle::new("wire-ghost");
    let err = backend.renew_lease(&ghost).await.unwrap_err();
    assert!(err.is_no_existing_lock_lease_found());
    assert_eq!(err.to_string(), "no existing lock lease found");

    // A stale handle for a lock whose lease belongs to someone else.
    let stale = lockgate_core::LockHandle::new("wire-errors");
    let err = backend.release(&stale).await.unwrap_err();
    assert!(err.is_lock_already_leased());
    assert_eq!(err.to_string(), "lock already leased");

    backend.release(&handle).await.unwrap();
}

#[tokio::test]
async fn raw_wire_format_matches_the_protocol() {
    let base = start_lock_server(Duration::from_secs(10)).await;
    let client = reqwest::Client::new();

    let body: serde_json::Value = client
        .post(format!("{base}/acquire"))
        .json(&serde_json::json!({
            "lockName": "raw",
            "opts": {"shared": false, "acquirerId": ""},
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["err"], "");
    assert_eq!(body["lockHandle"]["name"], "raw");
    let id = body["lockHandle"]["id"].as_str().unwrap();
    assert!(!id.is_empty());

    // Releasing through the raw protocol as well.
    let body: serde_json::Value = client
        .post(format!("{base}/release"))
        .json(&serde_json::json!({"lockHandle": {"id": id, "name": "raw"}}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["err"], "");
}

#[tokio::test]
async fn unreachable_server_is_a_transport_error() {
    // Reserved port with nothing listening.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let backend = HttpBackend::new(format!("http://{addr}"));
    let err = backend
        .acquire("nowhere", AcquireParams::default())
        .await
        .unwrap_err();
    assert!(matches!(err, lockgate_core::LockError::Transport(_)));
}
