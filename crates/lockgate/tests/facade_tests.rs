//! Tests for the facade constructors and the scoped-acquisition helper.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use lockgate::{
    new_http_backend_router_with_in_memory_store, new_http_locker, new_in_memory_locker,
    with_acquire, AcquireOptions, FileLocker, Locker,
};

#[tokio::test]
async fn in_memory_locker_round_trip() {
    let locker = new_in_memory_locker();
    let handle = locker
        .acquire("facade", AcquireOptions::new())
        .await
        .unwrap()
        .unwrap();

    // Clones share the coordination state.
    let clone = locker.clone();
    let miss = clone
        .acquire("facade", AcquireOptions::new().non_blocking())
        .await
        .unwrap();
    assert!(miss.is_none());

    locker.release(handle).await.unwrap();
}

#[tokio::test]
async fn http_locker_against_the_bundled_router() {
    let app = new_http_backend_router_with_in_memory_store();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let locker = new_http_locker(format!("http://{addr}"));
    let handle = locker
        .acquire("served", AcquireOptions::new())
        .await
        .unwrap()
        .unwrap();

    let miss = locker
        .acquire("served", AcquireOptions::new().non_blocking())
        .await
        .unwrap();
    assert!(miss.is_none());

    locker.release(handle).await.unwrap();
}

#[tokio::test]
async fn with_acquire_scopes_a_file_lock() {
    let dir = tempfile::tempdir().unwrap();
    let locker = FileLocker::new(dir.path()).unwrap();

    let ran = Arc::new(AtomicBool::new(false));
    {
        let ran = Arc::clone(&ran);
        with_acquire(&locker, "scoped", AcquireOptions::new(), |acquired| {
            let ran = Arc::clone(&ran);
            async move {
                assert!(acquired);
                ran.store(true, Ordering::SeqCst);
                Ok(())
            }
        })
        .await
        .unwrap();
    }
    assert!(ran.load(Ordering::SeqCst));

    // The helper released on the way out.
    let handle = locker
        .acquire("scoped", AcquireOptions::new().non_blocking())
        .await
        .unwrap();
    assert!(handle.is_some());
    locker.release(handle.unwrap()).await.unwrap();
}

#[tokio::test]
async fn with_acquire_reports_a_non_blocking_miss() {
    let locker = new_in_memory_locker();
    let holder = locker
        .acquire("busy", AcquireOptions::new())
        .await
        .unwrap()
        .unwrap();

    with_acquire(
        &locker,
        "busy",
        AcquireOptions::new().non_blocking(),
        |acquired| async move {
            assert!(!acquired);
            Ok(())
        },
    )
    .await
    .unwrap();

    locker.release(holder).await.unwrap();
}
