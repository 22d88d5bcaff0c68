//! Named lock service with pluggable engines.
//!
//! `lockgate` coordinates critical sections by name, either inside one
//! host through advisory file locks or across hosts through a lease-based
//! protocol over an optimistic-locking store (optionally behind an HTTP
//! lock server).
//!
//! # Quick start
//!
//! ```rust,no_run
//! use lockgate::{AcquireOptions, FileLocker, Locker};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let locker = FileLocker::new("/var/lock/myapp")?;
//!
//!     if let Some(handle) = locker.acquire("db-migrate", AcquireOptions::new()).await? {
//!         // Critical section: we hold the lock.
//!         locker.release(handle).await?;
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Engines
//!
//! - [`FileLocker`] - per-name lock files under a directory, advisory OS
//!   locks, shared and exclusive modes.
//! - [`DistributedLocker`] over an [`OptimisticLockingStoreBackend`] -
//!   TTL-bounded leases with background renewal, fair FIFO queueing for
//!   waiters that supply an acquirer id.
//! - [`DistributedLocker`] over an [`HttpBackend`] - the same protocol
//!   against a remote lock server; see [`run_backend_server`].
//!
//! This is a meta-crate re-exporting `lockgate-core`, `lockgate-file`,
//! `lockgate-distributed` and `lockgate-http`.

use std::sync::Arc;

pub use lockgate_core::*;
#[allow(ambiguous_glob_reexports)]
pub use lockgate_distributed::*;
#[allow(ambiguous_glob_reexports)]
pub use lockgate_file::*;
#[allow(ambiguous_glob_reexports)]
pub use lockgate_http::*;

/// A distributed locker coordinating through a process-local store.
///
/// Useful for tests and single-process deployments; clone the locker to
/// share it.
pub fn new_in_memory_locker() -> DistributedLocker<OptimisticLockingStoreBackend<InMemoryStore>> {
    DistributedLocker::new(OptimisticLockingStoreBackend::new(InMemoryStore::new()))
}

/// A distributed locker speaking to a remote lock server.
pub fn new_http_locker(endpoint: impl Into<String>) -> DistributedLocker<HttpBackend> {
    DistributedLocker::new(HttpBackend::new(endpoint))
}

/// A ready-to-serve lock server router backed by an in-memory store.
pub fn new_http_backend_router_with_in_memory_store() -> axum::Router {
    backend_router(Arc::new(OptimisticLockingStoreBackend::new(
        InMemoryStore::new(),
    )))
}
