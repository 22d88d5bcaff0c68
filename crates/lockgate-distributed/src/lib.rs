//! Lease-based distributed lock engine.
//!
//! Coordination happens through any [`OptimisticLockingStore`]: every
//! mutation is a read-modify-write committed under a version fence and
//! retried on conflict. [`OptimisticLockingStoreBackend`] implements the
//! acquire / renew / release protocol over such a store, and
//! [`DistributedLocker`] puts the client-side loop on top: polling
//! waiters, fair queueing via acquirer ids, and a background renewal task
//! per live lease.

mod backend;
mod in_memory_store;
mod lease;
mod locker;
mod store;
mod store_backend;

pub use backend::{
    AcquireParams, BackendTimeouts, DistributedLockerBackend, LockerTimeouts,
    DISTRIBUTED_LOCK_LEASE_RENEW_PERIOD, DISTRIBUTED_LOCK_LEASE_TTL,
    DISTRIBUTED_LOCK_POLL_RETRY_PERIOD, DISTRIBUTED_OPTIMISTIC_RETRY_PERIOD,
};
pub use in_memory_store::InMemoryStore;
pub use lease::{LockLeaseRecord, QueueMember};
pub use locker::DistributedLocker;
pub use store::{OptimisticLockingStore, StoreValue};
pub use store_backend::{store_key_name, OptimisticLockingStoreBackend};
