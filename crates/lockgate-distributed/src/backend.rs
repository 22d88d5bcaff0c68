//! Backend contract for distributed lock coordination.

use std::future::Future;
use std::time::Duration;

use lockgate_core::{LockHandle, LockResult};
use serde::{Deserialize, Serialize};

/// Lifetime of a lease from its last renewal.
pub const DISTRIBUTED_LOCK_LEASE_TTL: Duration = Duration::from_secs(10);
/// How long a waiter sleeps between acquisition attempts.
pub const DISTRIBUTED_LOCK_POLL_RETRY_PERIOD: Duration = Duration::from_secs(2);
/// How long a writer sleeps after a version conflict before re-reading.
pub const DISTRIBUTED_OPTIMISTIC_RETRY_PERIOD: Duration = Duration::from_secs(1);
/// How often a live lease is renewed. Must stay below half the TTL so a
/// single missed tick cannot forfeit the lease.
pub const DISTRIBUTED_LOCK_LEASE_RENEW_PERIOD: Duration = Duration::from_secs(3);

/// Per-call parameters a backend needs for an acquisition.
///
/// This is the backend-level subset of
/// [`AcquireOptions`](lockgate_core::AcquireOptions): waiting, timeouts
/// and callbacks stay on the client side.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AcquireParams {
    #[serde(default)]
    pub shared: bool,
    /// Identity used to hold a place in the fair queue across retries.
    /// Empty opts out of fairness.
    #[serde(rename = "acquirerId", default)]
    pub acquirer_id: String,
}

/// The distributed lock protocol: acquire, renew, release.
///
/// Implementations are stateless aside from their store or transport; all
/// coordination state lives behind them. The lock manager drives waiting
/// and lease renewal on top of this contract.
pub trait DistributedLockerBackend: Send + Sync {
    /// Attempts one acquisition step.
    ///
    /// Returns the held lease's handle, or
    /// [`LockError::ShouldWait`](lockgate_core::LockError::ShouldWait)
    /// when the caller has to poll again.
    fn acquire(
        &self,
        lock_name: &str,
        params: AcquireParams,
    ) -> impl Future<Output = LockResult<LockHandle>> + Send;

    /// Extends the lease of `handle` by one TTL.
    fn renew_lease(&self, handle: &LockHandle) -> impl Future<Output = LockResult<()>> + Send;

    /// Drops `handle`'s hold on the lease.
    fn release(&self, handle: &LockHandle) -> impl Future<Output = LockResult<()>> + Send;
}

/// Store-level timing knobs for a backend.
#[derive(Debug, Clone, Copy)]
pub struct BackendTimeouts {
    /// Lease lifetime granted by acquire and renew.
    pub lease_ttl: Duration,
    /// Sleep between optimistic-locking retries.
    pub optimistic_retry_period: Duration,
}

impl Default for BackendTimeouts {
    fn default() -> Self {
        Self {
            lease_ttl: DISTRIBUTED_LOCK_LEASE_TTL,
            optimistic_retry_period: DISTRIBUTED_OPTIMISTIC_RETRY_PERIOD,
        }
    }
}

/// Client-side timing knobs for the distributed lock manager.
#[derive(Debug, Clone, Copy)]
pub struct LockerTimeouts {
    /// Sleep between blocking-acquire attempts.
    pub poll_retry_period: Duration,
    /// Cadence of the lease renewal worker; keep below half the backend's
    /// lease TTL.
    pub lease_renew_period: Duration,
}

impl Default for LockerTimeouts {
    fn default() -> Self {
        Self {
            poll_retry_period: DISTRIBUTED_LOCK_POLL_RETRY_PERIOD,
            lease_renew_period: DISTRIBUTED_LOCK_LEASE_RENEW_PERIOD,
        }
    }
}
