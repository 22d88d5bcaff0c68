//! Lease protocol over an optimistic-locking store.

use std::fmt::Write as _;

use lockgate_core::{LockError, LockHandle, LockResult};
use sha3::{Digest, Sha3_224};
use tracing::debug;
use uuid::Uuid;

use crate::backend::{AcquireParams, BackendTimeouts, DistributedLockerBackend};
use crate::lease::{unix_now, LockLeaseRecord, QueueMember};
use crate::store::{OptimisticLockingStore, StoreValue};

const STORE_KEY_PREFIX: &str = "lockgate.io/";

/// Derives the store key for a lock name.
///
/// The name is hashed (SHA3-224, hex) to bound the key length regardless
/// of what callers put in their lock names.
pub fn store_key_name(lock_name: &str) -> String {
    let digest = Sha3_224::digest(lock_name.as_bytes());
    let mut key = String::with_capacity(STORE_KEY_PREFIX.len() + digest.len() * 2);
    key.push_str(STORE_KEY_PREFIX);
    for byte in digest {
        let _ = write!(key, "{byte:02x}");
    }
    key
}

/// What to do with the lease after a change closure ran.
enum LeaseDisposition {
    /// Write the (mutated) record back.
    Store,
    /// Clear the stored value; the lease is gone.
    Erase,
}

/// Distributed lock backend coordinating through any
/// [`OptimisticLockingStore`].
///
/// Stateless apart from the injected store: every operation is a
/// read-modify-write that restarts from the read whenever the versioned
/// write loses a race.
pub struct OptimisticLockingStoreBackend<S> {
    store: S,
    timeouts: BackendTimeouts,
}

impl<S: OptimisticLockingStore> OptimisticLockingStoreBackend<S> {
    pub fn new(store: S) -> Self {
        Self::with_timeouts(store, BackendTimeouts::default())
    }

    pub fn with_timeouts(store: S, timeouts: BackendTimeouts) -> Self {
        Self { store, timeouts }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn lease_ttl_secs(&self) -> i64 {
        self.timeouts.lease_ttl.as_secs() as i64
    }

    /// Read-modify-write on the lease owned by `handle`.
    ///
    /// Fails with `NoExistingLockLeaseFound` when the value is empty and
    /// `LockAlreadyLeased` when the stored lease belongs to another
    /// handle. A version conflict on the write restarts the whole cycle
    /// after the optimistic-retry sleep; `change` may therefore run more
    /// than once and must be idempotent over its captures.
    async fn change_lease<F>(&self, handle: &LockHandle, mut change: F) -> LockResult<()>
    where
        F: FnMut(&mut LockLeaseRecord) -> LockResult<LeaseDisposition> + Send,
    {
        let key = store_key_name(&handle.lock_name);
        loop {
            let value = self.store.get_value(&key).await?;
            let Some(mut lease) = LockLeaseRecord::decode(&value.data)? else {
                return Err(LockError::NoExistingLockLeaseFound);
            };
            if lease.lock_handle.id != handle.id {
                return Err(LockError::LockAlreadyLeased);
            }

            let data = match change(&mut lease)? {
                LeaseDisposition::Store => lease.encode()?,
                LeaseDisposition::Erase => String::new(),
            };
            match self
                .store
                .put_value(
                    &key,
                    StoreValue {
                        data,
                        token: value.token,
                    },
                )
                .await
            {
                Err(err) if err.is_record_version_changed() => {
                    debug!(lock_name = %handle.lock_name, %key, "version conflict on lease change, retrying");
                    tokio::time::sleep(self.timeouts.optimistic_retry_period).await;
                }
                other => return other,
            }
        }
    }

    /// Fair take-over of an expired lease.
    ///
    /// Prunes expired queue members, keeps the caller's place refreshed,
    /// and rotates the lease to a fresh handle when the caller is first
    /// in line (or nobody is queued). Returns `ShouldWait` when an older
    /// waiter exists.
    async fn take_if_oldest(
        &self,
        handle: &LockHandle,
        acquirer_id: &str,
    ) -> LockResult<LockHandle> {
        let ttl = self.lease_ttl_secs();
        let mut rotated: Option<LockHandle> = None;

        self.change_lease(handle, |lease| {
            // The closure reruns on version conflicts; start clean.
            rotated = None;
            let now = unix_now();

            lease
                .queue_members
                .retain(|_, member| member.expire_at_timestamp >= now);
            if let Some(member) = lease.queue_members.get_mut(acquirer_id) {
                member.expire_at_timestamp = now + ttl;
            }
            let next_up = lease
                .queue_members
                .values()
                .min_by_key(|member| member.acquired_at_timestamp)
                .map(|member| member.acquirer_id.clone());

            if !acquirer_id.is_empty() && !lease.queue_members.contains_key(acquirer_id) {
                lease.queue_members.insert(
                    acquirer_id.to_string(),
                    QueueMember {
                        acquirer_id: acquirer_id.to_string(),
                        acquired_at_timestamp: now,
                        expire_at_timestamp: now + ttl,
                    },
                );
            }

            if next_up.as_deref().is_none_or(|id| id == acquirer_id) {
                lease.lock_handle.id = Uuid::new_v4();
                lease.expire_at_timestamp = now + ttl;
                lease.shared_holders_count = 1;
                lease.queue_members.remove(acquirer_id);
                rotated = Some(lease.lock_handle.clone());
            }
            Ok(LeaseDisposition::Store)
        })
        .await?;

        rotated.ok_or(LockError::ShouldWait)
    }

    /// Registers the caller in the fair queue, or refreshes its entry.
    async fn update_queue(&self, handle: &LockHandle, acquirer_id: &str) -> LockResult<()> {
        if acquirer_id.is_empty() {
            return Ok(());
        }
        let ttl = self.lease_ttl_secs();
        self.change_lease(handle, |lease| {
            let now = unix_now();
            match lease.queue_members.get_mut(acquirer_id) {
                Some(member) => member.expire_at_timestamp = now + ttl,
                None => {
                    lease.queue_members.insert(
                        acquirer_id.to_string(),
                        QueueMember {
                            acquirer_id: acquirer_id.to_string(),
                            acquired_at_timestamp: now,
                            expire_at_timestamp: now + ttl,
                        },
                    );
                }
            }
            Ok(LeaseDisposition::Store)
        })
        .await
    }
}

impl<S: OptimisticLockingStore> DistributedLockerBackend for OptimisticLockingStoreBackend<S> {
    async fn acquire(&self, lock_name: &str, params: AcquireParams) -> LockResult<LockHandle> {
        let key = store_key_name(lock_name);
        loop {
            let value = self.store.get_value(&key).await?;
            let old_lease = LockLeaseRecord::decode(&value.data)?;

            let Some(old_lease) = old_lease else {
                // No existing lease: create one for this caller.
                let lease = LockLeaseRecord::new(lock_name, params.shared, self.timeouts.lease_ttl);
                let data = lease.encode()?;
                match self
                    .store
                    .put_value(
                        &key,
                        StoreValue {
                            data,
                            token: value.token,
                        },
                    )
                    .await
                {
                    Err(err) if err.is_record_version_changed() => {
                        debug!(lock_name, %key, "version conflict creating lease, retrying");
                        tokio::time::sleep(self.timeouts.optimistic_retry_period).await;
                        continue;
                    }
                    Err(err) => return Err(err),
                    Ok(()) => {
                        debug!(lock_name, id = %lease.lock_handle.id, "created lease");
                        return Ok(lease.lock_handle);
                    }
                }
            };

            if old_lease.is_expired_at(unix_now()) {
                debug!(lock_name, id = %old_lease.lock_handle.id, "lease expired, attempting take-over");
                return self
                    .take_if_oldest(&old_lease.lock_handle, &params.acquirer_id)
                    .await;
            }

            if params.shared && old_lease.is_shared {
                // Join the live shared lease under its existing id;
                // renewal is per lease, not per holder.
                let mut lease = old_lease;
                lease.shared_holders_count += 1;
                lease.expire_at_timestamp = unix_now() + self.lease_ttl_secs();
                let data = lease.encode()?;
                match self
                    .store
                    .put_value(
                        &key,
                        StoreValue {
                            data,
                            token: value.token,
                        },
                    )
                    .await
                {
                    Err(err) if err.is_record_version_changed() => {
                        debug!(lock_name, %key, "version conflict joining shared lease, retrying");
                        tokio::time::sleep(self.timeouts.optimistic_retry_period).await;
                        continue;
                    }
                    Err(err) => return Err(err),
                    Ok(()) => {
                        debug!(
                            lock_name,
                            id = %lease.lock_handle.id,
                            holders = lease.shared_holders_count,
                            "joined shared lease"
                        );
                        return Ok(lease.lock_handle);
                    }
                }
            }

            // Held by someone else: keep our place in line and wait.
            self.update_queue(&old_lease.lock_handle, &params.acquirer_id)
                .await?;
            return Err(LockError::ShouldWait);
        }
    }

    async fn renew_lease(&self, handle: &LockHandle) -> LockResult<()> {
        let ttl = self.lease_ttl_secs();
        self.change_lease(handle, |lease| {
            lease.expire_at_timestamp = unix_now() + ttl;
            Ok(LeaseDisposition::Store)
        })
        .await
    }

    async fn release(&self, handle: &LockHandle) -> LockResult<()> {
        self.change_lease(handle, |lease| {
            lease.shared_holders_count -= 1;
            let now = unix_now();
            lease
                .queue_members
                .retain(|_, member| member.expire_at_timestamp >= now);

            if lease.shared_holders_count == 0 {
                if lease.queue_members.is_empty() {
                    return Ok(LeaseDisposition::Erase);
                }
                // Waiters exist: mark the lease expired so the next poll
                // can take it over through the expired-lease path.
                lease.expire_at_timestamp = now - 1;
            }
            Ok(LeaseDisposition::Store)
        })
        .await
    }
}
