//! Lease records stored inside a store value.

use std::collections::HashMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use lockgate_core::{LockHandle, LockResult};
use serde::{Deserialize, Serialize};

/// Current wall-clock time as unix seconds.
pub(crate) fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs() as i64)
        .unwrap_or_default()
}

/// A waiting acquirer's place in the fair queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueMember {
    #[serde(rename = "AcquirerId")]
    pub acquirer_id: String,
    /// When the acquirer first joined the queue; queue order.
    #[serde(rename = "AcquiredAtTimestamp")]
    pub acquired_at_timestamp: i64,
    /// The entry is pruned once this passes without a refresh.
    #[serde(rename = "ExpireAtTimestamp")]
    pub expire_at_timestamp: i64,
}

/// The lease state written into a store value.
///
/// Exactly one record exists per lock while a lease is live; an empty
/// store value means no lease.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockLeaseRecord {
    /// Handle of the current holder.
    #[serde(flatten)]
    pub lock_handle: LockHandle,
    /// The lease is valid only while `now < expire_at_timestamp`.
    #[serde(rename = "ExpireAtTimestamp")]
    pub expire_at_timestamp: i64,
    /// Number of concurrent shared holders; at least 1 while the lease
    /// exists, exactly 1 for exclusive leases.
    #[serde(rename = "SharedHoldersCount")]
    pub shared_holders_count: i64,
    #[serde(rename = "IsShared")]
    pub is_shared: bool,
    /// Waiting acquirers, keyed by acquirer id.
    #[serde(rename = "QueueMembers", default)]
    pub queue_members: HashMap<String, QueueMember>,
}

impl LockLeaseRecord {
    /// Composes a fresh lease held by a newly generated handle.
    pub fn new(lock_name: &str, is_shared: bool, lease_ttl: Duration) -> Self {
        Self {
            lock_handle: LockHandle::new(lock_name),
            expire_at_timestamp: unix_now() + lease_ttl.as_secs() as i64,
            shared_holders_count: 1,
            is_shared,
            queue_members: HashMap::new(),
        }
    }

    /// Decodes a record from store data; empty data means no lease.
    pub fn decode(data: &str) -> LockResult<Option<Self>> {
        if data.is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(data)?))
    }

    /// Encodes the record into store data.
    pub fn encode(&self) -> LockResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Whether the lease has passed its TTL at `now`.
    pub fn is_expired_at(&self, now: i64) -> bool {
        now > self.expire_at_timestamp
    }
}
