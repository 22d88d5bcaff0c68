//! Optimistic-locking store interface.

use std::future::Future;

use lockgate_core::LockResult;

/// A single value slot in an optimistic-locking store.
///
/// `data` is the serialized lease record, or empty when no lease exists.
/// `token` is the version fence observed at read time; a later
/// [`put_value`](OptimisticLockingStore::put_value) carrying it commits
/// only if the stored version still matches.
#[derive(Debug, Clone)]
pub struct StoreValue<T> {
    pub data: String,
    pub token: T,
}

/// A key-value store with compare-and-swap writes.
///
/// Between a successful `get_value` and a successful `put_value` of the
/// returned token, no other writer's put can have committed: any
/// interleaving makes one side fail with
/// [`LockError::RecordVersionChanged`](lockgate_core::LockError::RecordVersionChanged).
/// All other store errors propagate unchanged.
pub trait OptimisticLockingStore: Send + Sync {
    /// Backend-specific version token carried between get and put.
    type Token: Send;

    /// Reads the current value for `key`.
    ///
    /// A missing key yields an empty-data value whose token denotes
    /// "not yet written", so that a subsequent put creates the record.
    fn get_value(
        &self,
        key: &str,
    ) -> impl Future<Output = LockResult<StoreValue<Self::Token>>> + Send;

    /// Writes `value.data` under the version fence `value.token`.
    fn put_value(
        &self,
        key: &str,
        value: StoreValue<Self::Token>,
    ) -> impl Future<Output = LockResult<()>> + Send;
}
