//! Lock handles.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Caller-visible token for a single acquisition of a named lock.
///
/// Every successful acquire yields a fresh `id`, even when several shared
/// holders ride the same underlying lease. The handle must be passed back
/// to release (and is used internally to renew) the acquisition; handles
/// are plain data and can be cloned or sent across threads freely.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LockHandle {
    /// Unique id of this acquisition.
    pub id: Uuid,
    /// The lock name the handle was issued for.
    #[serde(rename = "name")]
    pub lock_name: String,
}

impl LockHandle {
    /// Creates a handle with a freshly generated id.
    pub fn new(lock_name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            lock_name: lock_name.into(),
        }
    }
}
