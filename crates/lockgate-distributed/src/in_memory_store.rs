//! In-memory optimistic-locking store.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use lockgate_core::{LockError, LockResult};

use crate::store::{OptimisticLockingStore, StoreValue};

/// Token value denoting a key that has never been written.
const UNWRITTEN: u64 = 0;

#[derive(Debug, Default)]
struct Record {
    version: u64,
    data: String,
}

/// Process-local store with versioned compare-and-swap writes.
///
/// Cloning shares the underlying map, so every participant of a test or a
/// single-process deployment sees the same records.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    records: Arc<Mutex<HashMap<String, Record>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl OptimisticLockingStore for InMemoryStore {
    type Token = u64;

    async fn get_value(&self, key: &str) -> LockResult<StoreValue<u64>> {
        let records = self.records.lock().unwrap();
        Ok(match records.get(key) {
            Some(record) => StoreValue {
                data: record.data.clone(),
                token: record.version,
            },
            None => StoreValue {
                data: String::new(),
                token: UNWRITTEN,
            },
        })
    }

    async fn put_value(&self, key: &str, value: StoreValue<u64>) -> LockResult<()> {
        let mut records = self.records.lock().unwrap();
        match records.get_mut(key) {
            Some(record) => {
                if record.version != value.token {
                    return Err(LockError::RecordVersionChanged);
                }
                record.version += 1;
                record.data = value.data;
            }
            None => {
                if value.token != UNWRITTEN {
                    return Err(LockError::RecordVersionChanged);
                }
                records.insert(
                    key.to_string(),
                    Record {
                        version: 1,
                        data: value.data,
                    },
                );
            }
        }
        Ok(())
    }
}
