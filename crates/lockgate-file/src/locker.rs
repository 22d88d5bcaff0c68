//! File-backed lock manager.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use lockgate_core::{AcquireOptions, LockError, LockHandle, LockResult, Locker};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::file_lock::FileLock;
use crate::os_lock::create_locks_dir;

/// Lock manager coordinating named locks through advisory file locks.
///
/// Every acquisition gets its own [`FileLock`] anchored to
/// `locks_dir/<hex-hash(name)>`, registered under the issued handle id
/// until it is released. Mutual exclusion between handles (and between
/// processes) happens entirely at the OS lock layer.
pub struct FileLocker {
    locks_dir: PathBuf,
    locks: Mutex<HashMap<Uuid, FileLock>>,
}

impl FileLocker {
    /// Creates the manager, creating `locks_dir` if needed.
    pub fn new(locks_dir: impl Into<PathBuf>) -> LockResult<Self> {
        lockgate_core::debug::init_debug_tracing();
        let locks_dir = locks_dir.into();
        create_locks_dir(&locks_dir)?;
        Ok(Self {
            locks_dir,
            locks: Mutex::new(HashMap::new()),
        })
    }

    /// Directory holding the lock files.
    pub fn locks_dir(&self) -> &Path {
        &self.locks_dir
    }
}

impl Locker for FileLocker {
    #[instrument(skip(self, opts), fields(locks_dir = %self.locks_dir.display()))]
    async fn acquire(
        &self,
        lock_name: &str,
        opts: AcquireOptions,
    ) -> LockResult<Option<LockHandle>> {
        let handle = LockHandle::new(lock_name);
        let mut lock = FileLock::new(lock_name, &self.locks_dir)?;

        if opts.non_blocking {
            if !lock.try_lock(opts.shared)? {
                debug!(lock_name, "non-blocking acquire: lock not taken");
                return Ok(None);
            }
        } else {
            lock.lock(opts.timeout, opts.shared, opts.on_wait.as_ref())
                .await?;
        }

        debug!(lock_name, id = %handle.id, shared = opts.shared, "acquired");
        self.locks.lock().unwrap().insert(handle.id, lock);
        Ok(Some(handle))
    }

    #[instrument(skip(self), fields(lock_name = %handle.lock_name, id = %handle.id))]
    async fn release(&self, handle: LockHandle) -> LockResult<()> {
        let lock = self.locks.lock().unwrap().remove(&handle.id);
        match lock {
            Some(mut lock) => {
                lock.unlock();
                debug!("released");
                Ok(())
            }
            None => Err(LockError::UnknownHandle {
                id: handle.id,
                name: handle.lock_name,
            }),
        }
    }
}
