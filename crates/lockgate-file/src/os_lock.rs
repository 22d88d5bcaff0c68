//! Owned holder for an OS-level advisory lock.

use std::fs::{self, File, OpenOptions};
use std::io::ErrorKind;
use std::path::Path;

use fd_lock::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use lockgate_core::{LockError, LockResult};

enum Guard {
    Shared(#[allow(dead_code)] RwLockReadGuard<'static, File>),
    Exclusive(#[allow(dead_code)] RwLockWriteGuard<'static, File>),
}

/// A held advisory lock on a lock file.
///
/// Owns both the `fd-lock` guard and the lock it borrows from, so the pair
/// can be stored and moved as one value; dropping it releases the OS lock.
pub(crate) struct OsLock {
    // SAFETY: _guard borrows from the RwLock boxed in _lock and must be
    // dropped first. Rust drops fields in declaration order.
    _guard: Guard,
    _lock: Box<RwLock<File>>,
}

// SAFETY: the guard only wraps the boxed File which never leaves this
// struct; the pair is moved and dropped as a unit.
unsafe impl Send for OsLock {}

impl OsLock {
    /// Attempts to take the advisory lock on `path` without blocking.
    ///
    /// Returns `Ok(None)` when another holder has it. The lock file and
    /// its parent directory are created on demand.
    pub(crate) fn try_acquire(path: &Path, shared: bool) -> LockResult<Option<Self>> {
        let file = open_lock_file(path)?;

        // The guard borrows the RwLock, so the lock needs a stable address
        // that outlives the borrow: box it, take the guard through a raw
        // pointer, then reclaim the box alongside the guard.
        let lock_ptr: *mut RwLock<File> = Box::into_raw(Box::new(RwLock::new(file)));

        let guard = if shared {
            match unsafe { (*lock_ptr).try_read() } {
                Ok(guard) => Ok(Guard::Shared(unsafe { std::mem::transmute(guard) })),
                Err(err) => Err(err),
            }
        } else {
            match unsafe { (*lock_ptr).try_write() } {
                Ok(guard) => Ok(Guard::Exclusive(unsafe { std::mem::transmute(guard) })),
                Err(err) => Err(err),
            }
        };

        match guard {
            Ok(guard) => Ok(Some(Self {
                _guard: guard,
                _lock: unsafe { Box::from_raw(lock_ptr) },
            })),
            Err(err) => {
                drop(unsafe { Box::from_raw(lock_ptr) });
                if err.kind() == ErrorKind::WouldBlock {
                    Ok(None)
                } else {
                    Err(LockError::Io(err))
                }
            }
        }
    }
}

fn open_lock_file(path: &Path) -> LockResult<File> {
    if let Some(parent) = path.parent() {
        create_locks_dir(parent)?;
    }

    let mut options = OpenOptions::new();
    options.read(true).write(true).create(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o644);
    }
    options.open(path).map_err(LockError::Io)
}

/// Creates the locks directory (mode 0755 on unix) if it does not exist.
pub(crate) fn create_locks_dir(dir: &Path) -> LockResult<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        fs::DirBuilder::new()
            .recursive(true)
            .mode(0o755)
            .create(dir)
            .or_else(|err| {
                if dir.is_dir() {
                    Ok(())
                } else {
                    Err(LockError::Io(err))
                }
            })
    }
    #[cfg(not(unix))]
    {
        fs::create_dir_all(dir).map_err(LockError::Io)
    }
}
