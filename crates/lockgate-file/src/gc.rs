//! Garbage collection for lock file directories.

use std::fs;
use std::path::Path;

use lockgate_core::LockResult;
use tracing::debug;

use crate::os_lock::OsLock;

/// Deletes unreferenced lock files under `dir`, recursively.
///
/// A file is unreferenced when an exclusive advisory lock on it can be
/// taken without waiting; files locked by any live holder are left alone.
pub fn gc_lock_files_dir(dir: impl AsRef<Path>) -> LockResult<()> {
    gc_dir(dir.as_ref())
}

fn gc_dir(dir: &Path) -> LockResult<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            gc_dir(&path)?;
        } else {
            remove_if_unreferenced(&path)?;
        }
    }
    Ok(())
}

fn remove_if_unreferenced(path: &Path) -> LockResult<()> {
    match OsLock::try_acquire(path, false)? {
        // Locked by a live holder.
        None => Ok(()),
        Some(os_lock) => {
            fs::remove_file(path)?;
            drop(os_lock);
            debug!(path = %path.display(), "collected lock file");
            Ok(())
        }
    }
}
