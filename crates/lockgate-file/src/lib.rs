//! Advisory file lock engine for the lockgate named lock service.
//!
//! [`FileLocker`] implements the [`Locker`](lockgate_core::Locker) contract
//! over per-name lock files; [`FileLock`] is the underlying reentrant lock
//! object, usable standalone when a single process wants nested holds.

mod file_lock;
mod gc;
mod locker;
mod name;
mod os_lock;

pub use file_lock::{FileLock, FILE_LOCK_POLL_PERIOD};
pub use gc::gc_lock_files_dir;
pub use locker::FileLocker;
pub use name::lock_file_path;
