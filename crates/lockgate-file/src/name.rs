//! Lock-name to lock-file-path derivation.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use lockgate_core::{LockError, LockResult};
use sha2::{Digest, Sha256};

/// Derives the lock file path for a lock name.
///
/// The file name is the hex SHA-256 of the lock name, which bounds its
/// length and keeps arbitrary names filesystem-safe.
pub fn lock_file_path(locks_dir: &Path, lock_name: &str) -> LockResult<PathBuf> {
    if lock_name.is_empty() {
        return Err(LockError::InvalidName(
            "lock name cannot be empty".to_string(),
        ));
    }
    Ok(locks_dir.join(hex_hash(lock_name)))
}

fn hex_hash(lock_name: &str) -> String {
    let digest = Sha256::digest(lock_name.as_bytes());
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        let _ = write!(out, "{byte:02x}");
    }
    out
}
