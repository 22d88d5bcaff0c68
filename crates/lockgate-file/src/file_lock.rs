//! A named advisory file lock with in-process reentrancy.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use lockgate_core::{DoWait, LockError, LockResult, OnWaitFn};
use tokio::sync::oneshot;
use tracing::debug;

use crate::name::lock_file_path;
use crate::os_lock::OsLock;

/// How often a waiting lock attempt re-tries the OS lock.
pub const FILE_LOCK_POLL_PERIOD: Duration = Duration::from_millis(500);

/// An advisory lock anchored to `locks_dir/<hex-hash(name)>`.
///
/// The OS-level lock is taken when the in-process counter goes 0→1 and
/// released on 1→0; nested `lock`/`unlock` pairs in between only move the
/// counter. The counter is mode-agnostic: nested acquisitions reenter
/// whatever mode the first one took, so callers must not interleave shared
/// and exclusive use of one `FileLock`.
pub struct FileLock {
    name: String,
    path: PathBuf,
    active_locks: u32,
    os_lock: Option<OsLock>,
}

impl FileLock {
    /// Creates the lock object for `lock_name` under `locks_dir`.
    ///
    /// No filesystem state is touched until the first acquisition attempt.
    pub fn new(lock_name: impl Into<String>, locks_dir: &Path) -> LockResult<Self> {
        let name = lock_name.into();
        let path = lock_file_path(locks_dir, &name)?;
        Ok(Self {
            name,
            path,
            active_locks: 0,
            os_lock: None,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Path of the lock file this lock anchors to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of in-process holders.
    pub fn active_locks(&self) -> u32 {
        self.active_locks
    }

    /// Attempts to take the lock without waiting.
    ///
    /// Returns `true` when the lock is held afterwards (either the OS lock
    /// was just taken or this object already held it).
    pub fn try_lock(&mut self, shared: bool) -> LockResult<bool> {
        if self.active_locks == 0 {
            match OsLock::try_acquire(&self.path, shared)? {
                Some(os_lock) => self.os_lock = Some(os_lock),
                None => return Ok(false),
            }
        }
        self.active_locks += 1;
        Ok(true)
    }

    /// Takes the lock, polling the OS lock every
    /// [`FILE_LOCK_POLL_PERIOD`] while it is held elsewhere.
    ///
    /// `timeout` bounds the wait (`None` or zero waits indefinitely).
    /// When `on_wait` is provided and the first attempt fails, it is
    /// invoked with the lock name and a wait continuation that runs the
    /// polling loop; the acquisition result propagates out of that
    /// continuation.
    pub async fn lock(
        &mut self,
        timeout: Option<Duration>,
        shared: bool,
        on_wait: Option<&OnWaitFn>,
    ) -> LockResult<()> {
        if self.active_locks > 0 {
            self.active_locks += 1;
            return Ok(());
        }

        let os_lock = match OsLock::try_acquire(&self.path, shared)? {
            Some(os_lock) => os_lock,
            None => {
                debug!(name = %self.name, path = %self.path.display(), "file lock busy, polling");
                match on_wait {
                    None => poll_os_lock(self.path.clone(), shared, timeout).await?,
                    Some(on_wait) => {
                        let slot: Arc<Mutex<Option<OsLock>>> = Arc::new(Mutex::new(None));
                        let do_wait: DoWait = {
                            let slot = Arc::clone(&slot);
                            let path = self.path.clone();
                            Box::new(move || {
                                Box::pin(async move {
                                    let os_lock = poll_os_lock(path, shared, timeout).await?;
                                    *slot.lock().unwrap() = Some(os_lock);
                                    Ok(())
                                })
                            })
                        };
                        on_wait(self.name.clone(), do_wait).await?;
                        let Some(os_lock) = slot.lock().unwrap().take() else {
                            return Err(LockError::Backend(
                                "on_wait callback returned without acquiring the lock".into(),
                            ));
                        };
                        os_lock
                    }
                }
            }
        };

        self.os_lock = Some(os_lock);
        self.active_locks = 1;
        Ok(())
    }

    /// Drops one in-process hold; the OS lock is released on the last one.
    pub fn unlock(&mut self) {
        if self.active_locks == 0 {
            return;
        }
        self.active_locks -= 1;
        if self.active_locks == 0 {
            self.os_lock = None;
        }
    }
}

/// Polls the OS lock on a background task until it is taken or `timeout`
/// elapses. The poller hands the held lock back over a result channel and
/// is aborted when the deadline wins the race.
async fn poll_os_lock(
    path: PathBuf,
    shared: bool,
    timeout: Option<Duration>,
) -> LockResult<OsLock> {
    let (result_tx, result_rx) = oneshot::channel::<LockResult<OsLock>>();

    let poller = tokio::spawn(async move {
        let start = tokio::time::Instant::now() + FILE_LOCK_POLL_PERIOD;
        let mut ticker = tokio::time::interval_at(start, FILE_LOCK_POLL_PERIOD);
        loop {
            ticker.tick().await;
            match OsLock::try_acquire(&path, shared) {
                Ok(Some(os_lock)) => {
                    let _ = result_tx.send(Ok(os_lock));
                    return;
                }
                Ok(None) => {}
                Err(err) => {
                    let _ = result_tx.send(Err(err));
                    return;
                }
            }
        }
    });

    let result = match timeout {
        Some(limit) if !limit.is_zero() => {
            match tokio::time::timeout(limit, result_rx).await {
                Ok(received) => received,
                Err(_) => {
                    poller.abort();
                    return Err(LockError::Timeout(limit));
                }
            }
        }
        _ => result_rx.await,
    };

    result.unwrap_or_else(|_| {
        Err(LockError::Backend(
            "file lock poller exited unexpectedly".into(),
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn nested_locks_take_os_lock_once() {
        let dir = tempfile::tempdir().unwrap();
        let mut lock = FileLock::new("nested", dir.path()).unwrap();

        for expected in 1..=3u32 {
            lock.lock(None, false, None).await.unwrap();
            assert_eq!(lock.active_locks(), expected);
        }

        // A second object on the same name is excluded while any nesting
        // level is outstanding.
        let mut contender = FileLock::new("nested", dir.path()).unwrap();
        for _ in 0..3 {
            assert!(!contender.try_lock(false).unwrap());
            lock.unlock();
        }
        assert_eq!(lock.active_locks(), 0);
        assert!(contender.try_lock(false).unwrap());
    }

    #[tokio::test]
    async fn unlock_without_lock_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let mut lock = FileLock::new("idle", dir.path()).unwrap();
        lock.unlock();
        assert_eq!(lock.active_locks(), 0);
    }

    #[tokio::test]
    async fn timeout_fires_against_a_held_lock() {
        let dir = tempfile::tempdir().unwrap();
        let mut holder = FileLock::new("held", dir.path()).unwrap();
        assert!(holder.try_lock(false).unwrap());

        let mut waiter = FileLock::new("held", dir.path()).unwrap();
        let started = std::time::Instant::now();
        let err = waiter
            .lock(Some(Duration::from_millis(120)), false, None)
            .await
            .unwrap_err();
        assert!(matches!(err, LockError::Timeout(_)));
        assert!(started.elapsed() >= Duration::from_millis(120));
        assert_eq!(waiter.active_locks(), 0);
    }
}
