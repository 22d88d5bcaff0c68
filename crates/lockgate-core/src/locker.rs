//! The `Locker` contract shared by all lock managers.

use std::future::Future;

use crate::error::LockResult;
use crate::handle::LockHandle;
use crate::options::AcquireOptions;

/// A named lock manager.
///
/// Implementations are thread safe: one `Locker` can be shared across
/// tasks. Each successful acquire returns a fresh [`LockHandle`] that the
/// caller must pass back to [`Locker::release`]; handles are the unit of
/// book-keeping, so acquiring the same name twice yields two handles that
/// are released independently.
///
/// # Example
///
/// ```rust,ignore
/// let acquired = locker.acquire("db-migrate", AcquireOptions::new()).await?;
/// if let Some(handle) = acquired {
///     run_migration().await?;
///     locker.release(handle).await?;
/// }
/// ```
pub trait Locker: Send + Sync {
    /// Acquires the named lock.
    ///
    /// * `Ok(Some(handle))` - acquired.
    /// * `Ok(None)` - non-blocking attempt found the lock held.
    /// * `Err(LockError::Timeout)` - blocking attempt exceeded
    ///   `opts.timeout`.
    /// * `Err(..)` - infrastructure failure; the lock was not acquired.
    fn acquire(
        &self,
        lock_name: &str,
        opts: AcquireOptions,
    ) -> impl Future<Output = LockResult<Option<LockHandle>>> + Send;

    /// Releases a previously acquired handle.
    ///
    /// Releasing a handle the manager does not know returns
    /// [`LockError::UnknownHandle`](crate::error::LockError::UnknownHandle).
    fn release(&self, handle: LockHandle) -> impl Future<Output = LockResult<()>> + Send;
}

/// Runs `body` under the named lock and releases on the way out.
///
/// `body` receives `acquired = false` only for a non-blocking miss. When
/// the lock was acquired, it is released after `body` completes; a release
/// error is surfaced only if `body` itself succeeded.
pub async fn with_acquire<L, F, Fut>(
    locker: &L,
    lock_name: &str,
    opts: AcquireOptions,
    body: F,
) -> LockResult<()>
where
    L: Locker,
    F: FnOnce(bool) -> Fut,
    Fut: Future<Output = LockResult<()>>,
{
    match locker.acquire(lock_name, opts).await? {
        Some(handle) => {
            let body_result = body(true).await;
            let release_result = locker.release(handle).await;
            match body_result {
                Ok(()) => release_result,
                Err(err) => Err(err),
            }
        }
        None => body(false).await,
    }
}
