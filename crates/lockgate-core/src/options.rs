//! Acquisition options and wait callbacks.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use crate::error::LockResult;
use crate::handle::LockHandle;

/// Boxed future used by the callback aliases below.
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// The wait continuation handed to [`AcquireOptions::on_wait`] callbacks.
///
/// Calling it runs the sleep-then-retry loop; the acquisition outcome
/// propagates out of the returned future.
pub type DoWait = Box<dyn FnOnce() -> BoxFuture<LockResult<()>> + Send>;

/// Callback invoked once when a blocking acquire first has to wait.
///
/// Receives the lock name and the wait continuation. A typical
/// implementation prints a "waiting for <name>" notice around the
/// `do_wait()` call; the callback decides when (and whether) to wait.
pub type OnWaitFn = Arc<dyn Fn(String, DoWait) -> BoxFuture<LockResult<()>> + Send + Sync>;

/// Callback invoked from the lease-renewal worker when the lease can no
/// longer be renewed. The worker logs the callback's error and exits.
pub type OnLostLeaseFn = Arc<dyn Fn(LockHandle) -> LockResult<()> + Send + Sync>;

/// Options controlling a single acquire call.
#[derive(Clone, Default)]
pub struct AcquireOptions {
    /// Return immediately with a miss instead of waiting.
    pub non_blocking: bool,
    /// Upper bound on the whole blocking acquisition, measured from the
    /// first attempt. `None` waits indefinitely.
    pub timeout: Option<Duration>,
    /// Request a shared (reader) lease instead of an exclusive one.
    pub shared: bool,
    /// Identity of this caller in the fair acquisition queue. Empty means
    /// the caller races unfairly through the "nobody queued" fast path.
    pub acquirer_id: String,
    /// Invoked exactly once when the first attempt has to wait.
    pub on_wait: Option<OnWaitFn>,
    /// Invoked when the renewal worker loses the lease.
    pub on_lost_lease: Option<OnLostLeaseFn>,
}

impl AcquireOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn non_blocking(mut self) -> Self {
        self.non_blocking = true;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn shared(mut self) -> Self {
        self.shared = true;
        self
    }

    pub fn acquirer_id(mut self, acquirer_id: impl Into<String>) -> Self {
        self.acquirer_id = acquirer_id.into();
        self
    }

    /// Sets the wait callback.
    pub fn on_wait<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(String, DoWait) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = LockResult<()>> + Send + 'static,
    {
        self.on_wait = Some(Arc::new(move |name, do_wait| Box::pin(f(name, do_wait))));
        self
    }

    /// Sets the lost-lease callback.
    pub fn on_lost_lease<F>(mut self, f: F) -> Self
    where
        F: Fn(LockHandle) -> LockResult<()> + Send + Sync + 'static,
    {
        self.on_lost_lease = Some(Arc::new(f));
        self
    }
}

impl fmt::Debug for AcquireOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AcquireOptions")
            .field("non_blocking", &self.non_blocking)
            .field("timeout", &self.timeout)
            .field("shared", &self.shared)
            .field("acquirer_id", &self.acquirer_id)
            .field("on_wait", &self.on_wait.is_some())
            .field("on_lost_lease", &self.on_lost_lease.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_chain() {
        let opts = AcquireOptions::new()
            .shared()
            .non_blocking()
            .timeout(Duration::from_secs(5))
            .acquirer_id("worker-1");
        assert!(opts.shared);
        assert!(opts.non_blocking);
        assert_eq!(opts.timeout, Some(Duration::from_secs(5)));
        assert_eq!(opts.acquirer_id, "worker-1");
    }

    #[test]
    fn debug_renders_callback_presence() {
        let opts = AcquireOptions::new().on_lost_lease(|_| Ok(()));
        let rendered = format!("{opts:?}");
        assert!(rendered.contains("on_lost_lease: true"));
        assert!(rendered.contains("on_wait: false"));
    }
}
