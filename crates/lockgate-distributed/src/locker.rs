//! Distributed lock manager with client-side lease renewal.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use lockgate_core::{
    AcquireOptions, BoxFuture, DoWait, LockError, LockHandle, LockResult, Locker, OnLostLeaseFn,
    OnWaitFn,
};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, instrument, warn};
use uuid::Uuid;

use crate::backend::{AcquireParams, DistributedLockerBackend, LockerTimeouts};

/// Book-keeping for the renewal task of one live lease.
///
/// `shared_lease_counter` collapses renewal to a single task per lease id
/// when several in-process shared acquires return the same underlying
/// lease.
struct LeaseRenewWorkerDescriptor {
    done: oneshot::Sender<()>,
    task: JoinHandle<()>,
    shared_lease_counter: i64,
}

struct DistributedLockerInner<B> {
    backend: B,
    timeouts: LockerTimeouts,
    renew_workers: Mutex<HashMap<Uuid, LeaseRenewWorkerDescriptor>>,
}

/// Lock manager in front of a [`DistributedLockerBackend`].
///
/// Adds everything the stateless backend leaves to the client: the
/// blocking retry loop with its timeout and wait callback, and a
/// background renewal task per live lease that keeps the lease alive for
/// the whole critical section. Cloning shares the manager.
pub struct DistributedLocker<B> {
    inner: Arc<DistributedLockerInner<B>>,
}

impl<B> Clone for DistributedLocker<B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<B: DistributedLockerBackend + 'static> DistributedLocker<B> {
    pub fn new(backend: B) -> Self {
        Self::with_timeouts(backend, LockerTimeouts::default())
    }

    pub fn with_timeouts(backend: B, timeouts: LockerTimeouts) -> Self {
        lockgate_core::debug::init_debug_tracing();
        Self {
            inner: Arc::new(DistributedLockerInner {
                backend,
                timeouts,
                renew_workers: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn backend(&self) -> &B {
        &self.inner.backend
    }
}

impl<B: DistributedLockerBackend + 'static> Locker for DistributedLocker<B> {
    #[instrument(skip(self, opts))]
    async fn acquire(
        &self,
        lock_name: &str,
        opts: AcquireOptions,
    ) -> LockResult<Option<LockHandle>> {
        debug!(?opts, "acquire");
        Arc::clone(&self.inner)
            .acquire(lock_name.to_string(), opts, true, Instant::now())
            .await
    }

    #[instrument(skip(self), fields(lock_name = %handle.lock_name, id = %handle.id))]
    async fn release(&self, handle: LockHandle) -> LockResult<()> {
        debug!("release");
        self.inner.release_handle(handle).await
    }
}

impl<B: DistributedLockerBackend + 'static> DistributedLockerInner<B> {
    /// The acquisition loop.
    ///
    /// `should_call_on_wait` is true only for the outermost call: the
    /// retry that runs inside the wait continuation must not invoke the
    /// callback again. The deadline is measured from `started_at`, the
    /// instant of the very first attempt, so time spent inside the
    /// callback counts against the timeout.
    fn acquire(
        self: Arc<Self>,
        lock_name: String,
        opts: AcquireOptions,
        should_call_on_wait: bool,
        started_at: Instant,
    ) -> BoxFuture<LockResult<Option<LockHandle>>> {
        Box::pin(async move {
            loop {
                if let Some(limit) = opts.timeout {
                    if !limit.is_zero() && started_at.elapsed() >= limit {
                        return Err(LockError::Timeout(limit));
                    }
                }

                let params = AcquireParams {
                    shared: opts.shared,
                    acquirer_id: opts.acquirer_id.clone(),
                };
                match self.backend.acquire(&lock_name, params).await {
                    Ok(handle) => {
                        self.run_lease_renew_worker(&handle, &opts);
                        return Ok(Some(handle));
                    }
                    Err(err) if err.is_should_wait() => {
                        if opts.non_blocking {
                            debug!(%lock_name, "non-blocking acquire: lock not taken");
                            return Ok(None);
                        }
                        if should_call_on_wait {
                            if let Some(on_wait) = opts.on_wait.clone() {
                                return self
                                    .acquire_with_on_wait(lock_name, opts, on_wait, started_at)
                                    .await;
                            }
                        }
                        debug!(
                            %lock_name,
                            period = ?self.timeouts.poll_retry_period,
                            "lock is busy, will poll"
                        );
                        tokio::time::sleep(self.timeouts.poll_retry_period).await;
                    }
                    Err(err) => return Err(err),
                }
            }
        })
    }

    /// Runs the user's wait callback exactly once, handing it a
    /// continuation that performs the sleep-then-retry loop.
    async fn acquire_with_on_wait(
        self: &Arc<Self>,
        lock_name: String,
        opts: AcquireOptions,
        on_wait: OnWaitFn,
        started_at: Instant,
    ) -> LockResult<Option<LockHandle>> {
        // The continuation returns a summary to the callback while the
        // full outcome (which may carry a handle) is kept aside.
        let outcome: Arc<Mutex<Option<LockResult<Option<LockHandle>>>>> =
            Arc::new(Mutex::new(None));

        let do_wait: DoWait = {
            let inner = Arc::clone(self);
            let lock_name = lock_name.clone();
            let opts = opts.clone();
            let outcome = Arc::clone(&outcome);
            let poll_retry_period = self.timeouts.poll_retry_period;
            Box::new(move || {
                Box::pin(async move {
                    tokio::time::sleep(poll_retry_period).await;
                    let result = inner.acquire(lock_name, opts, false, started_at).await;
                    let summary = match &result {
                        Ok(_) => Ok(()),
                        Err(err) => Err(LockError::from_message(err.to_string())),
                    };
                    *outcome.lock().unwrap() = Some(result);
                    summary
                })
            })
        };

        let wait_result = on_wait(lock_name.clone(), do_wait).await;
        let stored = outcome.lock().unwrap().take();
        match wait_result {
            Ok(()) => stored.unwrap_or(Ok(None)),
            Err(err) => {
                // The callback failed after the wait may already have
                // succeeded; a handle we cannot hand out must not keep
                // its lease (and renewal worker) alive.
                if let Some(Ok(Some(handle))) = stored {
                    warn!(
                        %lock_name,
                        id = %handle.id,
                        "releasing lock acquired during a failing on_wait callback"
                    );
                    if let Err(release_err) = self.release_handle(handle).await {
                        error!(%release_err, "release after on_wait failure also failed");
                    }
                }
                Err(err)
            }
        }
    }

    async fn release_handle(&self, handle: LockHandle) -> LockResult<()> {
        self.stop_lease_renew_worker(&handle).await?;
        self.backend.release(&handle).await
    }

    fn run_lease_renew_worker(self: &Arc<Self>, handle: &LockHandle, opts: &AcquireOptions) {
        let mut workers = self.renew_workers.lock().unwrap();
        match workers.entry(handle.id) {
            Entry::Occupied(mut entry) => {
                entry.get_mut().shared_lease_counter += 1;
                debug!(
                    lock_name = %handle.lock_name,
                    id = %handle.id,
                    holders = entry.get().shared_lease_counter,
                    "joined existing renew worker"
                );
            }
            Entry::Vacant(entry) => {
                let (done, done_rx) = oneshot::channel();
                let task = tokio::spawn(Self::lease_renew_worker(
                    Arc::clone(self),
                    handle.clone(),
                    opts.on_lost_lease.clone(),
                    done_rx,
                ));
                entry.insert(LeaseRenewWorkerDescriptor {
                    done,
                    task,
                    shared_lease_counter: 1,
                });
                debug!(lock_name = %handle.lock_name, id = %handle.id, "started renew worker");
            }
        }
    }

    /// Stops the renewal task for `handle` once its last in-process
    /// holder releases.
    ///
    /// The descriptor is removed under the mutex, then the task is
    /// signalled and awaited outside it, so that by the time release
    /// mutates the lease no further renewal tick can run.
    async fn stop_lease_renew_worker(&self, handle: &LockHandle) -> LockResult<()> {
        let descriptor = {
            let mut workers = self.renew_workers.lock().unwrap();
            let Some(descriptor) = workers.get_mut(&handle.id) else {
                return Err(LockError::UnknownHandle {
                    id: handle.id,
                    name: handle.lock_name.clone(),
                });
            };
            descriptor.shared_lease_counter -= 1;
            if descriptor.shared_lease_counter > 0 {
                return Ok(());
            }
            workers.remove(&handle.id)
        };

        if let Some(descriptor) = descriptor {
            let _ = descriptor.done.send(());
            let _ = descriptor.task.await;
        }
        Ok(())
    }

    fn is_renew_worker_active(&self, handle: &LockHandle) -> bool {
        self.renew_workers.lock().unwrap().contains_key(&handle.id)
    }

    async fn lease_renew_worker(
        inner: Arc<Self>,
        handle: LockHandle,
        on_lost_lease: Option<OnLostLeaseFn>,
        mut done: oneshot::Receiver<()>,
    ) {
        let period = inner.timeouts.lease_renew_period;
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut last_renew_at: Option<Instant> = None;

        loop {
            tokio::select! {
                _ = &mut done => {
                    debug!(lock_name = %handle.lock_name, id = %handle.id, "renew worker stopped");
                    return;
                }
                _ = ticker.tick() => {
                    // Throttle to one renewal per period.
                    if last_renew_at.is_some_and(|at| at.elapsed() < period) {
                        continue;
                    }
                    // A tick that lost the race with release is a no-op.
                    if !inner.is_renew_worker_active(&handle) {
                        continue;
                    }

                    match inner.backend.renew_lease(&handle).await {
                        Ok(()) => {
                            debug!(lock_name = %handle.lock_name, id = %handle.id, "lease renewed");
                            last_renew_at = Some(Instant::now());
                        }
                        Err(err) if err.is_lease_lost() => {
                            error!(
                                lock_name = %handle.lock_name,
                                id = %handle.id,
                                %err,
                                "lost lease"
                            );
                            if let Some(on_lost_lease) = &on_lost_lease {
                                if let Err(handler_err) = on_lost_lease(handle.clone()) {
                                    error!(%handler_err, "lost-lease handler failed");
                                }
                            }
                            return;
                        }
                        Err(err) => {
                            error!(
                                lock_name = %handle.lock_name,
                                id = %handle.id,
                                %err,
                                "lease renewal failed"
                            );
                        }
                    }
                }
            }
        }
    }
}
