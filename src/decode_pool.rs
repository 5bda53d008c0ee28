//! Worker pool for decode runs.
//!
//! Decode runs are long, CPU-bound and synchronous, so they go to tokio's
//! blocking thread pool rather than onto async worker threads or the thread
//! driving animation timing.
//!
//! Two schedulers implement [`DecodeScheduler`]:
//! - [`DecodePool`]: runs tasks on a tokio runtime via `spawn_blocking`,
//!   either a runtime it owns or one the host already has.
//! - [`DeferredScheduler`]: queues tasks until the caller runs them. Used for
//!   deterministic tests and single-threaded hosts.
//!
//! # Example
//! ```no_run
//! use anim_frames::decode_pool::DecodePool;
//! use std::time::Duration;
//!
//! # fn main() -> anim_frames::error::AnimResult<()> {
//! let pool = DecodePool::new(2)?;
//! // ... hand `pool` to providers as their scheduler ...
//! pool.block_until_idle(Duration::from_secs(1));
//! # Ok(())
//! # }
//! ```

use crate::config::DecodePoolConfig;
use crate::error::{AnimError, AnimResult};
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::runtime::{Builder, Handle, Runtime};
use tracing::{debug, trace};

/// Unit of decode work.
pub trait DecodeTask: Send + Sync {
    /// Decode until the task has nothing more to do right now.
    fn run(&self);

    /// Whether running inline on the caller is cheaper than a worker hop.
    fn should_prefer_sync_run(&self) -> bool;
}

/// Something that runs decode tasks off the caller's thread.
pub trait DecodeScheduler: Send + Sync {
    /// Run `task` asynchronously.
    fn async_run(&self, task: Arc<dyn DecodeTask>);
}

#[derive(Debug, Default)]
struct InFlight {
    count: Mutex<usize>,
    idle: Condvar,
}

impl InFlight {
    fn begin(&self) {
        *self.count.lock() += 1;
    }

    fn end(&self) {
        let mut count = self.count.lock();
        *count = count.saturating_sub(1);
        if *count == 0 {
            self.idle.notify_all();
        }
    }
}

/// Decrements the in-flight count even if the task panics.
struct InFlightGuard(Arc<InFlight>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.end();
    }
}

/// Tokio-backed decode scheduler.
pub struct DecodePool {
    runtime: Option<Runtime>,
    handle: Handle,
    in_flight: Arc<InFlight>,
}

impl DecodePool {
    /// Build a pool with its own runtime and up to `threads` decode threads.
    ///
    /// Must not be dropped from inside an async context; hosts that already
    /// run tokio should use [`from_handle`](Self::from_handle).
    pub fn new(threads: usize) -> AnimResult<Self> {
        let threads = threads.max(1);
        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .max_blocking_threads(threads)
            .thread_name("anim-decode")
            .enable_time()
            .build()
            .map_err(|e| AnimError::Scheduler(format!("Failed to build decode runtime: {}", e)))?;

        debug!(threads, "Decode pool started");
        Ok(Self {
            handle: runtime.handle().clone(),
            runtime: Some(runtime),
            in_flight: Arc::new(InFlight::default()),
        })
    }

    /// Build a pool sized from configuration.
    pub fn from_config(config: &DecodePoolConfig) -> AnimResult<Self> {
        Self::new(config.worker_threads)
    }

    /// Schedule onto an existing runtime.
    #[must_use]
    pub fn from_handle(handle: Handle) -> Self {
        Self {
            runtime: None,
            handle,
            in_flight: Arc::new(InFlight::default()),
        }
    }

    /// Run `task` inline if it prefers that, otherwise schedule it.
    ///
    /// Returns whether the task ran on the calling thread.
    pub fn sync_run_if_preferred(&self, task: Arc<dyn DecodeTask>) -> bool {
        if task.should_prefer_sync_run() {
            trace!("Running decode task synchronously");
            task.run();
            return true;
        }
        self.async_run(task);
        false
    }

    /// Tasks scheduled but not yet finished.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        *self.in_flight.count.lock()
    }

    /// Wait until no task is in flight or `timeout` elapses.
    ///
    /// Returns whether the pool went idle. Tasks scheduled by running tasks
    /// are waited for as well.
    pub fn block_until_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut count = self.in_flight.count.lock();
        while *count > 0 {
            if self.in_flight.idle.wait_until(&mut count, deadline).timed_out() {
                return *count == 0;
            }
        }
        true
    }

    /// Whether this pool owns its runtime.
    #[must_use]
    pub fn owns_runtime(&self) -> bool {
        self.runtime.is_some()
    }
}

impl DecodeScheduler for DecodePool {
    fn async_run(&self, task: Arc<dyn DecodeTask>) {
        self.in_flight.begin();
        let guard = InFlightGuard(Arc::clone(&self.in_flight));
        self.handle.spawn_blocking(move || {
            let _guard = guard;
            task.run();
        });
    }
}

impl std::fmt::Debug for DecodePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecodePool")
            .field("owns_runtime", &self.owns_runtime())
            .field("in_flight", &self.in_flight())
            .finish()
    }
}

/// Scheduler that holds tasks until [`run_pending`](Self::run_pending).
#[derive(Default)]
pub struct DeferredScheduler {
    queue: Mutex<VecDeque<Arc<dyn DecodeTask>>>,
}

impl DeferredScheduler {
    /// Empty scheduler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Tasks waiting to run.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.queue.lock().len()
    }

    /// Run queued tasks, including ones they schedule, until none are left.
    ///
    /// Returns how many tasks ran.
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        loop {
            // Pop under the lock, run without it.
            let Some(task) = self.queue.lock().pop_front() else {
                return ran;
            };
            task.run();
            ran += 1;
        }
    }
}

impl DecodeScheduler for DeferredScheduler {
    fn async_run(&self, task: Arc<dyn DecodeTask>) {
        self.queue.lock().push_back(task);
    }
}

impl std::fmt::Debug for DeferredScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeferredScheduler")
            .field("queued", &self.queued())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingTask {
        runs: AtomicUsize,
        prefer_sync: bool,
    }

    impl DecodeTask for CountingTask {
        fn run(&self) {
            self.runs.fetch_add(1, Ordering::SeqCst);
        }

        fn should_prefer_sync_run(&self) -> bool {
            self.prefer_sync
        }
    }

    #[test]
    fn test_deferred_runs_in_order() {
        let scheduler = DeferredScheduler::new();
        let task = Arc::new(CountingTask::default());

        scheduler.async_run(task.clone());
        scheduler.async_run(task.clone());
        assert_eq!(scheduler.queued(), 2);
        assert_eq!(task.runs.load(Ordering::SeqCst), 0);

        assert_eq!(scheduler.run_pending(), 2);
        assert_eq!(task.runs.load(Ordering::SeqCst), 2);
        assert_eq!(scheduler.queued(), 0);
    }

    #[test]
    fn test_pool_runs_tasks() {
        let pool = DecodePool::new(2).unwrap();
        assert!(pool.owns_runtime());

        let task = Arc::new(CountingTask::default());
        for _ in 0..8 {
            pool.async_run(task.clone());
        }

        assert!(pool.block_until_idle(Duration::from_secs(5)));
        assert_eq!(task.runs.load(Ordering::SeqCst), 8);
        assert_eq!(pool.in_flight(), 0);
    }

    #[test]
    fn test_sync_run_if_preferred() {
        let pool = DecodePool::new(1).unwrap();

        let inline = Arc::new(CountingTask {
            prefer_sync: true,
            ..Default::default()
        });
        assert!(pool.sync_run_if_preferred(inline.clone()));
        assert_eq!(inline.runs.load(Ordering::SeqCst), 1);

        let queued = Arc::new(CountingTask::default());
        assert!(!pool.sync_run_if_preferred(queued.clone()));
        assert!(pool.block_until_idle(Duration::from_secs(5)));
        assert_eq!(queued.runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_pool_from_handle() {
        let pool = DecodePool::from_handle(Handle::current());
        assert!(!pool.owns_runtime());

        let task = Arc::new(CountingTask::default());
        pool.async_run(task.clone());

        let idle = tokio::task::block_in_place(|| pool.block_until_idle(Duration::from_secs(5)));
        assert!(idle);
        assert_eq!(task.runs.load(Ordering::SeqCst), 1);
    }
}
