//! Bounded worker pool
//!
//! A fixed set of worker threads fed by two sources: a zero-capacity handoff
//! channel for the non-blocking fast path, and a bounded queue that throttles
//! producers once it fills up. Every task runs under panic recovery, so a
//! failing task never costs the pool a worker.

use crossbeam::channel::{self, select, Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

use crate::config::RoutineConfig;
use crate::error::PoolError;
use crate::log::{default_log, Log};
use crate::metrics::METRICS;
use crate::recover::catch_panic;

/// Default number of workers
pub const DEFAULT_ROUTINE_POOL_SIZE: usize = 10_000;

/// Default capacity of the wait queue
pub const DEFAULT_QUEUE_CAPACITY: usize = 100_000;

/// A unit of work: a handler paired with its argument
pub struct Task {
    job: Box<dyn FnOnce() + Send + 'static>,
}

impl Task {
    /// Pair `handler` with the argument it will be called with
    pub fn new<A, F>(handler: F, arg: A) -> Self
    where
        A: Send + 'static,
        F: FnOnce(A) + Send + 'static,
    {
        Self {
            job: Box::new(move || handler(arg)),
        }
    }

    /// Wrap a closure that already captures its argument
    pub fn from_fn<F>(f: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self { job: Box::new(f) }
    }

    fn run(self) {
        (self.job)()
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task").finish_non_exhaustive()
    }
}

/// State shared between the pool handle and its workers
struct Shared {
    size: usize,
    free: AtomicUsize,
    stopped: AtomicBool,
    log: Arc<dyn Log>,
}

/// Channel ends a worker selects on
struct WorkerChannels {
    handoff: Receiver<Task>,
    queue: Receiver<Task>,
    stop: Receiver<()>,
}

/// Fixed-size pool of worker threads
pub struct RoutinePool {
    shared: Arc<Shared>,
    handoff_tx: Sender<Task>,
    queue_tx: Sender<Task>,
    queue_rx: Receiver<Task>,
    /// Dropping the sender disconnects the channel, which every worker observes
    stop_tx: Mutex<Option<Sender<()>>>,
    stop_rx: Receiver<()>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl RoutinePool {
    /// Start a pool of `size` workers with the default queue capacity
    ///
    /// Fails with [`PoolError::InvalidOption`] when `size` is zero.
    pub fn new(size: usize) -> Result<Self, PoolError> {
        Self::with_options(size, DEFAULT_QUEUE_CAPACITY, "routine", default_log())
    }

    /// Start a pool from the `[routine]` configuration section
    pub fn from_config(config: &RoutineConfig, log: Arc<dyn Log>) -> Result<Self, PoolError> {
        Self::with_options(
            config.effective_workers(),
            config.queue_capacity,
            &config.thread_name,
            log,
        )
    }

    /// Start a pool with every knob explicit
    ///
    /// `size` and `queue_capacity` must both be at least one.
    pub fn with_options(
        size: usize,
        queue_capacity: usize,
        thread_name: &str,
        log: Arc<dyn Log>,
    ) -> Result<Self, PoolError> {
        if size == 0 {
            return Err(PoolError::InvalidOption("size must be > 0"));
        }
        if queue_capacity == 0 {
            return Err(PoolError::InvalidOption("queue_capacity must be > 0"));
        }

        let (handoff_tx, handoff_rx) = channel::bounded(0);
        let (queue_tx, queue_rx) = channel::bounded(queue_capacity);
        let (stop_tx, stop_rx) = channel::bounded(0);

        let shared = Arc::new(Shared {
            size,
            free: AtomicUsize::new(size),
            stopped: AtomicBool::new(false),
            log,
        });

        let pool = Self {
            shared,
            handoff_tx,
            queue_tx,
            queue_rx,
            stop_tx: Mutex::new(Some(stop_tx)),
            stop_rx,
            workers: Mutex::new(Vec::with_capacity(size)),
        };

        for id in 0..size {
            let channels = WorkerChannels {
                handoff: handoff_rx.clone(),
                queue: pool.queue_rx.clone(),
                stop: pool.stop_rx.clone(),
            };
            let shared = pool.shared.clone();

            // On failure `pool` drops here, which stops the workers already started
            let handle = thread::Builder::new()
                .name(format!("{thread_name}-{id}"))
                .spawn(move || worker_loop(&shared, &channels))?;
            pool.workers.lock().push(handle);
        }

        info!(size, queue_capacity, "Routine pool started");
        Ok(pool)
    }

    /// Hand `task` directly to an idle worker without blocking.
    ///
    /// Returns the task back when no worker is waiting at this instant, so
    /// the caller can retry, drop it, or fall back to [`push_task`].
    ///
    /// [`push_task`]: RoutinePool::push_task
    pub fn do_task(&self, task: Task) -> Result<(), Task> {
        if self.is_stopped() {
            return Err(task);
        }

        match self.handoff_tx.try_send(task) {
            Ok(()) => {
                METRICS.task_handed_off();
                Ok(())
            }
            Err(TrySendError::Full(task)) | Err(TrySendError::Disconnected(task)) => {
                METRICS.task_handoff_missed();
                Err(task)
            }
        }
    }

    /// Queue `task`, blocking while the queue is full.
    ///
    /// Fails only if the pool is, or becomes, stopped before the task is
    /// queued.
    pub fn push_task(&self, task: Task) -> Result<(), PoolError> {
        if self.is_stopped() {
            return Err(PoolError::Stopped);
        }

        select! {
            send(self.queue_tx, task) -> res => {
                res.map_err(|_| PoolError::Stopped)?;
                METRICS.task_queued();
                Ok(())
            }
            recv(self.stop_rx) -> _ => Err(PoolError::Stopped),
        }
    }

    /// Number of workers, fixed at construction
    pub fn count(&self) -> usize {
        self.shared.size
    }

    /// Workers not currently running a task (advisory)
    pub fn free(&self) -> usize {
        self.shared.free.load(Ordering::Relaxed)
    }

    /// Tasks waiting in the queue (advisory)
    pub fn queued(&self) -> usize {
        self.queue_rx.len()
    }

    pub fn is_stopped(&self) -> bool {
        self.shared.stopped.load(Ordering::Acquire)
    }

    /// Signal every worker to exit once it is idle. Safe to call repeatedly.
    ///
    /// Running tasks finish; queued tasks may or may not run.
    pub fn stop(&self) {
        if self.shared.stopped.swap(true, Ordering::AcqRel) {
            return;
        }
        drop(self.stop_tx.lock().take());
        info!(size = self.shared.size, "Routine pool stopping");
    }

    /// Wait for every worker thread to exit.
    ///
    /// Only returns after [`stop`](RoutinePool::stop). Returns the number of
    /// queued tasks that were left unexecuted.
    pub fn join(&self) -> usize {
        let handles = std::mem::take(&mut *self.workers.lock());
        for handle in handles {
            // Workers catch task panics, so a join error is not expected
            let _ = handle.join();
        }

        let dropped = self.queue_rx.try_iter().count();
        if dropped > 0 {
            warn!(dropped, "Queued tasks discarded at shutdown");
        }
        dropped
    }

    /// Stop the pool and wait for its workers
    pub fn shutdown(&self) -> usize {
        self.stop();
        self.join()
    }

    /// Get pool statistics
    pub fn stats(&self) -> RoutinePoolStats {
        RoutinePoolStats {
            size: self.count(),
            free: self.free(),
            queued: self.queued(),
            stopped: self.is_stopped(),
        }
    }
}

impl Drop for RoutinePool {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Routine pool statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutinePoolStats {
    pub size: usize,
    pub free: usize,
    pub queued: usize,
    pub stopped: bool,
}

fn worker_loop(shared: &Shared, channels: &WorkerChannels) {
    loop {
        // A disconnected task channel means the pool handle is gone
        let task = select! {
            recv(channels.handoff) -> msg => msg.ok(),
            recv(channels.queue) -> msg => msg.ok(),
            recv(channels.stop) -> _ => None,
        };

        match task {
            Some(task) => handle_task(shared, task),
            None => break,
        }
    }

    debug!("Routine worker exiting");
}

fn handle_task(shared: &Shared, task: Task) {
    shared.free.fetch_sub(1, Ordering::Relaxed);
    let completed = catch_panic(shared.log.as_ref(), || task.run());
    shared.free.fetch_add(1, Ordering::Relaxed);

    if completed {
        METRICS.task_completed();
    } else {
        METRICS.task_panicked();
    }
}
