//! Prometheus metrics exporter
//!
//! Installs a Prometheus recorder without an HTTP listener; the application
//! decides how to serve [`PrometheusHandle::render`]. [`MetricsSync`] copies
//! the atomic counters into the `metrics` facade as deltas, and
//! [`MetricsExporter`] runs it on a background thread every second.

use anyhow::{Context, Result};
use crossbeam::channel::{self, RecvTimeoutError, Sender};
use metrics::{counter, describe_counter};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::debug;

use super::counters::{MetricsSnapshot, METRICS};

/// How often the background thread publishes counter deltas
pub const SYNC_INTERVAL: Duration = Duration::from_secs(1);

/// Register metric descriptions and install the Prometheus recorder
pub fn init_metrics() -> Result<PrometheusHandle> {
    describe_counter!("tidepool_buffers_allocated", "Buffers allocated by buffer pools");
    describe_counter!("tidepool_buffers_recycled", "Buffers served from a free list");
    describe_counter!("tidepool_buffers_oversized", "Returned buffers replaced for exceeding the ceiling");
    describe_counter!("tidepool_buffers_dropped", "Returned buffers dropped because the free list was full");
    describe_counter!("tidepool_tasks_handed_off", "Tasks accepted through direct handoff");
    describe_counter!("tidepool_tasks_handoff_missed", "Direct handoffs with no idle worker");
    describe_counter!("tidepool_tasks_queued", "Tasks placed on the wait queue");
    describe_counter!("tidepool_tasks_completed", "Tasks that returned normally");
    describe_counter!("tidepool_tasks_panicked", "Tasks that panicked");

    let handle = PrometheusBuilder::new().install_recorder()?;
    Ok(handle)
}

/// Publishes counter deltas since the previous [`sync`](MetricsSync::sync)
#[derive(Debug, Default)]
pub struct MetricsSync {
    last: MetricsSnapshot,
}

impl MetricsSync {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push the growth of every counter since the last call. Returns the deltas.
    pub fn sync(&mut self) -> MetricsSnapshot {
        let snapshot = METRICS.snapshot();
        let delta = delta(&snapshot, &self.last);

        let pairs = [
            ("tidepool_buffers_allocated", delta.buffers_allocated),
            ("tidepool_buffers_recycled", delta.buffers_recycled),
            ("tidepool_buffers_oversized", delta.buffers_oversized),
            ("tidepool_buffers_dropped", delta.buffers_dropped),
            ("tidepool_tasks_handed_off", delta.tasks_handed_off),
            ("tidepool_tasks_handoff_missed", delta.tasks_handoff_missed),
            ("tidepool_tasks_queued", delta.tasks_queued),
            ("tidepool_tasks_completed", delta.tasks_completed),
            ("tidepool_tasks_panicked", delta.tasks_panicked),
        ];
        for (name, value) in pairs {
            if value > 0 {
                counter!(name).increment(value);
            }
        }

        self.last = snapshot;
        delta
    }
}

/// Prometheus handle plus the thread that keeps it fed
pub struct MetricsExporter {
    handle: PrometheusHandle,
    sync: Arc<Mutex<MetricsSync>>,
    /// Dropping the sender wakes the sync thread and makes it exit
    stop_tx: Mutex<Option<Sender<()>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl MetricsExporter {
    /// Start syncing counters into `handle`'s recorder every `interval`
    pub fn start(handle: PrometheusHandle, interval: Duration) -> Result<Self> {
        let sync = Arc::new(Mutex::new(MetricsSync::new()));
        let (stop_tx, stop_rx) = channel::bounded::<()>(0);

        let thread_sync = sync.clone();
        let worker = thread::Builder::new()
            .name("metrics-sync".to_string())
            .spawn(move || loop {
                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {
                        thread_sync.lock().sync();
                    }
                    _ => break,
                }
            })
            .context("Failed to spawn metrics sync thread")?;

        Ok(Self {
            handle,
            sync,
            stop_tx: Mutex::new(Some(stop_tx)),
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Publish pending deltas now instead of waiting for the next tick
    pub fn sync_now(&self) -> MetricsSnapshot {
        self.sync.lock().sync()
    }

    /// Handle of the installed recorder
    pub fn handle(&self) -> &PrometheusHandle {
        &self.handle
    }

    /// Sync, then render the Prometheus text exposition
    pub fn render(&self) -> String {
        self.sync_now();
        self.handle.render()
    }

    /// Stop the sync thread after one final sync. Safe to call repeatedly.
    pub fn stop(&self) {
        let Some(stop_tx) = self.stop_tx.lock().take() else {
            return;
        };
        drop(stop_tx);

        if let Some(worker) = self.worker.lock().take() {
            let _ = worker.join();
        }
        self.sync_now();
        debug!("Metrics sync stopped");
    }
}

impl Drop for MetricsExporter {
    fn drop(&mut self) {
        self.stop();
    }
}

fn delta(now: &MetricsSnapshot, last: &MetricsSnapshot) -> MetricsSnapshot {
    MetricsSnapshot {
        buffers_allocated: now.buffers_allocated.saturating_sub(last.buffers_allocated),
        buffers_recycled: now.buffers_recycled.saturating_sub(last.buffers_recycled),
        buffers_oversized: now.buffers_oversized.saturating_sub(last.buffers_oversized),
        buffers_dropped: now.buffers_dropped.saturating_sub(last.buffers_dropped),
        tasks_handed_off: now.tasks_handed_off.saturating_sub(last.tasks_handed_off),
        tasks_handoff_missed: now.tasks_handoff_missed.saturating_sub(last.tasks_handoff_missed),
        tasks_queued: now.tasks_queued.saturating_sub(last.tasks_queued),
        tasks_completed: now.tasks_completed.saturating_sub(last.tasks_completed),
        tasks_panicked: now.tasks_panicked.saturating_sub(last.tasks_panicked),
    }
}
