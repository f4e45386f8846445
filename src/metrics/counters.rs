//! Atomic counters for hot-path metrics
//!
//! Lock-free counters that can be safely updated from any thread. They are
//! process-wide and shared by every pool instance.

use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics instance
pub static METRICS: Metrics = Metrics::new();

/// Atomic metrics counters
pub struct Metrics {
    // Buffer pool metrics
    pub buffers_allocated: AtomicU64,
    pub buffers_recycled: AtomicU64,
    pub buffers_oversized: AtomicU64,
    pub buffers_dropped: AtomicU64,

    // Routine pool metrics
    pub tasks_handed_off: AtomicU64,
    pub tasks_handoff_missed: AtomicU64,
    pub tasks_queued: AtomicU64,
    pub tasks_completed: AtomicU64,
    pub tasks_panicked: AtomicU64,
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            buffers_allocated: AtomicU64::new(0),
            buffers_recycled: AtomicU64::new(0),
            buffers_oversized: AtomicU64::new(0),
            buffers_dropped: AtomicU64::new(0),
            tasks_handed_off: AtomicU64::new(0),
            tasks_handoff_missed: AtomicU64::new(0),
            tasks_queued: AtomicU64::new(0),
            tasks_completed: AtomicU64::new(0),
            tasks_panicked: AtomicU64::new(0),
        }
    }

    // Buffer pool tracking
    #[inline]
    pub fn buffer_allocated(&self) {
        self.buffers_allocated.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn buffer_recycled(&self) {
        self.buffers_recycled.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn buffer_oversized(&self) {
        self.buffers_oversized.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn buffer_dropped(&self) {
        self.buffers_dropped.fetch_add(1, Ordering::Relaxed);
    }

    // Task tracking
    #[inline]
    pub fn task_handed_off(&self) {
        self.tasks_handed_off.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn task_handoff_missed(&self) {
        self.tasks_handoff_missed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn task_queued(&self) {
        self.tasks_queued.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn task_completed(&self) {
        self.tasks_completed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn task_panicked(&self) {
        self.tasks_panicked.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            buffers_allocated: self.buffers_allocated.load(Ordering::Relaxed),
            buffers_recycled: self.buffers_recycled.load(Ordering::Relaxed),
            buffers_oversized: self.buffers_oversized.load(Ordering::Relaxed),
            buffers_dropped: self.buffers_dropped.load(Ordering::Relaxed),
            tasks_handed_off: self.tasks_handed_off.load(Ordering::Relaxed),
            tasks_handoff_missed: self.tasks_handoff_missed.load(Ordering::Relaxed),
            tasks_queued: self.tasks_queued.load(Ordering::Relaxed),
            tasks_completed: self.tasks_completed.load(Ordering::Relaxed),
            tasks_panicked: self.tasks_panicked.load(Ordering::Relaxed),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics for reporting
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub buffers_allocated: u64,
    pub buffers_recycled: u64,
    pub buffers_oversized: u64,
    pub buffers_dropped: u64,
    pub tasks_handed_off: u64,
    pub tasks_handoff_missed: u64,
    pub tasks_queued: u64,
    pub tasks_completed: u64,
    pub tasks_panicked: u64,
}
