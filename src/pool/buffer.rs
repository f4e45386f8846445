//! Recycling pool of byte buffers
//!
//! Lock-free free list of [`ByteBuffer`]s. Buffers that grew past a ceiling
//! while in use are swapped for fresh ones on return, so the memory retained
//! per pooled buffer stays bounded.

use crossbeam::queue::ArrayQueue;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

use super::byte_buffer::{ByteBuffer, DEFAULT_BUFFER_SIZE};
use crate::config::BufferConfig;
use crate::metrics::METRICS;

/// Capacity above which a returned buffer is replaced instead of recycled
pub const MAX_RETAINED_CAPACITY: usize = 1024 * 1024;

/// Default number of idle buffers the free list holds
pub const DEFAULT_MAX_IDLE: usize = 65536;

/// Inner pool state (shared across clones)
struct BufferPoolInner {
    idle: ArrayQueue<ByteBuffer>,
    default_capacity: usize,
    max_retained_capacity: usize,

    // Advisory counters
    allocated: AtomicUsize,
    resident: AtomicUsize,
}

impl BufferPoolInner {
    fn get(&self) -> ByteBuffer {
        if let Some(buf) = self.idle.pop() {
            self.resident.fetch_sub(1, Ordering::Relaxed);
            METRICS.buffer_recycled();
            return buf;
        }

        self.allocated.fetch_add(1, Ordering::Relaxed);
        METRICS.buffer_allocated();
        ByteBuffer::with_capacity(self.default_capacity)
    }

    fn put(&self, mut buf: ByteBuffer) {
        if buf.capacity() == 0 {
            return;
        }

        if buf.capacity() >= self.max_retained_capacity {
            debug!(
                capacity = buf.capacity(),
                ceiling = self.max_retained_capacity,
                "Replacing oversized buffer"
            );
            METRICS.buffer_oversized();
            buf = ByteBuffer::with_capacity(self.default_capacity);
        }

        buf.reset();
        // Count first so a concurrent get never sees the counter go negative
        self.resident.fetch_add(1, Ordering::Relaxed);
        if self.idle.push(buf).is_err() {
            self.resident.fetch_sub(1, Ordering::Relaxed);
            METRICS.buffer_dropped();
            trace!("Free list full, dropping buffer");
        }
    }
}

/// Lock-free pool of reusable [`ByteBuffer`]s
///
/// Cloning is cheap and yields a handle to the same pool.
#[derive(Clone)]
pub struct BufferPool {
    inner: Arc<BufferPoolInner>,
}

impl BufferPool {
    /// Create a pool with the default buffer size, ceiling and free-list size
    pub fn new() -> Self {
        Self::with_limits(DEFAULT_BUFFER_SIZE, MAX_RETAINED_CAPACITY, DEFAULT_MAX_IDLE)
    }

    /// Create a pool from the `[buffer]` configuration section
    pub fn from_config(config: &BufferConfig) -> Self {
        Self::with_limits(
            config.default_capacity,
            config.max_retained_capacity,
            config.max_idle,
        )
    }

    /// Create a pool with explicit limits
    ///
    /// `max_idle` is clamped to at least one slot.
    pub fn with_limits(default_capacity: usize, max_retained_capacity: usize, max_idle: usize) -> Self {
        debug!(
            default_capacity,
            max_retained_capacity,
            max_idle,
            "Creating buffer pool"
        );

        Self {
            inner: Arc::new(BufferPoolInner {
                idle: ArrayQueue::new(max_idle.max(1)),
                default_capacity,
                max_retained_capacity,
                allocated: AtomicUsize::new(0),
                resident: AtomicUsize::new(0),
            }),
        }
    }

    /// Take a buffer, reusing an idle one when possible. Never blocks.
    pub fn get(&self) -> ByteBuffer {
        self.inner.get()
    }

    /// Return a buffer to the pool. It is reset before reuse.
    pub fn put(&self, buf: ByteBuffer) {
        self.inner.put(buf);
    }

    /// Take a buffer that goes back to the pool when dropped
    pub fn acquire(&self) -> PooledBuffer {
        PooledBuffer {
            buf: Some(self.inner.get()),
            pool: self.inner.clone(),
        }
    }

    /// Total buffers this pool has allocated (advisory)
    pub fn cap(&self) -> usize {
        self.inner.allocated.load(Ordering::Relaxed)
    }

    /// Buffers currently idle in the free list (advisory)
    pub fn len(&self) -> usize {
        self.inner.resident.load(Ordering::Relaxed)
    }

    /// Check if the free list is empty (advisory)
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get pool statistics
    pub fn stats(&self) -> BufferPoolStats {
        BufferPoolStats {
            allocated: self.cap(),
            idle: self.len(),
            default_capacity: self.inner.default_capacity,
            max_retained_capacity: self.inner.max_retained_capacity,
        }
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new()
    }
}

/// Buffer pool statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferPoolStats {
    pub allocated: usize,
    pub idle: usize,
    pub default_capacity: usize,
    pub max_retained_capacity: usize,
}

/// A buffer borrowed from a [`BufferPool`], returned on drop
pub struct PooledBuffer {
    buf: Option<ByteBuffer>,
    pool: Arc<BufferPoolInner>,
}

impl PooledBuffer {
    /// Detach the buffer so it is not returned to the pool
    pub fn into_inner(mut self) -> ByteBuffer {
        self.buf.take().unwrap_or_default()
    }
}

impl Deref for PooledBuffer {
    type Target = ByteBuffer;

    fn deref(&self) -> &Self::Target {
        // Only `into_inner` and `drop` take the buffer, and both consume self
        self.buf.as_ref().expect("pooled buffer already released")
    }
}

impl DerefMut for PooledBuffer {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.buf.as_mut().expect("pooled buffer already released")
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        if let Some(buf) = self.buf.take() {
            self.pool.put(buf);
        }
    }
}
