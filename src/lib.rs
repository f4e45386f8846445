//! Tidepool - pooled runtime primitives
//!
//! Two building blocks for protocol services:
//!
//! - [`ByteBuffer`] and [`BufferPool`]: cursor-based byte buffers for framing
//!   and parsing, recycled through a lock-free free list with a bounded
//!   per-buffer memory ceiling.
//! - [`RoutinePool`]: a fixed set of worker threads with a non-blocking
//!   handoff path and a bounded, backpressured queue. Task panics are caught
//!   and logged without losing the worker.
//!
//! Pools are plain values: construct them where they are needed and share
//! them by reference, `Arc`, or (for [`BufferPool`]) `Clone`. [`Runtime`]
//! builds both from a [`Config`].

pub mod config;
pub mod error;
pub mod log;
pub mod metrics;
pub mod pool;
pub mod recover;
pub mod runtime;
pub mod util;

pub use config::Config;
pub use error::PoolError;
pub use log::{Log, TracingLog};
pub use pool::{BufferPool, ByteBuffer, PooledBuffer, RoutinePool, Task};
pub use runtime::Runtime;

/// Crate version for display
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
