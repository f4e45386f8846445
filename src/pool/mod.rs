//! Pooled runtime primitives
//!
//! Recyclable byte buffers and a bounded worker pool.

mod buffer;
mod byte_buffer;
mod routine;

pub use buffer::{BufferPool, BufferPoolStats, PooledBuffer, DEFAULT_MAX_IDLE, MAX_RETAINED_CAPACITY};
pub use byte_buffer::{ByteBuffer, DEFAULT_BUFFER_SIZE, READ_CHUNK};
pub use routine::{
    RoutinePool, RoutinePoolStats, Task, DEFAULT_QUEUE_CAPACITY, DEFAULT_ROUTINE_POOL_SIZE,
};
