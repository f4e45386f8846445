//! Library error types

use std::io;
use thiserror::Error;

/// Errors reported by the pools
#[derive(Debug, Error)]
pub enum PoolError {
    /// The routine pool was stopped before the task could be queued
    #[error("routine pool is stopped")]
    Stopped,

    /// A pool option is out of range
    #[error("invalid pool option: {0}")]
    InvalidOption(&'static str),

    /// A worker thread could not be started
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] io::Error),
}
