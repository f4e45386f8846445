//! Logging capability handed to the pools
//!
//! The pools only need two levels. [`TracingLog`] forwards them to `tracing`,
//! so applications configure output through their subscriber.

use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

/// Sink for informational and error messages
pub trait Log: Send + Sync {
    fn info(&self, args: fmt::Arguments<'_>);
    fn error(&self, args: fmt::Arguments<'_>);
}

/// Forwards to `tracing` under the `tidepool` target
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLog;

impl Log for TracingLog {
    fn info(&self, args: fmt::Arguments<'_>) {
        tracing::info!(target: "tidepool", "{}", args);
    }

    fn error(&self, args: fmt::Arguments<'_>) {
        tracing::error!(target: "tidepool", "{}", args);
    }
}

/// Shared handle to the default logger
pub fn default_log() -> Arc<dyn Log> {
    Arc::new(TracingLog)
}

/// Records messages in memory, for assertions in tests
#[derive(Debug, Default)]
pub struct CaptureLog {
    infos: Mutex<Vec<String>>,
    errors: Mutex<Vec<String>>,
}

impl CaptureLog {
    pub fn infos(&self) -> Vec<String> {
        self.infos.lock().clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().clone()
    }
}

impl Log for CaptureLog {
    fn info(&self, args: fmt::Arguments<'_>) {
        self.infos.lock().push(args.to_string());
    }

    fn error(&self, args: fmt::Arguments<'_>) {
        self.errors.lock().push(args.to_string());
    }
}
