//! Composition root
//!
//! Builds the pools described by a [`Config`] so applications can own them
//! explicitly instead of relying on process-wide instances.

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use tracing::info;

use crate::config::Config;
use crate::log::{default_log, Log};
use crate::metrics::{init_metrics, MetricsExporter, SYNC_INTERVAL};
use crate::pool::{BufferPool, RoutinePool};

/// The pools an application shares between its components
pub struct Runtime {
    pub buffers: BufferPool,
    pub routines: Arc<RoutinePool>,
    metrics: Option<MetricsExporter>,
}

impl Runtime {
    /// Build the pools, logging task panics through `tracing`
    pub fn new(config: &Config) -> Result<Self> {
        Self::with_log(config, default_log())
    }

    /// Build the pools with a custom logging collaborator
    pub fn with_log(config: &Config, log: Arc<dyn Log>) -> Result<Self> {
        config.validate()?;

        let metrics = if config.metrics.enabled {
            let handle = init_metrics().context("Failed to install metrics recorder")?;
            Some(MetricsExporter::start(handle, SYNC_INTERVAL)?)
        } else {
            None
        };

        let buffers = BufferPool::from_config(&config.buffer);
        let routines = RoutinePool::from_config(&config.routine, log)
            .context("Failed to start routine pool")?;

        info!(
            workers = routines.count(),
            queue_capacity = config.routine.queue_capacity,
            buffer_capacity = config.buffer.default_capacity,
            "Runtime ready"
        );

        Ok(Self {
            buffers,
            routines: Arc::new(routines),
            metrics,
        })
    }

    /// Prometheus handle, if metrics are enabled. Pending counter deltas are
    /// published first.
    pub fn metrics(&self) -> Option<&PrometheusHandle> {
        let exporter = self.metrics.as_ref()?;
        exporter.sync_now();
        Some(exporter.handle())
    }

    /// Current Prometheus text exposition, if metrics are enabled
    pub fn render_metrics(&self) -> Option<String> {
        self.metrics.as_ref().map(MetricsExporter::render)
    }

    /// Stop the routine pool and wait for its workers, then stop the metrics
    /// sync thread
    pub fn shutdown(&self) -> usize {
        let dropped = self.routines.shutdown();
        if let Some(exporter) = &self.metrics {
            exporter.stop();
        }
        dropped
    }
}
