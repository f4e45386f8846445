//! Metrics and observability
//!
//! Atomic counters for the pool hot paths, exportable through Prometheus.

mod counters;
mod exporter;

pub use counters::*;
pub use exporter::{init_metrics, MetricsExporter, MetricsSync, SYNC_INTERVAL};
