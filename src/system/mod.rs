//! Ambient observability: process-wide metrics.

/// Prometheus metric registration and the global [`metrics::EngineMetrics`] singleton.
pub mod metrics;
