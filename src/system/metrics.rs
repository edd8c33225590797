//! Metrics for the in-memory engine, optimized for minimal overhead during
//! hot-path mutations.
//!
//! Callers own registration failures through [`crate::core::error::Error`]
//! (`prometheus::Error` converts via `#[from]`); the global instance
//! obtained from [`EngineMetrics::global`] panics on registration failure,
//! matching the teacher's lazy-singleton pattern — double registration
//! under the default registry is itself a programming error, not a runtime
//! condition callers should recover from.

use once_cell::sync::Lazy;
use prometheus::{Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry};

use crate::core::error::Result;

static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

/// Counters and histograms for container mutation, rehashing, traversal,
/// and persistence.
///
/// Registered directly against [`registry`] via [`Registry::register`] —
/// the `register_*!` macros register into `prometheus`'s process-global
/// default registry instead, which would leave [`collect_metrics`] gathering
/// nothing from this crate's own registry.
pub struct EngineMetrics {
    /// Mutations applied, labeled by op (`set`/`add`/`del`) and container
    /// (`vector`/`graph`).
    pub mutations: IntCounterVec,
    /// Mutations collapsed to a deletion by the `NONZERO`/`POSITIVE` policy.
    pub collapses: IntCounter,
    /// Bucket table resizes triggered by `vector_optimize`/`graph_optimize`.
    pub rehashes: IntCounter,
    /// Wall-clock duration of a `bfs` traversal.
    pub bfs_duration: Histogram,
    /// Wall-clock duration of a `power_iteration` call.
    pub power_iteration_duration: Histogram,
    /// Snapshot saves/loads, labeled by direction (`save`/`load`).
    pub persistence_ops: IntCounterVec,
}

impl EngineMetrics {
    fn new() -> Result<Self> {
        let mutations = IntCounterVec::new(
            Opts::new("tvg_mutations_total", "Total container mutations applied"),
            &["op", "container"],
        )?;
        let collapses = IntCounter::new(
            "tvg_collapses_total",
            "Total mutations collapsed to a deletion by the NONZERO/POSITIVE policy",
        )?;
        let rehashes = IntCounter::new("tvg_rehashes_total", "Total bucket table resizes")?;
        let bfs_duration = Histogram::with_opts(
            HistogramOpts::new("tvg_bfs_duration_seconds", "Duration of a bfs traversal")
                .buckets(vec![0.0001, 0.001, 0.01, 0.1, 1.0, 10.0]),
        )?;
        let power_iteration_duration = Histogram::with_opts(
            HistogramOpts::new(
                "tvg_power_iteration_duration_seconds",
                "Duration of a power_iteration call",
            )
            .buckets(vec![0.001, 0.01, 0.1, 1.0, 10.0]),
        )?;
        let persistence_ops = IntCounterVec::new(
            Opts::new("tvg_persistence_ops_total", "Total snapshot save/load operations"),
            &["direction"],
        )?;

        let registry = registry();
        registry.register(Box::new(mutations.clone()))?;
        registry.register(Box::new(collapses.clone()))?;
        registry.register(Box::new(rehashes.clone()))?;
        registry.register(Box::new(bfs_duration.clone()))?;
        registry.register(Box::new(power_iteration_duration.clone()))?;
        registry.register(Box::new(persistence_ops.clone()))?;

        Ok(Self { mutations, collapses, rehashes, bfs_duration, power_iteration_duration, persistence_ops })
    }

    /// The process-wide metrics instance.
    pub fn global() -> &'static EngineMetrics {
        static INSTANCE: Lazy<EngineMetrics> =
            Lazy::new(|| EngineMetrics::new().expect("failed to register engine metrics"));
        &INSTANCE
    }
}

/// Force registration of the global metrics, e.g. at process start.
pub fn init_registry() {
    let _ = EngineMetrics::global();
}

/// The registry backing [`EngineMetrics::global`], for exporters that need
/// to gather and encode it.
pub fn registry() -> &'static Registry {
    &REGISTRY
}

/// Render the current metric values in Prometheus text exposition format.
pub fn collect_metrics() -> String {
    let encoder = prometheus::TextEncoder::new();
    let metric_families = registry().gather();
    encoder.encode_to_string(&metric_families).unwrap_or_default()
}
