//! tvg-engine — an in-memory engine for time-varying graphs: sparse
//! bucket-hashed storage for weighted vectors and graphs, BFS-style
//! traversal, power iteration, Pareto stability ranking, and a packed
//! binary snapshot format.
//!
//! A time-varying graph itself is a sequence of these snapshots indexed by
//! timestamp, owned by a timeline collaborator outside this crate (see
//! [`timeline_link`]); this crate only provides the per-snapshot container
//! and the operations defined over it.
#![warn(missing_docs)]

/// Error handling and engine configuration.
pub mod core;

/// Container flags shared by [`vector::Vector`] and [`graph::Graph`].
pub mod flags;
/// Stored record types.
pub mod entry;
/// Sorted, packed per-bucket storage.
pub mod bucket;
/// Sparse 1-D weighted container.
pub mod vector;
/// Sparse 2-D weighted container.
pub mod graph;
/// Hook contract for an external timeline/cache collaborator.
pub mod timeline_link;

/// Pointwise and structural arithmetic over snapshots.
pub mod arithmetic;
/// Weighted traversal and derived distance/connectivity queries.
pub mod bfs;
/// Dominant eigenvector/eigenvalue via power iteration.
pub mod power_iteration;
/// Multi-objective stability ranking across a snapshot sequence.
pub mod pareto;
/// Packed binary snapshot format.
pub mod persistence;

/// Ambient observability: process-wide metrics.
pub mod system;

pub use core::{Error, Result};
pub use entry::{Entry1, Entry2};
pub use flags::ContainerFlags;
pub use graph::Graph;
pub use vector::Vector;

/// Crate version, as set by Cargo.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
/// Crate name, as set by Cargo.
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Initialize tracing and force registration of the global metrics.
///
/// Not required to use the crate — callers embedding this engine in a
/// larger process may already own their own `tracing_subscriber`
/// initialization, in which case they should skip this and call
/// [`system::metrics::init_registry`] directly.
pub fn init() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    tracing::info!("initializing {} v{}", NAME, VERSION);
    system::metrics::init_registry();
    Ok(())
}
