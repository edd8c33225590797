//! Hook contract exposed to the out-of-scope timeline/cache collaborator
//! (spec §5, §6).
//!
//! The timeline owns an ordered set of snapshots and an LRU cache of
//! materialized graphs; it is not part of this crate. `Graph` only needs a
//! weak, non-owning way to signal it and to learn about its neighbors when
//! unlinked. `TimelineLink` is that seam.

/// Which neighboring snapshot needs reloading, propagated by `Graph::unlink`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadHint {
    /// The predecessor snapshot should be reloaded.
    Previous,
    /// The successor snapshot should be reloaded.
    Next,
}

/// Callbacks a timeline implementation provides so the core can signal it
/// without owning it.
///
/// A `Graph` not attached to any timeline uses [`NullTimelineLink`], which
/// makes every hook a no-op — the default and the only implementation
/// exercised inside this crate's own tests.
pub trait TimelineLink: std::fmt::Debug {
    /// Called after a mutation that the timeline's LRU cache should treat as
    /// a fresh access, if this graph is cache-resident (`refresh_cache`,
    /// spec §5). Requires the graph to actually be attached to a timeline;
    /// a detached graph never calls this.
    fn refresh_cache(&self) {}

    /// Called from `Graph::unlink` to propagate a reload hint to the
    /// predecessor/successor snapshot found via the timeline's own
    /// AVL-neighbor accessor.
    fn propagate_load_hint(&self, _hint: LoadHint) {}
}

/// The default, no-op [`TimelineLink`] used by graphs with no attached
/// timeline.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullTimelineLink;

impl TimelineLink for NullTimelineLink {}
