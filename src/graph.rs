//! Sparse 2-D container: a power-of-two bucket table keyed by the low bits
//! of `(source, target)` (spec §3, §4.2).

use std::sync::{Arc, Weak};

use crate::bucket::Bucket2;
use crate::core::config::RehashConfig;
use crate::core::error::{Error, Result};
use crate::entry::Entry2;
use crate::flags::ContainerFlags;
use crate::system::metrics::EngineMetrics;
use crate::timeline_link::{LoadHint, TimelineLink};

/// A sparse, optionally-directed weighted graph.
///
/// Undirected graphs store both `(s, t)` and `(t, s)` whenever `s != t`; the
/// diagonal is stored once. Every mutation of an off-diagonal edge on an
/// undirected graph mirrors to the reverse edge.
pub struct Graph {
    bits_source: u8,
    bits_target: u8,
    buckets: Vec<Bucket2>,
    flags: ContainerFlags,
    eps: f32,
    revision: u64,
    optimize: i64,
    rehash: RehashConfig,
    tvg: Option<Weak<dyn TimelineLink + Send + Sync>>,
    cache_attached: bool,
}

impl std::fmt::Debug for Graph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Graph")
            .field("bits_source", &self.bits_source)
            .field("bits_target", &self.bits_target)
            .field("flags", &self.flags)
            .field("revision", &self.revision)
            .field("num_edges", &self.num_edges())
            .finish()
    }
}

impl Graph {
    /// Construct an empty graph with 1 bucket in each dimension.
    ///
    /// Rejects any flag outside [`ContainerFlags::CONSTRUCTIBLE`] — the
    /// stricter of the two historical `alloc_graph` variants noted in spec
    /// §9 is the only one implemented.
    pub fn new(flags: ContainerFlags, eps: f32) -> Result<Self> {
        if !ContainerFlags::CONSTRUCTIBLE.contains(flags) {
            return Err(Error::invalid_argument("unknown flag bit in Graph::new"));
        }
        Ok(Self {
            bits_source: 0,
            bits_target: 0,
            buckets: vec![Bucket2::new()],
            flags,
            eps,
            revision: 0,
            optimize: 256,
            rehash: RehashConfig::default(),
            tvg: None,
            cache_attached: false,
        })
    }

    /// Rebuild a graph directly from a bucket array already laid out for
    /// `bits_source`/`bits_target`, bypassing `graph_optimize` entirely —
    /// used by [`crate::persistence::load_graph`], which reconstructs the
    /// bucket array straight from the snapshot header's exponents (spec
    /// §4.7).
    pub(crate) fn from_raw_parts(
        flags: ContainerFlags,
        eps: f32,
        bits_source: u8,
        bits_target: u8,
        buckets: Vec<Bucket2>,
    ) -> Result<Self> {
        if !ContainerFlags::CONSTRUCTIBLE.contains(flags) {
            return Err(Error::invalid_argument("unknown flag bit in Graph::from_raw_parts"));
        }
        let rehash = RehashConfig::default();
        Ok(Self {
            bits_source,
            bits_target,
            buckets,
            flags,
            eps,
            revision: 0,
            optimize: rehash.min_optimize,
            rehash,
            tvg: None,
            cache_attached: false,
        })
    }

    /// The raw per-bucket layout, in bucket order — used by
    /// [`crate::persistence::save_graph`] to persist `u64 num_entries`
    /// followed by that bucket's entries per spec §4.7, rather than one
    /// flattened count.
    pub(crate) fn raw_buckets(&self) -> &[Bucket2] {
        &self.buckets
    }

    /// Override the rehash watermarks (tests only need small tables to
    /// exercise the resize path).
    pub fn with_rehash_config(mut self, rehash: RehashConfig) -> Self {
        self.optimize = rehash.min_optimize;
        self.rehash = rehash;
        self
    }

    /// Container flags.
    pub fn flags(&self) -> ContainerFlags {
        self.flags
    }

    /// `eps`: the threshold below which a set/add result collapses to zero.
    pub fn eps(&self) -> f32 {
        self.eps
    }

    /// Monotonically increasing mutation counter.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// `bits_source` exponent.
    pub fn bits_source(&self) -> u8 {
        self.bits_source
    }

    /// `bits_target` exponent.
    pub fn bits_target(&self) -> u8 {
        self.bits_target
    }

    /// Total stored directed entries (undirected off-diagonal edges counted
    /// twice — once per mirrored direction).
    pub fn raw_entry_count(&self) -> usize {
        self.buckets.iter().map(Bucket2::len).sum()
    }

    /// Number of logical edges: for undirected graphs, each mirrored pair
    /// counts once.
    pub fn num_edges(&self) -> usize {
        if self.flags.is_directed() {
            self.raw_entry_count()
        } else {
            self.iter().filter(|e| e.source <= e.target).count()
        }
    }

    /// Attach this graph to a timeline collaborator via a weak backpointer.
    pub fn attach_timeline(&mut self, link: &Arc<dyn TimelineLink + Send + Sync>) {
        self.tvg = Some(Arc::downgrade(link));
    }

    /// `true` if this graph is a member of the timeline's LRU cache list.
    pub fn is_cache_attached(&self) -> bool {
        self.cache_attached
    }

    /// Mark/unmark cache-list membership (timeline-invoked).
    pub fn set_cache_attached(&mut self, attached: bool) {
        self.cache_attached = attached;
    }

    /// Signal the timeline's LRU cache to treat this graph as freshly
    /// accessed. No-op if not cache-attached.
    pub fn refresh_cache(&self) {
        if !self.cache_attached {
            return;
        }
        if let Some(link) = self.tvg.as_ref().and_then(Weak::upgrade) {
            link.refresh_cache();
        }
    }

    /// Detach from the timeline, propagating any pending `LOAD_PREV`/
    /// `LOAD_NEXT` hints to the timeline's predecessor/successor via the
    /// hook, then dropping the weak backpointer and cache membership.
    pub fn unlink(&mut self) {
        if let Some(link) = self.tvg.as_ref().and_then(Weak::upgrade) {
            if self.flags.contains(ContainerFlags::LOAD_PREV) {
                link.propagate_load_hint(LoadHint::Previous);
            }
            if self.flags.contains(ContainerFlags::LOAD_NEXT) {
                link.propagate_load_hint(LoadHint::Next);
            }
        }
        self.flags.remove(ContainerFlags::LOAD_PREV | ContainerFlags::LOAD_NEXT);
        self.tvg = None;
        self.cache_attached = false;
    }

    fn mask_source(&self) -> u64 {
        (1u64 << self.bits_source) - 1
    }

    fn mask_target(&self) -> u64 {
        (1u64 << self.bits_target) - 1
    }

    fn bucket_index(&self, source: u64, target: u64) -> usize {
        ((source & self.mask_source()) | ((target & self.mask_target()) << self.bits_source)) as usize
    }

    fn check_writable(&self) -> Result<()> {
        if self.flags.is_readonly() {
            Err(Error::ReadOnly)
        } else {
            Ok(())
        }
    }

    fn mirrors(&self, source: u64, target: u64) -> bool {
        !self.flags.is_directed() && source != target
    }

    /// `true` if edge `(source, target)` has a stored (post-collapse) entry.
    pub fn has(&mut self, source: u64, target: u64) -> bool {
        self.get(source, target).is_some()
    }

    /// Read the weight of edge `(source, target)`.
    pub fn get(&mut self, source: u64, target: u64) -> Option<f32> {
        let idx = self.bucket_index(source, target);
        self.buckets[idx].get(source, target)
    }

    /// Overwrite (or insert) the weight of edge `(source, target)`, mirroring
    /// to `(target, source)` for undirected graphs with `source != target`.
    pub fn set(&mut self, source: u64, target: u64, weight: f32) -> Result<()> {
        self.check_writable()?;
        let idx = self.bucket_index(source, target);
        self.buckets[idx].set(source, target, weight);
        if self.mirrors(source, target) {
            let ridx = self.bucket_index(target, source);
            self.buckets[ridx].set(target, source, weight);
        }
        EngineMetrics::global().mutations.with_label_values(&["set", "graph"]).inc();
        self.finish_mutation(source, target);
        Ok(())
    }

    /// Add `delta` to the weight of edge `(source, target)`, inserting it if
    /// absent. Mirrors for undirected graphs.
    pub fn add_edge(&mut self, source: u64, target: u64, delta: f32) -> Result<()> {
        self.check_writable()?;
        let idx = self.bucket_index(source, target);
        *self.buckets[idx].get_entry_mut(source, target) += delta;
        if self.mirrors(source, target) {
            let ridx = self.bucket_index(target, source);
            *self.buckets[ridx].get_entry_mut(target, source) += delta;
        }
        EngineMetrics::global().mutations.with_label_values(&["add", "graph"]).inc();
        self.finish_mutation(source, target);
        Ok(())
    }

    /// Subtract `delta` from the weight of edge `(source, target)`.
    pub fn sub_edge(&mut self, source: u64, target: u64, delta: f32) -> Result<()> {
        self.add_edge(source, target, -delta)
    }

    /// Multiply every stored weight by `factor` in place, bumping `revision`
    /// exactly once regardless of edge count. A no-op (no revision bump) when
    /// `factor == 1.0`.
    pub(crate) fn scale_all(&mut self, factor: f32) -> Result<()> {
        self.check_writable()?;
        if factor == 1.0 {
            return Ok(());
        }
        let collapse_eps = self.eps;
        let positive = self.flags.is_positive();
        let nonzero = self.flags.is_nonzero();
        for bucket in &mut self.buckets {
            for e in bucket.iter_mut() {
                e.weight *= factor;
            }
            if positive || nonzero {
                bucket.retain(|w| if positive { w > collapse_eps } else { w.abs() > collapse_eps });
            }
        }
        self.bump_revision();
        self.maybe_rehash();
        Ok(())
    }

    /// Remove edge `(source, target)`, mirroring the removal for undirected
    /// graphs. Returns the removed weight, if any.
    pub fn del(&mut self, source: u64, target: u64) -> Result<Option<f32>> {
        self.check_writable()?;
        let idx = self.bucket_index(source, target);
        let removed = self.buckets[idx].del(source, target);
        if self.mirrors(source, target) {
            let ridx = self.bucket_index(target, source);
            self.buckets[ridx].del(target, source);
        }
        EngineMetrics::global().mutations.with_label_values(&["del", "graph"]).inc();
        self.bump_revision();
        self.maybe_rehash();
        Ok(removed)
    }

    fn finish_mutation(&mut self, source: u64, target: u64) {
        let idx = self.bucket_index(source, target);
        if let Some(weight) = self.buckets[idx].get(source, target) {
            let collapse = if self.flags.is_positive() {
                weight <= self.eps
            } else if self.flags.is_nonzero() {
                weight.abs() <= self.eps
            } else {
                false
            };
            if collapse {
                self.buckets[idx].del(source, target);
                if self.mirrors(source, target) {
                    let ridx = self.bucket_index(target, source);
                    self.buckets[ridx].del(target, source);
                }
                EngineMetrics::global().collapses.inc();
            }
        }
        self.bump_revision();
        self.maybe_rehash();
    }

    fn bump_revision(&mut self) {
        self.revision += 1;
    }

    fn maybe_rehash(&mut self) {
        self.optimize -= 1;
        if self.optimize <= 0 {
            self.rehash_table();
        }
    }

    /// Iterate every stored directed entry in bucket order (not a global
    /// sort order over `(source, target)` — see spec §5). Undirected edges
    /// appear once per stored direction.
    pub fn iter(&self) -> impl Iterator<Item = &Entry2> {
        self.buckets.iter().flat_map(Bucket2::iter)
    }

    /// Iterate outgoing edges of `source` (linear scan; acceptable given
    /// the bucket layout does not index by source alone once
    /// `bits_target > 0`).
    pub fn out_edges(&self, source: u64) -> impl Iterator<Item = &Entry2> {
        self.iter().filter(move |e| e.source == source)
    }

    fn rebuild(&mut self, new_bits_source: u8, new_bits_target: u8) {
        let new_count = 1usize << (new_bits_source as u32 + new_bits_target as u32);
        let mask_s = (1u64 << new_bits_source) - 1;
        let mask_t = (1u64 << new_bits_target) - 1;
        let mut new_buckets: Vec<Bucket2> = (0..new_count).map(|_| Bucket2::new()).collect();
        for bucket in &self.buckets {
            for e in bucket.iter() {
                let idx = ((e.source & mask_s) | ((e.target & mask_t) << new_bits_source)) as usize;
                new_buckets[idx].set(e.source, e.target, e.weight);
            }
        }
        self.bits_source = new_bits_source;
        self.bits_target = new_bits_target;
        self.buckets = new_buckets;
    }

    /// `graph_optimize`: grow/shrink the bucket table toward the
    /// `[shrink_factor, grow_stop_factor) * buckets` band, preferring to
    /// grow/shrink whichever of `bits_source`/`bits_target` is
    /// smaller/larger respectively. Rebuilds over a fresh array and swaps
    /// in on success (spec §9's preferred alternative to in-place
    /// row-shuffling).
    fn rehash_table(&mut self) {
        let n = self.raw_entry_count() as u64;
        let r = self.rehash;
        let mut bs = self.bits_source;
        let mut bt = self.bits_target;
        let b0 = 1u64 << (bs as u32 + bt as u32);
        if n >= r.grow_factor * b0 {
            loop {
                if bs <= bt {
                    bs += 1;
                } else {
                    bt += 1;
                }
                let b = 1u64 << (bs as u32 + bt as u32);
                if n < r.grow_stop_factor * b {
                    break;
                }
            }
        } else if b0 >= 2 && n < r.shrink_factor * b0 {
            loop {
                if bt >= bs {
                    if bt == 0 {
                        break;
                    }
                    bt -= 1;
                } else {
                    if bs == 0 {
                        break;
                    }
                    bs -= 1;
                }
                let b = 1u64 << (bs as u32 + bt as u32);
                if b == 1 || n >= r.grow_stop_factor * b {
                    break;
                }
            }
        }
        let resized = bs != self.bits_source || bt != self.bits_target;
        if resized {
            let (old_bs, old_bt) = (self.bits_source, self.bits_target);
            self.rebuild(bs, bt);
            EngineMetrics::global().rehashes.inc();
            tracing::debug!(
                old_bits_source = old_bs,
                old_bits_target = old_bt,
                new_bits_source = bs,
                new_bits_target = bt,
                entries = n,
                "graph rehash"
            );
        }
        self.optimize = if resized {
            let b = 1i64 << (self.bits_source as u32 + self.bits_target as u32);
            let mut next = (r.grow_factor as i64 * b - n as i64)
                .min(n as i64 - r.shrink_factor as i64 * b)
                .max(r.min_optimize);
            if !self.flags.is_directed() {
                next /= 2;
            }
            next
        } else {
            r.min_optimize
        };
    }

    /// Abort any in-progress resize as if the rebuild's allocation had
    /// failed: leave the table untouched and reset `optimize` to the retry
    /// value. Exposed so tests can exercise the OOM-rollback contract
    /// (spec §4.2, §8) without an actual allocator failure.
    #[doc(hidden)]
    pub fn simulate_rehash_allocation_failure(&mut self) {
        tracing::warn!(retry_optimize = self.rehash.retry_optimize, "graph rehash allocation failed, rolled back");
        self.optimize = self.rehash.retry_optimize;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn undirected_mirrors_and_counts_once() {
        let mut g = Graph::new(ContainerFlags::empty(), 1e-6).unwrap();
        g.set(0, 1, 2.0).unwrap();
        assert_eq!(g.get(0, 1), Some(2.0));
        assert_eq!(g.get(1, 0), Some(2.0));
        assert_eq!(g.num_edges(), 1);
        assert_eq!(g.raw_entry_count(), 2);
    }

    #[test]
    fn undirected_diagonal_stored_once() {
        let mut g = Graph::new(ContainerFlags::empty(), 1e-6).unwrap();
        g.set(5, 5, 1.0).unwrap();
        assert_eq!(g.raw_entry_count(), 1);
        assert_eq!(g.num_edges(), 1);
    }

    #[test]
    fn directed_does_not_mirror() {
        let mut g = Graph::new(ContainerFlags::DIRECTED, 1e-6).unwrap();
        g.set(0, 1, 1.0).unwrap();
        assert_eq!(g.get(0, 1), Some(1.0));
        assert_eq!(g.get(1, 0), None);
        assert_eq!(g.num_edges(), 1);
    }

    #[test]
    fn del_mirrors_on_undirected() {
        let mut g = Graph::new(ContainerFlags::empty(), 1e-6).unwrap();
        g.set(0, 1, 1.0).unwrap();
        g.del(0, 1).unwrap();
        assert_eq!(g.get(0, 1), None);
        assert_eq!(g.get(1, 0), None);
    }

    #[test]
    fn nonzero_collapse_removes_both_mirrored_entries() {
        let mut g = Graph::new(ContainerFlags::NONZERO, 1e-3).unwrap();
        g.set(0, 1, 1.0).unwrap();
        g.add_edge(0, 1, -1.0).unwrap();
        assert_eq!(g.get(0, 1), None);
        assert_eq!(g.get(1, 0), None);
    }

    #[test]
    fn readonly_rejects_mutation() {
        let mut g = Graph::new(ContainerFlags::READONLY, 1e-6).unwrap();
        assert!(matches!(g.set(0, 1, 1.0), Err(Error::ReadOnly)));
    }

    #[test]
    fn rehash_preserves_edge_multiset() {
        let mut g = Graph::new(ContainerFlags::DIRECTED, 1e-6).unwrap().with_rehash_config(
            RehashConfig { grow_factor: 4, grow_stop_factor: 2, shrink_factor: 1, min_optimize: 4, retry_optimize: 16 },
        );
        for i in 0..200u64 {
            g.set(i, i + 1, i as f32).unwrap();
        }
        assert_eq!(g.num_edges(), 200);
        let mut pairs: Vec<(u64, u64)> = g.iter().map(|e| (e.source, e.target)).collect();
        pairs.sort_unstable();
        let mut expected: Vec<(u64, u64)> = (0..200u64).map(|i| (i, i + 1)).collect();
        expected.sort_unstable();
        assert_eq!(pairs, expected);
    }

    #[test]
    fn unlink_propagates_load_hints_then_detaches() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        #[derive(Debug, Default)]
        struct Counter(AtomicUsize, AtomicUsize);
        impl TimelineLink for Counter {
            fn refresh_cache(&self) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
            fn propagate_load_hint(&self, _hint: LoadHint) {
                self.1.fetch_add(1, Ordering::SeqCst);
            }
        }

        let mut g = Graph::new(ContainerFlags::LOAD_NEXT | ContainerFlags::LOAD_PREV, 1e-6).unwrap();
        let link: Arc<dyn TimelineLink + Send + Sync> = Arc::new(Counter::default());
        g.attach_timeline(&link);
        g.unlink();
        assert!(!g.flags().contains(ContainerFlags::LOAD_NEXT));
        assert!(!g.flags().contains(ContainerFlags::LOAD_PREV));
    }
}
