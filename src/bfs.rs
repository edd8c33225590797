//! Weighted graph traversal and its derived distance/connectivity queries
//! (spec §6).

use std::cmp::{Ordering, Reverse};
use std::collections::{BTreeSet, BinaryHeap, HashSet};
use std::time::Instant;

use crate::core::error::{Error, Result};
use crate::flags::ContainerFlags;
use crate::graph::Graph;
use crate::system::metrics::EngineMetrics;
use crate::vector::Vector;

/// A node reached during traversal: cumulative weight and hop count from the
/// traversal's source, plus the edge it was reached over.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BfsEntry {
    /// Cumulative edge weight from the source to `to`.
    pub weight: f64,
    /// Number of edges from the source to `to`.
    pub hops: u32,
    /// The node `to` was reached from (equal to `to` for the source itself).
    pub from: u64,
    /// The node this entry describes.
    pub to: u64,
}

impl Eq for BfsEntry {}

/// What the traversal should do after visiting a node.
#[derive(Debug)]
pub enum BfsControl {
    /// Expand `to`'s outgoing edges into the frontier.
    Continue,
    /// Terminate the whole traversal now; the traversal is a success and
    /// whatever the caller has accumulated through `visit` so far is the
    /// result.
    Stop,
    /// Terminate the whole traversal now with a typed error.
    Abort(Error),
}

/// Frontier ordering key: compares by `weight` first when `use_weights` is
/// set, else by `hops` first. Either way the pop order is monotonic in the
/// leading field, so a caller bounding that field can safely `Stop` the
/// whole traversal the first time it is exceeded.
struct FrontierKey {
    entry: BfsEntry,
    use_weights: bool,
}

impl FrontierKey {
    fn cmp_fields(&self, other: &Self) -> Ordering {
        if self.use_weights {
            self.entry.weight.total_cmp(&other.entry.weight).then(self.entry.hops.cmp(&other.entry.hops))
        } else {
            self.entry.hops.cmp(&other.entry.hops).then(self.entry.weight.total_cmp(&other.entry.weight))
        }
    }
}

impl PartialEq for FrontierKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp_fields(other) == Ordering::Equal
    }
}

impl Eq for FrontierKey {}

impl PartialOrd for FrontierKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp_fields(other))
    }
}

impl Ord for FrontierKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.cmp_fields(other)
    }
}

/// Traverse `g` from `source`, calling `visit` once per newly-reached node.
///
/// The frontier is a min-heap ordered by cumulative weight when
/// `use_weights` is `true`, else by hop count — so callers bounding
/// whichever field they sorted by can rely on the pop order being
/// monotonic in it.
///
/// The source itself is visited first, with `weight = 0.0`, `hops = 0`,
/// `from == to == source`. Returns `Ok(())` once the frontier is exhausted
/// or `visit` returns [`BfsControl::Stop`]; returns `Err` as soon as `visit`
/// returns [`BfsControl::Abort`].
pub fn bfs(
    g: &Graph,
    source: u64,
    use_weights: bool,
    mut visit: impl FnMut(&BfsEntry) -> BfsControl,
) -> Result<()> {
    let start = Instant::now();
    let result = bfs_inner(g, source, use_weights, &mut visit);
    EngineMetrics::global().bfs_duration.observe(start.elapsed().as_secs_f64());
    result
}

fn bfs_inner(
    g: &Graph,
    source: u64,
    use_weights: bool,
    visit: &mut impl FnMut(&BfsEntry) -> BfsControl,
) -> Result<()> {
    let mut visited: HashSet<u64> = HashSet::new();
    let mut heap: BinaryHeap<Reverse<FrontierKey>> = BinaryHeap::new();
    heap.push(Reverse(FrontierKey {
        entry: BfsEntry { weight: 0.0, hops: 0, from: source, to: source },
        use_weights,
    }));
    while let Some(Reverse(FrontierKey { entry, .. })) = heap.pop() {
        if visited.contains(&entry.to) {
            continue;
        }
        visited.insert(entry.to);
        match visit(&entry) {
            BfsControl::Abort(e) => return Err(e),
            BfsControl::Stop => return Ok(()),
            BfsControl::Continue => {
                for e in g.out_edges(entry.to) {
                    if !visited.contains(&e.target) {
                        heap.push(Reverse(FrontierKey {
                            entry: BfsEntry {
                                weight: entry.weight + e.weight as f64,
                                hops: entry.hops + 1,
                                from: entry.to,
                                to: e.target,
                            },
                            use_weights,
                        }));
                    }
                }
            }
        }
    }
    Ok(())
}

/// Hop count of the shortest (fewest-edges) `source -> target` path, or
/// `None` if unreachable.
///
/// Per the documented BFS limitation (spec §7), unreachable is surfaced as
/// `None` here rather than a typed error.
pub fn distance_count(g: &Graph, source: u64, target: u64) -> Option<u32> {
    let mut result = None;
    let _ = bfs(g, source, false, |entry| {
        if entry.to == target {
            result = Some(entry.hops);
            return BfsControl::Stop;
        }
        BfsControl::Continue
    });
    result
}

/// Cumulative edge weight of the cheapest `source -> target` path, or `None`
/// if unreachable.
pub fn distance_weight(g: &Graph, source: u64, target: u64) -> Option<f64> {
    let mut result = None;
    let _ = bfs(g, source, true, |entry| {
        if entry.to == target {
            result = Some(entry.weight);
            return BfsControl::Stop;
        }
        BfsControl::Continue
    });
    result
}

/// Hop count from `source` to every node reachable within `max_count` hops.
///
/// The frontier is ordered by hop count, so pop order is monotonic in it:
/// the traversal stops as soon as a popped node exceeds the bound.
pub fn all_distances_count(g: &Graph, source: u64, max_count: u32) -> Result<Vector> {
    let mut out = Vector::new(ContainerFlags::empty(), 1e-6)?;
    bfs(g, source, false, |entry| {
        if entry.hops > max_count {
            return BfsControl::Stop;
        }
        match out.set(entry.to, entry.hops as f32) {
            Ok(_) => BfsControl::Continue,
            Err(e) => BfsControl::Abort(e),
        }
    })?;
    Ok(out)
}

/// Cumulative weight from `source` to every node reachable within
/// `max_weight`.
///
/// The frontier is ordered by cumulative weight, so pop order is monotonic
/// in it: the traversal stops as soon as a popped node exceeds the bound.
pub fn all_distances_weight(g: &Graph, source: u64, max_weight: f64) -> Result<Vector> {
    let mut out = Vector::new(ContainerFlags::empty(), 1e-6)?;
    bfs(g, source, true, |entry| {
        if entry.weight > max_weight {
            return BfsControl::Stop;
        }
        match out.set(entry.to, entry.weight as f32) {
            Ok(_) => BfsControl::Continue,
            Err(e) => BfsControl::Abort(e),
        }
    })?;
    Ok(out)
}

/// For every node `s` in the graph, BFS from `s` and record an edge
/// `(s, v, metric)` for every other node `v` it reaches, `metric` being the
/// cumulative weight when `use_weights` is set, else the hop count. The
/// diagonal (`s == v`) is skipped.
pub fn all_distances_graph(g: &Graph, use_weights: bool) -> Result<Graph> {
    let nodes = all_nodes(g);
    let mut result = Graph::new(ContainerFlags::DIRECTED, 1e-6)?;
    for &s in &nodes {
        bfs(g, s, use_weights, |entry| {
            if entry.to == s {
                return BfsControl::Continue;
            }
            let metric = if use_weights { entry.weight } else { entry.hops as f64 };
            match result.set(s, entry.to, metric as f32) {
                Ok(_) => BfsControl::Continue,
                Err(e) => BfsControl::Abort(e),
            }
        })?;
    }
    Ok(result)
}

fn all_nodes(g: &Graph) -> BTreeSet<u64> {
    let mut nodes = BTreeSet::new();
    for e in g.iter() {
        nodes.insert(e.source);
        nodes.insert(e.target);
    }
    nodes
}

/// Connected components of an undirected graph, each as a sorted list of
/// member nodes.
///
/// `Err(Error::Unsupported)` on a directed graph — connectivity is only
/// well-defined once edges are symmetric.
pub fn connected_components(g: &Graph) -> Result<Vec<Vec<u64>>> {
    if g.flags().is_directed() {
        return Err(Error::unsupported(
            "connected_components requires an undirected graph",
        ));
    }
    let mut remaining = all_nodes(g);
    let mut components = Vec::new();
    while let Some(&start) = remaining.iter().next() {
        let mut component = Vec::new();
        bfs(g, start, false, |entry| {
            component.push(entry.to);
            BfsControl::Continue
        })?;
        for n in &component {
            remaining.remove(n);
        }
        component.sort_unstable();
        components.push(component);
    }
    Ok(components)
}
