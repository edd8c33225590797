//! Multi-objective stability ranking over a sequence of snapshots (spec §6).
//!
//! Each edge (or vector entry) is scored on two objectives, `value1 = -mean`
//! and `value2 = variance`, both to be minimized. Entries are sorted
//! lexicographically by `(value1, value2)` and swept left to right: a
//! front starts with whatever comes first, then only admits the next entry
//! if its `value2` strictly improves on the front's running best or
//! exactly ties it. Whatever is admitted is removed and the next front is
//! swept the same way over what remains. A `stable` edge is one with both
//! a high mean and a low variance relative to its peers, so it survives
//! into an early front.

use std::collections::{BTreeSet, HashMap};

use crate::core::config::ParetoConfig;
use crate::core::error::{Error, Result};
use crate::graph::Graph;
use crate::vector::Vector;

/// One edge's stability ranking.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeStability {
    pub source: u64,
    pub target: u64,
    pub mean: f64,
    pub variance: f64,
    /// `0` is the most stable front; larger numbers are dominated by it.
    pub front: u32,
    /// Per-front sweep weight: starts at `1.0` and is updated by
    /// [`ParetoConfig::base`] each front (`+= 1.0` when `base == 0.0`,
    /// `*= base` otherwise).
    pub stability: f64,
}

/// One vector entry's stability ranking, same objectives as [`EdgeStability`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeStability {
    pub index: u64,
    pub mean: f64,
    pub variance: f64,
    pub front: u32,
    pub stability: f64,
}

/// `mean` is the arithmetic mean; `variance` is `Σ (w - mean)²` — a sum, not
/// divided by `n` (no Bessel correction, and not the population variance
/// either).
fn mean_variance(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|w| (w - mean).powi(2)).sum::<f64>();
    (mean, variance)
}

/// Peel Pareto fronts off `(key, value1, value2)` triples (both objectives
/// minimized), returning `(key, front, stability)` in front order.
///
/// Each front is built by one left-to-right scan of the entries sorted
/// lexicographically by `(value1, value2)`: a candidate joins the rising
/// front if it is the first of the scan, if its `value2` improves on the
/// running best, or if it exactly ties the running best on `(value1,
/// value2)`. Selected entries are removed and the next front is swept the
/// same way over what remains.
fn sweep_fronts<K: Copy>(mut points: Vec<(K, f64, f64)>, base: f64) -> Vec<(K, u32, f64)> {
    points.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.2.total_cmp(&b.2)));

    let mut results = Vec::with_capacity(points.len());
    let mut front_num = 0u32;
    let mut weight = 1.0f64;
    while !points.is_empty() {
        let mut remaining = Vec::with_capacity(points.len());
        let mut best: Option<(f64, f64)> = None;
        for p in points.into_iter() {
            let (_, v1, v2) = p;
            let take = match best {
                None => true,
                Some((b1, b2)) => v2 < b2 || (v1, v2) == (b1, b2),
            };
            if take {
                best = Some((v1, v2));
                results.push((p.0, front_num, weight));
            } else {
                remaining.push(p);
            }
        }
        points = remaining;
        front_num += 1;
        if base == 0.0 {
            weight += 1.0;
        } else {
            weight *= base;
        }
    }
    results
}

/// Rank every edge appearing in any of `snapshots` by stability across the
/// sequence. An edge absent from a given snapshot is treated as weight
/// `0.0` for that snapshot.
pub fn pareto_stability(snapshots: &[Graph], config: &ParetoConfig) -> Result<Vec<EdgeStability>> {
    if snapshots.is_empty() {
        return Err(Error::invalid_argument("pareto_stability requires at least one snapshot"));
    }
    let mut edge_set: BTreeSet<(u64, u64)> = BTreeSet::new();
    let per_snapshot: Vec<HashMap<(u64, u64), f64>> = snapshots
        .iter()
        .map(|g| {
            let mut m = HashMap::new();
            for e in g.iter() {
                m.insert((e.source, e.target), e.weight as f64);
                edge_set.insert((e.source, e.target));
            }
            m
        })
        .collect();

    let mut points = Vec::with_capacity(edge_set.len());
    for &(s, t) in &edge_set {
        let values: Vec<f64> = per_snapshot.iter().map(|m| *m.get(&(s, t)).unwrap_or(&0.0)).collect();
        let (mean, variance) = mean_variance(&values);
        points.push(((s, t, mean, variance), -mean, variance));
    }

    Ok(sweep_fronts(points, config.base)
        .into_iter()
        .map(|((s, t, mean, variance), front, stability)| EdgeStability {
            source: s,
            target: t,
            mean,
            variance,
            front,
            stability,
        })
        .collect())
}

/// Rank every index appearing in any of `snapshots` by stability across the
/// sequence.
pub fn pareto_stability_vector(snapshots: &[Vector], config: &ParetoConfig) -> Result<Vec<NodeStability>> {
    if snapshots.is_empty() {
        return Err(Error::invalid_argument(
            "pareto_stability_vector requires at least one snapshot",
        ));
    }
    let mut index_set: BTreeSet<u64> = BTreeSet::new();
    let per_snapshot: Vec<HashMap<u64, f64>> = snapshots
        .iter()
        .map(|v| {
            let mut m = HashMap::new();
            for e in v.iter() {
                m.insert(e.index, e.weight as f64);
                index_set.insert(e.index);
            }
            m
        })
        .collect();

    let mut points = Vec::with_capacity(index_set.len());
    for &idx in &index_set {
        let values: Vec<f64> = per_snapshot.iter().map(|m| *m.get(&idx).unwrap_or(&0.0)).collect();
        let (mean, variance) = mean_variance(&values);
        points.push(((idx, mean, variance), -mean, variance));
    }

    Ok(sweep_fronts(points, config.base)
        .into_iter()
        .map(|((idx, mean, variance), front, stability)| NodeStability {
            index: idx,
            mean,
            variance,
            front,
            stability,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flags::ContainerFlags;

    #[test]
    fn rejects_empty_snapshot_sequence() {
        let config = ParetoConfig::default();
        assert!(pareto_stability(&[], &config).is_err());
    }

    #[test]
    fn variance_is_a_sum_not_divided_by_snapshot_count() {
        let config = ParetoConfig::default();
        let mut snapshots = Vec::new();
        for w in [5.0f32, 5.0, 5.0] {
            let mut g = Graph::new(ContainerFlags::DIRECTED, 1e-6).unwrap();
            g.set(0, 1, w).unwrap();
            snapshots.push(g);
        }
        for (i, w) in [1.0f32, 5.0, 1.0].into_iter().enumerate() {
            snapshots[i].set(2, 3, w).unwrap();
        }

        let ranking = pareto_stability(&snapshots, &config).unwrap();
        let e1 = ranking.iter().find(|r| r.source == 0 && r.target == 1).unwrap();
        let e2 = ranking.iter().find(|r| r.source == 2 && r.target == 3).unwrap();
        assert!((e1.mean - 5.0).abs() < 1e-9);
        assert!(e1.variance.abs() < 1e-9);
        assert!((e2.mean - 7.0 / 3.0).abs() < 1e-9);
        assert!((e2.variance - 32.0 / 3.0).abs() < 1e-9);
        // e1 dominates e2 on both objectives (value1 = -5.0 < -2.33, value2 =
        // 0.0 < 10.67), so the first sweep takes only e1; e2 is left for the
        // second sweep.
        assert_eq!(e1.front, 0);
        assert_eq!(e2.front, 1);
        assert_eq!(e1.stability, 1.0);
        assert_eq!(e2.stability, 2.0);
    }

    #[test]
    fn stable_edge_ranks_in_front_zero() {
        let config = ParetoConfig::default();
        let mut snapshots = Vec::new();
        for _ in 0..5 {
            let mut g = Graph::new(ContainerFlags::DIRECTED, 1e-6).unwrap();
            g.set(0, 1, 1.0).unwrap();
            snapshots.push(g);
        }
        let mut flaky = Graph::new(ContainerFlags::DIRECTED, 1e-6).unwrap();
        flaky.set(2, 3, 5.0).unwrap();
        snapshots.push(flaky);
        for g in snapshots.iter_mut().skip(1) {
            g.set(2, 3, 0.0).unwrap();
        }

        let ranking = pareto_stability(&snapshots, &config).unwrap();
        let stable = ranking.iter().find(|r| r.source == 0 && r.target == 1).unwrap();
        assert_eq!(stable.front, 0);
        assert_eq!(stable.variance, 0.0);
    }

    #[test]
    fn front_numbers_are_monotonic_with_sweep_weight() {
        let config = ParetoConfig::default();
        let mut a = Graph::new(ContainerFlags::DIRECTED, 1e-6).unwrap();
        a.set(0, 1, 1.0).unwrap();
        let mut b = Graph::new(ContainerFlags::DIRECTED, 1e-6).unwrap();
        b.set(0, 1, 10.0).unwrap();
        let ranking = pareto_stability(std::slice::from_ref(&a), &config).unwrap();
        assert_eq!(ranking[0].front, 0);
        let _ = b;
    }
}
