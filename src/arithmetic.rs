//! Pointwise and structural arithmetic over [`Vector`]/[`Graph`] snapshots
//! (spec §6).

use crate::core::error::{Error, Result};
use crate::flags::ContainerFlags;
use crate::graph::Graph;
use crate::vector::Vector;

/// Scale every stored weight by `factor` in place.
pub fn mul_const_vector(v: &mut Vector, factor: f32) -> Result<()> {
    let indices: Vec<u64> = v.iter().map(|e| e.index).collect();
    for idx in indices {
        let w = v.get(idx).unwrap_or(0.0);
        v.set(idx, w * factor)?;
    }
    Ok(())
}

/// Scale every stored edge weight by `factor` in place. No-op when `factor ==
/// 1.0`. Bumps `revision` exactly once, not once per edge.
pub fn mul_const_graph(g: &mut Graph, factor: f32) -> Result<()> {
    g.scale_all(factor)
}

/// `lhs += w·rhs`, edge by edge: for each edge in `rhs`, `add_edge(lhs, s, t,
/// w·weight)`. Both operands must agree on directedness; undirected mirroring
/// is handled by `add_edge`.
pub fn add_graph(lhs: &mut Graph, rhs: &Graph, w: f32) -> Result<()> {
    if lhs.flags().is_directed() != rhs.flags().is_directed() {
        return Err(Error::invalid_argument(
            "add_graph requires both operands to agree on directedness",
        ));
    }
    for e in rhs.iter() {
        lhs.add_edge(e.source, e.target, w * e.weight)?;
    }
    Ok(())
}

/// `lhs -= w·rhs`, edge by edge.
pub fn sub_graph(lhs: &mut Graph, rhs: &Graph, w: f32) -> Result<()> {
    if lhs.flags().is_directed() != rhs.flags().is_directed() {
        return Err(Error::invalid_argument(
            "sub_graph requires both operands to agree on directedness",
        ));
    }
    for e in rhs.iter() {
        lhs.sub_edge(e.source, e.target, w * e.weight)?;
    }
    Ok(())
}

/// `result[s] = sum_t g(s, t) * v[t]`: sparse matrix-vector product.
///
/// Iterates the graph's stored entries rather than the vector's, since edge
/// count dominates vector size in every benchmark graph (spec §6).
pub fn mul_vector(g: &Graph, v: &mut Vector, out: &mut Vector) -> Result<()> {
    for e in g.iter() {
        if let Some(vt) = v.get(e.target) {
            let delta = e.weight * vt;
            out.add(e.source, delta)?;
        }
    }
    Ok(())
}

/// `out[s] = |{ t : g(s, t) exists }|` for every node with at least one
/// outgoing edge.
pub fn out_degrees(g: &Graph) -> Result<Vector> {
    let mut out = Vector::new(ContainerFlags::empty(), 1e-6)?;
    for e in g.iter() {
        out.add(e.source, 1.0)?;
    }
    Ok(out)
}

/// `out[s] = sum_t g(s, t)` for every node with at least one outgoing edge.
pub fn out_weights(g: &Graph) -> Result<Vector> {
    let mut out = Vector::new(ContainerFlags::empty(), 1e-6)?;
    for e in g.iter() {
        out.add(e.source, e.weight)?;
    }
    Ok(out)
}

/// `out[t] = |{ s : g(s, t) exists }|` for every node with at least one
/// incoming edge.
pub fn in_degrees(g: &Graph) -> Result<Vector> {
    let mut out = Vector::new(ContainerFlags::empty(), 1e-6)?;
    for e in g.iter() {
        out.add(e.target, 1.0)?;
    }
    Ok(out)
}

/// `out[t] = sum_s g(s, t)` for every node with at least one incoming edge.
pub fn in_weights(g: &Graph) -> Result<Vector> {
    let mut out = Vector::new(ContainerFlags::empty(), 1e-6)?;
    for e in g.iter() {
        out.add(e.target, e.weight)?;
    }
    Ok(out)
}

/// For every node `s` with at least one outgoing edge: `temp[s] = Σ_{t:
/// (s,t)∈E} out_degree(t)`, `result[s] = out_degree(s) − temp[s]/out_degree(s)`.
///
/// A node whose successors are themselves low out-degree (few further hops
/// reachable through them) scores higher than one whose successors are
/// high-out-degree hubs.
pub fn degree_anomalies(g: &Graph) -> Result<Vector> {
    let mut degrees = out_degrees(g)?;
    anomaly_score(g, &mut degrees)
}

/// Same as [`degree_anomalies`] but over out-weight instead of out-degree.
pub fn weight_anomalies(g: &Graph) -> Result<Vector> {
    let mut weights = out_weights(g)?;
    anomaly_score(g, &mut weights)
}

fn anomaly_score(g: &Graph, base: &mut Vector) -> Result<Vector> {
    let mut temp = Vector::new(ContainerFlags::empty(), 1e-6)?;
    for e in g.iter() {
        let successor_out = base.get(e.target).unwrap_or(0.0);
        temp.add(e.source, successor_out)?;
    }
    let mut result = Vector::new(ContainerFlags::empty(), 1e-6)?;
    for e in base.iter() {
        let out = e.weight;
        let accumulated = temp.get(e.index).unwrap_or(0.0);
        result.set(e.index, out - accumulated / out)?;
    }
    Ok(result)
}

/// Keep only nodes for which `keep(node)` is `true`: edges with either
/// endpoint dropped are removed from the result.
pub fn filter_nodes(g: &Graph, keep: impl Fn(u64) -> bool) -> Result<Graph> {
    let mut out = Graph::new(g.flags(), g.eps())?;
    for e in g.iter() {
        if keep(e.source) && keep(e.target) {
            out.set(e.source, e.target, e.weight)?;
        }
    }
    Ok(out)
}

/// `result[s,t] = g[s,t] / (out_weight[s] · in_weight[t])`. For an undirected
/// graph, `in_weight = out_weight`. An edge whose denominator is zero is left
/// untouched.
pub fn normalize(g: &mut Graph) -> Result<()> {
    let mut out_w = out_weights(g)?;
    let mut in_w = if g.flags().is_directed() { in_weights(g)? } else { out_w.clone() };
    let edges: Vec<(u64, u64, f32)> = g.iter().map(|e| (e.source, e.target, e.weight)).collect();
    for (s, t, weight) in edges {
        let denom = out_w.get(s).unwrap_or(0.0) * in_w.get(t).unwrap_or(0.0);
        if denom == 0.0 {
            continue;
        }
        g.set(s, t, weight / denom)?;
    }
    Ok(())
}

/// Sum every stored directed entry's weight in double precision (undirected
/// mirrored edges counted twice, matching the raw storage layout).
pub fn sum_weights(g: &Graph) -> f64 {
    g.iter().map(|e| e.weight as f64).sum()
}

/// Sum every stored entry's weight in double precision.
pub fn sum_weights_vector(v: &Vector) -> f64 {
    v.iter().map(|e| e.weight as f64).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> Graph {
        let mut g = Graph::new(ContainerFlags::DIRECTED, 1e-6).unwrap();
        g.set(0, 1, 1.0).unwrap();
        g.set(1, 2, 2.0).unwrap();
        g.set(2, 0, 3.0).unwrap();
        g
    }

    #[test]
    fn mul_const_scales_every_edge() {
        let mut g = triangle();
        mul_const_graph(&mut g, 2.0).unwrap();
        assert_eq!(g.get(0, 1), Some(2.0));
        assert_eq!(g.get(1, 2), Some(4.0));
        assert_eq!(g.get(2, 0), Some(6.0));
    }

    #[test]
    fn mul_const_is_a_no_op_for_factor_one() {
        let mut g = triangle();
        let before = g.revision();
        mul_const_graph(&mut g, 1.0).unwrap();
        assert_eq!(g.revision(), before);
        assert_eq!(g.get(0, 1), Some(1.0));
    }

    #[test]
    fn add_graph_sums_matching_edges_scaled_by_w() {
        let mut a = triangle();
        let b = triangle();
        add_graph(&mut a, &b, 1.0).unwrap();
        assert_eq!(a.get(0, 1), Some(2.0));

        let mut c = triangle();
        add_graph(&mut c, &b, 2.0).unwrap();
        assert_eq!(c.get(0, 1), Some(3.0));
    }

    #[test]
    fn sub_graph_rejects_directedness_mismatch() {
        let mut a = triangle();
        let b = Graph::new(ContainerFlags::empty(), 1e-6).unwrap();
        assert!(sub_graph(&mut a, &b, 1.0).is_err());
    }

    #[test]
    fn sub_graph_scales_by_w_before_subtracting() {
        let mut a = triangle();
        let b = triangle();
        sub_graph(&mut a, &b, 0.5).unwrap();
        assert!((a.get(0, 1).unwrap() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn mul_vector_computes_sparse_matvec() {
        let g = triangle();
        let mut v = Vector::new(ContainerFlags::empty(), 1e-6).unwrap();
        v.set(1, 10.0).unwrap();
        v.set(2, 5.0).unwrap();
        v.set(0, 1.0).unwrap();
        let mut out = Vector::new(ContainerFlags::empty(), 1e-6).unwrap();
        mul_vector(&g, &mut v, &mut out).unwrap();
        assert_eq!(out.get(0), Some(10.0));
        assert_eq!(out.get(1), Some(10.0));
        assert_eq!(out.get(2), Some(3.0));
    }

    #[test]
    fn out_degrees_and_weights() {
        let g = triangle();
        let degrees = out_degrees(&g).unwrap();
        assert_eq!(degrees.num_entries(), 3);
        let mut weights = out_weights(&g).unwrap();
        assert_eq!(weights.get(1), Some(2.0));
    }

    #[test]
    fn filter_nodes_drops_incident_edges() {
        let g = triangle();
        let mut filtered = filter_nodes(&g, |n| n != 2).unwrap();
        assert_eq!(filtered.get(0, 1), Some(1.0));
        assert_eq!(filtered.get(1, 2), None);
        assert_eq!(filtered.get(2, 0), None);
    }

    #[test]
    fn normalize_divides_by_out_weight_times_in_weight() {
        // 0 --1--> 1 --2--> 2: out_weight = {0:1, 1:2}, in_weight = {1:1, 2:2}.
        let mut g = Graph::new(ContainerFlags::DIRECTED, 1e-6).unwrap();
        g.set(0, 1, 1.0).unwrap();
        g.set(1, 2, 2.0).unwrap();
        normalize(&mut g).unwrap();
        // (0,1): 1.0 / (out_weight[0]=1.0 * in_weight[1]=1.0) = 1.0
        assert!((g.get(0, 1).unwrap() - 1.0).abs() < 1e-6);
        // (1,2): 2.0 / (out_weight[1]=2.0 * in_weight[2]=2.0) = 0.5
        assert!((g.get(1, 2).unwrap() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn normalize_undirected_uses_out_weight_on_both_sides() {
        let mut g = Graph::new(ContainerFlags::empty(), 1e-6).unwrap();
        g.set(0, 1, 2.0).unwrap();
        normalize(&mut g).unwrap();
        // out_weight[0] = out_weight[1] = 2.0 (each direction stored once).
        assert!((g.get(0, 1).unwrap() - 0.5).abs() < 1e-6);
        assert!((g.get(1, 0).unwrap() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn sum_weights_counts_undirected_mirrors_twice() {
        let mut g = Graph::new(ContainerFlags::empty(), 1e-6).unwrap();
        g.set(0, 1, 3.0).unwrap();
        assert_eq!(sum_weights(&g), 6.0);
    }

    #[test]
    fn degree_anomalies_scores_every_edge_cycle_as_zero() {
        // Every node in `triangle()` has out_degree 1 and every successor
        // also has out_degree 1, so temp[s]/out_degree(s) == out_degree(s).
        let g = triangle();
        let mut scores = degree_anomalies(&g).unwrap();
        for n in [0u64, 1, 2] {
            assert!(scores.get(n).unwrap().abs() < 1e-6);
        }
    }

    #[test]
    fn degree_anomalies_ranks_a_hub_above_a_chain() {
        let mut g = Graph::new(ContainerFlags::DIRECTED, 1e-6).unwrap();
        // Hub: node 0 fans out to 20 leaves with no further out-edges.
        for t in 0..20u64 {
            g.set(0, t + 1, 1.0).unwrap();
        }
        // Ordinary chain node: out_degree 1, successor also out_degree 0.
        g.set(100, 101, 1.0).unwrap();
        let mut scores = degree_anomalies(&g).unwrap();
        // hub: out_degree(0)=20, temp[0]=sum of out_degree(leaf)=0 -> 20 - 0 = 20
        assert!((scores.get(0).unwrap() - 20.0).abs() < 1e-6);
        // chain: out_degree(100)=1, temp[100]=out_degree(101)=0 -> 1 - 0 = 1
        assert!((scores.get(100).unwrap() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn weight_anomalies_matches_the_spec_formula() {
        let g = triangle();
        let mut scores = weight_anomalies(&g).unwrap();
        // out_weight = {0:1, 1:2, 2:3}; temp[s] = out_weight(successor).
        assert!((scores.get(0).unwrap() - (1.0 - 2.0 / 1.0)).abs() < 1e-6);
        assert!((scores.get(1).unwrap() - (2.0 - 3.0 / 2.0)).abs() < 1e-6);
        assert!((scores.get(2).unwrap() - (3.0 - 1.0 / 3.0)).abs() < 1e-6);
    }
}
