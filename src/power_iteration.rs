//! Dominant eigenvector/eigenvalue via power iteration (spec §6).

use std::collections::BTreeSet;
use std::time::Instant;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::arithmetic::mul_vector;
use crate::core::error::{Error, Result};
use crate::flags::ContainerFlags;
use crate::graph::Graph;
use crate::system::metrics::EngineMetrics;
use crate::vector::Vector;

/// Nodes with at least one incoming directed edge — the domain the initial
/// vector is seeded over, since `mul_vector` only ever reads `v` at a `target`
/// index (`out[source] += weight * v[target]`).
fn nodes_with_incoming_edge(g: &Graph) -> BTreeSet<u64> {
    let mut nodes = BTreeSet::new();
    for e in g.iter() {
        nodes.insert(e.target);
    }
    nodes
}

fn l2_norm(v: &Vector) -> f64 {
    v.iter().map(|e| (e.weight as f64).powi(2)).sum::<f64>().sqrt()
}

fn dot(a: &Vector, b: &mut Vector) -> f64 {
    a.iter().map(|e| e.weight as f64 * b.get(e.index).unwrap_or(0.0) as f64).sum()
}

fn scale_in_place(v: &mut Vector, factor: f32) -> Result<()> {
    let indices: Vec<u64> = v.iter().map(|e| e.index).collect();
    for idx in indices {
        let w = v.get(idx).unwrap_or(0.0);
        v.set(idx, w * factor)?;
    }
    Ok(())
}

/// Rayleigh quotient `λ = v · (g · v)` for the current iterate — unlike the
/// L2 norm of `g · v`, this can be negative, which the power method needs to
/// report correctly for graphs whose dominant eigenvalue is negative.
fn rayleigh_quotient(g: &Graph, v: &Vector) -> Result<f64> {
    let mut gv = Vector::new(ContainerFlags::empty(), 1e-6)?;
    let mut v_mut = v.clone();
    mul_vector(g, &mut v_mut, &mut gv)?;
    Ok(dot(v, &mut gv))
}

/// Estimate the dominant eigenvector of `g` by repeated `v <- normalize(g *
/// v)`.
///
/// `initial_guess`, if given, seeds `v[node] = initial_guess[node]` for every
/// node with an incoming edge whose entry in `initial_guess` is present and
/// nonzero; every other such node falls back to a uniform `[0, 1)` draw from
/// a `StdRng` created fresh from `seed` — never a process-global generator,
/// so two calls with the same seed (and the same, or absent, `initial_guess`)
/// on the same graph are bit-for-bit identical.
///
/// Runs at most `num_iterations` steps; stops early once the L2 distance
/// between successive iterates drops below `tolerance` (a `tolerance` of
/// `0.0` disables the early-stop check and always runs the full count).
///
/// Returns the normalized eigenvector and, when `with_eigenvalue` is set,
/// the Rayleigh-quotient eigenvalue estimate `λ = v · (g · v)`.
pub fn power_iteration(
    g: &Graph,
    seed: u64,
    num_iterations: u32,
    tolerance: f64,
    with_eigenvalue: bool,
    initial_guess: Option<&Vector>,
) -> Result<(Vector, Option<f64>)> {
    let start = Instant::now();
    let result = power_iteration_inner(g, seed, num_iterations, tolerance, with_eigenvalue, initial_guess);
    EngineMetrics::global().power_iteration_duration.observe(start.elapsed().as_secs_f64());
    result
}

fn power_iteration_inner(
    g: &Graph,
    seed: u64,
    num_iterations: u32,
    tolerance: f64,
    with_eigenvalue: bool,
    initial_guess: Option<&Vector>,
) -> Result<(Vector, Option<f64>)> {
    let nodes = nodes_with_incoming_edge(g);
    if nodes.is_empty() {
        return Err(Error::invalid_argument(
            "power_iteration requires at least one node with an incoming edge",
        ));
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut v = Vector::new(ContainerFlags::empty(), 1e-6)?;
    for &n in &nodes {
        let seeded = initial_guess
            .and_then(|g0| g0.iter().find(|e| e.index == n).map(|e| e.weight))
            .filter(|&w| w != 0.0);
        v.set(n, seeded.unwrap_or_else(|| rng.random::<f32>()))?;
    }
    let norm = l2_norm(&v);
    if norm > 0.0 {
        scale_in_place(&mut v, (1.0 / norm) as f32)?;
    }

    for _ in 0..num_iterations {
        let mut next = Vector::new(ContainerFlags::empty(), 1e-6)?;
        mul_vector(g, &mut v, &mut next)?;
        let next_norm = l2_norm(&next);
        if next_norm == 0.0 {
            v = next;
            break;
        }
        scale_in_place(&mut next, (1.0 / next_norm) as f32)?;

        if tolerance > 0.0 {
            let delta: f64 = nodes
                .iter()
                .map(|&n| {
                    let a = v.get(n).unwrap_or(0.0) as f64;
                    let b = next.get(n).unwrap_or(0.0) as f64;
                    (a - b).powi(2)
                })
                .sum::<f64>()
                .sqrt();
            v = next;
            if delta < tolerance {
                break;
            }
        } else {
            v = next;
        }
    }

    if with_eigenvalue {
        let eigenvalue = rayleigh_quotient(g, &v)?;
        Ok((v, Some(eigenvalue)))
    } else {
        Ok((v, None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_graph() {
        let g = Graph::new(ContainerFlags::DIRECTED, 1e-6).unwrap();
        assert!(power_iteration(&g, 1, 10, 0.0, false, None).is_err());
    }

    #[test]
    fn same_seed_is_deterministic() {
        let mut g = Graph::new(ContainerFlags::empty(), 1e-6).unwrap();
        g.set(0, 1, 2.0).unwrap();
        g.set(1, 2, 1.0).unwrap();
        let (v1, _) = power_iteration(&g, 42, 50, 0.0, false, None).unwrap();
        let (v2, _) = power_iteration(&g, 42, 50, 0.0, false, None).unwrap();
        for n in [0u64, 1, 2] {
            assert_eq!(v1.iter().find(|e| e.index == n).map(|e| e.weight),
                       v2.iter().find(|e| e.index == n).map(|e| e.weight));
        }
    }

    #[test]
    fn eigenvector_is_l2_normalized() {
        let mut g = Graph::new(ContainerFlags::empty(), 1e-6).unwrap();
        g.set(0, 1, 3.0).unwrap();
        g.set(1, 2, 5.0).unwrap();
        g.set(2, 0, 1.0).unwrap();
        let (v, eigenvalue) = power_iteration(&g, 7, 200, 0.0, true, None).unwrap();
        let norm = l2_norm(&v);
        assert!((norm - 1.0).abs() < 1e-3);
        assert!(eigenvalue.unwrap() > 0.0);
    }

    #[test]
    fn initial_guess_seeds_nonzero_entries_and_falls_back_for_the_rest() {
        let mut g = Graph::new(ContainerFlags::empty(), 1e-6).unwrap();
        g.set(0, 1, 2.0).unwrap();
        g.set(1, 2, 1.0).unwrap();
        let mut guess = Vector::new(ContainerFlags::empty(), 1e-6).unwrap();
        guess.set(0, 1.0).unwrap();
        guess.set(1, 0.0).unwrap(); // present but zero: falls back to random.
        // node 2 absent from guess entirely: falls back to random too.
        let (v1, _) = power_iteration(&g, 5, 1, 0.0, false, Some(&guess)).unwrap();
        let (v2, _) = power_iteration(&g, 5, 1, 0.0, false, Some(&guess)).unwrap();
        // Same seed, same guess: still bit-for-bit identical.
        for n in [0u64, 1, 2] {
            assert_eq!(v1.iter().find(|e| e.index == n).map(|e| e.weight),
                       v2.iter().find(|e| e.index == n).map(|e| e.weight));
        }
    }

    #[test]
    fn rayleigh_quotient_reports_a_negative_eigenvalue() {
        let mut g = Graph::new(ContainerFlags::DIRECTED, 1e-6).unwrap();
        g.set(0, 1, -1.0).unwrap();
        g.set(1, 0, -1.0).unwrap();
        let mut guess = Vector::new(ContainerFlags::empty(), 1e-6).unwrap();
        guess.set(0, 1.0).unwrap();
        guess.set(1, 1.0).unwrap();
        let (_, eigenvalue) = power_iteration(&g, 3, 1, 0.0, true, Some(&guess)).unwrap();
        assert!((eigenvalue.unwrap() - (-1.0)).abs() < 1e-6);
    }
}
