use criterion::{black_box, criterion_group, criterion_main, Criterion};

use tvg_engine::bfs::{bfs, BfsControl};
use tvg_engine::flags::ContainerFlags;
use tvg_engine::graph::Graph;

fn path_graph(n: u64) -> Graph {
    let mut g = Graph::new(ContainerFlags::DIRECTED, 1e-6).unwrap();
    for i in 0..n {
        g.set(i, i + 1, 1.0).unwrap();
    }
    g
}

fn bench_graph_mutation(c: &mut Criterion) {
    c.bench_function("graph_set_sequential", |b| {
        b.iter(|| {
            let mut g = Graph::new(ContainerFlags::DIRECTED, 1e-6).unwrap();
            for i in 0..black_box(2_000u64) {
                g.set(i, i + 1, i as f32).unwrap();
            }
            black_box(g.num_edges())
        })
    });
}

fn bench_graph_lookup(c: &mut Criterion) {
    let mut g = path_graph(10_000);
    c.bench_function("graph_get_random_access", |b| {
        b.iter(|| {
            let mut total = 0.0f32;
            for i in (0..10_000u64).step_by(7) {
                if let Some(w) = black_box(&mut g).get(i, i + 1) {
                    total += w;
                }
            }
            black_box(total)
        })
    });
}

fn bench_bfs(c: &mut Criterion) {
    let g = path_graph(5_000);
    c.bench_function("bfs_full_traversal", |b| {
        b.iter(|| {
            let mut visited = 0u64;
            bfs(black_box(&g), 0, true, |_| {
                visited += 1;
                BfsControl::Continue
            })
            .unwrap();
            black_box(visited)
        })
    });
}

criterion_group!(benches, bench_graph_mutation, bench_graph_lookup, bench_bfs);
criterion_main!(benches);
