//! Minimum-norm solve cost for typical EEG channel counts

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use meeg_inverse::minimum_norm;
use meeg_simulation::{analytic_leadfield, normal_dipoles};
use meeg_core::Mesh;
use nalgebra::DVector;

fn bench_minimum_norm(c: &mut Criterion) {
    let mut group = c.benchmark_group("minimum_norm");
    let cortex = Mesh::uv_sphere("cortex", 0.07, 40, 60).unwrap();
    let sources = normal_dipoles(&cortex);

    // (stacks, slices) of the electrode sphere
    for &(stacks, slices) in &[(4, 8), (8, 8), (8, 16), (12, 22)] {
        let electrodes = Mesh::uv_sphere("electrodes", 0.09, stacks, slices).unwrap();
        let g = analytic_leadfield(electrodes.vertices(), &sources).unwrap();
        let m = DVector::from_fn(g.nrows(), |i, _| (i as f64).sin());

        group.bench_with_input(
            BenchmarkId::new("channels", g.nrows()),
            &(g, m),
            |b, (g, m)| b.iter(|| minimum_norm(black_box(m), black_box(g), black_box(1e-6))),
        );
    }

    group.finish();
}

criterion_group!(benches, bench_minimum_norm);
criterion_main!(benches);
