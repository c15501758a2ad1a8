use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use laserloc_3d::{pointcloud::PointCloud, transforms::RigidTransform};
use laserloc_icp::{align, compute_fitness, IcpParams};
use rand::{Rng, SeedableRng};

fn create_cloud(num_points: usize) -> PointCloud {
    let mut rng = rand::rngs::StdRng::seed_from_u64(0);
    let points = (0..num_points)
        .map(|_| [rng.random_range(-5.0..5.0), rng.random_range(-5.0..5.0), 0.0])
        .collect();
    PointCloud::new(points)
}

fn bench_icp(c: &mut Criterion) {
    let mut group = c.benchmark_group("icp");
    let params = IcpParams::default();
    let offset = RigidTransform::from_planar(0.05, -0.02, 0.01);

    for num_points in [360, 720, 1440] {
        let target = create_cloud(num_points);
        let source = target.transformed(&offset);

        group.bench_with_input(
            BenchmarkId::new("align", num_points),
            &(source.clone(), target.clone()),
            |b, (s, t)| b.iter(|| align(black_box(s), black_box(t), &params)),
        );

        group.bench_with_input(
            BenchmarkId::new("fitness", num_points),
            &(source, target),
            |b, (s, t)| {
                b.iter(|| compute_fitness(black_box(s.points()), black_box(t.points()), 0.1))
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_icp);
criterion_main!(benches);
