use common::config::SliceConfig;
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use nalgebra::Vector2;

use slicer::{builder::MeshBuilder, plane::Plane, raster::Rasterizer, Pos};

pub fn bench(c: &mut Criterion) {
    let mut group = c.benchmark_group("Rasterize Cylinder");

    let config = SliceConfig {
        platform_resolution: Vector2::new(1920, 1080),
        platform_size: Vector2::new(96.0, 54.0),
        ..Default::default()
    };

    for precision in [32, 256, 2048] {
        let mut builder = MeshBuilder::new();
        builder.add_vertical_cylinder(Pos::zeros(), 40.0, (20.0, 10.0), precision);
        let mesh = builder.build();

        let flat = Rasterizer::new(mesh.clone(), Plane::default(), &config);
        group.bench_with_input(BenchmarkId::new("Flat", precision), &flat, |b, i| {
            b.iter(|| i.render(&[20.0]))
        });

        let tilted = Rasterizer::new(mesh, Plane::new(0.3), &config);
        group.bench_with_input(
            BenchmarkId::new("Tilted x4", precision),
            &tilted,
            |b, i| b.iter(|| i.render(&[19.0, 19.5, 20.0, 20.5])),
        );
    }
}

criterion_group!(benches, bench);
criterion_main!(benches);
