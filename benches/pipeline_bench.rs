// benches/pipeline_bench.rs

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ndarray::Array2;
use tecto_emission_sim::prelude::*;

fn benchmark_components(c: &mut Criterion) {
    c.bench_function("stick_slip_1000_steps", |b| {
        let params = RuptureParams {
            total_time_yr: 10.0,
            ..RuptureParams::default()
        };
        b.iter(|| simulate_stick_slip(black_box(&params), 42).unwrap());
    });

    c.bench_function("surface_deposit_64x64", |b| {
        let field = SurfaceAccumulationField::new(
            TerrainMap::flat(64, 64).unwrap(),
            SurfaceParams {
                diffusion_sigma: 5.0,
                ..SurfaceParams::default()
            },
        )
        .unwrap();
        let mut grid = field.empty_grid();
        b.iter(|| field.update(&mut grid, 32, 32, black_box(1.0)).unwrap());
    });

    c.bench_function("ladder_steady_state", |b| {
        let sys = LadderSystem::rydberg_defaults();
        b.iter(|| LiouvillianSolver.steady_state(black_box(&sys)).unwrap());
    });
}

fn benchmark_pipeline(c: &mut Criterion) {
    c.bench_function("pipeline_32x32_100_steps", |b| {
        let altitude = Array2::from_shape_fn((32, 32), |(x, y)| ((x + y) as f64 * 0.1).sin());
        let mut config = SimulationConfig::new(TerrainMap::new(altitude).unwrap());
        config.sources = vec![
            SourcePosition { x: 8, y: 8, depth: 0.0 },
            SourcePosition { x: 24, y: 20, depth: 0.0 },
        ];
        config.sensors = vec![SensorPosition { x: 8, y: 8 }, SensorPosition { x: 16, y: 16 }];
        config.emission = EmissionSource::Continuous(ContinuousParams {
            total_time_yr: 100.0,
            dt_yr: 1.0,
            ..ContinuousParams::default()
        });
        let orch = SimulationOrchestrator::new(config).unwrap();
        b.iter(|| orch.run().unwrap());
    });
}

criterion_group!(benches, benchmark_components, benchmark_pipeline);
criterion_main!(benches);
