//! Run the full pipeline on a synthetic ridge and print a short summary.
//!
//!     RUST_LOG=info cargo run --example synthetic_run

use ndarray::Array2;
use tecto_emission_sim::prelude::*;

fn main() -> Result<(), SimError> {
    env_logger::init();

    let n = 50;
    let altitude = Array2::from_shape_fn((n, n), |(x, y)| {
        let dx = x as f64 - n as f64 / 2.0;
        let dy = y as f64 - n as f64 / 3.0;
        200.0 * (-(dx * dx + dy * dy) / 200.0).exp()
    });
    let mut config = SimulationConfig::new(TerrainMap::new(altitude)?);
    config.surface.attraction_strength = 0.005;
    config.sources = vec![
        SourcePosition { x: 10, y: 10, depth: 1000.0 },
        SourcePosition { x: 30, y: 35, depth: 2000.0 },
    ];
    config.sensors = vec![
        SensorPosition { x: 25, y: 16 },
        SensorPosition { x: 10, y: 10 },
    ];
    config.emission = EmissionSource::EventTriggered(RuptureParams {
        total_time_yr: 100.0,
        dt_yr: 1.0,
        ..RuptureParams::default()
    });

    let output = SimulationOrchestrator::new(config)?.run()?;

    println!("=== Synthetic emission run ===");
    println!("Columns: {:?}", output.emissions.column_names());
    for r in output.emissions.records().iter().take(5) {
        println!(
            "  {:>6.1} yr  {:.3e} Pa  Q={:.3e} kg  seismic={:.3e}",
            r.time_years, r.stress_pa, r.emission_q, r.seismic_output
        );
    }
    println!("Ruptures: {}", output.emissions.len());
    println!("Total emitted: {:.3e} kg", output.emissions.total_emission());
    println!(
        "Bursts: {}",
        output.burst_counts.iter().sum::<usize>()
    );
    println!(
        "Sensor failures: {}",
        output.sensor_failures.iter().filter(|&&f| f).count()
    );
    for t in (0..output.n_timesteps()).step_by(20) {
        let p = output.measurement(t, 0).populations();
        println!(
            "t={:>3}  holes={:.3e}  ρ00={:.4} ρ11={:.4} ρ22={:.4}",
            t,
            output.total_accumulation(t),
            p[0],
            p[1],
            p[2]
        );
    }
    Ok(())
}
