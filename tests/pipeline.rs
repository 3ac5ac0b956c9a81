use ndarray::Array2;
use tecto_emission_sim::prelude::*;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn small_config() -> SimulationConfig {
    let terrain = TerrainMap::new(Array2::zeros((3, 3))).unwrap();
    let mut config = SimulationConfig::new(terrain);
    config.sources = vec![SourcePosition {
        x: 1,
        y: 1,
        depth: 0.0,
    }];
    config.sensors = vec![SensorPosition { x: 1, y: 1 }];
    config.emission = EmissionSource::EventTriggered(RuptureParams {
        total_time_yr: 2.0,
        dt_yr: 1.0,
        ..RuptureParams::default()
    });
    config.seed = 7;
    config
}

#[test]
fn two_step_run_produces_well_formed_outputs() {
    init_logging();
    let out = run_simulation(small_config()).unwrap();

    assert_eq!(out.n_timesteps(), 2);
    assert_eq!(out.ground_accumulation.dim(), (2, 3, 3));
    assert_eq!(out.bursts.e_uv.dim(), (2, 3, 3));
    assert_eq!(out.measurements.dim(), (2, 1, 3, 3));
    assert_eq!(out.sensor_failures.dim(), (2, 1));

    for t in 0..2 {
        assert!(!out.sensor_failures[[t, 0]]);
        let rho = out.measurement(t, 0);
        assert!(rho.is_finite());
        assert!((rho.trace().re - 1.0).abs() < 1e-9);
        assert!(rho.is_hermitian(1e-6), "{:?}", rho);
        assert!(rho.populations().iter().all(|&p| p > -1e-6));
    }
}

#[test]
fn cell_above_threshold_is_zeroed_in_its_snapshot() {
    init_logging();
    let out = run_simulation(small_config()).unwrap();
    let first = out.emissions.records()[0].emission_q;
    assert!(first > 1e-2);
    assert_eq!(out.ground_accumulation[[0, 1, 1]], 0.0);
    assert!(out.bursts.get(0, 1, 1).total() > 0.0);
    assert!(out.burst_counts[0] >= 1);
}

#[test]
fn fixed_seed_is_deterministic() {
    init_logging();
    let a = run_simulation(small_config()).unwrap();
    let b = run_simulation(small_config()).unwrap();
    assert_eq!(a.emissions, b.emissions);
    assert_eq!(a.ground_accumulation, b.ground_accumulation);
    assert_eq!(a.bursts, b.bursts);
    assert_eq!(a.measurements, b.measurements);
}

#[test]
fn signal_driven_run_has_one_step_per_sample() {
    init_logging();
    let mut config = small_config();
    config.emission = EmissionSource::Signal(vec![0.0, 0.5, 1.0, 0.25]);
    config.burst.threshold = 10.0;
    let out = run_simulation(config).unwrap();
    assert_eq!(out.n_timesteps(), 4);
    assert_eq!(out.emissions.variant(), EmissionVariant::Signal);
    assert_eq!(out.total_accumulation(0), 0.0);
    assert!(out.total_accumulation(3) > out.total_accumulation(1));
    assert_eq!(out.burst_counts, vec![0; 4]);
}

#[test]
fn unreachable_sources_leave_the_grid_empty() {
    init_logging();
    let mut config = small_config();
    config.sources[0].depth = 1e6;
    let out = run_simulation(config).unwrap();
    assert!(out.ground_accumulation.iter().all(|&h| h == 0.0));
    assert!(out.bursts.e_ir.iter().all(|&e| e == 0.0));
}

#[test]
fn overflowing_signal_fails_before_any_step() {
    let mut config = small_config();
    config.emission = EmissionSource::Signal(vec![0.5, -1000.0]);
    assert!(matches!(
        SimulationOrchestrator::new(config.clone()),
        Err(SimError::InvalidArgument { .. })
    ));
    assert!(run_simulation(config).is_err());
}

#[test]
fn source_outside_grid_is_rejected() {
    let mut config = small_config();
    config.sources[0].x = 3;
    assert!(matches!(
        run_simulation(config),
        Err(SimError::OutOfBounds { what: "source", .. })
    ));
}

#[test]
fn sensor_outside_grid_is_rejected() {
    let mut config = small_config();
    config.sensors[0].y = 10;
    assert!(matches!(
        run_simulation(config),
        Err(SimError::OutOfBounds { what: "sensor", .. })
    ));
}

#[test]
fn non_positive_burst_threshold_is_rejected() {
    for threshold in [0.0, -0.5] {
        let mut config = small_config();
        config.burst.threshold = threshold;
        assert!(matches!(
            run_simulation(config),
            Err(SimError::InvalidArgument { .. })
        ));
    }
}

#[test]
fn stepping_manually_matches_run() {
    init_logging();
    let orch = SimulationOrchestrator::new(small_config()).unwrap();
    let mut state = orch.initial_state();
    let mut reports = Vec::new();
    while !orch.is_finished(&state) {
        reports.push(orch.step(&mut state).unwrap());
    }
    let stepped = orch.finish(state);
    let ran = orch.run().unwrap();
    assert_eq!(reports.len(), 2);
    assert_eq!(reports[1].time_years, 1.0);
    assert_eq!(stepped.ground_accumulation, ran.ground_accumulation);
    assert_eq!(stepped.burst_counts, ran.burst_counts);
}
