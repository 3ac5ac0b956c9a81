//! Time-stepped orchestration of the full pipeline.
//!
//! Each step `t` of the emission timeline:
//! 1. Inject every emission whose surface arrival falls within half a step
//!    of `t`, at its source cell.
//! 2. Check every cell for a burst; a bursting cell is zeroed.
//! 3. Measure each sensor against the burst at its cell.
//! 4. Snapshot the accumulation grid.
//!
//! [`SimulationOrchestrator::step`] performs exactly one of these steps on a
//! [`SimulationState`], so a single step can be driven and inspected in
//! isolation. [`SimulationOrchestrator::run`] loops it to the end of the
//! timeline.
//!
//! With the `parallel` feature the burst pass runs over cells in parallel.
//! Cells are independent within that pass, so outputs are identical with the
//! feature on or off.

use log::{debug, info, warn};
use ndarray::{s, Array2, Array3, Array4, Axis, Zip};
use num_complex::Complex64;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::burst::{BurstInfo, BurstParams, IonizationBurstDetector};
use crate::density::{DensityMatrix, LEVELS};
use crate::error::{require_non_negative, require_positive, SimError, SolverError};
use crate::lindblad::LiouvillianSolver;
use crate::rupture::{
    simulate_continuous_with_rng, simulate_stick_slip_with_rng, ContinuousParams, EmissionTable,
    EmissionVariant, RuptureParams,
};
use crate::sensor::{QuantumSensorModel, SensorParams, SteadyStateSolver};
use crate::signal::emissions_from_signal;
use crate::surface::{SurfaceAccumulationField, SurfaceParams, TerrainMap};
use crate::units::transit_years;

/// Subsurface emission source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourcePosition {
    pub x: usize,
    pub y: usize,
    /// Depth below the surface (m)
    pub depth: f64,
}

/// Surface sensor location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorPosition {
    pub x: usize,
    pub y: usize,
}

/// Where the emission timeline comes from.
#[derive(Debug, Clone)]
pub enum EmissionSource {
    /// Stick-slip ruptures, one step per rupture.
    EventTriggered(RuptureParams),
    /// Continuous leakage, one step per fixed time step.
    Continuous(ContinuousParams),
    /// External driving signal, one step per sample.
    ///
    /// Every sample is injected at every source on its own step; transit
    /// delay is not applied.
    Signal(Vec<f64>),
}

impl EmissionSource {
    /// Step size used for the arrival window (years).
    pub fn dt_yr(&self) -> f64 {
        match self {
            EmissionSource::EventTriggered(p) => p.dt_yr,
            EmissionSource::Continuous(p) => p.dt_yr,
            EmissionSource::Signal(_) => 1.0,
        }
    }

    fn generate(&self, seed: u64) -> Result<EmissionTable, SimError> {
        let mut rng = StdRng::seed_from_u64(seed);
        match self {
            EmissionSource::EventTriggered(p) => simulate_stick_slip_with_rng(p, &mut rng),
            EmissionSource::Continuous(p) => simulate_continuous_with_rng(p, &mut rng),
            EmissionSource::Signal(data) => emissions_from_signal(data),
        }
    }
}

/// Everything needed to run the pipeline.
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    pub terrain: TerrainMap,
    pub sources: Vec<SourcePosition>,
    pub sensors: Vec<SensorPosition>,
    pub emission: EmissionSource,
    pub surface: SurfaceParams,
    pub burst: BurstParams,
    pub sensor: SensorParams,
    /// Upward carrier velocity (m/s)
    pub v_upward: f64,
    pub seed: u64,
}

impl SimulationConfig {
    /// Defaults for a 500-year run at one-year steps.
    pub fn new(terrain: TerrainMap) -> Self {
        Self {
            terrain,
            sources: Vec::new(),
            sensors: Vec::new(),
            emission: EmissionSource::EventTriggered(RuptureParams {
                total_time_yr: 500.0,
                dt_yr: 1.0,
                ..RuptureParams::default()
            }),
            surface: SurfaceParams {
                diffusion_sigma: 5.0,
                attraction_strength: 5.0,
                ..SurfaceParams::default()
            },
            burst: BurstParams {
                threshold: 1e-2,
                gamma_conversion: 1e5,
                ..BurstParams::default()
            },
            sensor: SensorParams::rydberg_ladder(),
            v_upward: 0.01,
            seed: 42,
        }
    }

    pub fn validate(&self) -> Result<(), SimError> {
        require_positive("v_upward", self.v_upward)?;
        for src in &self.sources {
            self.terrain.check_index("source", src.x, src.y)?;
            require_non_negative("source.depth", src.depth)?;
        }
        for sensor in &self.sensors {
            self.terrain.check_index("sensor", sensor.x, sensor.y)?;
        }
        self.surface.validate()?;
        self.burst.validate()?;
        self.sensor.validate()
    }
}

/// Per-band burst energies, indexed `[t, x, y]`.
#[derive(Debug, Clone, PartialEq)]
pub struct BurstMaps {
    pub e_uv: Array3<f64>,
    pub e_visnir: Array3<f64>,
    pub e_ir: Array3<f64>,
}

impl BurstMaps {
    fn zeros(nt: usize, nx: usize, ny: usize) -> Self {
        Self {
            e_uv: Array3::zeros((nt, nx, ny)),
            e_visnir: Array3::zeros((nt, nx, ny)),
            e_ir: Array3::zeros((nt, nx, ny)),
        }
    }

    pub fn get(&self, t: usize, x: usize, y: usize) -> BurstInfo {
        BurstInfo {
            e_uv: self.e_uv[[t, x, y]],
            e_visnir: self.e_visnir[[t, x, y]],
            e_ir: self.e_ir[[t, x, y]],
        }
    }
}

/// Write-once output buffers filled step by step.
#[derive(Debug, Clone)]
pub struct OutputBuffers {
    /// Accumulated holes after each step, `[t, x, y]`
    pub ground_accumulation: Array3<f64>,
    pub bursts: BurstMaps,
    /// Steady-state matrices, `[t, sensor, i, j]`
    pub measurements: Array4<Complex64>,
    /// True where the sensor solve failed and a NaN sentinel was recorded
    pub sensor_failures: Array2<bool>,
    /// Number of cells that burst at each step
    pub burst_counts: Vec<usize>,
}

impl OutputBuffers {
    fn new(nt: usize, nx: usize, ny: usize, n_sensors: usize) -> Self {
        Self {
            ground_accumulation: Array3::zeros((nt, nx, ny)),
            bursts: BurstMaps::zeros(nt, nx, ny),
            measurements: Array4::zeros((nt, n_sensors, LEVELS, LEVELS)),
            sensor_failures: Array2::from_elem((nt, n_sensors), false),
            burst_counts: vec![0; nt],
        }
    }

    fn record_measurement(&mut self, t: usize, sensor: usize, rho: &DensityMatrix) {
        let mut slot = self.measurements.slice_mut(s![t, sensor, .., ..]);
        for ((i, j), z) in slot.indexed_iter_mut() {
            *z = rho.get(i, j);
        }
    }
}

/// Mutable bundle carried from one step to the next.
#[derive(Debug, Clone)]
pub struct SimulationState {
    /// Current hole accumulation per cell
    pub grid: Array2<f64>,
    /// Index of the next step to run
    pub step: usize,
    /// Per source: first emission that can still arrive
    cursors: Vec<usize>,
    pub outputs: OutputBuffers,
}

/// What happened during one step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepReport {
    pub step: usize,
    pub time_years: f64,
    pub injections: usize,
    pub bursts: usize,
    pub sensor_failures: usize,
}

/// Final product of a run.
#[derive(Debug, Clone)]
pub struct SimulationOutput {
    pub emissions: EmissionTable,
    pub ground_accumulation: Array3<f64>,
    pub bursts: BurstMaps,
    pub measurements: Array4<Complex64>,
    pub sensor_failures: Array2<bool>,
    pub burst_counts: Vec<usize>,
}

impl SimulationOutput {
    pub fn n_timesteps(&self) -> usize {
        self.ground_accumulation.len_of(Axis(0))
    }

    pub fn measurement(&self, t: usize, sensor: usize) -> DensityMatrix {
        let mut elements = [Complex64::new(0.0, 0.0); LEVELS * LEVELS];
        for (k, z) in self
            .measurements
            .slice(s![t, sensor, .., ..])
            .iter()
            .enumerate()
        {
            elements[k] = *z;
        }
        DensityMatrix::from_elements(elements)
    }

    pub fn snapshot(&self, t: usize) -> Array2<f64> {
        self.ground_accumulation.index_axis(Axis(0), t).to_owned()
    }

    pub fn total_accumulation(&self, t: usize) -> f64 {
        self.ground_accumulation.index_axis(Axis(0), t).sum()
    }
}

#[derive(Debug, Clone)]
enum ArrivalGating {
    /// Arrival = emission time + per-source delay, matched within ±dt/2.
    TransitDelay { delays: Vec<f64>, half_window: f64 },
    /// Emission `t` arrives at step `t` at every source.
    SameStep,
}

/// Drives the pipeline over the emission timeline.
#[derive(Debug, Clone)]
pub struct SimulationOrchestrator<S = LiouvillianSolver> {
    emissions: EmissionTable,
    times: Vec<f64>,
    field: SurfaceAccumulationField,
    detector: IonizationBurstDetector,
    sensor_model: QuantumSensorModel<S>,
    zero_burst_reading: Result<DensityMatrix, SolverError>,
    sources: Vec<SourcePosition>,
    sensors: Vec<SensorPosition>,
    gating: ArrivalGating,
}

impl SimulationOrchestrator<LiouvillianSolver> {
    pub fn new(config: SimulationConfig) -> Result<Self, SimError> {
        Self::with_solver(config, LiouvillianSolver)
    }
}

impl<S: SteadyStateSolver> SimulationOrchestrator<S> {
    /// Validate the configuration, generate the emission timeline from the
    /// seed, and bind the per-step components.
    pub fn with_solver(config: SimulationConfig, solver: S) -> Result<Self, SimError> {
        config.validate()?;
        let emissions = config.emission.generate(config.seed)?;
        Self::assemble(config, emissions, solver)
    }

    /// Use an already generated emission table instead of the configured source.
    pub fn from_emissions(
        config: SimulationConfig,
        emissions: EmissionTable,
        solver: S,
    ) -> Result<Self, SimError> {
        config.validate()?;
        Self::assemble(config, emissions, solver)
    }

    /// Bind a validated configuration to its emission table.
    fn assemble(
        config: SimulationConfig,
        emissions: EmissionTable,
        solver: S,
    ) -> Result<Self, SimError> {
        let gating = match emissions.variant() {
            EmissionVariant::Signal => ArrivalGating::SameStep,
            EmissionVariant::EventTriggered | EmissionVariant::Continuous => {
                ArrivalGating::TransitDelay {
                    delays: config
                        .sources
                        .iter()
                        .map(|src| transit_years(src.depth, config.v_upward))
                        .collect(),
                    half_window: config.emission.dt_yr() / 2.0,
                }
            }
        };
        let field = SurfaceAccumulationField::new(config.terrain, config.surface)?;
        let detector = IonizationBurstDetector::new(config.burst)?;
        let sensor_model = QuantumSensorModel::with_solver(config.sensor, solver)?;
        let zero_burst_reading = sensor_model.unperturbed();
        let times = emissions.times();

        info!(
            "simulation ready: grid {:?}, {} emissions, {} sources, {} sensors",
            field.terrain().dim(),
            emissions.len(),
            config.sources.len(),
            config.sensors.len()
        );

        Ok(Self {
            emissions,
            times,
            field,
            detector,
            sensor_model,
            zero_burst_reading,
            sources: config.sources,
            sensors: config.sensors,
            gating,
        })
    }

    pub fn emissions(&self) -> &EmissionTable {
        &self.emissions
    }

    pub fn n_timesteps(&self) -> usize {
        self.times.len()
    }

    /// Fresh state at step zero with all outputs allocated.
    pub fn initial_state(&self) -> SimulationState {
        let (nx, ny) = self.field.terrain().dim();
        SimulationState {
            grid: self.field.empty_grid(),
            step: 0,
            cursors: vec![0; self.sources.len()],
            outputs: OutputBuffers::new(self.n_timesteps(), nx, ny, self.sensors.len()),
        }
    }

    pub fn is_finished(&self, state: &SimulationState) -> bool {
        state.step >= self.n_timesteps()
    }

    /// `(emission index, source index)` pairs arriving at step `t`, in
    /// emission-major order.
    fn arrivals(&self, cursors: &mut [usize], t: usize, now: f64) -> Vec<(usize, usize)> {
        match &self.gating {
            ArrivalGating::SameStep => (0..self.sources.len()).map(|s| (t, s)).collect(),
            ArrivalGating::TransitDelay {
                delays,
                half_window,
            } => {
                let records = self.emissions.records();
                let mut hits = Vec::new();
                for (s, (&delay, cursor)) in delays.iter().zip(cursors.iter_mut()).enumerate() {
                    while *cursor < records.len()
                        && now - (records[*cursor].time_years + delay) >= *half_window
                    {
                        *cursor += 1;
                    }
                    for (offset, record) in records[*cursor..].iter().enumerate() {
                        let lag = record.time_years + delay - now;
                        if lag >= *half_window {
                            break;
                        }
                        if lag.abs() < *half_window {
                            hits.push((*cursor + offset, s));
                        }
                    }
                }
                hits.sort_unstable();
                hits
            }
        }
    }

    /// Zero every cell at or above threshold and record its burst at step `t`.
    fn burst_pass(&self, grid: &mut Array2<f64>, bursts: &mut BurstMaps, t: usize) -> usize {
        let fired = grid.iter().filter(|&&h| h >= self.detector.threshold()).count();
        if fired == 0 {
            return 0;
        }
        let detector = &self.detector;
        let zip = Zip::from(grid)
            .and(bursts.e_uv.index_axis_mut(Axis(0), t))
            .and(bursts.e_visnir.index_axis_mut(Axis(0), t))
            .and(bursts.e_ir.index_axis_mut(Axis(0), t));
        let apply = |h: &mut f64, uv: &mut f64, vis: &mut f64, ir: &mut f64| {
            if let Some(b) = detector.fire(*h) {
                *uv = b.e_uv;
                *vis = b.e_visnir;
                *ir = b.e_ir;
                *h = 0.0;
            }
        };
        #[cfg(feature = "parallel")]
        zip.par_for_each(apply);
        #[cfg(not(feature = "parallel"))]
        zip.for_each(apply);
        fired
    }

    /// Run one step, advancing `state.step` by one.
    pub fn step(&self, state: &mut SimulationState) -> Result<StepReport, SimError> {
        let t = state.step;
        if t >= self.n_timesteps() {
            return Err(SimError::invalid(
                "step",
                format!("timeline has {} steps, step {t} requested", self.n_timesteps()),
            ));
        }
        let now = self.times[t];

        let hits = self.arrivals(&mut state.cursors, t, now);
        let records = self.emissions.records();
        for &(e, s) in &hits {
            let src = &self.sources[s];
            self.field
                .update(&mut state.grid, src.x, src.y, records[e].emission_q)?;
        }

        let bursts = self.burst_pass(&mut state.grid, &mut state.outputs.bursts, t);
        state.outputs.burst_counts[t] = bursts;

        let mut sensor_failures = 0;
        for (k, pos) in self.sensors.iter().enumerate() {
            let burst = state.outputs.bursts.get(t, pos.x, pos.y);
            let reading = if burst.is_zero() {
                self.zero_burst_reading.clone()
            } else {
                self.sensor_model.measure(&burst)
            };
            let rho = match reading {
                Ok(rho) => rho,
                Err(e) => {
                    warn!("sensor {k} at ({}, {}) step {t}: {e}", pos.x, pos.y);
                    state.outputs.sensor_failures[[t, k]] = true;
                    sensor_failures += 1;
                    DensityMatrix::nan()
                }
            };
            state.outputs.record_measurement(t, k, &rho);
        }

        state
            .outputs
            .ground_accumulation
            .index_axis_mut(Axis(0), t)
            .assign(&state.grid);
        state.step += 1;

        debug!(
            "step {t} (t={now} yr): {} injections, {bursts} bursts, total holes {:.3e}",
            hits.len(),
            state.grid.sum()
        );

        Ok(StepReport {
            step: t,
            time_years: now,
            injections: hits.len(),
            bursts,
            sensor_failures,
        })
    }

    /// Run every remaining step and hand back the outputs.
    pub fn run(&self) -> Result<SimulationOutput, SimError> {
        let mut state = self.initial_state();
        let mut failures = 0;
        while !self.is_finished(&state) {
            failures += self.step(&mut state)?.sensor_failures;
        }
        info!(
            "simulation finished: {} steps, {} bursts, {} sensor failures",
            state.step,
            state.outputs.burst_counts.iter().sum::<usize>(),
            failures
        );
        Ok(self.finish(state))
    }

    /// Package a state's outputs together with the emission table.
    pub fn finish(&self, state: SimulationState) -> SimulationOutput {
        let OutputBuffers {
            ground_accumulation,
            bursts,
            measurements,
            sensor_failures,
            burst_counts,
        } = state.outputs;
        SimulationOutput {
            emissions: self.emissions.clone(),
            ground_accumulation,
            bursts,
            measurements,
            sensor_failures,
            burst_counts,
        }
    }
}

/// Build and run the pipeline with the default steady-state solver.
pub fn run_simulation(config: SimulationConfig) -> Result<SimulationOutput, SimError> {
    SimulationOrchestrator::new(config)?.run()
}
