//! Stochastic stress accumulation and release on a plate boundary.
//!
//! Two loading regimes produce the emission time series consumed by the
//! surface model:
//!
//! - **Stick-slip** ([`StickSlipProcess`]): stress builds at `k·V·dt` per step
//!   and is released only when it reaches a failure threshold drawn fresh
//!   from `N(sigma_mean, sigma_std)` each cycle. A rupture emits
//!   `Q = α·(σ − σ_res)` and, for large drops, seismic output `β·Δσ²`.
//! - **Continuous leakage** ([`ContinuousProcess`]): every step emits
//!   `Q = α·σ·dt` with α redrawn each step; crossing a fixed absolute
//!   threshold adds seismic output `β·σ` and hard-resets stress.
//!
//! Both are driven by one explicitly passed RNG, so a seed fully determines
//! the resulting [`EmissionTable`].

use log::trace;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

use crate::error::{require_finite, require_non_negative, require_positive, SimError};
use crate::units::years_to_seconds;

/// Record granularity of an emission series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmissionVariant {
    /// One record per rupture.
    EventTriggered,
    /// One record per time step.
    Continuous,
    /// One record per entry of an external driving signal.
    Signal,
}

/// A single emission at the source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EmissionRecord {
    /// Simulated time of the emission (years)
    pub time_years: f64,
    /// Stress drop (event-triggered) or instantaneous stress (continuous), Pa
    pub stress_pa: f64,
    /// Emitted hole quantity Q (kg)
    pub emission_q: f64,
    /// Seismic output, zero when no seismic event accompanied the emission
    pub seismic_output: f64,
}

/// Time-ordered emission series with a fixed column contract.
#[derive(Debug, Clone, PartialEq)]
pub struct EmissionTable {
    variant: EmissionVariant,
    records: Vec<EmissionRecord>,
}

impl EmissionTable {
    pub fn new(variant: EmissionVariant) -> Self {
        Self {
            variant,
            records: Vec::new(),
        }
    }

    /// Build a table from records that are already in ascending time order.
    pub fn from_records(
        variant: EmissionVariant,
        records: Vec<EmissionRecord>,
    ) -> Result<Self, SimError> {
        if records
            .windows(2)
            .any(|w| w[1].time_years < w[0].time_years)
        {
            return Err(SimError::invalid(
                "records",
                "emission times must be non-decreasing",
            ));
        }
        if let Some(i) = records.iter().position(|r| {
            !(r.time_years.is_finite()
                && r.stress_pa.is_finite()
                && r.emission_q.is_finite()
                && r.seismic_output.is_finite())
        }) {
            return Err(SimError::invalid(
                "records",
                format!("record {i} has a non-finite value"),
            ));
        }
        Ok(Self { variant, records })
    }

    pub fn variant(&self) -> EmissionVariant {
        self.variant
    }

    /// Column names in order, as relied on by downstream consumers.
    pub fn column_names(&self) -> [&'static str; 4] {
        let stress = match self.variant {
            EmissionVariant::EventTriggered => "stress_drop_Pa",
            EmissionVariant::Continuous | EmissionVariant::Signal => "stress_Pa",
        };
        ["time_years", stress, "emission_Q", "seismic_output"]
    }

    /// Values of a named column, `None` if the name is not part of this table.
    pub fn column(&self, name: &str) -> Option<Vec<f64>> {
        let idx = self.column_names().iter().position(|c| *c == name)?;
        Some(
            self.records
                .iter()
                .map(|r| match idx {
                    0 => r.time_years,
                    1 => r.stress_pa,
                    2 => r.emission_q,
                    _ => r.seismic_output,
                })
                .collect(),
        )
    }

    pub fn records(&self) -> &[EmissionRecord] {
        &self.records
    }

    pub fn times(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.time_years).collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn total_emission(&self) -> f64 {
        self.records.iter().map(|r| r.emission_q).sum()
    }

    pub(crate) fn push(&mut self, record: EmissionRecord) {
        debug_assert!(self
            .records
            .last()
            .map_or(true, |last| last.time_years <= record.time_years));
        self.records.push(record);
    }
}

/// Mutable fault state carried across steps.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StressState {
    /// Accumulated shear stress (Pa)
    pub stress: f64,
    /// Failure threshold for the current cycle (Pa)
    pub threshold: f64,
    /// Coupling coefficient α for the current cycle (kg s⁻¹ Pa⁻¹)
    pub alpha: f64,
    /// Cumulative relaxed slip (m)
    pub slip: f64,
}

/// Parameters of the stick-slip (event-triggered) regime.
#[derive(Debug, Clone)]
pub struct RuptureParams {
    /// Simulation span (years)
    pub total_time_yr: f64,
    /// Time step (years)
    pub dt_yr: f64,
    /// Plate velocity V (m/s)
    pub velocity: f64,
    /// Shear stiffness k (Pa/m)
    pub stiffness: f64,
    /// Mean failure stress (Pa)
    pub sigma_mean: f64,
    /// Standard deviation of failure stress (Pa)
    pub sigma_std: f64,
    /// Stress left on the fault after a rupture (Pa)
    pub sigma_residual: f64,
    /// Mean coupling α (kg s⁻¹ Pa⁻¹)
    pub alpha_mean: f64,
    /// Standard deviation of α
    pub alpha_std: f64,
    /// Minimum stress drop that counts as a seismic event (Pa)
    pub seismic_threshold: f64,
    /// Seismic energy scale β
    pub beta_seismic: f64,
}

impl Default for RuptureParams {
    fn default() -> Self {
        Self {
            total_time_yr: 1_000.0,
            dt_yr: 0.01,
            velocity: 1e-9,
            stiffness: 5e10,
            sigma_mean: 50e6,
            sigma_std: 5e6,
            sigma_residual: 10e6,
            alpha_mean: 2e-6,
            alpha_std: 0.5e-6,
            seismic_threshold: 15e6,
            beta_seismic: 1e-10,
        }
    }
}

impl RuptureParams {
    /// Stick-slip cycle with no seismic channel: every record carries zero
    /// seismic output.
    pub fn stick_slip() -> Self {
        Self {
            velocity: 1.0,
            sigma_mean: 50e5,
            sigma_std: 5e3,
            seismic_threshold: f64::INFINITY,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), SimError> {
        require_positive("total_time_yr", self.total_time_yr)?;
        require_positive("dt_yr", self.dt_yr)?;
        require_finite("velocity", self.velocity)?;
        require_finite("stiffness", self.stiffness)?;
        require_finite("sigma_mean", self.sigma_mean)?;
        require_non_negative("sigma_std", self.sigma_std)?;
        require_finite("sigma_residual", self.sigma_residual)?;
        require_finite("alpha_mean", self.alpha_mean)?;
        require_non_negative("alpha_std", self.alpha_std)?;
        if self.seismic_threshold.is_nan() {
            return Err(SimError::invalid("seismic_threshold", "must not be NaN"));
        }
        require_finite("beta_seismic", self.beta_seismic)
    }

    pub fn total_steps(&self) -> usize {
        step_count(self.total_time_yr, self.dt_yr)
    }
}

/// Parameters of the continuous-leakage regime.
#[derive(Debug, Clone)]
pub struct ContinuousParams {
    /// Simulation span (years)
    pub total_time_yr: f64,
    /// Time step (years)
    pub dt_yr: f64,
    /// Plate velocity V (m/s)
    pub velocity: f64,
    /// Shear stiffness k (Pa/m)
    pub stiffness: f64,
    /// Fixed absolute stress at which the fault resets (Pa)
    pub failure_threshold: f64,
    /// Stress after a reset (Pa)
    pub residual_stress: f64,
    /// Mean coupling α (kg s⁻¹ Pa⁻¹)
    pub alpha_mean: f64,
    /// Standard deviation of α
    pub alpha_std: f64,
    /// Seismic energy scale β
    pub beta_seismic: f64,
}

impl Default for ContinuousParams {
    fn default() -> Self {
        Self {
            total_time_yr: 1_000.0,
            dt_yr: 0.01,
            velocity: 1e-9,
            stiffness: 5e10,
            failure_threshold: 50e6,
            residual_stress: 0.0,
            alpha_mean: 2e-6,
            alpha_std: 0.5e-6,
            beta_seismic: 1e-10,
        }
    }
}

impl ContinuousParams {
    pub fn validate(&self) -> Result<(), SimError> {
        require_positive("total_time_yr", self.total_time_yr)?;
        require_positive("dt_yr", self.dt_yr)?;
        require_finite("velocity", self.velocity)?;
        require_finite("stiffness", self.stiffness)?;
        require_finite("failure_threshold", self.failure_threshold)?;
        require_finite("residual_stress", self.residual_stress)?;
        require_finite("alpha_mean", self.alpha_mean)?;
        require_non_negative("alpha_std", self.alpha_std)?;
        require_finite("beta_seismic", self.beta_seismic)
    }

    pub fn total_steps(&self) -> usize {
        step_count(self.total_time_yr, self.dt_yr)
    }
}

fn step_count(total_time_yr: f64, dt_yr: f64) -> usize {
    (total_time_yr / dt_yr).floor() as usize
}

fn normal(name: &'static str, mean: f64, std: f64) -> Result<Normal<f64>, SimError> {
    Normal::new(mean, std).map_err(|e| SimError::invalid(name, e.to_string()))
}

/// Event-triggered stress release: records only at ruptures.
#[derive(Debug, Clone)]
pub struct StickSlipProcess {
    params: RuptureParams,
    threshold_dist: Normal<f64>,
    alpha_dist: Normal<f64>,
    stress_rate: f64,
    state: StressState,
    step: usize,
}

impl StickSlipProcess {
    /// Validate parameters and draw the first cycle's threshold and α.
    pub fn new<R: Rng + ?Sized>(params: RuptureParams, rng: &mut R) -> Result<Self, SimError> {
        params.validate()?;
        let threshold_dist = normal("sigma_std", params.sigma_mean, params.sigma_std)?;
        let alpha_dist = normal("alpha_std", params.alpha_mean, params.alpha_std)?;
        let stress_rate = params.stiffness * params.velocity * years_to_seconds(params.dt_yr);
        let state = StressState {
            stress: 0.0,
            threshold: threshold_dist.sample(rng),
            alpha: alpha_dist.sample(rng),
            slip: 0.0,
        };
        Ok(Self {
            params,
            threshold_dist,
            alpha_dist,
            stress_rate,
            state,
            step: 0,
        })
    }

    pub fn state(&self) -> &StressState {
        &self.state
    }

    pub fn is_finished(&self) -> bool {
        self.step >= self.params.total_steps()
    }

    /// Advance one step, returning the rupture record if the fault failed.
    pub fn advance<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Option<EmissionRecord> {
        let step = self.step;
        self.step += 1;
        self.state.stress += self.stress_rate;

        if self.state.stress < self.state.threshold {
            return None;
        }

        let p = &self.params;
        let drop = self.state.stress - p.sigma_residual;
        let emission_q = self.state.alpha * drop;
        let seismic_output = if drop >= p.seismic_threshold {
            p.beta_seismic * drop * drop
        } else {
            0.0
        };
        let record = EmissionRecord {
            time_years: step as f64 * p.dt_yr,
            stress_pa: drop,
            emission_q,
            seismic_output,
        };
        trace!("rupture at step {step}: drop={drop:.3e} Pa, Q={emission_q:.3e}");

        self.state.slip += drop / p.stiffness;
        self.state.stress = p.sigma_residual;
        self.state.threshold = self.threshold_dist.sample(rng);
        self.state.alpha = self.alpha_dist.sample(rng);
        Some(record)
    }
}

/// Continuous stress leakage: records every step.
#[derive(Debug, Clone)]
pub struct ContinuousProcess {
    params: ContinuousParams,
    alpha_dist: Normal<f64>,
    stress_rate: f64,
    dt_s: f64,
    state: StressState,
    step: usize,
}

impl ContinuousProcess {
    pub fn new(params: ContinuousParams) -> Result<Self, SimError> {
        params.validate()?;
        let alpha_dist = normal("alpha_std", params.alpha_mean, params.alpha_std)?;
        let dt_s = years_to_seconds(params.dt_yr);
        let state = StressState {
            stress: 0.0,
            threshold: params.failure_threshold,
            alpha: params.alpha_mean,
            slip: 0.0,
        };
        Ok(Self {
            stress_rate: params.stiffness * params.velocity * dt_s,
            params,
            alpha_dist,
            dt_s,
            state,
            step: 0,
        })
    }

    pub fn state(&self) -> &StressState {
        &self.state
    }

    pub fn is_finished(&self) -> bool {
        self.step >= self.params.total_steps()
    }

    /// Advance one step. α is redrawn before it is used for this step's
    /// emission; the record carries the stress before any reset.
    pub fn advance<R: Rng + ?Sized>(&mut self, rng: &mut R) -> EmissionRecord {
        let step = self.step;
        self.step += 1;
        let p = &self.params;

        self.state.stress += self.stress_rate;
        self.state.alpha = self.alpha_dist.sample(rng);
        let stress = self.state.stress;
        let emission_q = self.state.alpha * stress * self.dt_s;

        let seismic_output = if stress >= p.failure_threshold {
            trace!("reset at step {step}: stress={stress:.3e} Pa");
            self.state.slip += (stress - p.residual_stress) / p.stiffness;
            self.state.stress = p.residual_stress;
            p.beta_seismic * stress
        } else {
            0.0
        };

        EmissionRecord {
            time_years: step as f64 * p.dt_yr,
            stress_pa: stress,
            emission_q,
            seismic_output,
        }
    }
}

/// Run the stick-slip regime to completion.
pub fn simulate_stick_slip_with_rng<R: Rng + ?Sized>(
    params: &RuptureParams,
    rng: &mut R,
) -> Result<EmissionTable, SimError> {
    let mut process = StickSlipProcess::new(params.clone(), rng)?;
    let mut table = EmissionTable::new(EmissionVariant::EventTriggered);
    while !process.is_finished() {
        if let Some(record) = process.advance(rng) {
            table.push(record);
        }
    }
    Ok(table)
}

/// Run the stick-slip regime from a seed.
pub fn simulate_stick_slip(params: &RuptureParams, seed: u64) -> Result<EmissionTable, SimError> {
    let mut rng = StdRng::seed_from_u64(seed);
    simulate_stick_slip_with_rng(params, &mut rng)
}

/// Run the continuous regime to completion.
pub fn simulate_continuous_with_rng<R: Rng + ?Sized>(
    params: &ContinuousParams,
    rng: &mut R,
) -> Result<EmissionTable, SimError> {
    let mut process = ContinuousProcess::new(params.clone())?;
    let mut table = EmissionTable::new(EmissionVariant::Continuous);
    while !process.is_finished() {
        table.push(process.advance(rng));
    }
    Ok(table)
}

/// Run the continuous regime from a seed.
pub fn simulate_continuous(params: &ContinuousParams, seed: u64) -> Result<EmissionTable, SimError> {
    let mut rng = StdRng::seed_from_u64(seed);
    simulate_continuous_with_rng(params, &mut rng)
}
