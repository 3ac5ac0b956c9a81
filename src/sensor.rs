//! Rydberg ladder sensor driven by burst energy.
//!
//! A burst perturbs the ladder's drive parameters band by band:
//!
//! | Band    | Effect                                          |
//! |---------|-------------------------------------------------|
//! | UV      | probe Rabi frequency × (1 + g_uv·E_uv/E₀)       |
//! | Vis-NIR | coupling Rabi frequency × (1 + g_vis·E_vis/E₀)  |
//! | IR      | coupling detuning + δ_ir·E_ir/E₀                |
//!
//! with E₀ = 1 mJ. The steady state of the perturbed ladder is the synthetic
//! measurement. The numerical solve sits behind [`SteadyStateSolver`] so any
//! backend that returns either the reduced coherence vector or the full
//! matrix can be plugged in.

use crate::burst::BurstInfo;
use crate::density::{DensityMatrix, ReducedRho};
use crate::error::{require_finite, require_positive, SimError, SolverError};
use crate::lindblad::LiouvillianSolver;
use crate::units::TWO_PI_MHZ;

/// Drive and decay parameters of the three-level ladder (rad/s).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LadderSystem {
    /// Probe Rabi frequency Ωp on |0⟩↔|1⟩
    pub probe_rabi: f64,
    /// Coupling Rabi frequency Ωc on |1⟩↔|2⟩
    pub coupling_rabi: f64,
    /// Probe detuning Δp
    pub probe_detuning: f64,
    /// Coupling detuning Δc
    pub coupling_detuning: f64,
    /// Decay |1⟩→|0⟩ (Γ₁), must be > 0
    pub intermediate_decay: f64,
    /// Decay |2⟩→|1⟩ (Γ₂)
    pub rydberg_decay: f64,
}

impl LadderSystem {
    /// Unperturbed Rydberg ladder: Ωp = 2π·1 MHz, Ωc = 2π·5 MHz,
    /// Γ₁ = 2π·6 MHz, Γ₂ = 2π·0.5 MHz, both fields resonant.
    pub fn rydberg_defaults() -> Self {
        Self {
            probe_rabi: TWO_PI_MHZ,
            coupling_rabi: 5.0 * TWO_PI_MHZ,
            probe_detuning: 0.0,
            coupling_detuning: 0.0,
            intermediate_decay: 6.0 * TWO_PI_MHZ,
            rydberg_decay: 0.5 * TWO_PI_MHZ,
        }
    }

    pub fn validate(&self) -> Result<(), SolverError> {
        let finite = [
            ("probe_rabi", self.probe_rabi),
            ("coupling_rabi", self.coupling_rabi),
            ("probe_detuning", self.probe_detuning),
            ("coupling_detuning", self.coupling_detuning),
            ("intermediate_decay", self.intermediate_decay),
            ("rydberg_decay", self.rydberg_decay),
        ];
        if let Some((name, _)) = finite.iter().find(|(_, v)| !v.is_finite()) {
            return Err(SolverError::InvalidParameter(*name));
        }
        if self.intermediate_decay <= 0.0 {
            return Err(SolverError::InvalidParameter("intermediate_decay"));
        }
        if self.rydberg_decay < 0.0 {
            return Err(SolverError::InvalidParameter("rydberg_decay"));
        }
        Ok(())
    }

    /// Largest rate magnitude in the system.
    pub fn rate_scale(&self) -> f64 {
        [
            self.probe_rabi,
            self.coupling_rabi,
            self.probe_detuning,
            self.coupling_detuning,
            self.intermediate_decay,
            self.rydberg_decay,
        ]
        .iter()
        .fold(0.0f64, |m, v| m.max(v.abs()))
    }
}

/// What a steady-state backend hands back.
#[derive(Debug, Clone, PartialEq)]
pub enum SolverOutput {
    /// Every element except ρ₀₀, see [`crate::density::ReducedRho`].
    Reduced(ReducedRho),
    /// Full matrix, not necessarily trace-normalised.
    Full(DensityMatrix),
}

/// Steady-state backend for the ladder.
pub trait SteadyStateSolver {
    fn solve(&self, system: &LadderSystem) -> Result<SolverOutput, SolverError>;
}

/// How burst energy perturbs the ladder.
#[derive(Debug, Clone)]
pub struct SensorParams {
    pub base: LadderSystem,
    /// Energy normalisation E₀ (J)
    pub energy_unit: f64,
    /// Fractional probe Rabi increase per E₀ of UV
    pub uv_rabi_gain: f64,
    /// Fractional coupling Rabi increase per E₀ of Vis-NIR
    pub visnir_rabi_gain: f64,
    /// Coupling detuning shift per E₀ of IR (rad/s)
    pub ir_detuning_shift: f64,
}

impl Default for SensorParams {
    fn default() -> Self {
        Self::rydberg_ladder()
    }
}

impl SensorParams {
    /// 5 % Rabi increase per mJ of UV or Vis-NIR, 1 MHz detuning per mJ of IR.
    pub fn rydberg_ladder() -> Self {
        Self {
            base: LadderSystem::rydberg_defaults(),
            energy_unit: 1e-3,
            uv_rabi_gain: 0.05,
            visnir_rabi_gain: 0.05,
            ir_detuning_shift: TWO_PI_MHZ,
        }
    }

    pub fn validate(&self) -> Result<(), SimError> {
        self.base
            .validate()
            .map_err(|e| SimError::invalid("sensor.base", e.to_string()))?;
        require_positive("energy_unit", self.energy_unit)?;
        require_finite("uv_rabi_gain", self.uv_rabi_gain)?;
        require_finite("visnir_rabi_gain", self.visnir_rabi_gain)?;
        require_finite("ir_detuning_shift", self.ir_detuning_shift)
    }
}

/// Maps a burst to a perturbed ladder and solves for its steady state.
#[derive(Debug, Clone)]
pub struct QuantumSensorModel<S = LiouvillianSolver> {
    params: SensorParams,
    solver: S,
}

impl QuantumSensorModel<LiouvillianSolver> {
    pub fn new(params: SensorParams) -> Result<Self, SimError> {
        Self::with_solver(params, LiouvillianSolver)
    }
}

impl<S: SteadyStateSolver> QuantumSensorModel<S> {
    pub fn with_solver(params: SensorParams, solver: S) -> Result<Self, SimError> {
        params.validate()?;
        Ok(Self { params, solver })
    }

    pub fn params(&self) -> &SensorParams {
        &self.params
    }

    /// Ladder parameters after applying the burst.
    pub fn perturbed_system(&self, burst: &BurstInfo) -> LadderSystem {
        let p = &self.params;
        let base = &p.base;
        LadderSystem {
            probe_rabi: base.probe_rabi * (1.0 + p.uv_rabi_gain * burst.e_uv / p.energy_unit),
            coupling_rabi: base.coupling_rabi
                * (1.0 + p.visnir_rabi_gain * burst.e_visnir / p.energy_unit),
            coupling_detuning: base.coupling_detuning
                + p.ir_detuning_shift * burst.e_ir / p.energy_unit,
            ..*base
        }
    }

    /// Steady-state density matrix for this burst, trace one.
    pub fn measure(&self, burst: &BurstInfo) -> Result<DensityMatrix, SolverError> {
        let system = self.perturbed_system(burst);
        let rho = match self.solver.solve(&system)? {
            SolverOutput::Reduced(reduced) => DensityMatrix::from_reduced(&reduced),
            SolverOutput::Full(full) => {
                let tr = full.trace().re;
                full.normalized().ok_or(SolverError::TraceVanished(tr))?
            }
        };
        if !rho.is_finite() {
            return Err(SolverError::NonFinite);
        }
        Ok(rho)
    }

    /// Steady state with no burst.
    pub fn unperturbed(&self) -> Result<DensityMatrix, SolverError> {
        self.measure(&BurstInfo::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_complex::Complex64;

    struct FullScaled;

    impl SteadyStateSolver for FullScaled {
        fn solve(&self, system: &LadderSystem) -> Result<SolverOutput, SolverError> {
            let rho = LiouvillianSolver.steady_state(system)?;
            let scaled = (*rho.elements()).map(|z| z * 4.0);
            Ok(SolverOutput::Full(DensityMatrix::from_elements(scaled)))
        }
    }

    struct Diverging;

    impl SteadyStateSolver for Diverging {
        fn solve(&self, _: &LadderSystem) -> Result<SolverOutput, SolverError> {
            Err(SolverError::Singular)
        }
    }

    fn model() -> QuantumSensorModel {
        QuantumSensorModel::new(SensorParams::rydberg_ladder()).unwrap()
    }

    #[test]
    fn zero_burst_is_unperturbed_steady_state() {
        let m = model();
        let direct = LiouvillianSolver
            .steady_state(&LadderSystem::rydberg_defaults())
            .unwrap();
        let measured = m.measure(&BurstInfo::ZERO).unwrap();
        assert_eq!(m.perturbed_system(&BurstInfo::ZERO), LadderSystem::rydberg_defaults());
        for (a, b) in measured.elements().iter().zip(direct.elements().iter()) {
            assert!((a - b).norm() < 1e-12);
        }
    }

    #[test]
    fn measurements_are_physical_across_energies() {
        let m = model();
        for e in [0.0, 1e-4, 1e-3, 5e-3, 0.1] {
            let burst = BurstInfo {
                e_uv: 0.4 * e,
                e_visnir: 0.3 * e,
                e_ir: 0.3 * e,
            };
            let rho = m.measure(&burst).unwrap();
            assert!(rho.is_physical(1e-8), "energy {} gave {:?}", e, rho);
            let p = rho.populations();
            assert!((p.iter().sum::<f64>() - 1.0).abs() < 1e-10);
        }
    }

    #[test]
    fn band_mapping() {
        let m = model();
        let sys = m.perturbed_system(&BurstInfo {
            e_uv: 1e-3,
            e_visnir: 2e-3,
            e_ir: 0.5e-3,
        });
        let base = LadderSystem::rydberg_defaults();
        assert!((sys.probe_rabi - base.probe_rabi * 1.05).abs() < 1e-6);
        assert!((sys.coupling_rabi - base.coupling_rabi * 1.10).abs() < 1e-6);
        assert!((sys.coupling_detuning - 0.5 * TWO_PI_MHZ).abs() < 1e-6);
        assert_eq!(sys.probe_detuning, 0.0);
    }

    #[test]
    fn stronger_uv_drive_depletes_ground() {
        let m = model();
        let quiet = m.unperturbed().unwrap().populations()[0];
        let driven = m
            .measure(&BurstInfo {
                e_uv: 20e-3,
                ..BurstInfo::ZERO
            })
            .unwrap()
            .populations()[0];
        assert!(driven < quiet, "{} !< {}", driven, quiet);
    }

    #[test]
    fn full_output_is_trace_normalised() {
        let m = QuantumSensorModel::with_solver(SensorParams::default(), FullScaled).unwrap();
        let rho = m.unperturbed().unwrap();
        assert!((rho.trace() - Complex64::new(1.0, 0.0)).norm() < 1e-12);
    }

    #[test]
    fn solver_failure_propagates() {
        let m = QuantumSensorModel::with_solver(SensorParams::default(), Diverging).unwrap();
        assert_eq!(m.unperturbed(), Err(SolverError::Singular));
    }

    #[test]
    fn invalid_base_rejected() {
        let mut params = SensorParams::default();
        params.base.intermediate_decay = -1.0;
        assert!(QuantumSensorModel::new(params).is_err());
    }
}
