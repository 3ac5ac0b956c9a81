//! Steady state of the driven three-level ladder.
//!
//! Solves 0 = L[ρ] for the GKSL generator
//!
//!   L[ρ] = -i[H, ρ] + Σ_k (L_k ρ L_k† - ½{L_k†L_k, ρ})
//!
//! with, in the rotating frame (ℏ = 1),
//!
//!   H = -Δp |1⟩⟨1| - (Δp + Δc) |2⟩⟨2|
//!       + Ωp/2 (|0⟩⟨1| + |1⟩⟨0|) + Ωc/2 (|1⟩⟨2| + |2⟩⟨1|)
//!
//!   L_1 = √Γ₁ |0⟩⟨1|   (intermediate → ground)
//!   L_2 = √Γ₂ |1⟩⟨2|   (Rydberg → intermediate)
//!
//! The generator is assembled as a 9×9 superoperator acting on row-major
//! vec(ρ). It has a one-dimensional null space, so the ρ₀₀ equation is
//! replaced by Tr ρ = 1 and the system is solved by LU decomposition.
//!
//! All rates are divided by the largest one before assembly; the steady
//! state is invariant under a common rescaling of time.

use nalgebra::{DMatrix, DVector, Matrix3};
use num_complex::Complex64;

use crate::density::{DensityMatrix, LEVELS};
use crate::error::SolverError;
use crate::sensor::{LadderSystem, SolverOutput, SteadyStateSolver};

const DIM: usize = LEVELS * LEVELS;

/// Direct null-space solver for the ladder Liouvillian.
#[derive(Debug, Clone, Copy, Default)]
pub struct LiouvillianSolver;

fn zero() -> Complex64 {
    Complex64::new(0.0, 0.0)
}

fn real(x: f64) -> Complex64 {
    Complex64::new(x, 0.0)
}

fn hamiltonian(sys: &LadderSystem, scale: f64) -> Matrix3<Complex64> {
    let mut h = Matrix3::from_element(zero());
    h[(1, 1)] = real(-sys.probe_detuning / scale);
    h[(2, 2)] = real(-(sys.probe_detuning + sys.coupling_detuning) / scale);
    let half_p = real(0.5 * sys.probe_rabi / scale);
    let half_c = real(0.5 * sys.coupling_rabi / scale);
    h[(0, 1)] = half_p;
    h[(1, 0)] = half_p;
    h[(1, 2)] = half_c;
    h[(2, 1)] = half_c;
    h
}

fn collapse_operators(sys: &LadderSystem, scale: f64) -> [Matrix3<Complex64>; 2] {
    let mut l1 = Matrix3::from_element(zero());
    l1[(0, 1)] = real((sys.intermediate_decay / scale).sqrt());
    let mut l2 = Matrix3::from_element(zero());
    l2[(1, 2)] = real((sys.rydberg_decay / scale).sqrt());
    [l1, l2]
}

/// Apply the generator to a single 3×3 operator.
fn generator(
    h: &Matrix3<Complex64>,
    jumps: &[Matrix3<Complex64>; 2],
    rho: &Matrix3<Complex64>,
) -> Matrix3<Complex64> {
    let minus_i = Complex64::new(0.0, -1.0);
    let mut drho = (h * rho - rho * h) * minus_i;
    for l in jumps {
        let ld = l.adjoint();
        let ldl = ld * l;
        drho += l * rho * ld - (ldl * rho + rho * ldl) * real(0.5);
    }
    drho
}

/// Superoperator matrix of the generator on row-major vec(ρ).
pub fn liouvillian(sys: &LadderSystem) -> DMatrix<Complex64> {
    let scale = sys.rate_scale();
    let h = hamiltonian(sys, scale);
    let jumps = collapse_operators(sys, scale);

    let mut sup = DMatrix::from_element(DIM, DIM, zero());
    for k in 0..LEVELS {
        for l in 0..LEVELS {
            let mut basis = Matrix3::from_element(zero());
            basis[(k, l)] = real(1.0);
            let image = generator(&h, &jumps, &basis);
            let col = k * LEVELS + l;
            for i in 0..LEVELS {
                for j in 0..LEVELS {
                    sup[(i * LEVELS + j, col)] = image[(i, j)];
                }
            }
        }
    }
    sup
}

impl LiouvillianSolver {
    /// Full steady-state matrix, trace one.
    pub fn steady_state(&self, sys: &LadderSystem) -> Result<DensityMatrix, SolverError> {
        sys.validate()?;
        let mut sup = liouvillian(sys);
        for col in 0..DIM {
            sup[(0, col)] = zero();
        }
        for k in 0..LEVELS {
            sup[(0, k * LEVELS + k)] = real(1.0);
        }
        let mut rhs = DVector::from_element(DIM, zero());
        rhs[0] = real(1.0);

        let solution = sup.lu().solve(&rhs).ok_or(SolverError::Singular)?;
        if solution.iter().any(|z| !z.re.is_finite() || !z.im.is_finite()) {
            return Err(SolverError::NonFinite);
        }

        let mut elements = [zero(); DIM];
        for (dst, src) in elements.iter_mut().zip(solution.iter()) {
            *dst = *src;
        }
        let rho = DensityMatrix::from_elements(elements);
        let tr = rho.trace().re;
        rho.normalized().ok_or(SolverError::TraceVanished(tr))
    }
}

impl SteadyStateSolver for LiouvillianSolver {
    /// Reports the reduced coherence vector; ρ₀₀ is left to the caller.
    fn solve(&self, system: &LadderSystem) -> Result<SolverOutput, SolverError> {
        let rho = self.steady_state(system)?;
        Ok(SolverOutput::Reduced(rho.to_reduced()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::TWO_PI_MHZ;

    fn two_level(rabi: f64, decay: f64) -> LadderSystem {
        LadderSystem {
            probe_rabi: rabi,
            coupling_rabi: 0.0,
            probe_detuning: 0.0,
            coupling_detuning: 0.0,
            intermediate_decay: decay,
            rydberg_decay: decay,
        }
    }

    #[test]
    fn steady_state_is_annihilated_by_generator() {
        let sys = LadderSystem::rydberg_defaults();
        let rho = LiouvillianSolver.steady_state(&sys).unwrap();
        let sup = liouvillian(&sys);
        let v = DVector::from_iterator(DIM, rho.elements().iter().copied());
        let residual = (&sup * v).norm();
        assert!(residual < 1e-10, "residual {}", residual);
    }

    #[test]
    fn resonant_two_level_saturation() {
        // Ωc = 0 reduces to a resonantly driven two-level atom:
        // ρ11 = Ω² / (Γ² + 2Ω²)
        let gamma = 6.0 * TWO_PI_MHZ;
        for omega in [0.1 * gamma, gamma, 3.0 * gamma] {
            let rho = LiouvillianSolver.steady_state(&two_level(omega, gamma)).unwrap();
            let expected = omega * omega / (gamma * gamma + 2.0 * omega * omega);
            let p = rho.populations();
            assert!((p[1] - expected).abs() < 1e-10, "ρ11={} expected={}", p[1], expected);
            assert!(p[2].abs() < 1e-12);
        }
    }

    #[test]
    fn undriven_atom_sits_in_ground() {
        let rho = LiouvillianSolver
            .steady_state(&two_level(0.0, 1.0))
            .unwrap();
        assert!((rho.populations()[0] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn steady_state_is_physical() {
        let mut sys = LadderSystem::rydberg_defaults();
        sys.coupling_detuning = 2.0 * TWO_PI_MHZ;
        let rho = LiouvillianSolver.steady_state(&sys).unwrap();
        assert!(rho.is_physical(1e-9), "{:?}", rho);
    }

    #[test]
    fn non_finite_parameter_is_rejected() {
        let mut sys = LadderSystem::rydberg_defaults();
        sys.probe_rabi = f64::NAN;
        assert!(LiouvillianSolver.solve(&sys).is_err());
    }

    #[test]
    fn missing_intermediate_decay_is_rejected() {
        let mut sys = LadderSystem::rydberg_defaults();
        sys.intermediate_decay = 0.0;
        assert_eq!(
            LiouvillianSolver.steady_state(&sys),
            Err(SolverError::InvalidParameter("intermediate_decay"))
        );
    }
}
