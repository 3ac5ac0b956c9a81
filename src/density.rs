//! 3×3 density matrices for the three-level ladder.
//!
//! Levels: |0⟩ ground, |1⟩ intermediate, |2⟩ Rydberg.
//!
//! Steady-state solvers may hand back a reduced 8-element vector that omits
//! ρ₀₀; [`DensityMatrix::from_reduced`] rebuilds the full matrix and fixes
//! ρ₀₀ from the trace condition.

use num_complex::Complex64;

/// Number of levels in the ladder.
pub const LEVELS: usize = 3;

/// Reduced coherence vector: every element of ρ except ρ₀₀, in the order
/// `[ρ10, ρ20, ρ01, ρ21, ρ02, ρ12, ρ11, ρ22]`.
pub type ReducedRho = [Complex64; 8];

const REDUCED_LAYOUT: [(usize, usize); 8] = [
    (1, 0),
    (2, 0),
    (0, 1),
    (2, 1),
    (0, 2),
    (1, 2),
    (1, 1),
    (2, 2),
];

/// Row-major 3×3 complex density matrix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DensityMatrix {
    elements: [Complex64; LEVELS * LEVELS],
}

impl DensityMatrix {
    pub fn from_elements(elements: [Complex64; LEVELS * LEVELS]) -> Self {
        Self { elements }
    }

    /// Pure ground state |0⟩⟨0|.
    pub fn ground() -> Self {
        let mut elements = [Complex64::new(0.0, 0.0); LEVELS * LEVELS];
        elements[0] = Complex64::new(1.0, 0.0);
        Self { elements }
    }

    /// Sentinel recorded when a steady-state solve fails.
    pub fn nan() -> Self {
        Self {
            elements: [Complex64::new(f64::NAN, f64::NAN); LEVELS * LEVELS],
        }
    }

    /// Rebuild the full matrix from a reduced vector, setting
    /// `ρ00 = 1 − Re ρ11 − Re ρ22` so the trace is one.
    pub fn from_reduced(reduced: &ReducedRho) -> Self {
        let mut elements = [Complex64::new(0.0, 0.0); LEVELS * LEVELS];
        for (value, &(i, j)) in reduced.iter().zip(REDUCED_LAYOUT.iter()) {
            elements[i * LEVELS + j] = *value;
        }
        let rho00 = 1.0 - elements[4].re - elements[8].re;
        elements[0] = Complex64::new(rho00, 0.0);
        Self { elements }
    }

    /// Inverse of [`from_reduced`](Self::from_reduced).
    pub fn to_reduced(&self) -> ReducedRho {
        REDUCED_LAYOUT.map(|(i, j)| self.get(i, j))
    }

    /// Divide by the trace. `None` if the trace is zero or not finite.
    pub fn normalized(&self) -> Option<Self> {
        let tr = self.trace().re;
        if !tr.is_finite() || tr.abs() < f64::EPSILON {
            return None;
        }
        Some(Self {
            elements: self.elements.map(|z| z / tr),
        })
    }

    #[inline]
    pub fn get(&self, i: usize, j: usize) -> Complex64 {
        self.elements[i * LEVELS + j]
    }

    pub fn elements(&self) -> &[Complex64; LEVELS * LEVELS] {
        &self.elements
    }

    pub fn trace(&self) -> Complex64 {
        (0..LEVELS).map(|k| self.get(k, k)).sum()
    }

    /// Real parts of the diagonal: (ground, intermediate, Rydberg).
    pub fn populations(&self) -> [f64; LEVELS] {
        [self.get(0, 0).re, self.get(1, 1).re, self.get(2, 2).re]
    }

    /// Purity Tr(ρ²) = Σ |ρᵢⱼ|² for Hermitian ρ.
    pub fn purity(&self) -> f64 {
        self.elements.iter().map(|z| z.norm_sqr()).sum()
    }

    pub fn is_hermitian(&self, tol: f64) -> bool {
        (0..LEVELS).all(|i| {
            (0..LEVELS).all(|j| (self.get(i, j) - self.get(j, i).conj()).norm() <= tol)
        })
    }

    pub fn is_finite(&self) -> bool {
        self.elements.iter().all(|z| z.re.is_finite() && z.im.is_finite())
    }

    /// Hermitian, unit trace, real non-negative populations.
    pub fn is_physical(&self, tol: f64) -> bool {
        self.is_finite()
            && self.is_hermitian(tol)
            && (self.trace().re - 1.0).abs() <= tol
            && self.trace().im.abs() <= tol
            && (0..LEVELS).all(|k| self.get(k, k).re >= -tol && self.get(k, k).im.abs() <= tol)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(re: f64, im: f64) -> Complex64 {
        Complex64::new(re, im)
    }

    #[test]
    fn reduced_vector_rebuilds_unit_trace() {
        let reduced = [
            c(0.1, 0.02),
            c(0.0, 0.01),
            c(0.1, -0.02),
            c(0.03, 0.0),
            c(0.0, -0.01),
            c(0.03, 0.0),
            c(0.2, 0.0),
            c(0.05, 0.0),
        ];
        let rho = DensityMatrix::from_reduced(&reduced);
        assert!((rho.get(0, 0).re - 0.75).abs() < 1e-15);
        assert!((rho.trace().re - 1.0).abs() < 1e-15);
        assert_eq!(rho.get(1, 0), c(0.1, 0.02));
        assert_eq!(rho.get(0, 2), c(0.0, -0.01));
        assert!(rho.is_hermitian(1e-15));
        assert_eq!(rho.to_reduced(), reduced);
    }

    #[test]
    fn ground_state_is_pure() {
        let rho = DensityMatrix::ground();
        assert!(rho.is_physical(1e-12));
        assert!((rho.purity() - 1.0).abs() < 1e-15);
    }

    #[test]
    fn nan_sentinel_is_not_physical() {
        let rho = DensityMatrix::nan();
        assert!(!rho.is_finite());
        assert!(!rho.is_physical(1.0));
    }

    #[test]
    fn normalization_divides_by_trace() {
        let mut elements = [c(0.0, 0.0); 9];
        elements[0] = c(2.0, 0.0);
        elements[4] = c(1.0, 0.0);
        elements[8] = c(1.0, 0.0);
        let rho = DensityMatrix::from_elements(elements).normalized().unwrap();
        assert_eq!(rho.populations(), [0.5, 0.25, 0.25]);
        assert!(DensityMatrix::from_elements([c(0.0, 0.0); 9]).normalized().is_none());
    }
}
