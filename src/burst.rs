//! Threshold-triggered ionization bursts.
//!
//! Holes accumulate until the running total reaches `threshold`; the burst
//! then releases `E = γ·accumulated` split over three bands by a fixed
//! [`EnergyDistribution`] and the accumulator returns to zero.
//!
//! The orchestrator calls [`IonizationBurstDetector::fire`] once per cell per
//! step on that cell's current value, so a cell bursts exactly when its value
//! is at or above the threshold.

use crate::error::{require_finite, SimError};

/// Band fractions of the burst energy. Expected to sum to 1; not enforced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnergyDistribution {
    pub uv: f64,
    pub vis_nir: f64,
    pub ir: f64,
}

impl Default for EnergyDistribution {
    fn default() -> Self {
        Self {
            uv: 0.4,
            vis_nir: 0.3,
            ir: 0.3,
        }
    }
}

/// Energy released per band by one burst (J). All zero when nothing fired.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BurstInfo {
    pub e_uv: f64,
    pub e_visnir: f64,
    pub e_ir: f64,
}

impl BurstInfo {
    pub const ZERO: BurstInfo = BurstInfo {
        e_uv: 0.0,
        e_visnir: 0.0,
        e_ir: 0.0,
    };

    pub fn total(&self) -> f64 {
        self.e_uv + self.e_visnir + self.e_ir
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }
}

/// A burst found while scanning an emission sequence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BurstEvent {
    /// Position in the scanned sequence at which the threshold was reached
    pub index: usize,
    /// Holes released by the burst (kg)
    pub released: f64,
    pub energy: BurstInfo,
    /// Accumulator value after the burst (always zero)
    pub accumulated_after: f64,
}

#[derive(Debug, Clone)]
pub struct BurstParams {
    /// Hole mass that triggers a burst (kg)
    pub threshold: f64,
    /// Energy released per kg of holes (J/kg)
    pub gamma_conversion: f64,
    pub distribution: EnergyDistribution,
}

impl Default for BurstParams {
    fn default() -> Self {
        Self {
            threshold: 0.1,
            gamma_conversion: 1e5,
            distribution: EnergyDistribution::default(),
        }
    }
}

impl BurstParams {
    pub fn validate(&self) -> Result<(), SimError> {
        if !(self.threshold > 0.0) || !self.threshold.is_finite() {
            return Err(SimError::invalid(
                "threshold",
                format!("must be finite and > 0, got {}", self.threshold),
            ));
        }
        require_finite("gamma_conversion", self.gamma_conversion)?;
        require_finite("distribution.uv", self.distribution.uv)?;
        require_finite("distribution.vis_nir", self.distribution.vis_nir)?;
        require_finite("distribution.ir", self.distribution.ir)
    }
}

#[derive(Debug, Clone)]
pub struct IonizationBurstDetector {
    params: BurstParams,
}

impl IonizationBurstDetector {
    pub fn new(params: BurstParams) -> Result<Self, SimError> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn params(&self) -> &BurstParams {
        &self.params
    }

    pub fn threshold(&self) -> f64 {
        self.params.threshold
    }

    /// Band split of the energy released by `accumulated` holes.
    pub fn energy(&self, accumulated: f64) -> BurstInfo {
        let e_pulse = self.params.gamma_conversion * accumulated;
        let d = &self.params.distribution;
        BurstInfo {
            e_uv: d.uv * e_pulse,
            e_visnir: d.vis_nir * e_pulse,
            e_ir: d.ir * e_pulse,
        }
    }

    /// Burst energy if `accumulated` has reached the threshold.
    #[inline]
    pub fn fire(&self, accumulated: f64) -> Option<BurstInfo> {
        (accumulated >= self.params.threshold).then(|| self.energy(accumulated))
    }

    /// Accumulate a sequence of emitted quantities and report every burst.
    pub fn scan(&self, emissions: &[f64]) -> Vec<BurstEvent> {
        let mut accumulated = 0.0;
        let mut bursts = Vec::new();
        for (index, q) in emissions.iter().enumerate() {
            accumulated += q;
            if let Some(energy) = self.fire(accumulated) {
                bursts.push(BurstEvent {
                    index,
                    released: accumulated,
                    energy,
                    accumulated_after: 0.0,
                });
                accumulated = 0.0;
            }
        }
        bursts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detector(threshold: f64) -> IonizationBurstDetector {
        IonizationBurstDetector::new(BurstParams {
            threshold,
            ..BurstParams::default()
        })
        .unwrap()
    }

    #[test]
    fn exactly_at_threshold_fires() {
        let d = detector(0.1);
        assert!(d.fire(0.1).is_some());
    }

    #[test]
    fn one_ulp_below_threshold_is_quiet() {
        let threshold = 0.1f64;
        let below = f64::from_bits(threshold.to_bits() - 1);
        assert!(below < threshold);
        assert!(detector(threshold).fire(below).is_none());
    }

    #[test]
    fn bands_sum_to_total_energy() {
        let d = detector(0.01);
        let accumulated = 0.37;
        let e = d.fire(accumulated).unwrap();
        let expected = 1e5 * accumulated;
        assert!((e.total() - expected).abs() < 1e-9 * expected);
        assert!((e.e_uv - 0.4 * expected).abs() < 1e-9);
    }

    #[test]
    fn scan_resets_after_each_burst() {
        let d = detector(1.0);
        let bursts = d.scan(&[0.4, 0.4, 0.4, 0.9, 0.05, 2.0]);
        let indices: Vec<_> = bursts.iter().map(|b| b.index).collect();
        assert_eq!(indices, vec![2, 5]);
        assert!((bursts[0].released - 1.2).abs() < 1e-12);
        assert!((bursts[1].released - 2.95).abs() < 1e-12);
        assert!(bursts.iter().all(|b| b.accumulated_after == 0.0));
    }

    #[test]
    fn empty_scan_has_no_bursts() {
        assert!(detector(0.5).scan(&[]).is_empty());
    }

    #[test]
    fn non_positive_threshold_rejected() {
        for threshold in [0.0, -1.0, f64::NAN] {
            let params = BurstParams {
                threshold,
                ..BurstParams::default()
            };
            assert!(IonizationBurstDetector::new(params).is_err());
        }
    }

    #[test]
    fn zero_burst_is_zero() {
        assert!(BurstInfo::default().is_zero());
        assert_eq!(BurstInfo::ZERO.total(), 0.0);
    }
}
