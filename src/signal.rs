//! Emission series from an externally supplied driving signal.
//!
//! Each sample `x[i]` becomes one emission at time index `i` with the
//! saturating transform `Q = 1 − exp(−x[i])`. There is no stress model behind
//! a signal, so the stress and seismic columns are zero.

use crate::error::SimError;
use crate::rupture::{EmissionRecord, EmissionTable, EmissionVariant};

/// Saturating map from a signal sample to an emitted quantity.
pub fn saturating_emission(sample: f64) -> f64 {
    -(-sample).exp_m1()
}

/// Convert a driving signal into an emission table.
pub fn emissions_from_signal(big_data: &[f64]) -> Result<EmissionTable, SimError> {
    if let Some(i) = big_data.iter().position(|x| !x.is_finite()) {
        return Err(SimError::invalid(
            "big_data",
            format!("entry {i} is not finite"),
        ));
    }
    let records = big_data
        .iter()
        .enumerate()
        .map(|(i, &x)| EmissionRecord {
            time_years: i as f64,
            stress_pa: 0.0,
            emission_q: saturating_emission(x),
            seismic_output: 0.0,
        })
        .collect();
    EmissionTable::from_records(EmissionVariant::Signal, records)
}
