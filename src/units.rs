//! Physical constants and unit conversions.
//!
//! Stress and energy are carried in SI units throughout; simulated time is
//! tracked in years because the rupture cycle spans centuries while the
//! stress rate is expressed per second.

/// Seconds in a Julian year (s)
pub const SECONDS_PER_YEAR: f64 = 365.25 * 24.0 * 3600.0;

/// Pi
pub const PI: f64 = std::f64::consts::PI;

/// One megahertz expressed as angular frequency (rad/s)
pub const TWO_PI_MHZ: f64 = 2.0 * PI * 1e6;

/// Convert years to seconds
pub fn years_to_seconds(years: f64) -> f64 {
    years * SECONDS_PER_YEAR
}

/// Convert seconds to years
pub fn seconds_to_years(seconds: f64) -> f64 {
    seconds / SECONDS_PER_YEAR
}

/// Travel time in years for a carrier moving `depth_m` metres at `velocity_m_s`.
pub fn transit_years(depth_m: f64, velocity_m_s: f64) -> f64 {
    seconds_to_years(depth_m / velocity_m_s)
}
