//! # tecto-emission-sim
//!
//! Tectonic stress-driven emission of positive holes, their transport to a
//! terrain surface, threshold-triggered ionization bursts, and the response of
//! a three-level Rydberg ladder sensor to those bursts.
//!
//! ## Pipeline
//!
//! ```text
//! stress model ──▶ emission table ──▶ surface grid ──▶ bursts ──▶ sensor ρ
//!  (rupture,         (time, Q)         (blur ×          (E split    (Lindblad
//!   signal)                             attraction)      UV/VIS/IR)  steady state)
//! ```
//!
//! ## Usage
//!
//! ```no_run
//! use tecto_emission_sim::prelude::*;
//!
//! let mut config = SimulationConfig::new(TerrainMap::flat(32, 32).unwrap());
//! config.sources.push(SourcePosition { x: 16, y: 16, depth: 1000.0 });
//! config.sensors.push(SensorPosition { x: 16, y: 16 });
//! let output = run_simulation(config).unwrap();
//! println!("steps: {}", output.n_timesteps());
//! ```

pub mod burst;
pub mod density;
pub mod error;
pub mod lindblad;
pub mod rupture;
pub mod sensor;
pub mod signal;
pub mod simulation;
pub mod surface;
pub mod units;

pub mod prelude {
    pub use crate::burst::*;
    pub use crate::density::*;
    pub use crate::error::{SimError, SolverError};
    pub use crate::lindblad::*;
    pub use crate::rupture::*;
    pub use crate::sensor::*;
    pub use crate::signal::*;
    pub use crate::simulation::*;
    pub use crate::surface::*;
}
