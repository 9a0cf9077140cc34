//! Osprey Simulation Library
//!
//! Closed-loop scenario harness for the transition coordinator: a minimal
//! longitudinal plant, scripted transition scenarios and parameter bounds
//! for sweep tooling.

pub mod params;
pub mod plant;
pub mod scenario;

// Re-export main types
pub use params::{param_spec, ParamSpec, ALL_PARAMS};
pub use plant::{PlantConfig, VtolPlant};
pub use scenario::{
    run_scenario, ScenarioAction, ScenarioConfig, ScenarioEvent, ScenarioTrace,
};
