//! ---
//! fleetsim_section: "02-fleet-simulation"
//! fleetsim_subsection: "module"
//! fleetsim_type: "source"
//! fleetsim_scope: "code"
//! fleetsim_description: "Vehicle simulation engine and alert rule evaluation."
//! fleetsim_version: "v0.0.0-prealpha"
//! fleetsim_owner: "tbd"
//! ---
//! Per-vehicle telemetry synthesis for FleetSim.
//!
//! One [`VehicleSimulator`] owns the physical state of every vehicle in a
//! tenant session, advances each state one tick at a time, and exposes the
//! pure [`evaluate_alert`] rule chain over the samples it emits.

pub mod alerts;
pub mod simulator;
pub mod state;

pub use alerts::evaluate_alert;
pub use simulator::{SimulationError, VehicleSimulator, DTC_CODES};
pub use state::{DrivingPattern, VehicleState};
