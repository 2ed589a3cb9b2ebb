//! ---
//! fleetsim_section: "04-session-orchestration"
//! fleetsim_subsection: "module"
//! fleetsim_type: "source"
//! fleetsim_scope: "code"
//! fleetsim_description: "Multi-tenant session scheduler driving simulation ticks."
//! fleetsim_version: "v0.0.0-prealpha"
//! fleetsim_owner: "tbd"
//! ---
#![warn(missing_docs)]

pub mod metrics;
pub mod scheduler;
pub mod session;

pub use metrics::SchedulerMetrics;
pub use scheduler::SimulationScheduler;
pub use session::SessionStats;
