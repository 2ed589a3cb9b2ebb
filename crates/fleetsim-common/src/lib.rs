//! ---
//! fleetsim_section: "01-core-functionality"
//! fleetsim_subsection: "module"
//! fleetsim_type: "source"
//! fleetsim_scope: "code"
//! fleetsim_description: "Shared primitives and utilities for the core runtime."
//! fleetsim_version: "v0.0.0-prealpha"
//! fleetsim_owner: "tbd"
//! ---
//! Core shared primitives for the FleetSim workspace.
//! This crate exposes the telemetry/alert data model, configuration loading,
//! and logging setup consumed across the workspace.

pub mod config;
pub mod logging;
pub mod records;

pub use config::{
    AppConfig, DiagnosisConfig, LoadedAppConfig, LoggingConfig, MetricsConfig, PersistenceConfig,
    SessionConfig, SinkBackend, ValidationError,
};
pub use logging::{init_tracing, LogFormat};
pub use records::{
    AlertCandidate, AlertEnrichment, AlertRecord, AlertType, BrakeStatus, DiagnosisResult,
    DiagnosisSeverity, GpsFix, Severity, TelemetryRecord, TokenUsage,
};
