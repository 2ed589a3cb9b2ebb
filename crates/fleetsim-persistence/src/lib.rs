//! ---
//! fleetsim_section: "03-persistence-logging"
//! fleetsim_subsection: "module"
//! fleetsim_type: "source"
//! fleetsim_scope: "code"
//! fleetsim_description: "Persistence abstractions and storage bindings."
//! fleetsim_version: "v0.0.0-prealpha"
//! fleetsim_owner: "tbd"
//! ---
#![warn(missing_docs)]

use async_trait::async_trait;
use fleetsim_common::records::{AlertRecord, TelemetryRecord};

/// Result alias used throughout the persistence crate.
pub type Result<T> = std::result::Result<T, PersistenceError>;

/// Error type for the persistence subsystem.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    /// Wrapper for IO errors encountered while reading/writing sink files.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Wrapper for JSON serialization issues.
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Durable store for generated telemetry and alert records. The scheduler
/// only ever talks to this trait; the storage layer behind it is out of
/// the core's scope.
#[async_trait]
pub trait TelemetrySink: Send + Sync {
    /// Persist one telemetry sample.
    async fn store_telemetry(&self, record: &TelemetryRecord) -> Result<()>;
    /// Persist one alert record, enriched or not.
    async fn store_alert(&self, record: &AlertRecord) -> Result<()>;
}

pub mod jsonl;
pub mod memory;

pub use jsonl::{read_stream, JsonlSink};
pub use memory::MemorySink;
