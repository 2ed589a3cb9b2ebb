//! ---
//! fleetsim_section: "07-diagnosis-resilience"
//! fleetsim_subsection: "module"
//! fleetsim_type: "source"
//! fleetsim_scope: "code"
//! fleetsim_description: "Resilient enrichment client around the external reasoning service."
//! fleetsim_version: "v0.0.0-prealpha"
//! fleetsim_owner: "tbd"
//! ---
//! Diagnosis enrichment for FleetSim alerts.
//!
//! The [`DiagnosisClient`] wraps an exchangeable [`DiagnosisProvider`] with a
//! sliding-window rate limiter, exponential-backoff retries for transient
//! failures, and token/cost accounting. Failures degrade gracefully: callers
//! persist the rule-based alert unchanged and move on.

use std::time::Duration;

use thiserror::Error;

pub mod client;
pub mod cost;
pub mod limiter;
pub mod merge;
pub mod metrics;
pub mod provider;

pub use client::DiagnosisClient;
pub use limiter::{SlidingWindowLimiter, RATE_LIMIT_MAX_CALLS, RATE_LIMIT_WINDOW};
pub use merge::apply_diagnosis;
pub use metrics::DiagnosisMetrics;
pub use provider::{
    DiagnosisProvider, DiagnosisRequest, HttpDiagnosisProvider, ProviderDiagnosis, ProviderError,
};

/// Enrichment failure surfaced by [`DiagnosisClient::enrich`]. Never escapes
/// the scheduler's tick; the rule-based alert is persisted unenriched.
#[derive(Debug, Error)]
pub enum DiagnosisError {
    /// The sliding-window call budget is spent; retry after the given wait.
    #[error("enrichment rate limit reached, retry in {retry_after:?}")]
    RateLimited {
        /// Suggested wait until a window slot frees up.
        retry_after: Duration,
    },
    /// The provider kept failing (or failed permanently) within the attempt
    /// budget.
    #[error("enrichment failed after {attempts} attempt(s): {source}")]
    Exhausted {
        /// Attempts actually made, including the first call.
        attempts: u32,
        /// Last provider error observed.
        #[source]
        source: ProviderError,
    },
}
