//! ---
//! fleetsim_section: "04-session-orchestration"
//! fleetsim_subsection: "module"
//! fleetsim_type: "source"
//! fleetsim_scope: "code"
//! fleetsim_description: "Prometheus instruments for session counts and tick throughput."
//! fleetsim_version: "v0.0.0-prealpha"
//! fleetsim_owner: "tbd"
//! ---
use anyhow::Result;
use fleetsim_metrics::SharedRegistry;
use prometheus::{IntCounterVec, IntGauge, Opts};

/// Session and tick instruments, labelled by tenant where it matters.
#[derive(Clone)]
pub struct SchedulerMetrics {
    sessions_active: IntGauge,
    samples_total: IntCounterVec,
    alerts_total: IntCounterVec,
    vehicle_errors_total: IntCounterVec,
}

impl SchedulerMetrics {
    /// Register the scheduler instruments against the shared registry.
    pub fn new(registry: &SharedRegistry) -> Result<Self> {
        let sessions_active = IntGauge::new(
            "fleetsim_scheduler_sessions_active",
            "Currently active simulation sessions",
        )?;
        let samples_total = IntCounterVec::new(
            Opts::new(
                "fleetsim_scheduler_samples_total",
                "Telemetry samples generated",
            ),
            &["tenant"],
        )?;
        let alerts_total = IntCounterVec::new(
            Opts::new("fleetsim_scheduler_alerts_total", "Alerts raised"),
            &["tenant"],
        )?;
        let vehicle_errors_total = IntCounterVec::new(
            Opts::new(
                "fleetsim_scheduler_vehicle_errors_total",
                "Per-vehicle generation or persistence failures",
            ),
            &["tenant"],
        )?;

        registry.register(Box::new(sessions_active.clone()))?;
        registry.register(Box::new(samples_total.clone()))?;
        registry.register(Box::new(alerts_total.clone()))?;
        registry.register(Box::new(vehicle_errors_total.clone()))?;

        Ok(Self {
            sessions_active,
            samples_total,
            alerts_total,
            vehicle_errors_total,
        })
    }

    /// Set the active session gauge to the registry size.
    pub fn set_active_sessions(&self, count: usize) {
        self.sessions_active.set(count as i64);
    }

    /// Count one generated telemetry sample for the tenant.
    pub fn inc_samples(&self, tenant_id: &str) {
        self.samples_total.with_label_values(&[tenant_id]).inc();
    }

    /// Count one raised alert for the tenant.
    pub fn inc_alerts(&self, tenant_id: &str) {
        self.alerts_total.with_label_values(&[tenant_id]).inc();
    }

    /// Count one skipped vehicle failure for the tenant.
    pub fn inc_vehicle_errors(&self, tenant_id: &str) {
        self.vehicle_errors_total
            .with_label_values(&[tenant_id])
            .inc();
    }
}

impl std::fmt::Debug for SchedulerMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchedulerMetrics").finish_non_exhaustive()
    }
}
