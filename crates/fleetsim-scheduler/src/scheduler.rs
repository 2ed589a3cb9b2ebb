//! ---
//! fleetsim_section: "04-session-orchestration"
//! fleetsim_subsection: "module"
//! fleetsim_type: "source"
//! fleetsim_scope: "code"
//! fleetsim_description: "Tenant registry with start/stop lifecycle and cancellation guarantees."
//! fleetsim_version: "v0.0.0-prealpha"
//! fleetsim_owner: "tbd"
//! ---
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use fleetsim_common::config::{SessionConfig, ValidationError};
use fleetsim_diagnosis::DiagnosisClient;
use fleetsim_persistence::TelemetrySink;
use fleetsim_vehicle::VehicleSimulator;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::metrics::SchedulerMetrics;
use crate::session::{self, SessionHandle, SessionStats};

/// Owns every per-tenant simulation session. All lifecycle transitions go
/// through here; ticks themselves run on per-session tasks.
///
/// Cloning is cheap and shares the same registry.
#[derive(Clone)]
pub struct SimulationScheduler {
    inner: Arc<SchedulerInner>,
}

struct SchedulerInner {
    sink: Arc<dyn TelemetrySink>,
    diagnosis: Option<Arc<DiagnosisClient>>,
    metrics: Option<SchedulerMetrics>,
    sessions: Mutex<HashMap<String, Arc<SessionHandle>>>,
    /// Serializes start/stop so concurrent starts for one tenant leave
    /// exactly one surviving session.
    lifecycle: tokio::sync::Mutex<()>,
}

impl SimulationScheduler {
    /// Build a scheduler over the given sink. The diagnosis client and the
    /// metrics are optional; sessions run identically without them, minus
    /// enrichment and instrumentation.
    pub fn new(
        sink: Arc<dyn TelemetrySink>,
        diagnosis: Option<Arc<DiagnosisClient>>,
        metrics: Option<SchedulerMetrics>,
    ) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                sink,
                diagnosis,
                metrics,
                sessions: Mutex::new(HashMap::new()),
                lifecycle: tokio::sync::Mutex::new(()),
            }),
        }
    }

    /// Start a session for the tenant. An existing session for the same
    /// tenant is stopped first; duplicate starts replace, they never stack
    /// and never error. Invalid configuration is rejected before any session
    /// state is touched.
    pub async fn start(
        &self,
        tenant_id: &str,
        config: SessionConfig,
    ) -> Result<(), ValidationError> {
        config.validate()?;

        let guard = self.inner.lifecycle.lock().await;
        let replaced = self.inner.sessions.lock().remove(tenant_id);
        if let Some(old) = &replaced {
            info!(tenant = %tenant_id, "replacing active session");
            old.kill();
            old.join_tick().await;
        }

        let mut simulator = match config.seed {
            Some(seed) => VehicleSimulator::with_seed(config.error_probability, seed),
            None => VehicleSimulator::new(config.error_probability),
        };
        for vehicle_id in &config.vehicles {
            simulator.initialize(vehicle_id);
        }

        info!(
            tenant = %tenant_id,
            vehicles = config.vehicles.len(),
            interval_secs = config.interval.as_secs_f64(),
            duration_secs = config.duration.map(|d| d.as_secs_f64()),
            error_probability = config.error_probability,
            "starting session"
        );
        let handle = session::spawn_session(
            tenant_id,
            config,
            simulator,
            self.inner.sink.clone(),
            self.inner.diagnosis.clone(),
            self.inner.metrics.clone(),
        );
        // A configured duration of zero means no auto-stop.
        if let Some(after) = handle.duration().filter(|after| !after.is_zero()) {
            handle.set_autostop(self.spawn_autostop(tenant_id, after, &handle));
        }
        self.inner
            .sessions
            .lock()
            .insert(tenant_id.to_owned(), handle);
        self.update_session_gauge();
        drop(guard);

        // The replaced session's auto-stop may itself be waiting to take the
        // lifecycle lock, so it is joined only after the lock is released.
        if let Some(old) = replaced {
            old.join_autostop().await;
        }
        Ok(())
    }

    /// Stop the tenant's session. Returns once no further tick can fire and
    /// the simulator state has been released. Stopping a tenant without an
    /// active session is a logged no-op.
    pub async fn stop(&self, tenant_id: &str) -> bool {
        let guard = self.inner.lifecycle.lock().await;
        let removed = self.inner.sessions.lock().remove(tenant_id);
        let Some(handle) = removed else {
            info!(tenant = %tenant_id, "stop requested for tenant without active session");
            return false;
        };
        handle.kill();
        self.update_session_gauge();
        drop(guard);

        handle.join_tick().await;
        handle.join_autostop().await;
        info!(
            tenant = %tenant_id,
            samples = handle.samples(),
            alerts = handle.alerts(),
            "session stopped"
        );
        true
    }

    /// Stop every active session; used on daemon shutdown.
    pub async fn stop_all(&self) {
        let guard = self.inner.lifecycle.lock().await;
        let drained: Vec<(String, Arc<SessionHandle>)> =
            self.inner.sessions.lock().drain().collect();
        for (_, handle) in &drained {
            handle.kill();
        }
        self.update_session_gauge();
        drop(guard);

        for (tenant_id, handle) in drained {
            handle.join_tick().await;
            handle.join_autostop().await;
            info!(
                tenant = %tenant_id,
                samples = handle.samples(),
                alerts = handle.alerts(),
                "session stopped"
            );
        }
    }

    /// Whether the tenant currently has a session.
    pub fn is_active(&self, tenant_id: &str) -> bool {
        self.inner.sessions.lock().contains_key(tenant_id)
    }

    /// Stats snapshot for the tenant, or `None` when no session exists.
    pub fn stats(&self, tenant_id: &str) -> Option<SessionStats> {
        self.inner
            .sessions
            .lock()
            .get(tenant_id)
            .map(|handle| handle.stats())
    }

    /// Sorted tenant ids with active sessions.
    pub fn active_tenants(&self) -> Vec<String> {
        let mut tenants: Vec<String> = self.inner.sessions.lock().keys().cloned().collect();
        tenants.sort();
        tenants
    }

    fn update_session_gauge(&self) {
        if let Some(metrics) = &self.inner.metrics {
            metrics.set_active_sessions(self.inner.sessions.lock().len());
        }
    }

    /// One-shot task ending the session when its configured duration
    /// elapses. An explicit stop cancels it through the kill channel.
    fn spawn_autostop(
        &self,
        tenant_id: &str,
        after: Duration,
        handle: &Arc<SessionHandle>,
    ) -> JoinHandle<()> {
        let inner = Arc::downgrade(&self.inner);
        let own = Arc::downgrade(handle);
        let tenant_id = tenant_id.to_owned();
        let mut kill_rx = handle.subscribe_kill();
        tokio::spawn(async move {
            tokio::select! {
                _ = kill_rx.changed() => {
                    debug!(tenant = %tenant_id, "auto-stop cancelled by explicit stop");
                }
                _ = tokio::time::sleep(after) => {
                    let Some(inner) = inner.upgrade() else { return };
                    let Some(own) = own.upgrade() else { return };
                    SchedulerInner::stop_elapsed(inner, tenant_id, own).await;
                }
            }
        })
    }
}

impl SchedulerInner {
    /// Regular stop path driven by an auto-stop task. Removes the session
    /// only if it is still the one the task was spawned for; a replacement
    /// session under the same tenant is left untouched.
    async fn stop_elapsed(inner: Arc<SchedulerInner>, tenant_id: String, own: Arc<SessionHandle>) {
        let guard = inner.lifecycle.lock().await;
        let removed = {
            let mut sessions = inner.sessions.lock();
            match sessions.get(&tenant_id) {
                Some(current) if Arc::ptr_eq(current, &own) => sessions.remove(&tenant_id),
                _ => None,
            }
        };
        let Some(handle) = removed else {
            debug!(tenant = %tenant_id, "auto-stop found no matching session");
            return;
        };
        handle.kill();
        if let Some(metrics) = &inner.metrics {
            metrics.set_active_sessions(inner.sessions.lock().len());
        }
        drop(guard);

        handle.join_tick().await;
        info!(
            tenant = %tenant_id,
            samples = handle.samples(),
            alerts = handle.alerts(),
            "session auto-stopped after configured duration"
        );
    }
}

impl std::fmt::Debug for SimulationScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulationScheduler")
            .field("active_sessions", &self.inner.sessions.lock().len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetsim_persistence::MemorySink;

    fn idle_config(vehicles: &[&str]) -> SessionConfig {
        SessionConfig {
            vehicles: vehicles.iter().map(|id| (*id).to_owned()).collect(),
            // Long interval keeps ticks out of lifecycle-only tests.
            interval: Duration::from_secs(600),
            ..SessionConfig::default()
        }
    }

    fn scheduler() -> SimulationScheduler {
        SimulationScheduler::new(Arc::new(MemorySink::new()), None, None)
    }

    #[tokio::test]
    async fn invalid_config_is_rejected_before_session_creation() {
        let scheduler = scheduler();
        let config = SessionConfig {
            interval: Duration::ZERO,
            ..idle_config(&["VEH-001"])
        };

        let err = scheduler.start("acme", config).await.unwrap_err();
        assert_eq!(err, ValidationError::InvalidInterval);
        assert!(!scheduler.is_active("acme"));
        assert!(scheduler.stats("acme").is_none());
    }

    #[tokio::test]
    async fn duplicate_start_replaces_the_session() {
        let scheduler = scheduler();
        scheduler
            .start("acme", idle_config(&["VEH-001"]))
            .await
            .unwrap();
        scheduler
            .start("acme", idle_config(&["VEH-001", "VEH-002", "VEH-003"]))
            .await
            .unwrap();

        assert_eq!(scheduler.active_tenants(), vec!["acme".to_owned()]);
        let stats = scheduler.stats("acme").expect("session exists");
        assert!(stats.active);
        assert_eq!(stats.vehicle_count, 3);

        scheduler.stop_all().await;
        assert!(scheduler.active_tenants().is_empty());
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let scheduler = scheduler();
        scheduler
            .start("acme", idle_config(&["VEH-001"]))
            .await
            .unwrap();

        assert!(scheduler.stop("acme").await);
        assert!(!scheduler.stop("acme").await);
        assert!(!scheduler.is_active("acme"));
        assert!(scheduler.stats("acme").is_none());
    }

    #[tokio::test]
    async fn tenants_are_isolated() {
        let scheduler = scheduler();
        scheduler
            .start("acme", idle_config(&["VEH-001"]))
            .await
            .unwrap();
        scheduler
            .start("globex", idle_config(&["VEH-010", "VEH-011"]))
            .await
            .unwrap();

        assert_eq!(
            scheduler.active_tenants(),
            vec!["acme".to_owned(), "globex".to_owned()]
        );
        assert!(scheduler.stop("acme").await);
        assert!(!scheduler.is_active("acme"));
        assert!(scheduler.is_active("globex"));
        assert_eq!(scheduler.stats("globex").unwrap().vehicle_count, 2);

        scheduler.stop_all().await;
    }
}
