//! ---
//! fleetsim_section: "04-session-orchestration"
//! fleetsim_subsection: "module"
//! fleetsim_type: "source"
//! fleetsim_scope: "code"
//! fleetsim_description: "Per-tenant session handle and the repeating tick task."
//! fleetsim_version: "v0.0.0-prealpha"
//! fleetsim_owner: "tbd"
//! ---
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use fleetsim_common::config::SessionConfig;
use fleetsim_common::records::{AlertRecord, TelemetryRecord};
use fleetsim_diagnosis::{apply_diagnosis, DiagnosisClient, DiagnosisRequest};
use fleetsim_persistence::TelemetrySink;
use fleetsim_vehicle::{evaluate_alert, VehicleSimulator};
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, warn};

/// Earlier samples kept per vehicle as enrichment context.
const HISTORY_DEPTH: usize = 5;

/// Running counters owned by one session, read for stats while ticks run.
#[derive(Debug, Default)]
pub(crate) struct SessionCounters {
    samples: AtomicU64,
    alerts: AtomicU64,
}

/// Read-only snapshot of one session reported through
/// [`SimulationScheduler::stats`](crate::SimulationScheduler::stats).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStats {
    /// Whether the session is currently ticking.
    pub active: bool,
    /// Telemetry samples generated since start.
    pub samples_generated: u64,
    /// Alerts raised since start.
    pub alerts_generated: u64,
    /// Vehicles configured for the session.
    pub vehicle_count: usize,
    /// Seconds elapsed since the session started.
    pub uptime_seconds: u64,
}

/// Runtime handle for one tenant session. Owns the kill switch and the task
/// handles; the simulator itself lives inside the tick task and is dropped
/// when the task exits.
pub(crate) struct SessionHandle {
    config: SessionConfig,
    started_at: Instant,
    counters: Arc<SessionCounters>,
    kill_tx: watch::Sender<bool>,
    tick_task: Mutex<Option<JoinHandle<()>>>,
    autostop_task: Mutex<Option<JoinHandle<()>>>,
}

impl SessionHandle {
    pub(crate) fn kill(&self) {
        let _ = self.kill_tx.send(true);
    }

    pub(crate) fn subscribe_kill(&self) -> watch::Receiver<bool> {
        self.kill_tx.subscribe()
    }

    pub(crate) fn duration(&self) -> Option<Duration> {
        self.config.duration
    }

    pub(crate) fn set_autostop(&self, task: JoinHandle<()>) {
        *self.autostop_task.lock() = Some(task);
    }

    pub(crate) async fn join_tick(&self) {
        let task = self.tick_task.lock().take();
        if let Some(task) = task {
            if let Err(err) = task.await {
                warn!(error = %err, "session tick task join error");
            }
        }
    }

    pub(crate) async fn join_autostop(&self) {
        let task = self.autostop_task.lock().take();
        if let Some(task) = task {
            if let Err(err) = task.await {
                warn!(error = %err, "session auto-stop task join error");
            }
        }
    }

    pub(crate) fn samples(&self) -> u64 {
        self.counters.samples.load(Ordering::Relaxed)
    }

    pub(crate) fn alerts(&self) -> u64 {
        self.counters.alerts.load(Ordering::Relaxed)
    }

    pub(crate) fn stats(&self) -> SessionStats {
        SessionStats {
            active: true,
            samples_generated: self.samples(),
            alerts_generated: self.alerts(),
            vehicle_count: self.config.vehicles.len(),
            uptime_seconds: self.started_at.elapsed().as_secs(),
        }
    }
}

/// Spawn the tick task for a freshly built session and return its handle.
/// The auto-stop task, if any, is attached afterwards by the scheduler.
pub(crate) fn spawn_session(
    tenant_id: &str,
    config: SessionConfig,
    simulator: VehicleSimulator,
    sink: Arc<dyn TelemetrySink>,
    diagnosis: Option<Arc<DiagnosisClient>>,
    metrics: Option<crate::SchedulerMetrics>,
) -> Arc<SessionHandle> {
    let (kill_tx, kill_rx) = watch::channel(false);
    let counters = Arc::new(SessionCounters::default());
    let tick_task = spawn_tick_task(
        tenant_id.to_owned(),
        config.clone(),
        simulator,
        sink,
        diagnosis,
        counters.clone(),
        metrics,
        kill_rx,
    );
    Arc::new(SessionHandle {
        config,
        started_at: Instant::now(),
        counters,
        kill_tx,
        tick_task: Mutex::new(Some(tick_task)),
        autostop_task: Mutex::new(None),
    })
}

#[allow(clippy::too_many_arguments)]
fn spawn_tick_task(
    tenant_id: String,
    config: SessionConfig,
    simulator: VehicleSimulator,
    sink: Arc<dyn TelemetrySink>,
    diagnosis: Option<Arc<DiagnosisClient>>,
    counters: Arc<SessionCounters>,
    metrics: Option<crate::SchedulerMetrics>,
    mut kill_rx: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut state = TickState {
            tenant_id,
            vehicles: config.vehicles,
            simulator,
            sink,
            diagnosis,
            counters,
            metrics,
            history: HashMap::new(),
        };
        // First tick fires one full interval after start.
        let mut ticker = tokio::time::interval_at(
            tokio::time::Instant::now() + config.interval,
            config.interval,
        );
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                changed = kill_rx.changed() => {
                    match changed {
                        Ok(()) => {
                            if *kill_rx.borrow() {
                                debug!(tenant = %state.tenant_id, "session kill signal received");
                                break;
                            }
                        }
                        Err(_) => break,
                    }
                }
                _ = ticker.tick() => {
                    state.run_tick().await;
                }
            }
        }
        debug!(tenant = %state.tenant_id, "session tick loop exited");
    })
}

/// State moved into the tick task. Vehicles are processed strictly in
/// configuration order, so telemetry within one tenant stream keeps tick
/// order even when enrichment stalls a tick.
struct TickState {
    tenant_id: String,
    vehicles: Vec<String>,
    simulator: VehicleSimulator,
    sink: Arc<dyn TelemetrySink>,
    diagnosis: Option<Arc<DiagnosisClient>>,
    counters: Arc<SessionCounters>,
    metrics: Option<crate::SchedulerMetrics>,
    history: HashMap<String, VecDeque<TelemetryRecord>>,
}

impl TickState {
    async fn run_tick(&mut self) {
        for index in 0..self.vehicles.len() {
            let vehicle_id = self.vehicles[index].clone();
            self.process_vehicle(&vehicle_id).await;
        }
    }

    /// One vehicle, one tick: generate, persist, evaluate, enrich, persist.
    /// Every failure is logged and skipped; nothing here may abort the
    /// remaining vehicles or the session.
    async fn process_vehicle(&mut self, vehicle_id: &str) {
        let record = match self.simulator.generate(vehicle_id, &self.tenant_id) {
            Ok(record) => record,
            Err(err) => {
                error!(
                    tenant = %self.tenant_id,
                    vehicle = %vehicle_id,
                    error = %err,
                    "telemetry generation failed, skipping vehicle this tick"
                );
                if let Some(metrics) = &self.metrics {
                    metrics.inc_vehicle_errors(&self.tenant_id);
                }
                return;
            }
        };

        if let Err(err) = self.sink.store_telemetry(&record).await {
            error!(
                tenant = %self.tenant_id,
                vehicle = %vehicle_id,
                error = %err,
                "failed to persist telemetry sample"
            );
            if let Some(metrics) = &self.metrics {
                metrics.inc_vehicle_errors(&self.tenant_id);
            }
        }
        self.counters.samples.fetch_add(1, Ordering::Relaxed);
        if let Some(metrics) = &self.metrics {
            metrics.inc_samples(&self.tenant_id);
        }

        if let Some(candidate) = evaluate_alert(&record) {
            let mut alert = AlertRecord::from_candidate(
                &self.tenant_id,
                vehicle_id,
                record.timestamp,
                candidate,
            );
            if let Some(client) = &self.diagnosis {
                let request = DiagnosisRequest {
                    vehicle_id: vehicle_id.to_owned(),
                    timestamp: record.timestamp,
                    alert_type: alert.alert_type,
                    telemetry: record.clone(),
                    recent_history: self
                        .history
                        .get(vehicle_id)
                        .map(|samples| samples.iter().cloned().collect())
                        .unwrap_or_default(),
                };
                match client.enrich(&request).await {
                    Ok(result) => apply_diagnosis(&mut alert, result),
                    Err(err) => {
                        warn!(
                            tenant = %self.tenant_id,
                            vehicle = %vehicle_id,
                            error = %err,
                            "enrichment failed, persisting rule-based alert"
                        );
                    }
                }
            }
            if let Err(err) = self.sink.store_alert(&alert).await {
                error!(
                    tenant = %self.tenant_id,
                    vehicle = %vehicle_id,
                    error = %err,
                    "failed to persist alert"
                );
                if let Some(metrics) = &self.metrics {
                    metrics.inc_vehicle_errors(&self.tenant_id);
                }
            }
            self.counters.alerts.fetch_add(1, Ordering::Relaxed);
            if let Some(metrics) = &self.metrics {
                metrics.inc_alerts(&self.tenant_id);
            }
        }

        let entry = self.history.entry(vehicle_id.to_owned()).or_default();
        entry.push_back(record);
        if entry.len() > HISTORY_DEPTH {
            entry.pop_front();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_reflect_counter_state() {
        let (kill_tx, _kill_rx) = watch::channel(false);
        let handle = SessionHandle {
            config: SessionConfig {
                vehicles: vec!["VEH-001".to_owned(), "VEH-002".to_owned()],
                ..SessionConfig::default()
            },
            started_at: Instant::now(),
            counters: Arc::new(SessionCounters::default()),
            kill_tx,
            tick_task: Mutex::new(None),
            autostop_task: Mutex::new(None),
        };
        handle.counters.samples.fetch_add(14, Ordering::Relaxed);
        handle.counters.alerts.fetch_add(3, Ordering::Relaxed);

        let stats = handle.stats();
        assert!(stats.active);
        assert_eq!(stats.samples_generated, 14);
        assert_eq!(stats.alerts_generated, 3);
        assert_eq!(stats.vehicle_count, 2);
    }
}
