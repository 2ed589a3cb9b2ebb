//! ---
//! fleetsim_section: "01-core-functionality"
//! fleetsim_subsection: "binary"
//! fleetsim_type: "source"
//! fleetsim_scope: "code"
//! fleetsim_description: "Binary entrypoint for the FleetSim daemon."
//! fleetsim_version: "v0.0.0-prealpha"
//! fleetsim_owner: "tbd"
//! ---
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use fleetsim_common::config::{AppConfig, PersistenceConfig, SinkBackend};
use fleetsim_common::logging::init_tracing;
use fleetsim_diagnosis::{DiagnosisClient, DiagnosisMetrics, HttpDiagnosisProvider};
use fleetsim_metrics::{encode_text, new_registry, DaemonMetrics, SharedRegistry};
use fleetsim_persistence::{JsonlSink, MemorySink, TelemetrySink};
use fleetsim_scheduler::{SchedulerMetrics, SimulationScheduler};
use tokio::signal;
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(author, version, about = "FleetSim daemon", long_about = None)]
struct Cli {
    #[arg(long, value_name = "FILE", help = "Path to configuration file")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut candidates = Vec::new();
    if let Some(path) = &cli.config {
        candidates.push(path.clone());
    }
    candidates.push(PathBuf::from("configs/example.prod.toml"));
    candidates.push(PathBuf::from("configs/example.dev.toml"));

    let load_started = Instant::now();
    let loaded = AppConfig::load_with_source(&candidates)?;
    let config = loaded.config;
    let load_duration = load_started.elapsed();

    let registry = new_registry();
    let daemon_metrics = DaemonMetrics::new(registry.clone())?;
    daemon_metrics.observe_config_load(load_duration.as_secs_f64());
    daemon_metrics.inc_start();
    daemon_metrics.set_build_info(
        env!("CARGO_PKG_VERSION"),
        if cfg!(debug_assertions) {
            "debug"
        } else {
            "release"
        },
    );

    init_tracing("fleetsimd", &config.logging)?;
    info!(
        config_path = %loaded.source.display(),
        tenants = config.tenants.len(),
        "configuration loaded"
    );

    run_daemon(config, registry).await
}

async fn run_daemon(config: AppConfig, registry: SharedRegistry) -> Result<()> {
    let sink = build_sink(&config.persistence)?;

    let scheduler_metrics = if config.metrics.enabled {
        Some(SchedulerMetrics::new(&registry)?)
    } else {
        info!("metrics collection disabled by configuration");
        None
    };

    let diagnosis = if config.diagnosis.enabled {
        let provider = HttpDiagnosisProvider::from_config(&config.diagnosis)
            .context("failed to construct diagnosis provider")?;
        let mut client = DiagnosisClient::new(Arc::new(provider), &config.diagnosis);
        if config.metrics.enabled {
            client = client.with_metrics(DiagnosisMetrics::new(&registry)?);
        }
        info!(
            model = %config.diagnosis.model,
            endpoint = %config.diagnosis.endpoint,
            "alert enrichment enabled"
        );
        Some(Arc::new(client))
    } else {
        info!("alert enrichment disabled by configuration");
        None
    };

    let scheduler = SimulationScheduler::new(sink, diagnosis, scheduler_metrics);
    for (tenant_id, session) in &config.tenants {
        scheduler
            .start(tenant_id, session.clone())
            .await
            .with_context(|| format!("failed to start session for tenant '{tenant_id}'"))?;
    }

    info!(
        tenants = ?scheduler.active_tenants(),
        "daemon running; waiting for termination signal"
    );
    signal::ctrl_c().await?;
    info!("ctrl-c received; shutting down");

    for tenant_id in scheduler.active_tenants() {
        if let Some(stats) = scheduler.stats(&tenant_id) {
            info!(
                tenant = %tenant_id,
                samples = stats.samples_generated,
                alerts = stats.alerts_generated,
                uptime_seconds = stats.uptime_seconds,
                "final session stats"
            );
        }
    }
    scheduler.stop_all().await;

    if config.metrics.enabled {
        let snapshot = encode_text(&registry)?;
        let path = config.logging.directory.join("fleetsimd-metrics.prom");
        tokio::fs::write(&path, snapshot)
            .await
            .with_context(|| format!("failed to write metrics snapshot to {}", path.display()))?;
        info!(path = %path.display(), "metrics snapshot written");
    }

    Ok(())
}

fn build_sink(config: &PersistenceConfig) -> Result<Arc<dyn TelemetrySink>> {
    match config.backend {
        SinkBackend::Memory => {
            warn!("memory sink keeps records only for the process lifetime");
            Ok(Arc::new(MemorySink::new()))
        }
        SinkBackend::Jsonl => {
            let sink = JsonlSink::open(&config.directory)
                .context("failed to open jsonl persistence sink")?;
            info!(directory = %config.directory.display(), "jsonl sink opened");
            Ok(Arc::new(sink))
        }
    }
}
