//! ---
//! fleetsim_section: "03-persistence-logging"
//! fleetsim_subsection: "module"
//! fleetsim_type: "source"
//! fleetsim_scope: "code"
//! fleetsim_description: "Persistence abstractions and storage bindings."
//! fleetsim_version: "v0.0.0-prealpha"
//! fleetsim_owner: "tbd"
//! ---
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use fleetsim_common::records::{
    AlertCandidate, AlertRecord, AlertType, BrakeStatus, GpsFix, Severity, TelemetryRecord,
};
use fleetsim_persistence::{read_stream, JsonlSink, MemorySink, TelemetrySink};
use tempfile::tempdir;

fn sample(vehicle: &str, tick: u32) -> TelemetryRecord {
    TelemetryRecord {
        tenant_id: "acme".to_owned(),
        vehicle_id: vehicle.to_owned(),
        timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, tick).unwrap(),
        rpm: 2000 + tick * 10,
        speed: 50,
        engine_temp_c: 86,
        battery_voltage: 13.0,
        fuel_level_percent: 40,
        brake_status: BrakeStatus::Ok,
        dtc_codes: Vec::new(),
        gps: GpsFix {
            lat: -12.05,
            lng: -77.04,
            accuracy_m: 10.0,
        },
    }
}

fn alert(vehicle: &str) -> AlertRecord {
    AlertRecord::from_candidate(
        "acme",
        vehicle,
        Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 30).unwrap(),
        AlertCandidate {
            severity: Severity::Low,
            alert_type: AlertType::LowFuel,
            description: "Fuel level at 14% is below the 15% reserve".to_owned(),
            recommendation: "Refuel at the next available stop".to_owned(),
        },
    )
}

async fn drive_sink(sink: Arc<dyn TelemetrySink>) {
    for tick in 0..3 {
        sink.store_telemetry(&sample("BUS-001", tick)).await.unwrap();
    }
    sink.store_alert(&alert("BUS-001")).await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn memory_sink_behind_trait_object() {
    let sink = Arc::new(MemorySink::new());
    drive_sink(sink.clone()).await;

    assert_eq!(sink.telemetry_count(), 3);
    let alerts = sink.alerts();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].alert_type, AlertType::LowFuel);
    assert!(alerts[0].enrichment.is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn jsonl_sink_behind_trait_object() {
    let dir = tempdir().unwrap();
    let sink = Arc::new(JsonlSink::open(dir.path()).unwrap());
    let telemetry_path = sink.telemetry_path();
    let alert_path = sink.alert_path();
    drive_sink(sink).await;

    let samples: Vec<TelemetryRecord> = read_stream(&telemetry_path).unwrap();
    assert_eq!(samples.len(), 3);
    assert_eq!(samples[2].rpm, 2020);

    let alerts: Vec<AlertRecord> = read_stream(&alert_path).unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].severity, Severity::Low);
}
