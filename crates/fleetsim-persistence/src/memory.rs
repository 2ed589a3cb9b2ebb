//! ---
//! fleetsim_section: "03-persistence-logging"
//! fleetsim_subsection: "module"
//! fleetsim_type: "source"
//! fleetsim_scope: "code"
//! fleetsim_description: "In-memory sink for tests and development runs."
//! fleetsim_version: "v0.0.0-prealpha"
//! fleetsim_owner: "tbd"
//! ---
use async_trait::async_trait;
use fleetsim_common::records::{AlertRecord, TelemetryRecord};
use parking_lot::Mutex;

use crate::{Result, TelemetrySink};

/// Sink that keeps every record in memory. Used by tests and short-lived
/// development runs; nothing is bounded or evicted.
#[derive(Debug, Default)]
pub struct MemorySink {
    telemetry: Mutex<Vec<TelemetryRecord>>,
    alerts: Mutex<Vec<AlertRecord>>,
}

impl MemorySink {
    /// Empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every stored telemetry record, in arrival order.
    pub fn telemetry(&self) -> Vec<TelemetryRecord> {
        self.telemetry.lock().clone()
    }

    /// Snapshot of every stored alert record, in arrival order.
    pub fn alerts(&self) -> Vec<AlertRecord> {
        self.alerts.lock().clone()
    }

    /// Number of stored telemetry records.
    pub fn telemetry_count(&self) -> usize {
        self.telemetry.lock().len()
    }

    /// Number of stored alert records.
    pub fn alert_count(&self) -> usize {
        self.alerts.lock().len()
    }
}

#[async_trait]
impl TelemetrySink for MemorySink {
    async fn store_telemetry(&self, record: &TelemetryRecord) -> Result<()> {
        self.telemetry.lock().push(record.clone());
        Ok(())
    }

    async fn store_alert(&self, record: &AlertRecord) -> Result<()> {
        self.alerts.lock().push(record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use fleetsim_common::records::{BrakeStatus, GpsFix};

    fn record(vehicle: &str) -> TelemetryRecord {
        TelemetryRecord {
            tenant_id: "acme".to_owned(),
            vehicle_id: vehicle.to_owned(),
            timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap(),
            rpm: 1800,
            speed: 30,
            engine_temp_c: 85,
            battery_voltage: 12.7,
            fuel_level_percent: 55,
            brake_status: BrakeStatus::Ok,
            dtc_codes: Vec::new(),
            gps: GpsFix {
                lat: -12.05,
                lng: -77.04,
                accuracy_m: 6.0,
            },
        }
    }

    #[tokio::test]
    async fn stores_preserve_arrival_order() {
        let sink = MemorySink::new();
        sink.store_telemetry(&record("BUS-001")).await.unwrap();
        sink.store_telemetry(&record("BUS-002")).await.unwrap();

        let stored = sink.telemetry();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].vehicle_id, "BUS-001");
        assert_eq!(stored[1].vehicle_id, "BUS-002");
        assert_eq!(sink.alert_count(), 0);
    }
}
