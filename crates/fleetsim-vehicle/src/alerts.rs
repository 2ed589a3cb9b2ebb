//! ---
//! fleetsim_section: "02-fleet-simulation"
//! fleetsim_subsection: "module"
//! fleetsim_type: "source"
//! fleetsim_scope: "code"
//! fleetsim_description: "Ordered first-match alert rule chain over telemetry samples."
//! fleetsim_version: "v0.0.0-prealpha"
//! fleetsim_owner: "tbd"
//! ---
use fleetsim_common::records::{
    AlertCandidate, AlertType, BrakeStatus, Severity, TelemetryRecord,
};

/// Evaluate the alert rule chain against one sample. The chain is strictly
/// ordered and first-match wins; at most one candidate per vehicle per tick.
/// Pure: identical input always yields the identical candidate or `None`.
pub fn evaluate_alert(record: &TelemetryRecord) -> Option<AlertCandidate> {
    if record.engine_temp_c > 100 {
        let severity = if record.engine_temp_c > 110 {
            Severity::High
        } else {
            Severity::Medium
        };
        return Some(AlertCandidate {
            severity,
            alert_type: AlertType::EngineOverheating,
            description: format!(
                "Engine temperature at {} C exceeds the 100 C operating limit",
                record.engine_temp_c
            ),
            recommendation: "Stop the vehicle and inspect the cooling system".to_owned(),
        });
    }

    if record.battery_voltage < 12.0 {
        let severity = if record.battery_voltage < 11.5 {
            Severity::High
        } else {
            Severity::Medium
        };
        return Some(AlertCandidate {
            severity,
            alert_type: AlertType::LowBattery,
            description: format!(
                "Battery voltage at {:.1} V below the 12.0 V threshold",
                record.battery_voltage
            ),
            recommendation: "Test the battery and charging circuit before the next shift"
                .to_owned(),
        });
    }

    if record.fuel_level_percent < 15 {
        let severity = if record.fuel_level_percent < 5 {
            Severity::High
        } else {
            Severity::Low
        };
        return Some(AlertCandidate {
            severity,
            alert_type: AlertType::LowFuel,
            description: format!(
                "Fuel level at {}% is below the 15% reserve",
                record.fuel_level_percent
            ),
            recommendation: "Refuel at the next available stop".to_owned(),
        });
    }

    match record.brake_status {
        BrakeStatus::Critical => {
            return Some(AlertCandidate {
                severity: Severity::High,
                alert_type: AlertType::BrakeFailure,
                description: "Brake wear is critical; braking performance is compromised"
                    .to_owned(),
                recommendation: "Take the vehicle out of service and replace brake pads"
                    .to_owned(),
            });
        }
        BrakeStatus::Warning => {
            return Some(AlertCandidate {
                severity: Severity::Medium,
                alert_type: AlertType::BrakeWear,
                description: "Brake wear has passed the 50% warning level".to_owned(),
                recommendation: "Schedule a brake inspection within the week".to_owned(),
            });
        }
        BrakeStatus::Ok => {}
    }

    if !record.dtc_codes.is_empty() {
        let severity = if record.dtc_codes.len() > 2 {
            Severity::High
        } else {
            Severity::Medium
        };
        return Some(AlertCandidate {
            severity,
            alert_type: AlertType::DiagnosticTroubleCodes,
            description: format!(
                "{} diagnostic trouble code(s) reported: {}",
                record.dtc_codes.len(),
                record.dtc_codes.join(", ")
            ),
            recommendation: "Run a full OBD-II scan to confirm the reported codes".to_owned(),
        });
    }

    if record.rpm > 4500 {
        let severity = if record.rpm > 5500 {
            Severity::High
        } else {
            Severity::Medium
        };
        return Some(AlertCandidate {
            severity,
            alert_type: AlertType::HighRpm,
            description: format!("Engine running at {} rpm, above the 4500 rpm limit", record.rpm),
            recommendation: "Reduce engine load and check the transmission".to_owned(),
        });
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use fleetsim_common::records::GpsFix;

    fn healthy_record() -> TelemetryRecord {
        TelemetryRecord {
            tenant_id: "acme".to_owned(),
            vehicle_id: "BUS-001".to_owned(),
            timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            rpm: 2200,
            speed: 45,
            engine_temp_c: 88,
            battery_voltage: 12.8,
            fuel_level_percent: 60,
            brake_status: BrakeStatus::Ok,
            dtc_codes: Vec::new(),
            gps: GpsFix {
                lat: -12.05,
                lng: -77.04,
                accuracy_m: 7.5,
            },
        }
    }

    #[test]
    fn healthy_sample_raises_nothing() {
        assert_eq!(evaluate_alert(&healthy_record()), None);
    }

    #[test]
    fn evaluation_is_pure() {
        let mut record = healthy_record();
        record.engine_temp_c = 104;
        let first = evaluate_alert(&record);
        let second = evaluate_alert(&record);
        assert_eq!(first, second);
        assert!(first.is_some());
    }

    #[test]
    fn overheating_outranks_low_battery() {
        let mut record = healthy_record();
        record.engine_temp_c = 105;
        record.battery_voltage = 11.0;
        let candidate = evaluate_alert(&record).unwrap();
        assert_eq!(candidate.alert_type, AlertType::EngineOverheating);
    }

    #[test]
    fn overheating_severity_steps_at_110() {
        let mut record = healthy_record();
        record.engine_temp_c = 101;
        assert_eq!(evaluate_alert(&record).unwrap().severity, Severity::Medium);
        record.engine_temp_c = 111;
        assert_eq!(evaluate_alert(&record).unwrap().severity, Severity::High);
    }

    #[test]
    fn low_battery_severity_steps_at_11_5() {
        let mut record = healthy_record();
        record.battery_voltage = 11.9;
        let candidate = evaluate_alert(&record).unwrap();
        assert_eq!(candidate.alert_type, AlertType::LowBattery);
        assert_eq!(candidate.severity, Severity::Medium);
        record.battery_voltage = 11.4;
        assert_eq!(evaluate_alert(&record).unwrap().severity, Severity::High);
    }

    #[test]
    fn low_fuel_is_low_unless_nearly_empty() {
        let mut record = healthy_record();
        record.fuel_level_percent = 14;
        let candidate = evaluate_alert(&record).unwrap();
        assert_eq!(candidate.alert_type, AlertType::LowFuel);
        assert_eq!(candidate.severity, Severity::Low);
        record.fuel_level_percent = 4;
        assert_eq!(evaluate_alert(&record).unwrap().severity, Severity::High);
    }

    #[test]
    fn brake_state_maps_to_two_alert_types() {
        let mut record = healthy_record();
        record.brake_status = BrakeStatus::Warning;
        let warning = evaluate_alert(&record).unwrap();
        assert_eq!(warning.alert_type, AlertType::BrakeWear);
        assert_eq!(warning.severity, Severity::Medium);
        record.brake_status = BrakeStatus::Critical;
        let critical = evaluate_alert(&record).unwrap();
        assert_eq!(critical.alert_type, AlertType::BrakeFailure);
        assert_eq!(critical.severity, Severity::High);
    }

    #[test]
    fn trouble_codes_escalate_past_two() {
        let mut record = healthy_record();
        record.dtc_codes = vec!["P0300".to_owned()];
        let candidate = evaluate_alert(&record).unwrap();
        assert_eq!(candidate.alert_type, AlertType::DiagnosticTroubleCodes);
        assert_eq!(candidate.severity, Severity::Medium);
        assert!(candidate.description.contains("P0300"));
        record.dtc_codes = vec!["P0300".to_owned(), "P0420".to_owned(), "P0171".to_owned()];
        assert_eq!(evaluate_alert(&record).unwrap().severity, Severity::High);
    }

    #[test]
    fn high_rpm_is_the_last_rule() {
        let mut record = healthy_record();
        record.rpm = 4600;
        let candidate = evaluate_alert(&record).unwrap();
        assert_eq!(candidate.alert_type, AlertType::HighRpm);
        assert_eq!(candidate.severity, Severity::Medium);
        record.rpm = 5600;
        assert_eq!(evaluate_alert(&record).unwrap().severity, Severity::High);

        record.dtc_codes = vec!["P0300".to_owned()];
        let candidate = evaluate_alert(&record).unwrap();
        assert_eq!(candidate.alert_type, AlertType::DiagnosticTroubleCodes);
    }
}
