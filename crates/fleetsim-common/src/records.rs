//! ---
//! fleetsim_section: "01-core-functionality"
//! fleetsim_subsection: "module"
//! fleetsim_type: "source"
//! fleetsim_scope: "code"
//! fleetsim_description: "Telemetry and alert record types shared across the workspace."
//! fleetsim_version: "v0.0.0-prealpha"
//! fleetsim_owner: "tbd"
//! ---
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Storage severity attached to persisted alerts. Three levels only; the
/// provider's `critical` is remapped before it ever reaches the sink.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity as reported by the diagnosis provider. Carries the extra
/// `critical` level that storage does not.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosisSeverity {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl DiagnosisSeverity {
    /// Remap to the three-level storage severity. `critical` folds into `high`.
    pub fn to_storage(&self) -> Severity {
        match self {
            DiagnosisSeverity::Low => Severity::Low,
            DiagnosisSeverity::Medium => Severity::Medium,
            DiagnosisSeverity::High | DiagnosisSeverity::Critical => Severity::High,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosisSeverity::Low => "low",
            DiagnosisSeverity::Medium => "medium",
            DiagnosisSeverity::High => "high",
            DiagnosisSeverity::Critical => "critical",
        }
    }
}

impl std::fmt::Display for DiagnosisSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derived brake condition: ok below 50% wear, warning between 50 and 70,
/// critical above 70.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum BrakeStatus {
    Ok,
    Warning,
    Critical,
}

impl BrakeStatus {
    /// Classify cumulative brake wear percent.
    pub fn from_wear(wear_percent: f64) -> Self {
        if wear_percent > 70.0 {
            BrakeStatus::Critical
        } else if wear_percent > 50.0 {
            BrakeStatus::Warning
        } else {
            BrakeStatus::Ok
        }
    }
}

/// Closed set of alert types raised by the rule chain.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    EngineOverheating,
    LowBattery,
    LowFuel,
    BrakeFailure,
    BrakeWear,
    DiagnosticTroubleCodes,
    HighRpm,
}

impl AlertType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertType::EngineOverheating => "engine_overheating",
            AlertType::LowBattery => "low_battery",
            AlertType::LowFuel => "low_fuel",
            AlertType::BrakeFailure => "brake_failure",
            AlertType::BrakeWear => "brake_wear",
            AlertType::DiagnosticTroubleCodes => "diagnostic_trouble_codes",
            AlertType::HighRpm => "high_rpm",
        }
    }
}

impl std::fmt::Display for AlertType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// GPS position with horizontal accuracy in metres.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GpsFix {
    pub lat: f64,
    pub lng: f64,
    pub accuracy_m: f64,
}

/// Immutable telemetry sample, one per vehicle per tick.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TelemetryRecord {
    pub tenant_id: String,
    pub vehicle_id: String,
    pub timestamp: DateTime<Utc>,
    pub rpm: u32,
    /// Speed in km/h, rounded to the nearest integer.
    pub speed: u32,
    /// Engine temperature in degrees Celsius, rounded to the nearest integer.
    pub engine_temp_c: i32,
    /// Battery voltage, rounded to one decimal.
    pub battery_voltage: f64,
    pub fuel_level_percent: u8,
    pub brake_status: BrakeStatus,
    pub dtc_codes: Vec<String>,
    pub gps: GpsFix,
}

/// Rule-chain output before any enrichment. At most one per vehicle per tick.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AlertCandidate {
    pub severity: Severity,
    pub alert_type: AlertType,
    pub description: String,
    pub recommendation: String,
}

/// Token accounting reported by the diagnosis provider.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Successful enrichment outcome as returned by the diagnosis client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DiagnosisResult {
    pub diagnosis: String,
    pub recommendations: Vec<String>,
    pub severity: DiagnosisSeverity,
    pub tokens: TokenUsage,
    pub cost_usd: f64,
    pub cached: bool,
}

/// Enrichment block embedded in a persisted alert. Preserves the provider's
/// raw severity alongside the remapped storage severity on the record itself.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AlertEnrichment {
    pub diagnosis: String,
    pub recommendations: Vec<String>,
    pub llm_severity: DiagnosisSeverity,
    pub cost_usd: f64,
    pub tokens: TokenUsage,
    pub cached: bool,
}

impl From<DiagnosisResult> for AlertEnrichment {
    fn from(result: DiagnosisResult) -> Self {
        Self {
            diagnosis: result.diagnosis,
            recommendations: result.recommendations,
            llm_severity: result.severity,
            cost_usd: result.cost_usd,
            tokens: result.tokens,
            cached: result.cached,
        }
    }
}

/// Alert record in the shape consumed by the persistence sink.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AlertRecord {
    pub tenant_id: String,
    pub vehicle_id: String,
    pub timestamp: DateTime<Utc>,
    pub severity: Severity,
    pub alert_type: AlertType,
    pub description: String,
    pub recommendation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enrichment: Option<AlertEnrichment>,
}

impl AlertRecord {
    /// Build an unenriched record from a rule-chain candidate.
    pub fn from_candidate(
        tenant_id: &str,
        vehicle_id: &str,
        timestamp: DateTime<Utc>,
        candidate: AlertCandidate,
    ) -> Self {
        Self {
            tenant_id: tenant_id.to_owned(),
            vehicle_id: vehicle_id.to_owned(),
            timestamp,
            severity: candidate.severity,
            alert_type: candidate.alert_type,
            description: candidate.description,
            recommendation: candidate.recommendation,
            enrichment: None,
        }
    }
}
