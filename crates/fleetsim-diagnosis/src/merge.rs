//! ---
//! fleetsim_section: "07-diagnosis-resilience"
//! fleetsim_subsection: "module"
//! fleetsim_type: "source"
//! fleetsim_scope: "code"
//! fleetsim_description: "Folds a provider diagnosis back into the stored alert."
//! fleetsim_version: "v0.0.0-prealpha"
//! fleetsim_owner: "tbd"
//! ---
use fleetsim_common::records::{AlertEnrichment, AlertRecord, DiagnosisResult};

/// Replace the rule-based description, recommendation and severity of an
/// alert with the provider's verdict and attach the full enrichment detail.
///
/// The provider text wins outright; the rule-based fields are not kept
/// alongside it. Recommendations are flattened into the single
/// recommendation field, joined with "; ".
pub fn apply_diagnosis(alert: &mut AlertRecord, diagnosis: DiagnosisResult) {
    alert.description = diagnosis.diagnosis.clone();
    alert.recommendation = diagnosis.recommendations.join("; ");
    alert.severity = diagnosis.severity.to_storage();
    alert.enrichment = Some(AlertEnrichment::from(diagnosis));
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use fleetsim_common::records::{
        AlertCandidate, AlertType, DiagnosisSeverity, Severity, TokenUsage,
    };

    fn rule_based_alert() -> AlertRecord {
        let candidate = AlertCandidate {
            severity: Severity::Medium,
            alert_type: AlertType::EngineOverheating,
            description: "Engine temperature at 104C exceeds safe threshold".to_owned(),
            recommendation: "Reduce load and check coolant level".to_owned(),
        };
        AlertRecord::from_candidate("acme", "BUS-001", Utc::now(), candidate)
    }

    #[test]
    fn provider_verdict_replaces_rule_based_fields() {
        let mut alert = rule_based_alert();
        apply_diagnosis(
            &mut alert,
            DiagnosisResult {
                diagnosis: "Thermostat stuck closed".to_owned(),
                recommendations: vec![
                    "Replace thermostat".to_owned(),
                    "Pressure-test cooling system".to_owned(),
                ],
                severity: DiagnosisSeverity::Critical,
                tokens: TokenUsage {
                    prompt_tokens: 180,
                    completion_tokens: 60,
                    total_tokens: 240,
                },
                cost_usd: 0.000_063,
                cached: false,
            },
        );

        assert_eq!(alert.description, "Thermostat stuck closed");
        assert_eq!(
            alert.recommendation,
            "Replace thermostat; Pressure-test cooling system"
        );
        assert_eq!(alert.severity, Severity::High);
        let enrichment = alert.enrichment.expect("enrichment attached");
        assert_eq!(enrichment.llm_severity, DiagnosisSeverity::Critical);
        assert_eq!(enrichment.tokens.total_tokens, 240);
        assert!(!enrichment.cached);
    }

    #[test]
    fn empty_recommendations_join_to_empty_string() {
        let mut alert = rule_based_alert();
        apply_diagnosis(
            &mut alert,
            DiagnosisResult {
                diagnosis: "Sensor fault".to_owned(),
                recommendations: Vec::new(),
                severity: DiagnosisSeverity::Low,
                tokens: TokenUsage::default(),
                cost_usd: 0.0,
                cached: false,
            },
        );
        assert_eq!(alert.recommendation, "");
        assert_eq!(alert.severity, Severity::Low);
    }
}
