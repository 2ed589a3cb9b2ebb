//! ---
//! fleetsim_section: "07-diagnosis-resilience"
//! fleetsim_subsection: "module"
//! fleetsim_type: "source"
//! fleetsim_scope: "code"
//! fleetsim_description: "Prometheus instruments for diagnosis calls, tokens and spend."
//! fleetsim_version: "v0.0.0-prealpha"
//! fleetsim_owner: "tbd"
//! ---
use anyhow::Result;
use fleetsim_common::records::TokenUsage;
use fleetsim_metrics::SharedRegistry;
use prometheus::{Counter, IntCounterVec, Opts};

/// Counters for the diagnosis pipeline, labelled by outcome and token kind.
#[derive(Clone)]
pub struct DiagnosisMetrics {
    requests_total: IntCounterVec,
    tokens_total: IntCounterVec,
    cost_usd_total: Counter,
}

impl DiagnosisMetrics {
    /// Register the diagnosis instruments against the shared registry.
    pub fn new(registry: &SharedRegistry) -> Result<Self> {
        let requests_total = IntCounterVec::new(
            Opts::new(
                "fleetsim_diagnosis_requests_total",
                "Diagnosis requests by outcome",
            ),
            &["outcome"],
        )?;
        let tokens_total = IntCounterVec::new(
            Opts::new(
                "fleetsim_diagnosis_tokens_total",
                "Tokens consumed by diagnosis calls",
            ),
            &["kind"],
        )?;
        let cost_usd_total = Counter::new(
            "fleetsim_diagnosis_cost_usd_total",
            "Estimated cumulative diagnosis spend in USD",
        )?;

        registry.register(Box::new(requests_total.clone()))?;
        registry.register(Box::new(tokens_total.clone()))?;
        registry.register(Box::new(cost_usd_total.clone()))?;

        Ok(Self {
            requests_total,
            tokens_total,
            cost_usd_total,
        })
    }

    /// Record one successful call with its token usage and estimated cost.
    pub fn record_success(&self, tokens: &TokenUsage, cost_usd: f64) {
        self.requests_total.with_label_values(&["success"]).inc();
        self.tokens_total
            .with_label_values(&["prompt"])
            .inc_by(u64::from(tokens.prompt_tokens));
        self.tokens_total
            .with_label_values(&["completion"])
            .inc_by(u64::from(tokens.completion_tokens));
        self.cost_usd_total.inc_by(cost_usd);
    }

    /// Record a request refused by the local rate limit.
    pub fn record_rate_limited(&self) {
        self.requests_total
            .with_label_values(&["rate_limited"])
            .inc();
    }

    /// Record a request that failed after all retry attempts.
    pub fn record_exhausted(&self) {
        self.requests_total.with_label_values(&["exhausted"]).inc();
    }
}

impl std::fmt::Debug for DiagnosisMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiagnosisMetrics").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetsim_metrics::{encode_text, new_registry};

    #[test]
    fn records_success_tokens_and_cost() {
        let registry = new_registry();
        let metrics = DiagnosisMetrics::new(&registry).unwrap();
        metrics.record_success(
            &TokenUsage {
                prompt_tokens: 120,
                completion_tokens: 40,
                total_tokens: 160,
            },
            0.000_042,
        );
        metrics.record_rate_limited();

        let text = encode_text(&registry).unwrap();
        assert!(text.contains("fleetsim_diagnosis_requests_total{outcome=\"success\"} 1"));
        assert!(text.contains("fleetsim_diagnosis_requests_total{outcome=\"rate_limited\"} 1"));
        assert!(text.contains("fleetsim_diagnosis_tokens_total{kind=\"prompt\"} 120"));
        assert!(text.contains("fleetsim_diagnosis_tokens_total{kind=\"completion\"} 40"));
    }
}
