//! ---
//! fleetsim_section: "07-diagnosis-resilience"
//! fleetsim_subsection: "module"
//! fleetsim_type: "source"
//! fleetsim_scope: "code"
//! fleetsim_description: "Rate-limited, retrying front door to the diagnosis provider."
//! fleetsim_version: "v0.0.0-prealpha"
//! fleetsim_owner: "tbd"
//! ---
use std::sync::Arc;
use std::time::Duration;

use fleetsim_common::config::DiagnosisConfig;
use fleetsim_common::records::DiagnosisResult;
use tracing::{debug, warn};

use crate::cost::estimate_usd;
use crate::limiter::{SlidingWindowLimiter, RATE_LIMIT_MAX_CALLS, RATE_LIMIT_WINDOW};
use crate::metrics::DiagnosisMetrics;
use crate::provider::{DiagnosisProvider, DiagnosisRequest};
use crate::DiagnosisError;

/// Front door for alert enrichment. Applies the sliding-window rate limit
/// before the first attempt and exponential backoff between retries of
/// transient provider failures.
pub struct DiagnosisClient {
    provider: Arc<dyn DiagnosisProvider>,
    limiter: SlidingWindowLimiter,
    max_attempts: u32,
    base_delay: Duration,
    metrics: Option<DiagnosisMetrics>,
}

impl DiagnosisClient {
    /// Wrap a provider with the configured retry policy and the built-in
    /// rate limit.
    pub fn new(provider: Arc<dyn DiagnosisProvider>, config: &DiagnosisConfig) -> Self {
        Self {
            provider,
            limiter: SlidingWindowLimiter::new(RATE_LIMIT_MAX_CALLS, RATE_LIMIT_WINDOW),
            max_attempts: config.max_attempts.max(1),
            base_delay: config.base_delay,
            metrics: None,
        }
    }

    /// Attach metrics recording. Builder style, used once at startup.
    pub fn with_metrics(mut self, metrics: DiagnosisMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Produce an enriched diagnosis for one alert context.
    ///
    /// The rate limit is checked exactly once, before the first attempt;
    /// retries of one logical request do not consume extra window slots.
    /// Only a successful call records into the window.
    pub async fn enrich(
        &self,
        request: &DiagnosisRequest,
    ) -> Result<DiagnosisResult, DiagnosisError> {
        if let Err(retry_after) = self.limiter.check() {
            if let Some(metrics) = &self.metrics {
                metrics.record_rate_limited();
            }
            debug!(
                vehicle_id = %request.vehicle_id,
                retry_after_secs = retry_after.as_secs_f64(),
                "diagnosis rate limit reached"
            );
            return Err(DiagnosisError::RateLimited { retry_after });
        }

        let mut attempt = 1u32;
        loop {
            match self.provider.diagnose(request).await {
                Ok(diagnosis) => {
                    self.limiter.record();
                    let cost_usd = estimate_usd(&diagnosis.tokens);
                    if let Some(metrics) = &self.metrics {
                        metrics.record_success(&diagnosis.tokens, cost_usd);
                    }
                    debug!(
                        vehicle_id = %request.vehicle_id,
                        attempt,
                        total_tokens = diagnosis.tokens.total_tokens,
                        cost_usd,
                        "diagnosis succeeded"
                    );
                    return Ok(DiagnosisResult {
                        diagnosis: diagnosis.diagnosis,
                        recommendations: diagnosis.recommendations,
                        severity: diagnosis.severity,
                        tokens: diagnosis.tokens,
                        cost_usd,
                        cached: false,
                    });
                }
                Err(err) if err.is_transient() && attempt < self.max_attempts => {
                    let delay = backoff_delay(self.base_delay, attempt);
                    warn!(
                        vehicle_id = %request.vehicle_id,
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_secs = delay.as_secs_f64(),
                        error = %err,
                        "diagnosis attempt failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    if let Some(metrics) = &self.metrics {
                        metrics.record_exhausted();
                    }
                    warn!(
                        vehicle_id = %request.vehicle_id,
                        attempt,
                        error = %err,
                        "diagnosis failed permanently"
                    );
                    return Err(DiagnosisError::Exhausted {
                        attempts: attempt,
                        source: err,
                    });
                }
            }
        }
    }
}

impl std::fmt::Debug for DiagnosisClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiagnosisClient")
            .field("max_attempts", &self.max_attempts)
            .field("base_delay", &self.base_delay)
            .finish_non_exhaustive()
    }
}

/// Exponential backoff with the exponent capped so the delay stays bounded.
fn backoff_delay(base_delay: Duration, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(8);
    base_delay * 2u32.pow(exponent)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        let base = Duration::from_secs(1);
        assert_eq!(backoff_delay(base, 1), Duration::from_secs(1));
        assert_eq!(backoff_delay(base, 2), Duration::from_secs(2));
        assert_eq!(backoff_delay(base, 4), Duration::from_secs(8));
        assert_eq!(backoff_delay(base, 9), Duration::from_secs(256));
        assert_eq!(backoff_delay(base, 40), Duration::from_secs(256));
    }
}
