//! ---
//! fleetsim_section: "07-diagnosis-resilience"
//! fleetsim_subsection: "module"
//! fleetsim_type: "source"
//! fleetsim_scope: "code"
//! fleetsim_description: "Provider boundary and HTTP chat-completions implementation."
//! fleetsim_version: "v0.0.0-prealpha"
//! fleetsim_owner: "tbd"
//! ---
use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fleetsim_common::config::DiagnosisConfig;
use fleetsim_common::records::{AlertType, DiagnosisSeverity, TelemetryRecord, TokenUsage};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Context handed to the provider for one enrichment call.
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosisRequest {
    pub vehicle_id: String,
    pub timestamp: DateTime<Utc>,
    pub alert_type: AlertType,
    /// Sample that raised the alert.
    pub telemetry: TelemetryRecord,
    /// Most recent earlier samples for the same vehicle, oldest first.
    /// May be empty.
    pub recent_history: Vec<TelemetryRecord>,
}

/// Raw diagnosis as returned by a provider, before cost accounting.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderDiagnosis {
    pub diagnosis: String,
    pub recommendations: Vec<String>,
    pub severity: DiagnosisSeverity,
    pub tokens: TokenUsage,
}

/// Provider-side failure. Transience decides whether the client retries.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Request never produced an HTTP response (connect failure, timeout).
    #[error("request transport failed: {message}")]
    Transport {
        message: String,
        /// Whether the failure was a client-side timeout.
        timeout: bool,
    },
    /// The service answered with a non-success HTTP status.
    #[error("service returned HTTP {status}")]
    Status { status: u16 },
    /// The response arrived but did not contain a usable diagnosis.
    #[error("invalid provider response: {message}")]
    InvalidResponse { message: String },
}

impl ProviderError {
    /// Transient errors are worth retrying; malformed responses are not.
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderError::Transport { .. } => true,
            ProviderError::Status { status } => *status == 429 || *status >= 500,
            ProviderError::InvalidResponse { .. } => false,
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        ProviderError::Transport {
            message: err.to_string(),
            timeout: err.is_timeout(),
        }
    }
}

/// Boundary to the external reasoning service.
#[async_trait]
pub trait DiagnosisProvider: Send + Sync {
    /// Produce a diagnosis for one alert context.
    async fn diagnose(&self, request: &DiagnosisRequest)
        -> Result<ProviderDiagnosis, ProviderError>;
}

/// Chat-completions provider speaking the OpenAI wire shape. The model is
/// instructed to answer with a strict JSON object which is parsed out of the
/// first choice's message content.
pub struct HttpDiagnosisProvider {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
    max_tokens: u32,
    temperature: f64,
}

impl HttpDiagnosisProvider {
    /// Build the provider from configuration, reading the API key from the
    /// configured environment variable.
    pub fn from_config(config: &DiagnosisConfig) -> anyhow::Result<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .with_context(|| format!("environment variable {} is not set", config.api_key_env))?;
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .context("failed to construct diagnosis http client")?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            api_key,
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }

    fn build_request(&self, request: &DiagnosisRequest) -> ChatRequest {
        let system = "You are a fleet maintenance assistant. Answer with a single JSON \
                      object of the shape {\"diagnosis\": string, \"recommendations\": \
                      [string], \"severity\": \"low\"|\"medium\"|\"high\"|\"critical\"} \
                      and nothing else."
            .to_owned();
        let telemetry = &request.telemetry;
        let mut user = format!(
            "Vehicle {} raised a {} alert at {}.\n\
             Current readings: {} rpm, {} km/h, engine {} C, battery {:.1} V, \
             fuel {}%, brake status {:?}, trouble codes [{}].",
            request.vehicle_id,
            request.alert_type,
            request.timestamp.to_rfc3339(),
            telemetry.rpm,
            telemetry.speed,
            telemetry.engine_temp_c,
            telemetry.battery_voltage,
            telemetry.fuel_level_percent,
            telemetry.brake_status,
            telemetry.dtc_codes.join(", "),
        );
        if !request.recent_history.is_empty() {
            let history: Vec<String> = request
                .recent_history
                .iter()
                .map(|sample| {
                    format!(
                        "{}: {} rpm, {} km/h, engine {} C, battery {:.1} V",
                        sample.timestamp.to_rfc3339(),
                        sample.rpm,
                        sample.speed,
                        sample.engine_temp_c,
                        sample.battery_voltage,
                    )
                })
                .collect();
            user.push_str("\nRecent history:\n");
            user.push_str(&history.join("\n"));
        }
        user.push_str("\nDiagnose the likely cause and recommend next steps.");

        ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_owned(),
                    content: system,
                },
                ChatMessage {
                    role: "user".to_owned(),
                    content: user,
                },
            ],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        }
    }
}

#[async_trait]
impl DiagnosisProvider for HttpDiagnosisProvider {
    async fn diagnose(
        &self,
        request: &DiagnosisRequest,
    ) -> Result<ProviderDiagnosis, ProviderError> {
        let body = self.build_request(request);
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Status {
                status: status.as_u16(),
            });
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|err| ProviderError::InvalidResponse {
                message: format!("body was not a chat completion: {err}"),
            })?;
        debug!(
            vehicle_id = %request.vehicle_id,
            prompt_tokens = chat.usage.prompt_tokens,
            completion_tokens = chat.usage.completion_tokens,
            "diagnosis response received"
        );

        let choice = chat
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::InvalidResponse {
                message: "response contained no choices".to_owned(),
            })?;
        let payload: ContentPayload = serde_json::from_str(&choice.message.content).map_err(
            |err| ProviderError::InvalidResponse {
                message: format!("message content was not diagnosis JSON: {err}"),
            },
        )?;
        if payload.diagnosis.trim().is_empty() {
            return Err(ProviderError::InvalidResponse {
                message: "diagnosis text was empty".to_owned(),
            });
        }

        Ok(ProviderDiagnosis {
            diagnosis: payload.diagnosis,
            recommendations: payload.recommendations,
            severity: payload.severity,
            tokens: TokenUsage {
                prompt_tokens: chat.usage.prompt_tokens,
                completion_tokens: chat.usage.completion_tokens,
                total_tokens: chat.usage.total_tokens,
            },
        })
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f64,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: ChatUsage,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

#[derive(Debug, Default, Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}

/// JSON object the model is asked to answer with.
#[derive(Debug, Deserialize)]
struct ContentPayload {
    diagnosis: String,
    #[serde(default)]
    recommendations: Vec<String>,
    #[serde(default)]
    severity: DiagnosisSeverity,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use fleetsim_common::records::{BrakeStatus, GpsFix};

    fn request() -> DiagnosisRequest {
        let telemetry = TelemetryRecord {
            tenant_id: "acme".to_owned(),
            vehicle_id: "BUS-001".to_owned(),
            timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            rpm: 3100,
            speed: 95,
            engine_temp_c: 104,
            battery_voltage: 13.7,
            fuel_level_percent: 41,
            brake_status: BrakeStatus::Ok,
            dtc_codes: vec!["P0300".to_owned()],
            gps: GpsFix {
                lat: -12.05,
                lng: -77.04,
                accuracy_m: 6.0,
            },
        };
        DiagnosisRequest {
            vehicle_id: "BUS-001".to_owned(),
            timestamp: telemetry.timestamp,
            alert_type: AlertType::EngineOverheating,
            telemetry,
            recent_history: Vec::new(),
        }
    }

    #[test]
    fn transience_classification() {
        assert!(ProviderError::Transport {
            message: "connection reset".to_owned(),
            timeout: false,
        }
        .is_transient());
        assert!(ProviderError::Status { status: 429 }.is_transient());
        assert!(ProviderError::Status { status: 503 }.is_transient());
        assert!(!ProviderError::Status { status: 401 }.is_transient());
        assert!(!ProviderError::InvalidResponse {
            message: "bad json".to_owned(),
        }
        .is_transient());
    }

    #[test]
    fn prompt_mentions_alert_and_readings() {
        let provider = HttpDiagnosisProvider {
            client: reqwest::Client::new(),
            endpoint: "http://localhost/v1/chat/completions".to_owned(),
            model: "gpt-4o-mini".to_owned(),
            api_key: "test-key".to_owned(),
            max_tokens: 500,
            temperature: 0.3,
        };
        let body = provider.build_request(&request());
        assert_eq!(body.model, "gpt-4o-mini");
        assert_eq!(body.messages.len(), 2);
        let user = &body.messages[1].content;
        assert!(user.contains("engine_overheating"));
        assert!(user.contains("104 C"));
        assert!(user.contains("P0300"));
        let encoded = serde_json::to_value(&body).unwrap();
        assert_eq!(encoded["response_format"]["type"], "json_object");
    }

    #[test]
    fn content_payload_parses_with_defaults() {
        let payload: ContentPayload =
            serde_json::from_str(r#"{"diagnosis": "Coolant loss likely"}"#).unwrap();
        assert_eq!(payload.severity, DiagnosisSeverity::Medium);
        assert!(payload.recommendations.is_empty());
    }
}
