//! ---
//! fleetsim_section: "01-core-functionality"
//! fleetsim_subsection: "module"
//! fleetsim_type: "source"
//! fleetsim_scope: "code"
//! fleetsim_description: "Configuration loading and validation for the daemon."
//! fleetsim_version: "v0.0.0-prealpha"
//! fleetsim_owner: "tbd"
//! ---
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationSeconds};
use thiserror::Error;
use tracing::debug;

use crate::logging::LogFormat;

fn default_tick_interval() -> Duration {
    Duration::from_secs(5)
}

fn default_logging_directory() -> PathBuf {
    PathBuf::from("target/logs")
}

fn default_log_format() -> LogFormat {
    LogFormat::StructuredJson
}

fn default_metrics_enabled() -> bool {
    true
}

fn default_sink_backend() -> SinkBackend {
    SinkBackend::Jsonl
}

fn default_persistence_directory() -> PathBuf {
    PathBuf::from("target/telemetry")
}

fn default_diagnosis_endpoint() -> String {
    "https://api.openai.com/v1/chat/completions".to_owned()
}

fn default_diagnosis_model() -> String {
    "gpt-4o-mini".to_owned()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_owned()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_max_tokens() -> u32 {
    500
}

fn default_temperature() -> f64 {
    0.3
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay() -> Duration {
    Duration::from_secs(1)
}

/// Configuration rejected synchronously before a session is created.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("tick interval must be greater than zero")]
    InvalidInterval,
    #[error("error probability {value} is outside [0, 1]")]
    InvalidErrorProbability { value: f64 },
}

/// Per-tenant simulation session parameters.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Vehicle identifiers simulated for this tenant.
    #[serde(default)]
    pub vehicles: Vec<String>,
    /// Delay between ticks. Must be greater than zero.
    #[serde(default = "default_tick_interval")]
    #[serde_as(as = "DurationSeconds<u64>")]
    pub interval: Duration,
    /// Optional wall-clock lifetime after which the session auto-stops.
    /// Zero behaves like unset.
    #[serde(default)]
    #[serde_as(as = "Option<DurationSeconds<u64>>")]
    pub duration: Option<Duration>,
    /// Bias toward alert-triggering states, in [0, 1].
    #[serde(default)]
    pub error_probability: f64,
    /// Fixed RNG seed for reproducible runs. Unset means entropy.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            vehicles: Vec::new(),
            interval: default_tick_interval(),
            duration: None,
            error_probability: 0.0,
            seed: None,
        }
    }
}

impl SessionConfig {
    /// Check the structural invariants enforced at `start()`.
    pub fn validate(&self) -> std::result::Result<(), ValidationError> {
        if self.interval.is_zero() {
            return Err(ValidationError::InvalidInterval);
        }
        if !(self.error_probability >= 0.0 && self.error_probability <= 1.0) {
            return Err(ValidationError::InvalidErrorProbability {
                value: self.error_probability,
            });
        }
        Ok(())
    }
}

/// Primary configuration object for the FleetSim daemon.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub persistence: PersistenceConfig,
    #[serde(default)]
    pub diagnosis: DiagnosisConfig,
    /// Tenants started automatically at daemon boot.
    #[serde(default)]
    pub tenants: IndexMap<String, SessionConfig>,
}

/// Metadata describing where an [`AppConfig`] was loaded from.
#[derive(Debug, Clone)]
pub struct LoadedAppConfig {
    pub config: AppConfig,
    pub source: PathBuf,
}

impl AppConfig {
    pub const ENV_CONFIG_PATH: &'static str = "FLEETSIM_CONFIG";

    /// Load configuration from disk, respecting the `FLEETSIM_CONFIG` override.
    pub fn load<P: AsRef<Path>>(candidates: &[P]) -> Result<Self> {
        Ok(Self::load_with_source(candidates)?.config)
    }

    /// Load configuration from disk together with the effective source path.
    pub fn load_with_source<P: AsRef<Path>>(candidates: &[P]) -> Result<LoadedAppConfig> {
        if let Ok(env_path) = std::env::var(Self::ENV_CONFIG_PATH) {
            if !env_path.trim().is_empty() {
                let path = PathBuf::from(env_path);
                let config = Self::from_path(path.clone())?;
                return Ok(LoadedAppConfig {
                    config,
                    source: path,
                });
            }
        }

        for candidate in candidates {
            if candidate.as_ref().exists() {
                let path = candidate.as_ref().to_path_buf();
                let config = Self::from_path(path.clone())?;
                return Ok(LoadedAppConfig {
                    config,
                    source: path,
                });
            }
        }

        Err(anyhow!(
            "no configuration files found. inspected: {}",
            candidates
                .iter()
                .map(|p| p.as_ref().display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ))
    }

    fn from_path(path: PathBuf) -> Result<Self> {
        debug!(config_path = %path.display(), "loading configuration");
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;
        let config = toml::from_str::<AppConfig>(&contents)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Retrieve a tenant session configuration by identifier.
    pub fn tenant(&self, tenant_id: &str) -> Option<&SessionConfig> {
        self.tenants.get(tenant_id)
    }

    /// Validate structural invariants.
    pub fn validate(&self) -> Result<()> {
        for (tenant_id, session) in &self.tenants {
            session
                .validate()
                .with_context(|| format!("invalid session config for tenant '{}'", tenant_id))?;
        }
        self.diagnosis.validate()?;
        Ok(())
    }
}

impl std::str::FromStr for AppConfig {
    type Err = anyhow::Error;

    fn from_str(content: &str) -> std::result::Result<Self, Self::Err> {
        let config: AppConfig =
            toml::from_str(content).with_context(|| "failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_directory")]
    pub directory: PathBuf,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
    #[serde(default)]
    pub file_prefix: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: default_logging_directory(),
            format: default_log_format(),
            file_prefix: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
        }
    }
}

/// Persistence sink selection for the daemon.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SinkBackend {
    Memory,
    #[default]
    Jsonl,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    #[serde(default = "default_sink_backend")]
    pub backend: SinkBackend,
    /// Directory holding the per-stream JSONL files.
    #[serde(default = "default_persistence_directory")]
    pub directory: PathBuf,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            backend: default_sink_backend(),
            directory: default_persistence_directory(),
        }
    }
}

/// External reasoning service settings. Disabled by default; a disabled
/// client is simply never constructed by the daemon.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosisConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_diagnosis_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_diagnosis_model")]
    pub model: String,
    /// Environment variable holding the API key. The key itself never lives
    /// in the config file.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_request_timeout")]
    #[serde_as(as = "DurationSeconds<u64>")]
    pub request_timeout: Duration,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    /// Total attempts per enrichment, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Backoff base; attempt n waits base * 2^(n-1).
    #[serde(default = "default_base_delay")]
    #[serde_as(as = "DurationSeconds<u64>")]
    pub base_delay: Duration,
}

impl Default for DiagnosisConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: default_diagnosis_endpoint(),
            model: default_diagnosis_model(),
            api_key_env: default_api_key_env(),
            request_timeout: default_request_timeout(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            max_attempts: default_max_attempts(),
            base_delay: default_base_delay(),
        }
    }
}

impl DiagnosisConfig {
    pub fn validate(&self) -> Result<()> {
        if self.enabled {
            if self.endpoint.trim().is_empty() {
                return Err(anyhow!("diagnosis endpoint must not be empty"));
            }
            if self.max_attempts == 0 {
                return Err(anyhow!("diagnosis max_attempts must be at least 1"));
            }
        }
        Ok(())
    }
}
