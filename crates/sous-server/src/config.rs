//! Server configuration loading from file and environment variables.

use serde::Deserialize;
use sous_voice::{LlmConfig, SttConfig, TtsConfig};
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;
use thiserror::Error;

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Server network settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Per-request pipeline limits.
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Speech recognition backend.
    #[serde(default)]
    pub stt: SttConfig,

    /// Speech synthesis backend.
    #[serde(default)]
    pub tts: TtsConfig,

    /// Language model endpoint shared by the dialogue engine and the
    /// completeness classifier.
    #[serde(default)]
    pub llm: LlmConfig,
}

/// Network configuration for the HTTP server.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to.
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Largest accepted audio upload, in bytes.
    #[serde(default = "default_max_audio_bytes")]
    pub max_audio_bytes: usize,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "sous_pipeline=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PipelineConfig {
    /// Wall-clock limit for one streamed run. Unset means no limit.
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

impl PipelineConfig {
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))
}

fn default_port() -> u16 {
    8000
}

fn default_max_audio_bytes() -> usize {
    10 * 1024 * 1024
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_audio_bytes: default_max_audio_bytes(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Loads configuration from a TOML file, falling back to defaults.
///
/// Environment variable overrides:
/// - `SOUS_HOST` overrides `server.host`
/// - `SOUS_PORT` overrides `server.port`
/// - `SOUS_LOG_LEVEL` overrides `logging.level`
/// - `SOUS_LOG_JSON` overrides `logging.json` (set to "true" to enable)
/// - `SOUS_REQUEST_TIMEOUT_SECS` overrides `pipeline.request_timeout_secs`
/// - `SOUS_LLM_BASE_URL`, `SOUS_LLM_API_KEY`, `SOUS_LLM_MODEL` override `llm.*`
/// - `SOUS_STT_BINARY`, `SOUS_STT_MODEL` override `stt.binary_path` and `stt.model_path`
/// - `SOUS_TTS_BINARY`, `SOUS_TTS_MODEL` override `tts.binary_path` and `tts.model_path`
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                Config::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => Config::default(),
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    Ok(config)
}

fn apply_env_overrides(config: &mut Config, var: impl Fn(&str) -> Option<String>) {
    if let Some(host) = var("SOUS_HOST") {
        if let Ok(parsed) = host.parse() {
            config.server.host = parsed;
        }
    }
    if let Some(port) = var("SOUS_PORT") {
        if let Ok(parsed) = port.parse() {
            config.server.port = parsed;
        }
    }
    if let Some(level) = var("SOUS_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(json) = var("SOUS_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }
    if let Some(secs) = var("SOUS_REQUEST_TIMEOUT_SECS") {
        if let Ok(parsed) = secs.parse() {
            config.pipeline.request_timeout_secs = Some(parsed);
        }
    }
    if let Some(base_url) = var("SOUS_LLM_BASE_URL") {
        config.llm.base_url = base_url;
    }
    if let Some(api_key) = var("SOUS_LLM_API_KEY").filter(|key| !key.is_empty()) {
        config.llm.api_key = Some(api_key);
    }
    if let Some(model) = var("SOUS_LLM_MODEL") {
        config.llm.model = model;
    }
    if let Some(binary) = var("SOUS_STT_BINARY") {
        config.stt.binary_path = binary.into();
    }
    if let Some(model) = var("SOUS_STT_MODEL") {
        config.stt.model_path = model.into();
    }
    if let Some(binary) = var("SOUS_TTS_BINARY") {
        config.tts.binary_path = binary.into();
    }
    if let Some(model) = var("SOUS_TTS_MODEL") {
        config.tts.model_path = model.into();
    }
}
