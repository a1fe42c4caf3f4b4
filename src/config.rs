//! Configuration management for the planner service.
//!
//! Configuration can be set via environment variables:
//! - `OPENAI_API_KEY` - Required. API key for the OpenAI chat completions API.
//! - `OPENWEATHERMAP_API_KEY` - Required. Key for the OpenWeatherMap assistant API.
//! - `TMDB_ACCESS_KEY` - Required. Bearer token for the TMDB discover API.
//! - `TICKETMASTER_API_KEY` - Required. Key for the Ticketmaster Discovery API.
//! - `OPENAI_MODEL` - Optional. Model identifier. Defaults to `gpt-5-nano`.
//! - `OPENAI_TIMEOUT_S` - Optional. Per-LLM-call timeout in seconds. Defaults to `30`.
//! - `OPENAI_TEMPERATURE` - Optional. Sampling temperature. Defaults to `0.1`.
//! - `HOST` - Optional. Server host. Defaults to `127.0.0.1`.
//! - `PORT` - Optional. Server port. Defaults to `3000`.
//! - `AGENT_TIMEOUT_S` - Optional. Overall deadline for one plan request. Defaults to `120`.
//! - `MAX_ITERATIONS` - Optional. Maximum agent loop iterations. Defaults to `10`.
//! - `TOOL_TIMEOUT_S` - Optional. Timeout for each external API call. Defaults to `10`.
//! - `LOG_LEVEL` - Optional. Default tracing filter directive. Defaults to `info`.
//! - `LOG_TRUNCATE_CHARS` - Optional. Truncation limit for logged tool
//!   inputs/outputs. Defaults to `2000`.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// LLM client configuration.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// OpenAI API key
    pub api_key: String,

    /// Model identifier
    pub model: String,

    /// Per-request timeout for chat completion calls
    pub timeout: Duration,

    /// Sampling temperature
    pub temperature: f32,
}

/// API keys for the external planning data sources.
#[derive(Debug, Clone)]
pub struct ToolKeys {
    /// OpenWeatherMap assistant API key
    pub openweathermap: String,

    /// TMDB read access token (sent as a bearer token)
    pub tmdb: String,

    /// Ticketmaster Discovery API key
    pub ticketmaster: String,
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Default tracing filter directive when `RUST_LOG` is unset
    pub level: String,

    /// Truncation limit for tool inputs/outputs written to the log
    pub truncate_chars: usize,
}

/// Service configuration, read once at startup and passed explicitly to the
/// orchestrator and tool constructors.
#[derive(Debug, Clone)]
pub struct Config {
    /// LLM client settings
    pub openai: OpenAiConfig,

    /// External API keys for the tools
    pub keys: ToolKeys,

    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    /// Overall deadline for a single plan request (covers all nested tool calls)
    pub agent_timeout: Duration,

    /// Maximum iterations for the agent loop
    pub max_iterations: usize,

    /// Timeout for each external tool HTTP call
    pub tool_timeout: Duration,

    /// Logging settings
    pub log: LogConfig,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` if any required API key is not
    /// set, so a misconfigured deployment fails before the listener binds.
    pub fn from_env() -> Result<Self, ConfigError> {
        let openai = OpenAiConfig {
            api_key: require_env("OPENAI_API_KEY")?,
            model: std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-5-nano".to_string()),
            timeout: Duration::from_secs(parse_env("OPENAI_TIMEOUT_S", 30)?),
            temperature: parse_env("OPENAI_TEMPERATURE", 0.1f32)?,
        };

        let keys = ToolKeys {
            openweathermap: require_env("OPENWEATHERMAP_API_KEY")?,
            tmdb: require_env("TMDB_ACCESS_KEY")?,
            ticketmaster: require_env("TICKETMASTER_API_KEY")?,
        };

        let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = parse_env("PORT", 3000u16)?;

        let agent_timeout = Duration::from_secs(parse_env("AGENT_TIMEOUT_S", 120)?);
        let max_iterations = parse_env("MAX_ITERATIONS", 10usize)?;
        let tool_timeout = Duration::from_secs(parse_env("TOOL_TIMEOUT_S", 10)?);

        let log = LogConfig {
            level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            truncate_chars: parse_env("LOG_TRUNCATE_CHARS", 2000usize)?,
        };

        Ok(Self {
            openai,
            keys,
            host,
            port,
            agent_timeout,
            max_iterations,
            tool_timeout,
            log,
        })
    }

    /// Create a config with placeholder keys and the documented defaults
    /// (useful for testing).
    pub fn for_tests() -> Self {
        Self {
            openai: OpenAiConfig {
                api_key: "test-openai-key".to_string(),
                model: "gpt-5-nano".to_string(),
                timeout: Duration::from_secs(30),
                temperature: 0.1,
            },
            keys: ToolKeys {
                openweathermap: "test-owm-key".to_string(),
                tmdb: "test-tmdb-token".to_string(),
                ticketmaster: "test-tm-key".to_string(),
            },
            host: "127.0.0.1".to_string(),
            port: 3000,
            agent_timeout: Duration::from_secs(120),
            max_iterations: 10,
            tool_timeout: Duration::from_secs(10),
            log: LogConfig {
                level: "info".to_string(),
                truncate_chars: 2000,
            },
        }
    }
}

fn require_env(name: &str) -> Result<String, ConfigError> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ConfigError::MissingEnvVar(name.to_string()))
}

fn parse_env<T: std::str::FromStr>(name: &str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), format!("{}", e))),
        Err(_) => Ok(default),
    }
}
