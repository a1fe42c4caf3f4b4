//! Tools the planning agent can invoke.
//!
//! Each tool wraps exactly one external REST API call behind a bounded
//! timeout and returns a normalized JSON summary string for the LLM to read.
//! Failures are typed as `ToolError`; the orchestrator converts them into
//! tool-failure messages so the agent can continue with a partial plan.

mod events;
mod geocoding;
mod movie;
mod places;
mod weather;

pub use events::DiscoverEvents;
pub use geocoding::GeocodeCity;
pub use movie::DiscoverMovies;
pub use places::FindRestaurants;
pub use weather::Weather;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::config::Config;
use crate::llm::{FunctionSchema, ToolSchema};

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Missing '{0}' argument")]
    MissingArgument(&'static str),

    #[error("Invalid '{0}' argument: {1}")]
    InvalidArgument(&'static str, String),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Upstream request failed: {0}")]
    Upstream(#[from] reqwest::Error),

    #[error("Upstream returned status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Failed to decode upstream response: {0}")]
    Decode(String),
}

impl ToolError {
    /// Whether the upstream rejected our credentials or quota.
    pub fn is_quota(&self) -> bool {
        matches!(self, ToolError::Status { status: 401 | 403 | 429, .. })
    }
}

/// A callable wrapping one external API, invocable by the LLM during planning.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON Schema for the tool's arguments (OpenAI function format).
    fn parameters_schema(&self) -> Value;

    async fn execute(&self, args: Value) -> Result<String, ToolError>;
}

/// Registry of the tools exposed to the agent.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    order: Vec<String>,
}

impl ToolRegistry {
    /// Build the registry with the five planning tools, sharing one HTTP
    /// client bounded by the configured tool timeout.
    pub fn new(config: &Config) -> Self {
        let http = shared_client(config.tool_timeout);

        let mut registry = Self {
            tools: HashMap::new(),
            order: Vec::new(),
        };
        registry.register(Arc::new(Weather::new(
            http.clone(),
            config.keys.openweathermap.clone(),
        )));
        registry.register(Arc::new(GeocodeCity::new(http.clone())));
        registry.register(Arc::new(FindRestaurants::new(http.clone())));
        registry.register(Arc::new(DiscoverEvents::new(
            http.clone(),
            config.keys.ticketmaster.clone(),
        )));
        registry.register(Arc::new(DiscoverMovies::new(http, config.keys.tmdb.clone())));
        registry
    }

    /// Empty registry for tests that install their own tools.
    #[cfg(test)]
    pub fn empty() -> Self {
        Self {
            tools: HashMap::new(),
            order: Vec::new(),
        }
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        if self.tools.insert(name.clone(), tool).is_none() {
            self.order.push(name);
        }
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    /// Tools in registration order.
    pub fn list(&self) -> Vec<&Arc<dyn Tool>> {
        self.order.iter().filter_map(|n| self.tools.get(n)).collect()
    }

    /// OpenAI-format schemas for all registered tools.
    pub fn schemas(&self) -> Vec<ToolSchema> {
        self.list()
            .into_iter()
            .map(|tool| ToolSchema {
                schema_type: "function".to_string(),
                function: FunctionSchema {
                    name: tool.name().to_string(),
                    description: tool.description().to_string(),
                    parameters: tool.parameters_schema(),
                },
            })
            .collect()
    }

    pub async fn execute(&self, name: &str, args: Value) -> Result<String, ToolError> {
        let tool = self
            .get(name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;
        tool.execute(args).await
    }
}

/// One HTTP client for all tools. The Nominatim and Overpass usage policies
/// require an identifying User-Agent.
fn shared_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent("weekend-planner-agent/1.0")
        .timeout(timeout)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

/// Check a response status, mapping non-2xx to `ToolError::Status` with a
/// bounded upstream message.
pub(crate) async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ToolError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    let message = message.lines().next().unwrap_or("").chars().take(200).collect();
    Err(ToolError::Status {
        status: status.as_u16(),
        message,
    })
}

pub(crate) fn required_str<'a>(args: &'a Value, key: &'static str) -> Result<&'a str, ToolError> {
    args[key].as_str().ok_or(ToolError::MissingArgument(key))
}

pub(crate) fn required_f64(args: &Value, key: &'static str) -> Result<f64, ToolError> {
    args[key].as_f64().ok_or(ToolError::MissingArgument(key))
}
