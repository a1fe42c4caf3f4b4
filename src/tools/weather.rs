//! Weather tool backed by the OpenWeatherMap assistant API.

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{check_status, required_str, Tool, ToolError};

const SESSION_URL: &str = "https://api.openweathermap.org/assistant/session";

/// Ask the OpenWeatherMap assistant a free-text weather question.
pub struct Weather {
    http: reqwest::Client,
    api_key: String,
}

impl Weather {
    pub fn new(http: reqwest::Client, api_key: String) -> Self {
        Self { http, api_key }
    }
}

#[async_trait]
impl Tool for Weather {
    fn name(&self) -> &str {
        "weather"
    }

    fn description(&self) -> &str {
        "Get a weather forecast or current conditions from a natural-language prompt, e.g. 'What's the weather like in San Jose, CA next weekend?'. Use this for the weather section of the itinerary."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "prompt": {
                    "type": "string",
                    "description": "Natural-language weather question including the location and time frame"
                }
            },
            "required": ["prompt"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, ToolError> {
        let prompt = required_str(&args, "prompt")?;

        let response = self
            .http
            .post(SESSION_URL)
            .header("Content-Type", "application/json")
            .header("X-Api-Key", &self.api_key)
            .json(&json!({ "prompt": prompt }))
            .send()
            .await?;

        let response = check_status(response).await?;
        let body: Value = response
            .json()
            .await
            .map_err(|e| ToolError::Decode(e.to_string()))?;

        serde_json::to_string(&body).map_err(|e| ToolError::Decode(e.to_string()))
    }
}
