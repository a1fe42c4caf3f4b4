//! API request and response types.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

/// Request to plan a weekend.
#[derive(Debug, Clone, Deserialize)]
pub struct PlanRequest {
    /// Free-text query, e.g. "Plan my weekend in San Jose. I like sushi and live music."
    pub query: String,

    /// When set, the response carries the full agent trace in `raw`
    #[serde(default)]
    pub verbose: bool,
}

/// The planned itinerary.
///
/// `raw` is always present in the JSON body: the serialized trace in verbose
/// mode, `null` otherwise.
#[derive(Debug, Clone, Serialize)]
pub struct PlanResponse {
    /// Natural-language itinerary, never empty
    pub output: String,

    /// Full agent trace (tool calls, results, final response)
    pub raw: Option<serde_json::Value>,
}

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,

    /// Service version
    pub version: String,
}

/// Error body returned to callers. Carries a generic message only; internal
/// error detail stays in the log.
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub message: String,
    pub r#type: String,
    pub code: Option<String>,
}

pub fn error_response(status: StatusCode, message: String, code: &str) -> Response {
    let body = ErrorResponse {
        error: ErrorBody {
            message,
            r#type: "error".to_string(),
            code: Some(code.to_string()),
        },
    };
    (status, Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbose_defaults_to_false() {
        let request: PlanRequest =
            serde_json::from_str(r#"{"query": "Plan my weekend"}"#).unwrap();
        assert_eq!(request.query, "Plan my weekend");
        assert!(!request.verbose);
    }

    #[test]
    fn missing_query_fails_to_parse() {
        let result = serde_json::from_str::<PlanRequest>(r#"{"verbose": true}"#);
        assert!(result.is_err());
    }

    #[test]
    fn raw_serializes_as_null_when_absent() {
        let response = PlanResponse {
            output: "plan".to_string(),
            raw: None,
        };
        let json = serde_json::to_value(&response).unwrap();
        assert!(json["raw"].is_null());
        assert_eq!(json["output"], "plan");
    }
}
