//! Request handlers for the planning endpoints.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Extension, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;
use tracing::Instrument;

use crate::agent::PlanError;
use crate::logging::{RequestContext, RequestId};

use super::types::{error_response, HealthResponse, PlanRequest};
use super::AppState;

/// `POST /agent`: run the planning agent on a free-text query.
///
/// The body is parsed by hand so malformed requests get a `400` before any
/// tool or LLM call happens.
pub async fn run_agent(
    State(state): State<Arc<AppState>>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    body: Bytes,
) -> Response {
    let request: PlanRequest = match serde_json::from_slice(&body) {
        Ok(r) => r,
        Err(e) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                format!("Invalid request body: {}", e),
                "invalid_request_error",
            );
        }
    };

    if request.query.trim().is_empty() {
        return error_response(
            StatusCode::BAD_REQUEST,
            "Field 'query' must be a non-empty string".to_string(),
            "invalid_request_error",
        );
    }

    let ctx = RequestContext::new(request_id);
    let span = tracing::info_span!("agent_request", request_id = %ctx.request_id);

    tracing::info!(
        request_id = %ctx.request_id,
        verbose = request.verbose,
        "plan request accepted"
    );

    let result = state
        .planner
        .plan(&request.query, request.verbose, &ctx)
        .instrument(span)
        .await;

    match result {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(PlanError::DeadlineExceeded) => {
            tracing::error!(request_id = %ctx.request_id, "plan request hit the overall deadline");
            error_response(
                StatusCode::GATEWAY_TIMEOUT,
                "The planning request took too long to complete".to_string(),
                "deadline_exceeded",
            )
        }
        Err(PlanError::Llm(e)) => {
            tracing::error!(request_id = %ctx.request_id, error = %e, "plan request failed upstream");
            error_response(
                StatusCode::BAD_GATEWAY,
                "The planning service is temporarily unavailable".to_string(),
                "upstream_error",
            )
        }
    }
}

/// Query parameters for the direct (non-LLM) plan endpoint.
#[derive(Debug, Deserialize)]
pub struct DirectPlanQuery {
    #[serde(default = "default_prompt")]
    pub prompt: String,

    #[serde(default = "default_city")]
    pub city_name: String,
}

fn default_prompt() -> String {
    "What's the weather like in San Jose, CA next weekend?".to_string()
}

fn default_city() -> String {
    "San Jose, CA".to_string()
}

/// `GET /plan`: direct composition of the weather and geocoding tools,
/// with no LLM in the loop. Tool failures degrade to explanatory text.
pub async fn direct_plan(
    State(state): State<Arc<AppState>>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    Query(params): Query<DirectPlanQuery>,
) -> Response {
    let tools = state.planner.tools();

    let weather = match tools
        .execute("weather", json!({ "prompt": params.prompt }))
        .await
    {
        Ok(summary) => serde_json::from_str(&summary).unwrap_or(serde_json::Value::String(summary)),
        Err(e) => {
            tracing::warn!(request_id = %request_id, error = %e, "weather lookup failed");
            json!("Could not retrieve weather for the given prompt.")
        }
    };

    let location = match tools
        .execute("geocode_city", json!({ "city": params.city_name }))
        .await
    {
        Ok(summary) => serde_json::from_str(&summary).unwrap_or(serde_json::Value::String(summary)),
        Err(e) => {
            tracing::warn!(request_id = %request_id, error = %e, "geocoding failed");
            json!("Could not retrieve latitude and longitude for the given city.")
        }
    };

    Json(json!({
        "plan": "Here is the information for your trip:",
        "weather": weather,
        "location": location,
    }))
    .into_response()
}

/// `GET /`: welcome message.
pub async fn root() -> Json<serde_json::Value> {
    Json(json!({ "message": "Welcome to the Weekend Planner Agent!" }))
}

/// `GET /health`: liveness probe.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
