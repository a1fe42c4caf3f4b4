//! Request correlation and log hygiene.
//!
//! Every HTTP request gets a request id (from `X-Request-ID` or freshly
//! generated) that is echoed on the response and attached to all log lines
//! for that request. Tool inputs and outputs are sanitized (secret-looking
//! keys redacted) and truncated before they reach the log stream.
//! Observability only: no behavior depends on log content.

use std::sync::OnceLock;
use std::time::{Duration, Instant};

use axum::{extract::Request, http::HeaderValue, middleware::Next, response::Response};
use regex::Regex;
use serde_json::Value;
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Correlation id extension inserted by [`request_id_middleware`].
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// Per-request correlation state, created once per HTTP call.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: String,
    pub start_time: Instant,
}

impl RequestContext {
    pub fn new(request_id: String) -> Self {
        Self {
            request_id,
            start_time: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }
}

/// Accept a caller-supplied `X-Request-ID` (or mint a UUIDv4), expose it to
/// handlers via an extension, and echo it on the response.
pub async fn request_id_middleware(mut request: Request, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    request.extensions_mut().insert(RequestId(request_id.clone()));

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

/// One tool call as seen by the log stream. Created per invocation, written
/// out, then discarded.
#[derive(Debug)]
pub struct ToolInvocationRecord {
    pub tool_name: String,
    pub inputs: String,
    pub truncated_output: String,
    pub duration: Duration,
}

impl ToolInvocationRecord {
    pub fn new(
        tool_name: &str,
        inputs: &Value,
        output: &str,
        duration: Duration,
        truncate_chars: usize,
    ) -> Self {
        Self {
            tool_name: tool_name.to_string(),
            inputs: sanitize_for_log(inputs, truncate_chars),
            truncated_output: truncate_str(output, truncate_chars),
            duration,
        }
    }

    /// Emit the record as a single structured log line tagged with the
    /// request id.
    pub fn emit(&self, request_id: &str) {
        tracing::info!(
            request_id = %request_id,
            tool = %self.tool_name,
            duration_ms = self.duration.as_millis() as u64,
            inputs = %self.inputs,
            output = %self.truncated_output,
            "tool invocation"
        );
    }
}

fn secret_key_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(api[_-]?key|authorization|token|secret|password)")
            .expect("secret key regex is valid")
    })
}

/// Serialize a JSON value for logging, replacing values under secret-looking
/// keys with `***` and truncating the result.
pub fn sanitize_for_log(value: &Value, max_chars: usize) -> String {
    let sanitized = sanitize_value(value);
    let serialized = serde_json::to_string(&sanitized).unwrap_or_else(|_| format!("{:?}", value));
    truncate_str(&serialized, max_chars)
}

fn sanitize_value(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, val)| {
                    if secret_key_re().is_match(key) {
                        (key.clone(), Value::String("***".to_string()))
                    } else {
                        (key.clone(), sanitize_value(val))
                    }
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(sanitize_value).collect()),
        other => other.clone(),
    }
}

/// Truncate at a UTF-8 character boundary, noting how much was dropped.
pub fn truncate_str(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…(truncated {} chars)", &s[..end], s.len() - end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn truncate_keeps_short_strings_intact() {
        assert_eq!(truncate_str("hello", 10), "hello");
    }

    #[test]
    fn truncate_reports_dropped_length() {
        let s = "a".repeat(30);
        let out = truncate_str(&s, 10);
        assert!(out.starts_with("aaaaaaaaaa"));
        assert!(out.ends_with("(truncated 20 chars)"));
    }

    #[test]
    fn truncate_respects_utf8_boundaries() {
        // Each 'é' is two bytes; a limit inside a char must back off.
        let s = "ééééé";
        let out = truncate_str(s, 3);
        assert!(out.starts_with('é'));
        assert!(!out.starts_with("éé"));
    }

    #[test]
    fn sanitize_redacts_secret_keys_recursively() {
        let value = json!({
            "query": "sushi",
            "apikey": "abc123",
            "nested": { "Authorization": "Bearer xyz", "city": "San Jose" },
            "list": [{ "api_key": "def" }]
        });
        let out = sanitize_for_log(&value, 1000);
        assert!(!out.contains("abc123"));
        assert!(!out.contains("Bearer xyz"));
        assert!(!out.contains("def"));
        assert!(out.contains("sushi"));
        assert!(out.contains("San Jose"));
    }

    #[test]
    fn tool_record_truncates_both_directions() {
        let record = ToolInvocationRecord::new(
            "weather",
            &json!({ "prompt": "x".repeat(100) }),
            &"y".repeat(100),
            Duration::from_millis(12),
            40,
        );
        assert!(record.inputs.contains("truncated"));
        assert!(record.truncated_output.contains("truncated"));
        assert_eq!(record.tool_name, "weather");
    }
}
