//! OpenAI chat-completions client.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::OpenAiConfig;

use super::{AssistantMessage, ChatMessage, LlmClient, LlmError, ToolSchema};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Client for the OpenAI `/chat/completions` endpoint.
pub struct OpenAiClient {
    http: reqwest::Client,
    config: OpenAiConfig,
    base_url: String,
}

impl OpenAiClient {
    pub fn new(config: OpenAiConfig) -> Self {
        Self::with_base_url(config, DEFAULT_BASE_URL)
    }

    /// Point the client at a different OpenAI-compatible endpoint.
    pub fn with_base_url(config: OpenAiConfig, base_url: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            http,
            config,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<&'a [ToolSchema]>,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
    tool_calls: Option<Vec<super::ToolCall>>,
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn chat_completion(
        &self,
        messages: &[ChatMessage],
        tools: Option<&[ToolSchema]>,
    ) -> Result<AssistantMessage, LlmError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = CompletionRequest {
            model: &self.config.model,
            messages,
            temperature: self.config.temperature,
            tools,
        };

        let response = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Deadline
                } else {
                    LlmError::Transport(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            // Surface the upstream message for the log, not the caller.
            let message = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                message: first_line(&message, 300),
            });
        }

        let completion: CompletionResponse = response.json().await.map_err(LlmError::Transport)?;
        let choice = completion
            .choices
            .into_iter()
            .next()
            .ok_or(LlmError::EmptyResponse)?;

        Ok(AssistantMessage {
            content: choice.message.content,
            tool_calls: choice.message.tool_calls,
        })
    }
}

/// First line of an upstream error body, bounded for logging.
fn first_line(s: &str, max: usize) -> String {
    let line = s.lines().next().unwrap_or("").trim();
    let mut end = line.len().min(max);
    while end > 0 && !line.is_char_boundary(end) {
        end -= 1;
    }
    line[..end].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completion_request_omits_tools_when_none() {
        let messages = vec![ChatMessage::user("hello")];
        let req = CompletionRequest {
            model: "gpt-5-nano",
            messages: &messages,
            temperature: 0.1,
            tools: None,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert!(json.get("tools").is_none());
        assert_eq!(json["model"], "gpt-5-nano");
        assert_eq!(json["messages"][0]["role"], "user");
    }

    #[test]
    fn completion_response_parses_tool_calls() {
        let raw = serde_json::json!({
            "choices": [{
                "message": {
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {
                            "name": "geocode_city",
                            "arguments": "{\"city\":\"San Jose, CA\"}"
                        }
                    }]
                }
            }]
        });
        let parsed: CompletionResponse = serde_json::from_value(raw).unwrap();
        let calls = parsed.choices[0].message.tool_calls.as_ref().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].function.name, "geocode_city");
    }

    #[test]
    fn first_line_bounds_long_bodies() {
        let body = "a".repeat(500) + "\nsecond line";
        let line = first_line(&body, 300);
        assert_eq!(line.len(), 300);
        assert!(!line.contains('\n'));
    }
}
