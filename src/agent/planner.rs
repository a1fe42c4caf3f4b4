//! Core planning loop implementation.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use thiserror::Error;

use crate::api::types::PlanResponse;
use crate::config::Config;
use crate::llm::{ChatMessage, LlmClient, LlmError, OpenAiClient, Role};
use crate::logging::{truncate_str, RequestContext, ToolInvocationRecord};
use crate::tools::ToolRegistry;

use super::prompt::build_system_prompt;

/// Returned when nothing better can be said; the endpoint must never hand
/// back an empty `output`.
const UNABLE_MESSAGE: &str =
    "Unable to complete a weekend plan for this request. Please try again in a moment.";

/// Asked of the LLM (without tools) when the loop ends without a usable
/// final answer.
const WRAP_UP_PROMPT: &str =
    "Wrap up now: write the best weekend plan you can from the information gathered so far. \
     If nothing useful was gathered, briefly say what went wrong.";

#[derive(Debug, Error)]
pub enum PlanError {
    #[error("plan request exceeded the overall deadline")]
    DeadlineExceeded,

    #[error(transparent)]
    Llm(#[from] LlmError),
}

/// Kinds of trace entries recorded during one plan request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceEntryKind {
    /// The LLM requested a tool
    ToolCall,
    /// A tool returned (or failed)
    ToolResult,
    /// The LLM produced the final itinerary
    Response,
    /// The non-empty-output fallback kicked in
    Fallback,
}

/// One step of the agent run, returned as part of `raw` in verbose mode.
#[derive(Debug, Clone, Serialize)]
pub struct TraceEntry {
    /// Timestamp (RFC 3339)
    pub timestamp: String,

    pub kind: TraceEntryKind,

    pub content: String,

    /// Tool execution time, present on `tool_result` entries
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

impl TraceEntry {
    fn new(kind: TraceEntryKind, content: String) -> Self {
        Self {
            timestamp: chrono::Utc::now().to_rfc3339(),
            kind,
            content,
            duration_ms: None,
        }
    }
}

/// The planning orchestrator.
///
/// Registers the API-client tools with the LLM, supplies the itinerary
/// system prompt, and runs the tool-calling loop under an overall deadline.
pub struct Planner {
    llm: Arc<dyn LlmClient>,
    tools: Arc<ToolRegistry>,
    max_iterations: usize,
    agent_timeout: std::time::Duration,
    truncate_chars: usize,
}

impl Planner {
    pub fn new(config: &Config) -> Self {
        Self::with_parts(
            Arc::new(OpenAiClient::new(config.openai.clone())),
            Arc::new(ToolRegistry::new(config)),
            config,
        )
    }

    /// Assemble a planner from explicit parts (scripted LLMs in tests, or a
    /// different `LlmClient` implementation).
    pub fn with_parts(
        llm: Arc<dyn LlmClient>,
        tools: Arc<ToolRegistry>,
        config: &Config,
    ) -> Self {
        Self {
            llm,
            tools,
            max_iterations: config.max_iterations,
            agent_timeout: config.agent_timeout,
            truncate_chars: config.log.truncate_chars,
        }
    }

    /// The registered tools, shared with the direct (non-LLM) endpoints.
    pub fn tools(&self) -> &Arc<ToolRegistry> {
        &self.tools
    }

    /// Produce an itinerary for `query`.
    ///
    /// Always returns a non-empty `output` on `Ok`; the trace is attached as
    /// `raw` only when `verbose` is set. The whole loop (including nested
    /// tool calls) runs under the configured overall deadline.
    pub async fn plan(
        &self,
        query: &str,
        verbose: bool,
        ctx: &RequestContext,
    ) -> Result<PlanResponse, PlanError> {
        let run = self.run_loop(query, ctx);
        let (output, trace) = tokio::time::timeout(self.agent_timeout, run)
            .await
            .map_err(|_| PlanError::DeadlineExceeded)??;

        tracing::info!(
            request_id = %ctx.request_id,
            duration_ms = ctx.elapsed().as_millis() as u64,
            steps = trace.len(),
            "plan complete"
        );

        let raw = if verbose {
            Some(serde_json::to_value(&trace).unwrap_or(serde_json::Value::Null))
        } else {
            None
        };

        Ok(PlanResponse { output, raw })
    }

    async fn run_loop(
        &self,
        query: &str,
        ctx: &RequestContext,
    ) -> Result<(String, Vec<TraceEntry>), PlanError> {
        let mut trace = Vec::new();
        let mut messages = vec![
            ChatMessage::system(build_system_prompt(&self.tools)),
            ChatMessage::user(query),
        ];
        let schemas = self.tools.schemas();

        for iteration in 0..self.max_iterations {
            tracing::debug!(request_id = %ctx.request_id, iteration = iteration + 1, "agent iteration");

            let response = self.llm.chat_completion(&messages, Some(&schemas)).await?;

            if let Some(tool_calls) = response
                .tool_calls
                .as_ref()
                .filter(|calls| !calls.is_empty())
            {
                messages.push(ChatMessage {
                    role: Role::Assistant,
                    content: response.content.clone(),
                    tool_calls: Some(tool_calls.clone()),
                    tool_call_id: None,
                });

                for call in tool_calls {
                    let name = &call.function.name;
                    let args: serde_json::Value =
                        serde_json::from_str(&call.function.arguments)
                            .unwrap_or(serde_json::Value::Null);

                    trace.push(TraceEntry::new(
                        TraceEntryKind::ToolCall,
                        format!("{} {}", name, truncate_str(&call.function.arguments, 200)),
                    ));

                    let started = Instant::now();
                    let result = self.tools.execute(name, args.clone()).await;
                    let duration = started.elapsed();

                    // A failed tool becomes a failure message the LLM can
                    // plan around, never an aborted request.
                    let result_str = match result {
                        Ok(output) => output,
                        Err(e) => {
                            tracing::warn!(
                                request_id = %ctx.request_id,
                                tool = %name,
                                error = %e,
                                "tool failed, continuing with degraded plan"
                            );
                            format!("Error: {}", e)
                        }
                    };

                    ToolInvocationRecord::new(name, &args, &result_str, duration, self.truncate_chars)
                        .emit(&ctx.request_id);

                    let mut entry = TraceEntry::new(
                        TraceEntryKind::ToolResult,
                        truncate_str(&result_str, self.truncate_chars),
                    );
                    entry.duration_ms = Some(duration.as_millis() as u64);
                    trace.push(entry);

                    messages.push(ChatMessage::tool_result(call.id.clone(), result_str));
                }

                continue;
            }

            // No tool calls: a non-empty reply is the final itinerary.
            if let Some(content) = response.content.filter(|c| !c.trim().is_empty()) {
                trace.push(TraceEntry::new(
                    TraceEntryKind::Response,
                    truncate_str(&content, self.truncate_chars),
                ));
                return Ok((content, trace));
            }

            tracing::warn!(request_id = %ctx.request_id, "LLM returned empty response, falling back");
            return Ok(self.wrap_up(messages, trace).await);
        }

        tracing::warn!(
            request_id = %ctx.request_id,
            max_iterations = self.max_iterations,
            "agent loop exhausted without a final answer"
        );
        Ok(self.wrap_up(messages, trace).await)
    }

    /// Last-resort path keeping the non-empty-output guarantee: one
    /// tool-free LLM call over the conversation so far, then a fixed message.
    async fn wrap_up(
        &self,
        mut messages: Vec<ChatMessage>,
        mut trace: Vec<TraceEntry>,
    ) -> (String, Vec<TraceEntry>) {
        messages.push(ChatMessage::user(WRAP_UP_PROMPT));

        let output = match self.llm.chat_completion(&messages, None).await {
            Ok(reply) => reply
                .content
                .filter(|c| !c.trim().is_empty())
                .unwrap_or_else(|| UNABLE_MESSAGE.to_string()),
            Err(e) => {
                tracing::warn!(error = %e, "wrap-up call failed");
                UNABLE_MESSAGE.to_string()
            }
        };

        trace.push(TraceEntry::new(
            TraceEntryKind::Fallback,
            truncate_str(&output, self.truncate_chars),
        ));
        (output, trace)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::{json, Value};

    use crate::llm::{AssistantMessage, FunctionCall, ToolCall, ToolSchema};
    use crate::tools::{Tool, ToolError};

    /// LLM double that replays a fixed sequence of replies and records every
    /// conversation it was shown.
    struct ScriptedLlm {
        replies: Mutex<VecDeque<Result<AssistantMessage, LlmError>>>,
        conversations: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl ScriptedLlm {
        fn new(replies: Vec<Result<AssistantMessage, LlmError>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                conversations: Mutex::new(Vec::new()),
            })
        }

        fn conversation(&self, index: usize) -> Vec<ChatMessage> {
            self.conversations.lock().unwrap()[index].clone()
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn chat_completion(
            &self,
            messages: &[ChatMessage],
            _tools: Option<&[ToolSchema]>,
        ) -> Result<AssistantMessage, LlmError> {
            self.conversations.lock().unwrap().push(messages.to_vec());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(LlmError::EmptyResponse))
        }
    }

    /// LLM double that never resolves, for deadline tests.
    struct StalledLlm;

    #[async_trait]
    impl LlmClient for StalledLlm {
        async fn chat_completion(
            &self,
            _messages: &[ChatMessage],
            _tools: Option<&[ToolSchema]>,
        ) -> Result<AssistantMessage, LlmError> {
            futures::future::pending().await
        }
    }

    struct EchoTool {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "Echo the input back"
        }
        fn parameters_schema(&self) -> Value {
            json!({"type": "object", "properties": {}})
        }
        async fn execute(&self, args: Value) -> Result<String, ToolError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!("echo: {}", args))
        }
    }

    struct BrokenTool;

    #[async_trait]
    impl Tool for BrokenTool {
        fn name(&self) -> &str {
            "broken"
        }
        fn description(&self) -> &str {
            "Always fails"
        }
        fn parameters_schema(&self) -> Value {
            json!({"type": "object", "properties": {}})
        }
        async fn execute(&self, _args: Value) -> Result<String, ToolError> {
            Err(ToolError::Status {
                status: 503,
                message: "upstream unavailable".to_string(),
            })
        }
    }

    fn text_reply(content: &str) -> Result<AssistantMessage, LlmError> {
        Ok(AssistantMessage {
            content: Some(content.to_string()),
            tool_calls: None,
        })
    }

    fn tool_reply(name: &str, arguments: &str) -> Result<AssistantMessage, LlmError> {
        Ok(AssistantMessage {
            content: None,
            tool_calls: Some(vec![ToolCall {
                id: format!("call_{}", name),
                call_type: "function".to_string(),
                function: FunctionCall {
                    name: name.to_string(),
                    arguments: arguments.to_string(),
                },
            }]),
        })
    }

    fn planner_with(
        llm: Arc<dyn LlmClient>,
        tools: Vec<Arc<dyn Tool>>,
    ) -> Planner {
        let mut registry = ToolRegistry::empty();
        for tool in tools {
            registry.register(tool);
        }
        Planner::with_parts(llm, Arc::new(registry), &Config::for_tests())
    }

    fn ctx() -> RequestContext {
        RequestContext::new("req-test".to_string())
    }

    #[tokio::test]
    async fn direct_answer_yields_output_and_no_raw() {
        let llm = ScriptedLlm::new(vec![text_reply("Saturday: sushi, then jazz.")]);
        let planner = planner_with(llm, vec![]);

        let response = planner.plan("Plan my weekend", false, &ctx()).await.unwrap();
        assert_eq!(response.output, "Saturday: sushi, then jazz.");
        assert!(response.raw.is_none());
    }

    #[tokio::test]
    async fn verbose_attaches_trace() {
        let llm = ScriptedLlm::new(vec![text_reply("A fine plan.")]);
        let planner = planner_with(llm, vec![]);

        let response = planner.plan("Plan my weekend", true, &ctx()).await.unwrap();
        let raw = response.raw.expect("raw trace in verbose mode");
        assert!(!raw.is_null());
        assert_eq!(raw[0]["kind"], "response");
    }

    #[tokio::test]
    async fn tool_round_trip_feeds_result_back() {
        let echo = Arc::new(EchoTool {
            calls: AtomicUsize::new(0),
        });
        let llm = ScriptedLlm::new(vec![
            tool_reply("echo", r#"{"city":"San Jose"}"#),
            text_reply("Done: weekend planned."),
        ]);
        let planner = planner_with(llm.clone(), vec![echo.clone()]);

        let response = planner.plan("Plan my weekend", true, &ctx()).await.unwrap();

        assert_eq!(echo.calls.load(Ordering::SeqCst), 1);
        assert_eq!(response.output, "Done: weekend planned.");

        // Second LLM call must see the assistant tool request and the tool result
        let second = llm.conversation(1);
        assert!(second.iter().any(|m| m.role == Role::Assistant));
        let tool_msg = second.iter().find(|m| m.role == Role::Tool).unwrap();
        assert_eq!(tool_msg.tool_call_id.as_deref(), Some("call_echo"));
        assert!(tool_msg.content.as_deref().unwrap().contains("San Jose"));

        // Exactly one tool_call and one tool_result trace entry
        let raw = response.raw.unwrap();
        let kinds: Vec<&str> = raw
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["kind"].as_str().unwrap())
            .collect();
        assert_eq!(kinds, vec!["tool_call", "tool_result", "response"]);
        assert!(raw[1]["duration_ms"].is_u64());
    }

    #[tokio::test]
    async fn tool_failure_degrades_instead_of_aborting() {
        let llm = ScriptedLlm::new(vec![
            tool_reply("broken", "{}"),
            text_reply("Plan without event data."),
        ]);
        let planner = planner_with(llm.clone(), vec![Arc::new(BrokenTool)]);

        let response = planner.plan("Plan my weekend", true, &ctx()).await.unwrap();
        assert_eq!(response.output, "Plan without event data.");

        // The LLM saw the failure as a tool message, not an aborted request
        let second = llm.conversation(1);
        let tool_msg = second.iter().find(|m| m.role == Role::Tool).unwrap();
        assert!(tool_msg.content.as_deref().unwrap().starts_with("Error:"));
    }

    #[tokio::test]
    async fn unknown_tool_request_is_survivable() {
        let llm = ScriptedLlm::new(vec![
            tool_reply("no_such_tool", "{}"),
            text_reply("Recovered."),
        ]);
        let planner = planner_with(llm, vec![]);

        let response = planner.plan("Plan my weekend", false, &ctx()).await.unwrap();
        assert_eq!(response.output, "Recovered.");
    }

    #[tokio::test]
    async fn empty_reply_falls_back_to_wrap_up_answer() {
        let llm = ScriptedLlm::new(vec![
            text_reply("   "),
            text_reply("Best effort: stay home, it will rain."),
        ]);
        let planner = planner_with(llm, vec![]);

        let response = planner.plan("Plan my weekend", true, &ctx()).await.unwrap();
        assert_eq!(response.output, "Best effort: stay home, it will rain.");
        let raw = response.raw.unwrap();
        let last = raw.as_array().unwrap().last().unwrap();
        assert_eq!(last["kind"], "fallback");
    }

    #[tokio::test]
    async fn output_is_never_empty_even_when_wrap_up_fails() {
        let llm = ScriptedLlm::new(vec![text_reply(""), Err(LlmError::EmptyResponse)]);
        let planner = planner_with(llm, vec![]);

        let response = planner.plan("Plan my weekend", false, &ctx()).await.unwrap();
        assert!(!response.output.trim().is_empty());
        assert_eq!(response.output, UNABLE_MESSAGE);
    }

    #[tokio::test]
    async fn loop_exhaustion_still_produces_output() {
        // Every scripted reply requests another tool call; the loop gives up
        // after max_iterations, then the wrap-up reply lands.
        let mut replies: Vec<Result<AssistantMessage, LlmError>> = (0..10)
            .map(|_| tool_reply("echo", "{}"))
            .collect();
        replies.push(text_reply("Exhausted but here is the plan."));

        let echo = Arc::new(EchoTool {
            calls: AtomicUsize::new(0),
        });
        let planner = planner_with(ScriptedLlm::new(replies), vec![echo]);

        let response = planner.plan("Plan my weekend", false, &ctx()).await.unwrap();
        assert_eq!(response.output, "Exhausted but here is the plan.");
    }

    #[tokio::test]
    async fn llm_transport_failure_surfaces_as_error() {
        let llm = ScriptedLlm::new(vec![Err(LlmError::EmptyResponse)]);
        let planner = planner_with(llm, vec![]);

        let err = planner.plan("Plan my weekend", false, &ctx()).await.unwrap_err();
        assert!(matches!(err, PlanError::Llm(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_llm_hits_overall_deadline() {
        let planner = planner_with(Arc::new(StalledLlm), vec![]);

        let err = planner.plan("Plan my weekend", false, &ctx()).await.unwrap_err();
        assert!(matches!(err, PlanError::DeadlineExceeded));
    }
}
