//! Agent module - the LLM-driven planning orchestrator.
//!
//! The planner follows a "tools in a loop" pattern:
//! 1. Build context with system prompt and the user's query
//! 2. Call LLM with the available tools
//! 3. If the LLM requests tool calls, execute them and feed results back
//! 4. Repeat until the LLM produces a final itinerary or limits are hit
//!
//! The loop's reasoning (which tools, what order) belongs to the LLM; the
//! planner only enforces the overall deadline, records the trace, and
//! guarantees a non-empty answer.

mod planner;
mod prompt;

pub use planner::{PlanError, Planner, TraceEntry, TraceEntryKind};
pub use prompt::build_system_prompt;
