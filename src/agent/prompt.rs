//! System prompt template for the planner.

use crate::tools::ToolRegistry;

/// Build the system prompt with tool descriptions and the expected
/// itinerary structure.
pub fn build_system_prompt(tools: &ToolRegistry) -> String {
    let tool_descriptions = tools
        .list()
        .iter()
        .map(|t| format!("- **{}**: {}", t.name(), t.description()))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"You are a weekend planner. Given a user's request, compose a concrete weekend itinerary for their city and interests.

## Your Tools

{tool_descriptions}

## Guidelines

1. **Geocode first** - Restaurants and events need coordinates; resolve the city before calling those tools.

2. **Use real data** - Prefer tool results over your own guesses. If a tool fails, say so briefly and plan around the gap rather than inventing details.

3. **Stay on scope** - Only plan what the user asked about. Don't pad the itinerary with sections they didn't want.

## Itinerary Structure

Write the final answer as a readable plan covering, where relevant:
- **Weather**: the outlook for the weekend and how it shapes the plan
- **Dining**: specific restaurants matching the user's tastes
- **Events**: concerts, games, or shows happening that weekend
- **Movies**: current releases as a backup for bad weather

Finish with the complete itinerary as plain text. If you need data, respond with a tool call and the system will return the result."#,
        tool_descriptions = tool_descriptions
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn prompt_lists_every_registered_tool() {
        let tools = ToolRegistry::new(&Config::for_tests());
        let prompt = build_system_prompt(&tools);
        for tool in tools.list() {
            assert!(prompt.contains(tool.name()), "missing {}", tool.name());
        }
        assert!(prompt.contains("weekend planner"));
    }
}
