//! Synthesis of the tool-use instruction injected into rewritten requests.
//!
//! The instruction enumerates every tool (name, optional description, a
//! `Strict: true` marker when the caller set it explicitly, and the
//! parameter schema serialized as JSON) and teaches the model to answer
//! with a JSON array of `{"name": ..., "parameters": ...}` objects. Prior
//! tool results removed from the conversation are appended as a
//! "Previous tool calls" section in their original order.

use itertools::Itertools;

use crate::protocol::openai::Tool;

pub(crate) mod pool;

/// Placeholder a custom template uses to position the rendered tool
/// enumeration. Without it the enumeration is appended to the template.
pub const TOOLS_PLACEHOLDER: &str = "{tools}";

const BUILT_IN_TEMPLATE: &str = "\
You have access to the following functions:

{tools}

To call a function, respond with a JSON array of call objects, each shaped \
exactly as {\"name\": FUNCTION_NAME, \"parameters\": ARGUMENTS}. Use the \
function name verbatim and pass arguments matching its parameter schema. \
Respond with the JSON only, no surrounding prose, when you decide to call \
a function.";

/// A folded tool-result message: the id it answered and its content.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ToolResultEntry {
    pub tool_call_id: Option<String>,
    pub content: String,
}

/// Render the full instruction text for `tools` and previously observed
/// `results`, honoring a caller-supplied template override.
pub(crate) fn render(tools: &[Tool], results: &[ToolResultEntry], custom_template: Option<&str>) -> String {
    let mut buffer = pool::shared().acquire();

    // Folded results alone (no tools, no override) need no instruction
    // block.
    if !tools.is_empty() || custom_template.is_some() {
        let enumeration = render_tool_list(tools);
        let template = custom_template.unwrap_or(BUILT_IN_TEMPLATE);

        match template.split_once(TOOLS_PLACEHOLDER) {
            Some((before, after)) => {
                buffer.push_str(before);
                buffer.push_str(&enumeration);
                buffer.push_str(after);
            }
            None => {
                buffer.push_str(template);
                if !enumeration.is_empty() {
                    buffer.push_str("\n\n");
                    buffer.push_str(&enumeration);
                }
            }
        }
    }

    if !results.is_empty() {
        if !buffer.is_empty() {
            buffer.push_str("\n\n");
        }
        buffer.push_str("Previous tool calls:\n");
        for entry in results {
            match &entry.tool_call_id {
                Some(id) => buffer.push_str(&format!("\n[{id}]: {}", entry.content)),
                None => buffer.push_str(&format!("\n{}", entry.content)),
            }
        }
    }

    let prompt = buffer.clone();
    pool::shared().release(buffer);
    prompt
}

fn render_tool_list(tools: &[Tool]) -> String {
    tools
        .iter()
        .map(|tool| {
            let function = &tool.function;
            let mut lines = vec![format!("Function: {}", function.name)];

            if let Some(description) = &function.description {
                lines.push(format!("Description: {description}"));
            }

            if function.strict == Some(true) {
                lines.push("Strict: true".to_string());
            }

            if let Some(parameters) = &function.parameters {
                let schema = serde_json::to_string(parameters).unwrap_or_else(|_| "{}".to_string());
                lines.push(format!("Parameters: {schema}"));
            }

            lines.join("\n")
        })
        .join("\n\n")
}
