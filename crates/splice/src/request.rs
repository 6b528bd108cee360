//! Rewriting of outgoing requests for backends without native tool support.
//!
//! Tools and the tool-choice directive are removed, prior tool-result
//! messages are folded into the synthesized instruction, and the
//! instruction is injected using a deterministic placement rule: the last
//! system message wins, then (if the backend supports it) a fresh system
//! message, then the first user message, then a synthesized user message.

use std::time::Instant;

use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::prompt::{self, ToolResultEntry};
use crate::protocol::openai::{
    ChatCompletionRequest, ChatMessage, ChatRole, ContentPart, MessageContent,
};
use crate::telemetry::{self, MetricEvent};

/// Rewrite `request` according to `config`.
///
/// Requests with neither tools nor tool-result messages are returned
/// unchanged. The cancellation signal, when supplied, is observed between
/// phases; on a trip no partial request is returned.
pub(crate) fn transform(
    config: &Config,
    mut request: ChatCompletionRequest,
    cancel: Option<&CancellationToken>,
) -> Result<ChatCompletionRequest> {
    check_cancelled(cancel)?;

    if !request.needs_tool_rewrite() {
        return Ok(request);
    }

    let started = Instant::now();

    let tools = request.tools.take().unwrap_or_default();
    request.tool_choice = None;

    let results = fold_tool_messages(&mut request.messages);

    check_cancelled(cancel)?;

    let instruction = prompt::render(&tools, &results, config.custom_prompt_template.as_deref());

    check_cancelled(cancel)?;

    place_instruction(&mut request.messages, &instruction, config.system_message_support);

    telemetry::emit(
        config.metrics_callback.as_ref(),
        MetricEvent::ToolTransformation {
            tool_count: tools.len(),
            tool_names: tools.iter().map(|t| t.function.name.clone()).collect(),
            prompt_length: instruction.len(),
            duration: started.elapsed(),
        },
    );

    Ok(request)
}

fn check_cancelled(cancel: Option<&CancellationToken>) -> Result<()> {
    match cancel {
        Some(token) if token.is_cancelled() => Err(Error::Cancelled),
        _ => Ok(()),
    }
}

/// Remove every `tool`-role message, collecting `{tool_call_id, content}`
/// pairs in original message order. A tool message without a preceding
/// assistant call is folded all the same.
fn fold_tool_messages(messages: &mut Vec<ChatMessage>) -> Vec<ToolResultEntry> {
    let mut results = Vec::new();

    messages.retain_mut(|message| {
        if message.role != ChatRole::Tool {
            return true;
        }

        results.push(ToolResultEntry {
            tool_call_id: message.tool_call_id.take(),
            content: message.text_content().unwrap_or_default(),
        });

        false
    });

    results
}

/// Inject `instruction` into the conversation.
fn place_instruction(messages: &mut Vec<ChatMessage>, instruction: &str, system_message_support: bool) {
    // Last system wins: earlier system messages stay untouched.
    if let Some(message) = messages.iter_mut().rev().find(|m| m.role == ChatRole::System) {
        append_text(message, instruction);
        return;
    }

    if system_message_support {
        messages.insert(
            0,
            ChatMessage {
                role: ChatRole::System,
                content: Some(MessageContent::Text(instruction.to_string())),
                tool_calls: None,
                tool_call_id: None,
                unknown_fields: Default::default(),
            },
        );
        return;
    }

    if let Some(message) = messages.iter_mut().find(|m| m.role == ChatRole::User) {
        prepend_text(message, instruction);
        return;
    }

    messages.push(ChatMessage {
        role: ChatRole::User,
        content: Some(MessageContent::Text(instruction.to_string())),
        tool_calls: None,
        tool_call_id: None,
        unknown_fields: Default::default(),
    });
}

fn append_text(message: &mut ChatMessage, instruction: &str) {
    match &mut message.content {
        Some(MessageContent::Text(text)) => {
            if !text.is_empty() {
                text.push_str("\n\n");
            }
            text.push_str(instruction);
        }
        Some(MessageContent::Parts(parts)) => {
            parts.push(ContentPart::Text {
                text: instruction.to_string(),
            });
        }
        None => message.content = Some(MessageContent::Text(instruction.to_string())),
    }
}

/// Prepend the instruction to a user message, preserving its original
/// content. Multimodal messages collapse their text parts into a single
/// leading text part; non-text parts keep their original order.
fn prepend_text(message: &mut ChatMessage, instruction: &str) {
    match message.content.take() {
        Some(MessageContent::Text(text)) => {
            let combined = if text.is_empty() {
                instruction.to_string()
            } else {
                format!("{instruction}\n\n{text}")
            };
            message.content = Some(MessageContent::Text(combined));
        }
        Some(MessageContent::Parts(parts)) => {
            let mut joined = String::from(instruction);
            let mut rest = Vec::with_capacity(parts.len());

            for part in parts {
                match part {
                    ContentPart::Text { text } => {
                        joined.push_str("\n\n");
                        joined.push_str(&text);
                    }
                    other => rest.push(other),
                }
            }

            let mut merged = Vec::with_capacity(rest.len() + 1);
            merged.push(ContentPart::Text { text: joined });
            merged.extend(rest);
            message.content = Some(MessageContent::Parts(merged));
        }
        None => message.content = Some(MessageContent::Text(instruction.to_string())),
    }
}
