use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::protocol::unknown_fields::UnknownFields;

/// Request body for the OpenAI chat completions API.
///
/// Only the fields the shim inspects or rewrites are typed; everything else
/// (`temperature`, `max_tokens`, provider extensions, ...) rides along in
/// [`UnknownFields`] untouched.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ChatCompletionRequest {
    /// The model that will complete the conversation.
    pub model: String,

    /// Conversation turns in order.
    pub messages: Vec<ChatMessage>,

    /// Tool specifications the model may call during this request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<Tool>>,

    /// Directive controlling if and how the model must use tools.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<Value>,

    /// When true, deliver a Server-Sent Events stream instead of a single body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,

    /// Additional fields preserved for forward compatibility.
    #[serde(flatten)]
    pub unknown_fields: UnknownFields,
}

impl ChatCompletionRequest {
    /// True when the request carries neither tools nor tool-result messages,
    /// in which case the rewriter leaves it untouched.
    pub fn needs_tool_rewrite(&self) -> bool {
        self.tools.as_ref().is_some_and(|tools| !tools.is_empty())
            || self.messages.iter().any(|m| m.role == ChatRole::Tool)
    }
}

/// Message sender role.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
    Tool,
    /// Roles this crate does not know about yet, passed through verbatim.
    #[serde(untagged)]
    Other(String),
}

/// A single conversation turn.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ChatMessage {
    /// Who sent this message.
    pub role: ChatRole,

    /// Message payload. Absent for assistant turns that only carry tool calls.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<MessageContent>,

    /// Structured tool calls attached to an assistant turn.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,

    /// For `tool` turns, the id of the call this message answers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,

    /// Additional fields preserved for forward compatibility.
    #[serde(flatten)]
    pub unknown_fields: UnknownFields,
}

impl ChatMessage {
    /// Plain-text view of the message content, joining text parts of a
    /// multimodal payload. Non-text parts contribute nothing.
    pub fn text_content(&self) -> Option<String> {
        match &self.content {
            Some(MessageContent::Text(text)) => Some(text.clone()),
            Some(MessageContent::Parts(parts)) => {
                let joined = parts
                    .iter()
                    .filter_map(ContentPart::as_text)
                    .collect::<Vec<_>>()
                    .join("\n");
                Some(joined)
            }
            None => None,
        }
    }
}

/// Message content: a plain string or a sequence of typed parts.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum MessageContent {
    /// Simple text content, the common case.
    Text(String),
    /// Multimodal content blocks.
    Parts(Vec<ContentPart>),
}

/// One block of a multimodal message.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    /// Plain text block.
    Text { text: String },
    /// Image, audio and future part kinds, preserved verbatim.
    #[serde(untagged)]
    Other(Value),
}

impl ContentPart {
    /// The text of this part, if it is a text part.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContentPart::Text { text } => Some(text),
            ContentPart::Other(_) => None,
        }
    }
}

/// A tool the model may call.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Tool {
    /// Always `"function"` today; kept open for future tool kinds.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    /// The function specification.
    pub function: FunctionDefinition,

    /// Additional fields preserved for forward compatibility.
    #[serde(flatten)]
    pub unknown_fields: UnknownFields,
}

/// Callable function description supplied by the caller.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct FunctionDefinition {
    /// Function identifier, unique among the supplied tools.
    pub name: String,

    /// What the function does, for the model's benefit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// JSON Schema of the accepted arguments. Opaque to the shim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,

    /// OpenAI strict-mode marker. Only an explicit `true` is surfaced in the
    /// synthesized prompt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strict: Option<bool>,

    /// Additional fields preserved for forward compatibility.
    #[serde(flatten)]
    pub unknown_fields: UnknownFields,
}

/// A completed tool call as it appears on assistant messages.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ToolCall {
    /// Identifier correlating this call with its tool-result message.
    pub id: String,

    /// Always `"function"`.
    #[serde(rename = "type")]
    pub kind: String,

    /// The call payload.
    pub function: FunctionCall,

    /// Additional fields preserved for forward compatibility.
    #[serde(flatten)]
    pub unknown_fields: UnknownFields,
}

/// Function name plus serialized arguments.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct FunctionCall {
    /// Name of the function being called.
    pub name: String,

    /// Arguments as a JSON-encoded string.
    pub arguments: String,
}

/// Reason the model stopped generating.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ContentFilter,
    ToolCalls,
    /// Finish reasons this crate does not know about, passed through.
    #[serde(untagged)]
    Other(String),
}

/// A complete (non-streaming) chat completion response.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ChatCompletionResponse {
    /// Completion identifier.
    pub id: String,

    /// Always `"chat.completion"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object: Option<String>,

    /// Unix timestamp of creation.
    #[serde(default)]
    pub created: u64,

    /// Model that produced the response.
    pub model: String,

    /// Response candidates; index 0 is the primary one.
    pub choices: Vec<Choice>,

    /// Additional fields (`usage`, `system_fingerprint`, ...) preserved for
    /// forward compatibility.
    #[serde(flatten)]
    pub unknown_fields: UnknownFields,
}

/// One response candidate.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Choice {
    /// Position of this candidate.
    #[serde(default)]
    pub index: u32,

    /// The generated assistant message.
    pub message: ChatMessage,

    /// Why generation ended for this candidate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,

    /// Additional fields preserved for forward compatibility.
    #[serde(flatten)]
    pub unknown_fields: UnknownFields,
}

/// One atomic unit of a streamed response.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ChatCompletionChunk {
    /// Completion identifier, stable across all chunks of a stream.
    pub id: String,

    /// Always `"chat.completion.chunk"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object: Option<String>,

    /// Unix timestamp of creation.
    #[serde(default)]
    pub created: u64,

    /// Model producing the stream.
    pub model: String,

    /// Incremental choice updates, usually a single entry at index 0.
    pub choices: Vec<ChunkChoice>,

    /// Envelope extras (`system_fingerprint`, `usage`, ...) preserved at the
    /// level they were observed.
    #[serde(flatten)]
    pub unknown_fields: UnknownFields,
}

impl ChatCompletionChunk {
    /// The content fragment of the first choice, if any.
    pub fn content_fragment(&self) -> Option<&str> {
        self.choices.first().and_then(|c| c.delta.content.as_deref())
    }

    /// The finish reason of the first choice, if present on this chunk.
    pub fn finish_reason(&self) -> Option<&FinishReason> {
        self.choices.first().and_then(|c| c.finish_reason.as_ref())
    }

    /// True when any choice on this chunk carries streamed tool calls.
    pub fn has_tool_calls(&self) -> bool {
        self.choices
            .iter()
            .any(|c| c.delta.tool_calls.as_ref().is_some_and(|t| !t.is_empty()))
    }
}

/// Incremental update for one choice.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ChunkChoice {
    /// Index of the choice being updated.
    #[serde(default)]
    pub index: u32,

    /// The incremental payload.
    #[serde(default)]
    pub delta: ChunkDelta,

    /// Present on the terminal chunk for this choice.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,

    /// Additional fields (`logprobs`, ...) preserved for forward
    /// compatibility.
    #[serde(flatten)]
    pub unknown_fields: UnknownFields,
}

/// Partial message content carried by a chunk.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ChunkDelta {
    /// Present on the first chunk to establish the role.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<ChatRole>,

    /// New text to append to the assistant content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    /// Incremental tool-call updates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<StreamingToolCall>>,

    /// Additional fields (`reasoning`, ...) preserved for forward
    /// compatibility.
    #[serde(flatten)]
    pub unknown_fields: UnknownFields,
}

/// One entry of a streamed `tool_calls` vector.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct StreamingToolCall {
    /// Position in the accumulated tool-call list.
    pub index: u32,

    /// Call identifier, present when the call starts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Always `"function"` when present.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    /// Name and argument fragment.
    pub function: StreamingFunction,

    /// Additional fields preserved for forward compatibility.
    #[serde(flatten)]
    pub unknown_fields: UnknownFields,
}

/// Function payload of a streamed tool call.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct StreamingFunction {
    /// Function name, present when the call starts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Argument fragment to append.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
}
