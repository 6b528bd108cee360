//! Shared fixtures for the end-to-end shim tests: canned requests, tools,
//! chunk builders and mock upstream streams.

use futures::Stream;
use futures::stream::{BoxStream, StreamExt};
use serde_json::json;
use splice::protocol::openai::{
    ChatCompletionChunk, ChatCompletionRequest, ChatMessage, ChatRole, ChunkChoice, ChunkDelta,
    ContentPart, FinishReason, FunctionDefinition, MessageContent, Tool,
};

/// A text message with the given role.
pub fn text_message(role: ChatRole, text: &str) -> ChatMessage {
    ChatMessage {
        role,
        content: Some(MessageContent::Text(text.to_string())),
        tool_calls: None,
        tool_call_id: None,
        unknown_fields: Default::default(),
    }
}

/// A tool-result message answering `tool_call_id`.
pub fn tool_message(tool_call_id: &str, text: &str) -> ChatMessage {
    ChatMessage {
        role: ChatRole::Tool,
        content: Some(MessageContent::Text(text.to_string())),
        tool_calls: None,
        tool_call_id: Some(tool_call_id.to_string()),
        unknown_fields: Default::default(),
    }
}

/// The canonical weather tool used across the suite.
pub fn weather_tool() -> Tool {
    Tool {
        kind: Some("function".to_string()),
        function: FunctionDefinition {
            name: "get_weather".to_string(),
            description: Some("Get current weather for a location".to_string()),
            parameters: Some(json!({
                "type": "object",
                "properties": {
                    "location": {"type": "string"}
                },
                "required": ["location"]
            })),
            strict: None,
            unknown_fields: Default::default(),
        },
        unknown_fields: Default::default(),
    }
}

/// A minimal tool with only a name.
pub fn named_tool(name: &str) -> Tool {
    Tool {
        kind: Some("function".to_string()),
        function: FunctionDefinition {
            name: name.to_string(),
            description: None,
            parameters: None,
            strict: None,
            unknown_fields: Default::default(),
        },
        unknown_fields: Default::default(),
    }
}

/// A chat request over `messages` with optional tools.
pub fn request(messages: Vec<ChatMessage>, tools: Option<Vec<Tool>>) -> ChatCompletionRequest {
    ChatCompletionRequest {
        model: "local-llm".to_string(),
        messages,
        tools,
        tool_choice: None,
        stream: None,
        unknown_fields: Default::default(),
    }
}

/// One streamed content fragment.
pub fn content_chunk(text: &str) -> ChatCompletionChunk {
    ChatCompletionChunk {
        id: "chatcmpl-test".to_string(),
        object: Some("chat.completion.chunk".to_string()),
        created: 1_719_000_000,
        model: "local-llm".to_string(),
        choices: vec![ChunkChoice {
            index: 0,
            delta: ChunkDelta {
                role: Some(ChatRole::Assistant),
                content: Some(text.to_string()),
                ..Default::default()
            },
            finish_reason: None,
            unknown_fields: Default::default(),
        }],
        unknown_fields: Default::default(),
    }
}

/// The terminal chunk of a stream.
pub fn finish_chunk(reason: FinishReason) -> ChatCompletionChunk {
    ChatCompletionChunk {
        id: "chatcmpl-test".to_string(),
        object: Some("chat.completion.chunk".to_string()),
        created: 1_719_000_000,
        model: "local-llm".to_string(),
        choices: vec![ChunkChoice {
            index: 0,
            delta: ChunkDelta::default(),
            finish_reason: Some(reason),
            unknown_fields: Default::default(),
        }],
        unknown_fields: Default::default(),
    }
}

/// Mock upstream: the fragments as content chunks, then a stop terminator.
pub fn upstream(fragments: &[&str]) -> BoxStream<'static, splice::Result<ChatCompletionChunk>> {
    let mut chunks: Vec<splice::Result<ChatCompletionChunk>> =
        fragments.iter().map(|text| Ok(content_chunk(text))).collect();
    chunks.push(Ok(finish_chunk(FinishReason::Stop)));
    futures::stream::iter(chunks).boxed()
}

/// Mock upstream without a finish chunk.
pub fn upstream_without_finish(fragments: &[&str]) -> BoxStream<'static, splice::Result<ChatCompletionChunk>> {
    let chunks: Vec<splice::Result<ChatCompletionChunk>> =
        fragments.iter().map(|text| Ok(content_chunk(text))).collect();
    futures::stream::iter(chunks).boxed()
}

/// Collect a transformed stream, panicking on stream errors.
pub async fn collect_chunks<S>(stream: S) -> Vec<ChatCompletionChunk>
where
    S: Stream<Item = splice::Result<ChatCompletionChunk>>,
{
    stream.map(|chunk| chunk.expect("stream error")).collect().await
}

/// All assistant text across the collected chunks, in order.
pub fn concatenated_content(chunks: &[ChatCompletionChunk]) -> String {
    chunks.iter().filter_map(|c| c.content_fragment()).collect()
}

/// Index of the first chunk carrying tool calls, if any.
pub fn tool_call_position(chunks: &[ChatCompletionChunk]) -> Option<usize> {
    chunks.iter().position(|c| c.has_tool_calls())
}

/// A multimodal user message: one text part and one image part.
pub fn multimodal_user_message(text: &str, image_url: &str) -> ChatMessage {
    ChatMessage {
        role: ChatRole::User,
        content: Some(MessageContent::Parts(vec![
            ContentPart::Text { text: text.to_string() },
            ContentPart::Other(json!({
                "type": "image_url",
                "image_url": {"url": image_url}
            })),
        ])),
        tool_calls: None,
        tool_call_id: None,
        unknown_fields: Default::default(),
    }
}
