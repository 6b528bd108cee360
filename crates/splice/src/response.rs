//! Unary response transformation: re-lifting function-call JSON found in
//! completed assistant content into structured `tool_calls`.

use std::time::Instant;

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::{Config, ToolPolicy};
use crate::decode::{self, RawFunctionCall};
use crate::error::{Error, Result};
use crate::extract;
use crate::policy;
use crate::protocol::openai::{ChatCompletionResponse, FinishReason, FunctionCall, ToolCall};
use crate::telemetry::{self, MetricEvent};

/// Generate a fresh opaque identifier for a surfaced call.
pub(crate) fn fresh_call_id() -> String {
    format!("call_{}", Uuid::new_v4().simple())
}

/// Inspect `response` and rewrite its first choice when the assistant
/// content carries decodable function calls. Responses without detectable
/// calls are returned unchanged.
pub(crate) fn transform(
    config: &Config,
    mut response: ChatCompletionResponse,
    cancel: Option<&CancellationToken>,
) -> Result<ChatCompletionResponse> {
    check_cancelled(cancel)?;

    let Some(content) = response.choices.first().and_then(|choice| choice.message.text_content()) else {
        return Ok(response);
    };

    if content.trim().is_empty() {
        return Ok(response);
    }

    let started = Instant::now();

    let extraction_started = Instant::now();
    let candidates = extract::extract_candidates(&content, config.stream_buffer_limit);
    let extraction_duration = extraction_started.elapsed();

    if candidates.is_empty() {
        return Ok(response);
    }

    check_cancelled(cancel)?;

    let parse_started = Instant::now();
    let outcome = match &config.tool_policy {
        ToolPolicy::StopOnFirst | ToolPolicy::Other(_) => decode::decode_first(&candidates),
        _ => decode::decode_all(&candidates),
    };
    let json_parse_duration = parse_started.elapsed();

    if outcome.is_empty() {
        return Ok(response);
    }

    check_cancelled(cancel)?;

    telemetry::emit(
        config.metrics_callback.as_ref(),
        MetricEvent::FunctionCallDetection {
            call_count: outcome.calls.len(),
            function_names: outcome.calls.iter().map(|c| c.name.clone()).collect(),
            content_length: content.len(),
            candidate_count: candidates.len(),
            streaming: false,
            duration: started.elapsed(),
            extraction_duration,
            json_parse_duration,
        },
    );

    let calls = policy::apply(&config.tool_policy, config.tool_max_calls, outcome.calls);

    let choice = &mut response.choices[0];
    choice.message.tool_calls = Some(calls.iter().map(to_tool_call).collect());

    choice.finish_reason = match &config.tool_policy {
        ToolPolicy::AllowMixed => match choice.finish_reason.take() {
            Some(reason) => Some(reason),
            None => Some(FinishReason::ToolCalls),
        },
        _ => Some(FinishReason::ToolCalls),
    };

    if config.tool_policy.suppresses_content() {
        choice.message.content = None;
    }

    Ok(response)
}

fn to_tool_call(call: &RawFunctionCall) -> ToolCall {
    ToolCall {
        id: fresh_call_id(),
        kind: "function".to_string(),
        function: FunctionCall {
            name: call.name.clone(),
            arguments: call.arguments_json().to_string(),
        },
        unknown_fields: Default::default(),
    }
}

fn check_cancelled(cancel: Option<&CancellationToken>) -> Result<()> {
    match cancel {
        Some(token) if token.is_cancelled() => Err(Error::Cancelled),
        _ => Ok(()),
    }
}
