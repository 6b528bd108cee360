//! End-to-end unary response transformation.

use insta::assert_json_snapshot;
use serde_json::json;
use splice::protocol::openai::{ChatCompletionResponse, FinishReason};
use splice::{Adapter, Config, ToolPolicy};

fn response(content: &str, finish_reason: &str) -> ChatCompletionResponse {
    serde_json::from_value(json!({
        "id": "chatcmpl-42",
        "object": "chat.completion",
        "created": 1719000000,
        "model": "local-llm",
        "system_fingerprint": "fp_abc123",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": finish_reason
        }],
        "usage": {"prompt_tokens": 10, "completion_tokens": 20, "total_tokens": 30}
    }))
    .unwrap()
}

#[test]
fn person_record_in_prose_is_not_a_tool_call() {
    let adapter = Adapter::default();
    let original = response(r#"Here is data: {"name": "John Smith", "age":30}"#, "stop");

    let transformed = adapter.transform_response(original.clone()).unwrap();

    assert_eq!(transformed, original);
    assert_eq!(transformed.choices[0].finish_reason, Some(FinishReason::Stop));
}

#[test]
fn call_array_is_lifted_into_tool_calls() {
    let adapter = Adapter::default();
    let original = response(r#"[{"name":"get_weather","parameters":{"location":"Boston"}}]"#, "stop");

    let transformed = adapter.transform_response(original).unwrap();
    let choice = &transformed.choices[0];

    assert_eq!(choice.finish_reason, Some(FinishReason::ToolCalls));
    assert!(choice.message.content.is_none());

    let calls = choice.message.tool_calls.as_ref().unwrap();
    assert_json_snapshot!(calls, {"[].id" => "[call-id]"}, @r#"
    [
      {
        "id": "[call-id]",
        "type": "function",
        "function": {
          "name": "get_weather",
          "arguments": "{\"location\":\"Boston\"}"
        }
      }
    ]
    "#);
}

#[test]
fn usage_and_fingerprint_survive_the_rewrite() {
    let adapter = Adapter::default();
    let original = response(r#"[{"name":"ping"}]"#, "stop");

    let transformed = adapter.transform_response(original).unwrap();
    let wire = serde_json::to_value(&transformed).unwrap();

    assert_eq!(wire["system_fingerprint"], "fp_abc123");
    assert_eq!(wire["usage"]["total_tokens"], 30);
    assert_eq!(wire["choices"][0]["finish_reason"], "tool_calls");
}

#[test]
fn fenced_call_inside_prose_is_detected() {
    let adapter = Adapter::default();
    let content = "I'll check that.\n```json\n{\"name\":\"get_weather\",\"parameters\":{\"location\":\"Paris\"}}\n```";
    let transformed = adapter.transform_response(response(content, "stop")).unwrap();

    let calls = transformed.choices[0].message.tool_calls.as_ref().unwrap();
    assert_eq!(calls[0].function.name, "get_weather");
    assert_eq!(calls[0].function.arguments, r#"{"location":"Paris"}"#);
}

#[test]
fn allow_mixed_keeps_the_original_prose() {
    let adapter = Adapter::new(Config::builder().tool_policy(ToolPolicy::AllowMixed).build());
    let content = r#"On it: [{"name":"get_weather","parameters":{"location":"Oslo"}}] — stand by."#;

    let transformed = adapter.transform_response(response(content, "stop")).unwrap();
    let choice = &transformed.choices[0];

    assert_eq!(choice.message.text_content().unwrap(), content);
    assert_eq!(choice.finish_reason, Some(FinishReason::Stop));
    assert!(choice.message.tool_calls.is_some());
}

#[test]
fn empty_content_passes_through() {
    let adapter = Adapter::default();
    let original = response("", "stop");
    let transformed = adapter.transform_response(original.clone()).unwrap();
    assert_eq!(transformed, original);
}

#[test]
fn cancellation_is_an_error_not_a_partial_result() {
    use tokio_util::sync::CancellationToken;

    let adapter = Adapter::default();
    let token = CancellationToken::new();
    token.cancel();

    let result = adapter.transform_response_with_cancel(response(r#"[{"name":"x"}]"#, "stop"), &token);
    assert!(matches!(result, Err(splice::Error::Cancelled)));
}
