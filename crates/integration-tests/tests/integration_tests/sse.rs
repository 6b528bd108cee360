//! End-to-end SSE transformation over raw byte streams.

use std::convert::Infallible;

use futures::StreamExt;
use futures::stream::BoxStream;
use indoc::indoc;
use splice::{Adapter, Config, ToolPolicy};

fn byte_stream(body: &'static str) -> BoxStream<'static, Result<&'static [u8], Infallible>> {
    // Split the wire body into uneven segments so frames straddle reads.
    let segments: Vec<Result<&'static [u8], Infallible>> = body
        .as_bytes()
        .chunks(17)
        .map(Ok)
        .collect();
    futures::stream::iter(segments).boxed()
}

async fn collect_frames(adapter: &Adapter, body: &'static str) -> Vec<String> {
    adapter
        .wrap_sse(byte_stream(body))
        .map(|frame| frame.expect("sse stream error"))
        .collect()
        .await
}

fn chunk_payload(content_json: &str) -> String {
    format!(
        r#"{{"id":"chatcmpl-sse","object":"chat.completion.chunk","created":1719000000,"model":"local-llm","system_fingerprint":"fp_sse","choices":[{{"index":0,"delta":{{"content":{content_json}}},"finish_reason":null}}]}}"#
    )
}

#[tokio::test]
async fn tool_call_sse_stream_is_rewritten() {
    let body: &'static str = Box::leak(
        format!(
            "data: {}\n\ndata: {}\n\ndata: [DONE]\n\n",
            chunk_payload(r#""[{\"name\":\"get_weather\",""#),
            chunk_payload(r#""\"parameters\":{\"location\":\"Boston\"}}]""#),
        )
        .into_boxed_str(),
    );

    let adapter = Adapter::default();
    let frames = collect_frames(&adapter, body).await;

    let call_frame = frames
        .iter()
        .find(|f| f.contains("tool_calls"))
        .expect("expected a tool_calls frame");
    assert!(call_frame.contains("get_weather"));
    assert!(call_frame.contains("fp_sse"));

    assert!(frames.iter().any(|f| f.contains(r#""finish_reason":"tool_calls""#)));
    assert_eq!(frames.last().unwrap(), "data: [DONE]\n\n");

    for frame in &frames {
        assert!(frame.starts_with("data: ") && frame.ends_with("\n\n"));
    }
}

#[tokio::test]
async fn prose_sse_stream_round_trips() {
    let body: &'static str = Box::leak(
        format!(
            "data: {}\n\ndata: {}\n\ndata: [DONE]\n\n",
            chunk_payload(r#""The weather is ""#),
            chunk_payload(r#""mild today.""#),
        )
        .into_boxed_str(),
    );

    let adapter = Adapter::default();
    let frames = collect_frames(&adapter, body).await;

    let combined = frames.join("");
    assert!(combined.contains("The weather is "));
    assert!(combined.contains("mild today."));
    assert!(!combined.contains("tool_calls"));
    assert_eq!(frames.last().unwrap(), "data: [DONE]\n\n");
}

#[tokio::test]
async fn comments_are_dropped_and_garbage_forwarded() {
    let body = indoc! {"
        : heartbeat

        data: this is not a chunk

        data: [DONE]

    "};

    let adapter = Adapter::default();
    let frames = collect_frames(&adapter, body).await;

    assert_eq!(frames[0], "data: this is not a chunk\n\n");
    assert_eq!(frames.last().unwrap(), "data: [DONE]\n\n");
}

#[tokio::test]
async fn drain_all_sse_stream_suppresses_interstitial_prose() {
    let body: &'static str = Box::leak(
        format!(
            "data: {}\n\ndata: {}\n\ndata: [DONE]\n\n",
            chunk_payload(r#""[{\"name\":\"first_call\"}]""#),
            chunk_payload(r#"" and {\"name\":\"second_call\"}""#),
        )
        .into_boxed_str(),
    );

    let adapter = Adapter::new(Config::builder().tool_policy(ToolPolicy::DrainAll).build());
    let frames = collect_frames(&adapter, body).await;

    let call_frame = frames.iter().find(|f| f.contains("tool_calls")).unwrap();
    assert!(call_frame.contains("first_call"));
    assert!(call_frame.contains("second_call"));
    assert!(!frames.iter().any(|f| f.contains(" and ")));
}

#[tokio::test]
async fn missing_done_still_produces_the_sentinel() {
    let body: &'static str =
        Box::leak(format!("data: {}\n\n", chunk_payload(r#""cut off mid""#)).into_boxed_str());

    let adapter = Adapter::default();
    let frames = collect_frames(&adapter, body).await;

    assert!(frames.iter().any(|f| f.contains("cut off mid")));
    assert_eq!(frames.last().unwrap(), "data: [DONE]\n\n");
}
