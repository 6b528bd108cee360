//! End-to-end streaming transformation.

#![allow(clippy::panic)]

use futures::StreamExt;
use integration_tests::{
    collect_chunks, concatenated_content, content_chunk, finish_chunk, tool_call_position, upstream,
    upstream_without_finish,
};
use splice::protocol::openai::{ChatCompletionChunk, FinishReason};
use splice::{Adapter, Config, ToolPolicy};
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn split_call_yields_prose_then_call_then_terminator() {
    let adapter = Adapter::default();
    let stream = adapter.wrap_stream(upstream_without_finish(&[
        "Let me check: ",
        "[{\"name\":\"x\",",
        " \"parameters\":{\"a\":1}}]",
    ]));

    let output = collect_chunks(stream).await;

    assert_eq!(output.len(), 3);
    assert_eq!(output[0].content_fragment(), Some("Let me check: "));

    let calls = output[1].choices[0].delta.tool_calls.as_ref().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].function.name.as_deref(), Some("x"));
    assert_eq!(calls[0].function.arguments.as_deref(), Some(r#"{"a":1}"#));

    assert_eq!(output[2].finish_reason(), Some(&FinishReason::ToolCalls));
}

#[tokio::test]
async fn prose_streams_are_conserved() {
    let adapter = Adapter::default();

    let cases: &[&[&str]] = &[
        &["It is sunny in Boston today."],
        &["It is ", "sunny in ", "Boston today."],
        &["It", " ", "is", " ", "sunny", " in Boston today."],
        &["Numbers like {1, 2} and [3] are fine. ", "No calls here."],
    ];

    for fragments in cases {
        let expected: String = fragments.concat();
        let output = collect_chunks(adapter.wrap_stream(upstream(fragments))).await;

        assert_eq!(concatenated_content(&output), expected);
        assert_eq!(output.last().unwrap().finish_reason(), Some(&FinishReason::Stop));
        assert!(tool_call_position(&output).is_none());
    }
}

#[tokio::test]
async fn no_content_follows_a_call_under_suppressing_policies() {
    for policy in [ToolPolicy::StopOnFirst, ToolPolicy::CollectThenStop, ToolPolicy::DrainAll] {
        let adapter = Adapter::new(Config::builder().tool_policy(policy.clone()).build());
        let stream = adapter.wrap_stream(upstream(&[
            r#"[{"name":"x"}]"#,
            " trailing prose that must vanish",
        ]));

        let output = collect_chunks(stream).await;
        let position = tool_call_position(&output).unwrap_or_else(|| panic!("no call under {policy:?}"));

        for chunk in &output[position..] {
            assert!(chunk.content_fragment().is_none(), "content after call under {policy:?}");
        }
        assert_eq!(output.last().unwrap().finish_reason(), Some(&FinishReason::ToolCalls));
    }
}

#[tokio::test]
async fn collect_then_stop_truncates_to_the_first_two_calls() {
    let adapter = Adapter::new(
        Config::builder()
            .tool_policy(ToolPolicy::CollectThenStop)
            .tool_max_calls(2)
            .build(),
    );

    // Three calls arrive back to back in one structure, split mid-record.
    let stream = adapter.wrap_stream(upstream(&[
        r#"[{"name":"a","parameters":{"n":1}},"#,
        r#"{"name":"b","parameters":{"n":2}},"#,
        r#"{"name":"c","parameters":{"n":3}}]"#,
    ]));

    let output = collect_chunks(stream).await;
    let position = tool_call_position(&output).unwrap();
    let calls = output[position].choices[0].delta.tool_calls.as_ref().unwrap();

    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].function.name.as_deref(), Some("a"));
    assert_eq!(calls[1].function.name.as_deref(), Some("b"));

    for chunk in &output[position + 1..] {
        assert!(chunk.content_fragment().is_none());
    }
}

#[tokio::test]
async fn drain_all_collects_calls_from_separate_structures() {
    let adapter = Adapter::new(Config::builder().tool_policy(ToolPolicy::DrainAll).build());
    let stream = adapter.wrap_stream(upstream(&[
        r#"[{"name":"first_call"}]"#,
        " some narration ",
        r#"{"name":"second_call","parameters":{"q":"x"}}"#,
    ]));

    let output = collect_chunks(stream).await;
    let position = tool_call_position(&output).unwrap();
    let calls = output[position].choices[0].delta.tool_calls.as_ref().unwrap();

    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].function.name.as_deref(), Some("first_call"));
    assert_eq!(calls[1].function.name.as_deref(), Some("second_call"));
}

#[tokio::test]
async fn allow_mixed_interleaves_calls_and_prose() {
    let adapter = Adapter::new(Config::builder().tool_policy(ToolPolicy::AllowMixed).build());
    let stream = adapter.wrap_stream(upstream(&[
        r#"Checking: [{"name":"x"}]"#,
        " meanwhile, here is more prose.",
    ]));

    let output = collect_chunks(stream).await;

    assert!(tool_call_position(&output).is_some());
    assert_eq!(
        concatenated_content(&output),
        r#"Checking: [{"name":"x"}] meanwhile, here is more prose."#
    );
    // Upstream finished with stop; AllowMixed preserves it.
    assert_eq!(output.last().unwrap().finish_reason(), Some(&FinishReason::Stop));
}

#[tokio::test]
async fn synthesized_chunks_carry_the_upstream_identity() {
    let adapter = Adapter::default();
    let stream = adapter.wrap_stream(upstream_without_finish(&[r#"[{"name":"x"}]"#]));

    let output = collect_chunks(stream).await;

    for chunk in &output {
        assert_eq!(chunk.id, "chatcmpl-test");
        assert_eq!(chunk.model, "local-llm");
        assert_eq!(chunk.object.as_deref(), Some("chat.completion.chunk"));
        assert_eq!(chunk.created, 1_719_000_000);
    }
}

#[tokio::test]
async fn small_buffer_caps_still_deliver_all_content() {
    let adapter = Adapter::new(
        Config::builder()
            .tool_collect_max_bytes(16)
            .stream_buffer_limit(16)
            .build(),
    );

    let long_story = "a very long answer that easily exceeds the sixteen byte budget";
    let output = collect_chunks(adapter.wrap_stream(upstream(&[long_story, " and a tail"]))).await;

    assert_eq!(concatenated_content(&output), format!("{long_story} and a tail"));
    assert!(tool_call_position(&output).is_none());
}

#[tokio::test]
async fn early_detection_forwards_prose_and_still_finds_calls() {
    let config = || Config::builder().streaming_early_detection(12).build();

    // Prose stream: latched to passthrough after the budget.
    let adapter = Adapter::new(config());
    let output = collect_chunks(adapter.wrap_stream(upstream(&["A plain sentence, ", "nothing else."]))).await;
    assert_eq!(concatenated_content(&output), "A plain sentence, nothing else.");

    // Tool-shaped stream: still buffered and detected.
    let adapter = Adapter::new(config());
    let output =
        collect_chunks(adapter.wrap_stream(upstream_without_finish(&["[{\"name\":", "\"x\"}]"]))).await;
    assert!(tool_call_position(&output).is_some());
}

#[tokio::test]
async fn cancellation_mid_stream_surfaces_the_error() {
    let adapter = Adapter::default();
    let token = CancellationToken::new();

    let chunks: Vec<splice::Result<ChatCompletionChunk>> = vec![
        Ok(content_chunk("first ")),
        Ok(content_chunk("second")),
        Ok(finish_chunk(FinishReason::Stop)),
    ];

    let mut stream = adapter.wrap_stream_with_cancel(futures::stream::iter(chunks), token.clone());
    token.cancel();

    let first = stream.next().await.unwrap();
    assert!(matches!(first, Err(splice::Error::Cancelled)));
    assert!(stream.next().await.is_none());
}

#[tokio::test]
async fn upstream_error_discards_buffered_output() {
    let adapter = Adapter::default();
    let chunks: Vec<splice::Result<ChatCompletionChunk>> = vec![
        Ok(content_chunk("buffered but never delivered [{\"name\":\"x\"")),
        Err(splice::Error::Upstream("connection reset by peer".to_string())),
    ];

    let mut stream = adapter.wrap_stream(futures::stream::iter(chunks));

    let first = stream.next().await.unwrap();
    assert!(matches!(first, Err(splice::Error::Upstream(_))));
    assert!(stream.next().await.is_none());
}
