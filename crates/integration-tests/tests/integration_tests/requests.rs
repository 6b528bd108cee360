//! End-to-end request rewriting.

#![allow(clippy::panic)]

use integration_tests::{multimodal_user_message, named_tool, request, text_message, tool_message, weather_tool};
use splice::protocol::openai::{ChatRole, ContentPart, MessageContent};
use splice::{Adapter, Config};

#[test]
fn tools_fold_into_the_last_system_message() {
    let adapter = Adapter::default();
    let original = request(
        vec![
            text_message(ChatRole::System, "A"),
            text_message(ChatRole::System, "B"),
            text_message(ChatRole::System, "C"),
            text_message(ChatRole::User, "what's the weather in Boston?"),
        ],
        Some(vec![named_tool("f")]),
    );

    let rewritten = adapter.transform_request(original).unwrap();

    assert!(rewritten.tools.is_none());
    assert!(rewritten.tool_choice.is_none());
    assert_eq!(rewritten.messages.len(), 4);
    assert_eq!(rewritten.messages[0].text_content().unwrap(), "A");
    assert_eq!(rewritten.messages[1].text_content().unwrap(), "B");

    let third = rewritten.messages[2].text_content().unwrap();
    assert!(third.starts_with('C'));
    assert!(third.contains("Function: f"));

    assert_eq!(
        rewritten.messages[3].text_content().unwrap(),
        "what's the weather in Boston?"
    );
}

#[test]
fn multimodal_user_message_preserves_the_image() {
    let adapter = Adapter::default();
    let image_url = "https://example.com/photo.jpg";
    let original = request(
        vec![multimodal_user_message("look", image_url)],
        Some(vec![weather_tool()]),
    );

    let rewritten = adapter.transform_request(original).unwrap();

    assert_eq!(rewritten.messages.len(), 1);
    let Some(MessageContent::Parts(parts)) = &rewritten.messages[0].content else {
        panic!("expected a parts payload");
    };
    assert_eq!(parts.len(), 2);

    let ContentPart::Text { text } = &parts[0] else {
        panic!("expected the merged text part first");
    };
    assert!(text.contains("get_weather"));
    assert!(text.ends_with("look"));

    let ContentPart::Other(image) = &parts[1] else {
        panic!("expected the image part preserved");
    };
    assert_eq!(image["image_url"]["url"], image_url);
}

#[test]
fn request_without_tools_is_untouched() {
    let adapter = Adapter::default();
    let original = request(vec![text_message(ChatRole::User, "hello")], None);

    let rewritten = adapter.transform_request(original.clone()).unwrap();
    assert_eq!(rewritten, original);
}

#[test]
fn rewriting_twice_changes_nothing_more() {
    let adapter = Adapter::default();
    let original = request(
        vec![
            text_message(ChatRole::System, "be terse"),
            tool_message("call_9", "42"),
            text_message(ChatRole::User, "again?"),
        ],
        Some(vec![weather_tool()]),
    );

    let once = adapter.transform_request(original).unwrap();
    let twice = adapter.transform_request(once.clone()).unwrap();
    assert_eq!(once, twice);
}

#[test]
fn rewriting_is_deterministic() {
    let adapter = Adapter::default();
    let build = || {
        request(
            vec![
                text_message(ChatRole::System, "sys"),
                tool_message("call_1", "rainy"),
                text_message(ChatRole::User, "and tomorrow?"),
            ],
            Some(vec![weather_tool(), named_tool("search")]),
        )
    };

    let first = adapter.transform_request(build()).unwrap();
    let second = adapter.transform_request(build()).unwrap();

    assert_eq!(first, second);
}

#[test]
fn tool_results_fold_in_original_order() {
    let adapter = Adapter::default();
    let original = request(
        vec![
            text_message(ChatRole::User, "weather in Boston and Paris?"),
            tool_message("call_boston", "Boston: 21C"),
            tool_message("call_paris", "Paris: 18C"),
        ],
        Some(vec![weather_tool()]),
    );

    let rewritten = adapter.transform_request(original).unwrap();

    assert_eq!(rewritten.messages.len(), 1);
    let text = rewritten.messages[0].text_content().unwrap();
    assert!(text.contains("[call_boston]: Boston: 21C"));
    assert!(text.contains("[call_paris]: Paris: 18C"));
    assert!(text.find("call_boston").unwrap() < text.find("call_paris").unwrap());
}

#[test]
fn system_message_support_prepends_a_system_message() {
    let adapter = Adapter::new(Config::builder().system_message_support(true).build());
    let original = request(
        vec![text_message(ChatRole::User, "weather?")],
        Some(vec![weather_tool()]),
    );

    let rewritten = adapter.transform_request(original).unwrap();

    assert_eq!(rewritten.messages.len(), 2);
    assert_eq!(rewritten.messages[0].role, ChatRole::System);
    assert!(rewritten.messages[0].text_content().unwrap().contains("get_weather"));
}

#[test]
fn custom_template_replaces_the_built_in_instruction() {
    let template = format!("Use these tools wisely:\n{}\nReply as JSON.", splice::TOOLS_PLACEHOLDER);
    let adapter = Adapter::new(Config::builder().custom_prompt_template(template).build());

    let original = request(
        vec![text_message(ChatRole::User, "weather?")],
        Some(vec![weather_tool()]),
    );
    let rewritten = adapter.transform_request(original).unwrap();

    let text = rewritten.messages[0].text_content().unwrap();
    assert!(text.contains("Use these tools wisely:"));
    assert!(text.contains("Function: get_weather"));
    assert!(text.contains("Reply as JSON."));
}

#[test]
fn strict_flag_and_schema_appear_verbatim() {
    let adapter = Adapter::default();
    let mut tool = weather_tool();
    tool.function.strict = Some(true);
    let schema = tool.function.parameters.clone().unwrap();

    let original = request(vec![text_message(ChatRole::User, "weather?")], Some(vec![tool]));
    let rewritten = adapter.transform_request(original).unwrap();

    let text = rewritten.messages[0].text_content().unwrap();
    assert!(text.contains("Strict: true"));
    assert!(text.contains(&serde_json::to_string(&schema).unwrap()));
    assert!(text.contains("Description: Get current weather for a location"));
}

#[test]
fn passthrough_request_fields_survive_the_rewrite() {
    let adapter = Adapter::default();
    let mut original = request(
        vec![text_message(ChatRole::User, "weather?")],
        Some(vec![weather_tool()]),
    );
    original.unknown_fields.insert("temperature", serde_json::json!(0.2));
    original.unknown_fields.insert("max_tokens", serde_json::json!(512));

    let rewritten = adapter.transform_request(original).unwrap();

    assert_eq!(rewritten.unknown_fields.get("temperature"), Some(&serde_json::json!(0.2)));
    assert_eq!(rewritten.unknown_fields.get("max_tokens"), Some(&serde_json::json!(512)));
}
