//! End-to-end conversation tests against a scripted completion service.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use common::{chat_with, non_streaming_chat, Reply, ScriptedService};
use colloquy::chat::Chat;
use colloquy::error::ColloquyError;
use colloquy::events::{collecting_sink, ChatEventPayload, Notice};
use colloquy::provider::ToolManifest;
use colloquy::tools::{ToolCallPreview, ToolFailure, ToolParameters, ToolRenderer};
use colloquy::types::{
    ChatCompletion, ChatCompletionChunk, ChatOptions, ChunkDelta, FinishReason, Message,
    SubmitOptions, ToolCall, ToolProtocol,
};
use colloquy::util::RetryPolicy;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

fn add_tool(chat: &mut Chat) {
    chat.register_fn(
        "add",
        "Add two integers",
        ToolParameters::object()
            .integer("x", "left operand", true)
            .integer("y", "right operand", true)
            .build(),
        |args, _ctx| async move { Ok(json!(args.get_i64("x")? + args.get_i64("y")?)) },
    );
}

fn fast_retry(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        initial_backoff: Duration::from_millis(1),
        max_backoff: Duration::from_millis(1),
        multiplier: 1.0,
        jitter: false,
    }
}

#[tokio::test]
async fn text_reply_ends_the_exchange() {
    let service = ScriptedService::new();
    service.push_text(&["I am ", "a bird."]);

    let mut chat = chat_with(&service);
    chat.submit(["What are you?"]).await.unwrap();

    assert_eq!(
        chat.history(),
        &[Message::user("What are you?"), Message::assistant("I am a bird.")]
    );
    assert_eq!(service.request_count(), 1);
}

#[tokio::test]
async fn request_carries_history_then_inputs() {
    let service = ScriptedService::new();
    service.push_text(&["ok"]);

    let mut chat = chat_with(&service).with_context([Message::system("Be brief.")]);
    chat.submit(["hi"]).await.unwrap();

    let request = &service.requests()[0];
    assert_eq!(request.messages, vec![Message::system("Be brief."), Message::user("hi")]);
    assert_eq!(request.temperature, 0.0);
    assert_eq!(request.tools, ToolManifest::None);
}

#[tokio::test]
async fn text_beside_empty_tool_call_lists_is_kept() {
    let text = |content: &str| {
        ChatCompletionChunk::with_delta(ChunkDelta {
            content: Some(content.into()),
            tool_calls: Some(Vec::new()),
            function_call: None,
        })
    };
    let service = ScriptedService::new();
    service.push_stream(vec![text("I am "), text("a bird."), ChatCompletionChunk::finish("stop")]);

    let mut chat = chat_with(&service);
    chat.submit(["What are you?"]).await.unwrap();

    assert_eq!(
        chat.history(),
        &[Message::user("What are you?"), Message::assistant("I am a bird.")]
    );
}

#[tokio::test]
async fn tool_call_result_is_fed_back() {
    let service = ScriptedService::new();
    service.push_stream(vec![
        ChatCompletionChunk::tool_call_start(0, "a1", "add", "{\"x\":1,"),
        ChatCompletionChunk::tool_call_arguments(0, "\"y\":2}"),
        ChatCompletionChunk::finish("tool_calls"),
    ]);
    service.push_text(&["3"]);

    let mut chat = chat_with(&service);
    add_tool(&mut chat);
    chat.submit(["What is 1 + 2?"]).await.unwrap();

    assert_eq!(
        chat.history(),
        &[
            Message::user("What is 1 + 2?"),
            Message::assistant_tool_calls(vec![ToolCall::new("a1", "add", "{\"x\":1,\"y\":2}")]),
            Message::tool_result("a1", "add", "3"),
            Message::assistant("3"),
        ]
    );

    let requests = service.requests();
    assert_eq!(requests.len(), 2);
    // The continuation adds no new inputs: it is exactly the history so far.
    assert_eq!(requests[1].messages, chat.history()[..3].to_vec());
    match &requests[0].tools {
        ToolManifest::Tools(defs) => assert_eq!(defs[0].name, "add"),
        other => panic!("unexpected manifest: {other:?}"),
    }
}

#[tokio::test]
async fn several_tool_calls_run_in_creation_order() {
    let service = ScriptedService::new();
    service.push_stream(vec![
        ChatCompletionChunk::tool_call_start(0, "a", "add", ""),
        ChatCompletionChunk::tool_call_start(1, "b", "add", ""),
        ChatCompletionChunk::tool_call_arguments(1, r#"{"x":10,"y":20}"#),
        ChatCompletionChunk::tool_call_arguments(0, r#"{"x":1,"y":2}"#),
        ChatCompletionChunk::finish("tool_calls"),
    ]);
    service.push_text(&["done"]);

    let mut chat = chat_with(&service)
        .with_options(ChatOptions::builder().concurrent_tools(true).build());
    add_tool(&mut chat);
    chat.submit(["sum things"]).await.unwrap();

    let results: Vec<_> = chat
        .history()
        .iter()
        .filter_map(|m| match m {
            Message::Tool {
                tool_call_id,
                content,
                ..
            } => Some((tool_call_id.as_str(), content.as_str())),
            _ => None,
        })
        .collect();
    assert_eq!(results, vec![("a", "3"), ("b", "30")]);
}

#[tokio::test]
async fn unknown_tool_is_reported_to_the_model() {
    let service = ScriptedService::new();
    service.push_stream(vec![
        ChatCompletionChunk::tool_call_start(0, "c1", "divide", "{}"),
        ChatCompletionChunk::finish("tool_calls"),
    ]);
    service.push_text(&["Sorry, I cannot divide."]);

    let mut chat = chat_with(&service);
    chat.submit(["6 / 3?"]).await.unwrap();

    let Message::Tool { content, .. } = &chat.history()[2] else {
        panic!("expected tool result, got {:?}", chat.history()[2]);
    };
    let payload: Value = serde_json::from_str(content).unwrap();
    assert_eq!(payload["error"], json!(ToolFailure::UnknownTool("divide".into()).to_string()));
    assert_eq!(chat.history().len(), 4);
}

#[tokio::test]
async fn invalid_arguments_are_reported_to_the_model() {
    let service = ScriptedService::new();
    service.push_stream(vec![
        ChatCompletionChunk::tool_call_start(0, "c1", "add", "{\"x\": 1"),
        ChatCompletionChunk::finish("tool_calls"),
    ]);
    service.push_text(&["Let me retry."]);

    let mut chat = chat_with(&service);
    add_tool(&mut chat);
    chat.submit(["1 + ?"]).await.unwrap();

    let Message::Tool { content, .. } = &chat.history()[2] else {
        panic!("expected tool result");
    };
    assert!(content.contains("Invalid arguments"), "{content}");
}

#[tokio::test]
async fn legacy_function_call_round_trip() {
    let service = ScriptedService::new();
    service.push_stream(vec![
        ChatCompletionChunk::function_call_name("add"),
        ChatCompletionChunk::function_call_arguments("{\"x\":2,"),
        ChatCompletionChunk::function_call_arguments("\"y\":2}"),
        ChatCompletionChunk::finish("function_call"),
    ]);
    service.push_text(&["4"]);

    let mut chat = chat_with(&service)
        .with_options(ChatOptions::builder().protocol(ToolProtocol::LegacyFunctions).build());
    add_tool(&mut chat);
    chat.submit(["2 + 2?"]).await.unwrap();

    assert_eq!(
        chat.history(),
        &[
            Message::user("2 + 2?"),
            Message::assistant_function_call("add", "{\"x\":2,\"y\":2}"),
            Message::function_result("add", "4"),
            Message::assistant("4"),
        ]
    );
    assert!(matches!(service.requests()[0].tools, ToolManifest::Functions(_)));
}

#[tokio::test]
async fn function_call_finish_without_call_fails() {
    let service = ScriptedService::new();
    service.push_stream(vec![ChatCompletionChunk::finish("function_call")]);

    let mut chat = chat_with(&service);
    let err = chat.submit(["hi"]).await.unwrap_err();
    assert!(matches!(err, ColloquyError::MissingFunctionCall));
}

#[tokio::test]
async fn stream_without_finish_reason_fails() {
    let service = ScriptedService::new();
    service.push_stream(vec![ChatCompletionChunk::text("half an ans")]);

    let mut chat = chat_with(&service);
    let err = chat.submit(["hi"]).await.unwrap_err();

    assert!(matches!(err, ColloquyError::NoTerminalReason));
    // The request went out, so the input is kept; the broken turn is not.
    assert_eq!(chat.history(), &[Message::user("hi")]);
}

#[tokio::test]
async fn broken_stream_propagates_and_appends_no_assistant_text() {
    let service = ScriptedService::new();
    service.push(Reply::BrokenStream(vec![ChatCompletionChunk::text("partial")]));

    let mut chat = chat_with(&service);
    let err = chat.submit(["hi"]).await.unwrap_err();

    assert!(matches!(err, ColloquyError::MalformedStream(_)));
    assert_eq!(chat.history(), &[Message::user("hi")]);
}

#[tokio::test]
async fn truncated_reply_is_kept_with_a_notice() {
    let service = ScriptedService::new();
    service.push_stream(vec![
        ChatCompletionChunk::text("The answer is"),
        ChatCompletionChunk::finish("length"),
    ]);
    let (sink, events) = collecting_sink();

    let mut chat = chat_with(&service).with_event_sink(sink);
    chat.submit(["long question"]).await.unwrap();

    assert_eq!(chat.history().last(), Some(&Message::assistant("The answer is")));
    assert_eq!(service.request_count(), 1);
    let notices: Vec<_> = events
        .lock()
        .unwrap()
        .iter()
        .filter_map(|e| match &e.payload {
            ChatEventPayload::Notice { notice } => Some(notice.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(
        notices,
        vec![Notice::Truncated {
            reason: FinishReason::Length
        }]
    );
}

#[tokio::test]
async fn content_filter_and_unknown_reasons_stop_quietly() {
    for reason in ["content_filter", "wat"] {
        let service = ScriptedService::new();
        service.push_stream(vec![ChatCompletionChunk::finish(reason)]);

        let mut chat = chat_with(&service);
        chat.submit(["hi"]).await.unwrap();

        assert_eq!(service.request_count(), 1, "{reason}");
        // A turn always closes with one assistant message, even an empty one.
        assert_eq!(chat.history(), &[Message::user("hi"), Message::assistant("")], "{reason}");
    }
}

#[tokio::test]
async fn tool_calls_finish_without_calls_stops() {
    let service = ScriptedService::new();
    service.push_stream(vec![
        ChatCompletionChunk::text("hmm"),
        ChatCompletionChunk::finish("tool_calls"),
    ]);

    let mut chat = chat_with(&service);
    chat.submit(["hi"]).await.unwrap();
    assert_eq!(chat.history(), &[Message::user("hi"), Message::assistant("hmm")]);
}

#[tokio::test(start_paused = true)]
async fn throttled_request_is_retried_after_backoff() {
    let service = ScriptedService::new();
    service.push(Reply::Throttled { retry_after_ms: None });
    service.push_text(&["I am a bird."]);

    let mut chat = chat_with(&service);
    let started = tokio::time::Instant::now();
    chat.submit(["What are you?"]).await.unwrap();

    assert!(started.elapsed() >= Duration::from_secs(5));
    assert_eq!(service.request_count(), 2);
    let requests = service.requests();
    assert_eq!(requests[0], requests[1]);
    assert_eq!(
        chat.history(),
        &[Message::user("What are you?"), Message::assistant("I am a bird.")]
    );
}

#[tokio::test]
async fn exhausted_throttling_is_fatal() {
    let service = ScriptedService::new();
    for _ in 0..3 {
        service.push(Reply::Throttled {
            retry_after_ms: None,
        });
    }

    let mut chat = chat_with(&service).with_retry_policy(fast_retry(3));
    let err = chat.submit(["hi"]).await.unwrap_err();

    assert!(err.is_throttled());
    assert_eq!(service.request_count(), 3);
    assert!(chat.history().is_empty());
}

#[tokio::test]
async fn other_api_errors_are_not_retried() {
    let service = ScriptedService::new();
    service.push(Reply::Fail {
        status: 400,
        message: "bad request".into(),
    });
    service.push_text(&["unused"]);

    let mut chat = chat_with(&service).with_retry_policy(fast_retry(5));
    let err = chat.submit(["hi"]).await.unwrap_err();

    assert!(matches!(err, ColloquyError::Api { status: 400, .. }));
    assert_eq!(service.request_count(), 1);
    assert_eq!(service.remaining(), 1);
}

#[tokio::test]
async fn non_streaming_path_matches_streaming_history() {
    let service = ScriptedService::new();
    service.push(Reply::Complete(ChatCompletion::tool_calls(vec![ToolCall::new(
        "a1",
        "add",
        r#"{"x":1,"y":2}"#,
    )])));
    service.push(Reply::Complete(ChatCompletion::text("3", "stop")));

    let mut chat = non_streaming_chat(&service);
    add_tool(&mut chat);
    chat.submit(["What is 1 + 2?"]).await.unwrap();

    assert_eq!(
        chat.history(),
        &[
            Message::user("What is 1 + 2?"),
            Message::assistant_tool_calls(vec![ToolCall::new("a1", "add", r#"{"x":1,"y":2}"#)]),
            Message::tool_result("a1", "add", "3"),
            Message::assistant("3"),
        ]
    );
}

#[tokio::test]
async fn empty_completion_is_a_stop() {
    let service = ScriptedService::new();
    service.push(Reply::Complete(ChatCompletion::default()));

    let mut chat = non_streaming_chat(&service);
    chat.submit(["hi"]).await.unwrap();
    assert_eq!(chat.history(), &[Message::user("hi")]);
}

#[tokio::test]
async fn submit_overrides_apply_to_continuations() {
    let service = ScriptedService::new();
    service.push(Reply::Complete(ChatCompletion::tool_calls(vec![ToolCall::new(
        "a1",
        "add",
        r#"{"x":1,"y":1}"#,
    )])));
    service.push(Reply::Complete(ChatCompletion::text("2", "stop")));

    let mut chat = chat_with(&service);
    add_tool(&mut chat);
    chat.submit_with(
        ["1 + 1"],
        SubmitOptions::builder().stream(false).temperature(0.5).build(),
    )
    .await
    .unwrap();

    assert!(service.requests().iter().all(|r| r.temperature == 0.5));
}

#[tokio::test]
async fn runaway_tool_loop_hits_turn_limit() {
    let service = ScriptedService::new();
    for i in 0..3 {
        service.push_stream(vec![
            ChatCompletionChunk::tool_call_start(0, format!("c{i}"), "add", r#"{"x":1,"y":1}"#),
            ChatCompletionChunk::finish("tool_calls"),
        ]);
    }

    let mut chat = chat_with(&service).with_options(ChatOptions::builder().max_turns(3).build());
    add_tool(&mut chat);
    let err = chat.submit(["loop"]).await.unwrap_err();

    assert!(matches!(err, ColloquyError::MaxTurnsExceeded(3)));
    assert_eq!(service.request_count(), 3);
}

#[tokio::test]
async fn resume_continues_without_new_input() {
    let service = ScriptedService::new();
    service.push_text(&["continuing"]);

    let mut chat = chat_with(&service);
    chat.append([Message::user("tell me more")]);
    chat.resume().await.unwrap();

    assert_eq!(service.requests()[0].messages, vec![Message::user("tell me more")]);
    assert_eq!(chat.history().len(), 2);
}

#[tokio::test]
async fn append_twice_grows_history_by_two() {
    let service = ScriptedService::new();
    let mut chat = chat_with(&service);
    chat.append(["same"]);
    chat.append(["same"]);
    assert_eq!(chat.history().len(), 2);

    chat.clear_history();
    assert!(chat.history().is_empty());
}

#[tokio::test]
async fn render_hook_runs_once_per_call() {
    let service = ScriptedService::new();
    service.push_stream(vec![
        ChatCompletionChunk::tool_call_start(0, "a1", "add", ""),
        ChatCompletionChunk::tool_call_arguments(0, r#"{"x":1,"#),
        ChatCompletionChunk::tool_call_arguments(0, r#""y":2}"#),
        ChatCompletionChunk::finish("tool_calls"),
    ]);
    service.push_text(&["3"]);

    let renders = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&renders);
    let renderer: ToolRenderer = Arc::new(move |call: &ToolCallPreview<'_>| {
        counter.fetch_add(1, Ordering::SeqCst);
        format!("adding via {}", call.name)
    });

    let (sink, events) = collecting_sink();
    let mut chat = chat_with(&service).with_event_sink(sink);
    chat.register_with_renderer(
        colloquy::tools::FnTool::new(
            "add",
            "Add",
            ToolParameters::object()
                .integer("x", "", true)
                .integer("y", "", true)
                .build(),
            |args, _| async move { Ok(json!(args.get_i64("x")? + args.get_i64("y")?)) },
        ),
        renderer,
    );
    chat.submit(["1 + 2"]).await.unwrap();

    assert_eq!(renders.load(Ordering::SeqCst), 1);
    let started: Vec<_> = events
        .lock()
        .unwrap()
        .iter()
        .filter_map(|e| match &e.payload {
            ChatEventPayload::ToolCallStarted { rendered, .. } => rendered.clone(),
            _ => None,
        })
        .collect();
    assert_eq!(started, vec!["adding via add".to_string()]);
}

#[tokio::test]
async fn legacy_function_calls_use_the_registered_renderer() {
    let service = ScriptedService::new();
    service.push_stream(vec![
        ChatCompletionChunk::function_call_name("add"),
        ChatCompletionChunk::function_call_arguments(r#"{"x":2,"y":2}"#),
        ChatCompletionChunk::finish("function_call"),
    ]);
    service.push_text(&["4"]);

    let renderer: ToolRenderer =
        Arc::new(|call: &ToolCallPreview<'_>| format!("legacy {}", call.name));
    let (sink, events) = collecting_sink();
    let mut chat = chat_with(&service)
        .with_event_sink(sink)
        .with_options(ChatOptions::builder().protocol(ToolProtocol::LegacyFunctions).build());
    chat.register_with_renderer(
        colloquy::tools::FnTool::new(
            "add",
            "Add",
            ToolParameters::object()
                .integer("x", "", true)
                .integer("y", "", true)
                .build(),
            |args, _| async move { Ok(json!(args.get_i64("x")? + args.get_i64("y")?)) },
        ),
        renderer,
    );
    chat.submit(["2 + 2?"]).await.unwrap();

    let started: Vec<_> = events
        .lock()
        .unwrap()
        .iter()
        .filter_map(|e| match &e.payload {
            ChatEventPayload::ToolCallStarted { rendered, .. } => rendered.clone(),
            _ => None,
        })
        .collect();
    assert_eq!(started, vec!["legacy add".to_string()]);
}

#[tokio::test]
async fn events_are_sequenced_per_conversation() {
    let service = ScriptedService::new();
    service.push_text(&["hi"]);
    let (sink, events) = collecting_sink();

    let mut chat = chat_with(&service).with_event_sink(sink);
    chat.submit(["hello"]).await.unwrap();

    let events = events.lock().unwrap();
    let seqs: Vec<u64> = events.iter().map(|e| e.seq).collect();
    let expected: Vec<u64> = (1..=events.len() as u64).collect();
    assert_eq!(seqs, expected);
    assert!(events.iter().all(|e| e.conversation_id == chat.id()));
    assert!(matches!(events[0].payload, ChatEventPayload::TurnStarted { turn: 1 }));
    assert!(matches!(
        events.last().map(|e| &e.payload),
        Some(ChatEventPayload::TurnFinished {
            finish_reason: FinishReason::Stop,
            ..
        })
    ));
}
