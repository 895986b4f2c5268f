//! Terminal rendering of conversation events.

use std::io::Write;
use std::sync::Arc;

use crate::events::{ChatEvent, ChatEventPayload, ChatEventSink};

const RESULT_PREVIEW_CHARS: usize = 200;

/// A sink that streams assistant text to stdout and tool activity to stderr.
pub fn terminal_sink() -> ChatEventSink {
    Arc::new(|event: ChatEvent| render(&event))
}

fn render(event: &ChatEvent) {
    match &event.payload {
        ChatEventPayload::AssistantDelta { text } => {
            print!("{text}");
            let _ = std::io::stdout().flush();
        }
        ChatEventPayload::AssistantFinished { .. } => println!(),
        ChatEventPayload::ToolCallStarted { call_id, name, rendered } => match rendered {
            Some(text) => eprintln!("⚡ {text}"),
            None => eprintln!("⚡ {name} ({call_id})"),
        },
        ChatEventPayload::ToolResult {
            content, is_error, ..
        } => {
            let preview = truncate(content, RESULT_PREVIEW_CHARS);
            if *is_error {
                eprintln!("  ❌ {preview}");
            } else {
                eprintln!("  ✅ {preview}");
            }
        }
        ChatEventPayload::Notice { notice } => eprintln!("⚠ {notice}"),
        _ => {}
    }
}

/// Cut `text` at a char boundary at or before `max` bytes.
pub fn truncate(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }
    let mut end = max;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}
