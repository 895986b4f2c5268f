//! Reduces a full (non-streamed) completion to a turn outcome.
//!
//! The first choice is replayed through the demultiplexer as if it had been
//! streamed, so both paths share one set of rules.

use tracing::{debug, warn};

use super::demux::{StreamDemultiplexer, TurnOutcome};
use crate::error::ColloquyError;
use crate::events::{EventEmitter, Notice};
use crate::tools::ToolRegistry;
use crate::types::{
    ChatCompletion, ChatCompletionChunk, ChunkDelta, CompletionChoice, FinishReason,
    FunctionCallDelta, ToolCallDelta,
};

pub fn extract_completion(
    completion: ChatCompletion,
    registry: &ToolRegistry,
    events: &EventEmitter,
) -> Result<TurnOutcome, ColloquyError> {
    let mut choices = completion.choices.into_iter();
    let Some(choice) = choices.next() else {
        warn!("completion has no choices");
        events.notice(Notice::EmptyResponse);
        return Ok(TurnOutcome {
            finish_reason: FinishReason::Stop,
            messages: Vec::new(),
            function_call: None,
            tool_calls: Vec::new(),
        });
    };
    if choices.next().is_some() {
        debug!("completion has several choices; using the first");
    }

    let mut demux = StreamDemultiplexer::new(registry, events);
    for chunk in replay(choice) {
        if demux.push(chunk)? {
            break;
        }
    }
    demux.finish()
}

/// The chunks a stream would have carried for `choice`.
fn replay(choice: CompletionChoice) -> Vec<ChatCompletionChunk> {
    let message = choice.message;
    let mut chunks = Vec::new();

    if let Some(content) = message.content {
        chunks.push(ChatCompletionChunk::text(content));
    }
    if let Some(tool_calls) = message.tool_calls.filter(|calls| !calls.is_empty()) {
        let deltas = tool_calls
            .into_iter()
            .enumerate()
            .map(|(index, call)| ToolCallDelta {
                index,
                id: Some(call.id),
                function: Some(FunctionCallDelta {
                    name: Some(call.function.name),
                    arguments: Some(call.function.arguments),
                }),
            })
            .collect();
        chunks.push(ChatCompletionChunk::with_tool_deltas(deltas));
    }
    if let Some(function_call) = message.function_call {
        chunks.push(ChatCompletionChunk::with_delta(ChunkDelta {
            function_call: Some(FunctionCallDelta {
                name: Some(function_call.name),
                arguments: Some(function_call.arguments),
            }),
            ..Default::default()
        }));
    }

    let reason = choice.finish_reason.unwrap_or_else(|| {
        debug!("completion has no finish reason; treating as stop");
        FinishReason::Stop.to_string()
    });
    chunks.push(ChatCompletionChunk::finish(&reason));
    chunks
}
