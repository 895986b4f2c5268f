//! Routes streamed chunks to the text builder and tool call accumulators.

use std::collections::HashMap;
use std::time::Duration;

use futures::StreamExt;
use tracing::{debug, warn};

use super::assistant::AssistantTurnBuilder;
use super::tool_call::{ToolCallAccumulator, ToolCallRequest};
use crate::error::ColloquyError;
use crate::events::{ChatEventPayload, EventEmitter};
use crate::provider::ChunkStream;
use crate::tools::ToolRegistry;
use crate::types::{ChatCompletionChunk, FinishReason, FunctionCallDelta, Message, ToolCallDelta};
use crate::util::timeout::maybe_timeout;

/// What one turn reduced to.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnOutcome {
    pub finish_reason: FinishReason,
    /// Assistant text messages to append, in emission order.
    pub messages: Vec<Message>,
    /// The legacy `function_call`, if one was streamed.
    pub function_call: Option<ToolCallRequest>,
    /// Tool calls in order of first appearance.
    pub tool_calls: Vec<ToolCallRequest>,
}

/// Per-turn stream reducer.
///
/// Feed chunks in arrival order with [`push`](Self::push) until it reports
/// the terminal reason, then call [`finish`](Self::finish).
#[derive(Debug)]
pub struct StreamDemultiplexer<'a> {
    registry: &'a ToolRegistry,
    events: &'a EventEmitter,
    builder: AssistantTurnBuilder,
    messages: Vec<Message>,
    calls: Vec<ToolCallAccumulator>,
    /// Wire index to position in `calls`.
    positions: HashMap<usize, usize>,
    legacy: Option<ToolCallAccumulator>,
    finish_reason: Option<FinishReason>,
}

impl<'a> StreamDemultiplexer<'a> {
    pub fn new(registry: &'a ToolRegistry, events: &'a EventEmitter) -> Self {
        Self {
            registry,
            events,
            builder: AssistantTurnBuilder::new(),
            messages: Vec::new(),
            calls: Vec::new(),
            positions: HashMap::new(),
            legacy: None,
            finish_reason: None,
        }
    }

    /// Drain `stream`, failing with `Timeout` if no chunk arrives within
    /// `idle_timeout` of the previous one.
    pub async fn consume(
        mut self,
        mut stream: ChunkStream,
        idle_timeout: Option<Duration>,
    ) -> Result<TurnOutcome, ColloquyError> {
        while let Some(next) = maybe_timeout(idle_timeout, stream.next()).await? {
            if self.push(next?)? {
                break;
            }
        }
        self.finish()
    }

    /// Process one chunk. Returns true once the terminal reason is seen.
    pub fn push(&mut self, chunk: ChatCompletionChunk) -> Result<bool, ColloquyError> {
        if self.finish_reason.is_some() {
            debug!("ignoring chunk after finish reason");
            return Ok(true);
        }
        let mut choices = chunk.choices.into_iter();
        let Some(choice) = choices.next() else {
            warn!("stream chunk has no choices");
            return Ok(false);
        };
        if choices.next().is_some() {
            debug!("stream chunk has several choices; using the first");
        }

        let delta = choice.delta;
        if let Some(text) = delta.content.filter(|t| !t.is_empty()) {
            self.push_text(&text);
        }
        // Some servers send an empty list beside every text fragment.
        if let Some(deltas) = delta.tool_calls.filter(|d| !d.is_empty()) {
            self.push_tool_calls(deltas)?;
        }
        if let Some(function_call) = delta.function_call {
            self.push_function_call(function_call)?;
        }

        match choice.finish_reason {
            Some(reason) => {
                debug!(finish_reason = %reason, "turn finished");
                self.finish_reason = Some(FinishReason::parse(&reason));
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn push_text(&mut self, text: &str) {
        if self.builder.is_finished() {
            self.builder.append(text);
            return;
        }
        if self.builder.mark_displayed() {
            self.events.emit(ChatEventPayload::AssistantStarted);
        }
        self.builder.append(text);
        self.events.emit(ChatEventPayload::AssistantDelta {
            text: text.to_string(),
        });
    }

    /// Close the text part of the turn before a call begins, keeping it only
    /// if it holds text.
    fn close_text(&mut self) -> Result<(), ColloquyError> {
        if self.builder.is_finished() {
            return Ok(());
        }
        let keep = self.builder.has_text();
        let message = self.builder.finish()?;
        if keep {
            self.emit_finished(message);
        }
        Ok(())
    }

    fn emit_finished(&mut self, message: Message) {
        self.events.emit(ChatEventPayload::AssistantFinished {
            content: message.text().unwrap_or_default().to_string(),
        });
        self.messages.push(message);
    }

    fn push_tool_calls(&mut self, deltas: Vec<ToolCallDelta>) -> Result<(), ColloquyError> {
        self.close_text()?;

        for delta in deltas {
            let Some(function) = delta.function else {
                return Err(ColloquyError::malformed(format!(
                    "tool call delta at index {} has no function payload",
                    delta.index
                )));
            };

            if let Some(&pos) = self.positions.get(&delta.index) {
                if let Some(fragment) = function.arguments.filter(|a| !a.is_empty()) {
                    let call = &mut self.calls[pos];
                    call.append_arguments(&fragment);
                    self.events.emit(ChatEventPayload::ToolCallDelta {
                        call_id: call.id().to_string(),
                        arguments: fragment,
                    });
                }
                continue;
            }

            let (Some(id), Some(name)) = (delta.id, function.name) else {
                return Err(ColloquyError::malformed(format!(
                    "tool call at index {} started without an id and name",
                    delta.index
                )));
            };
            let mut call = ToolCallAccumulator::from_registry(
                self.registry,
                id,
                name,
                function.arguments.unwrap_or_default(),
            );
            call.display(self.events);
            debug!(index = delta.index, tool = call.name(), "tool call started");
            self.positions.insert(delta.index, self.calls.len());
            self.calls.push(call);
        }
        Ok(())
    }

    fn push_function_call(&mut self, delta: FunctionCallDelta) -> Result<(), ColloquyError> {
        let FunctionCallDelta { name, arguments } = delta;
        let arguments = arguments.filter(|a| !a.is_empty());

        let Some(call) = self.legacy.as_mut() else {
            match name {
                Some(name) => {
                    self.close_text()?;
                    let renderer = self.registry.lookup(&name).and_then(|t| t.renderer().cloned());
                    let mut call =
                        ToolCallAccumulator::legacy(name, arguments.unwrap_or_default(), renderer);
                    call.display(self.events);
                    self.legacy = Some(call);
                }
                None if arguments.is_some() => {
                    return Err(ColloquyError::malformed(
                        "function call arguments arrived before its name",
                    ));
                }
                None => {}
            }
            return Ok(());
        };

        if let Some(name) = name.filter(|n| n != call.name()) {
            return Err(ColloquyError::malformed(format!(
                "function call renamed from '{}' to '{name}' mid-stream",
                call.name()
            )));
        }
        if let Some(fragment) = arguments {
            call.append_arguments(&fragment);
            self.events.emit(ChatEventPayload::ToolCallDelta {
                call_id: call.id().to_string(),
                arguments: fragment,
            });
        }
        Ok(())
    }

    /// Close the turn. Fails if the stream never gave a finish reason.
    pub fn finish(mut self) -> Result<TurnOutcome, ColloquyError> {
        let finish_reason = self.finish_reason.take().ok_or(ColloquyError::NoTerminalReason)?;

        if !self.builder.is_finished() {
            let message = self.builder.finish()?;
            self.emit_finished(message);
        }

        Ok(TurnOutcome {
            finish_reason,
            messages: self.messages,
            function_call: self.legacy.map(ToolCallAccumulator::finish),
            tool_calls: self.calls.into_iter().map(ToolCallAccumulator::finish).collect(),
        })
    }
}
