//! Conversation event stream types.
//!
//! Rendering is not done here. A [`Chat`](crate::chat::Chat) reports what
//! happens during a `submit` as [`ChatEvent`]s to an optional sink, and the
//! caller decides how to show them.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::FinishReason;

/// Non-fatal conditions surfaced to the user instead of failing `submit`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notice {
    /// The model ran out of output budget (`length` / `max_tokens`).
    Truncated { reason: FinishReason },
    ContentFiltered,
    /// Finish reason not recognized; treated as `stop`.
    UnknownFinishReason { reason: String },
    /// `tool_calls` finish with no calls in the turn.
    MissingToolCalls,
    /// The service returned no choices.
    EmptyResponse,
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Truncated { reason } => {
                write!(f, "Response was cut short (finish reason: {reason})")
            }
            Self::ContentFiltered => f.write_str("Response was withheld by the content filter"),
            Self::UnknownFinishReason { reason } => {
                write!(f, "Unknown finish reason '{reason}', stopping")
            }
            Self::MissingToolCalls => {
                f.write_str("Model asked for tool calls but none were streamed")
            }
            Self::EmptyResponse => f.write_str("Service returned no choices"),
        }
    }
}

/// Concrete event payloads emitted during a `submit` chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEventPayload {
    /// A request/response cycle begins (1-based within the chain).
    TurnStarted {
        turn: usize,
    },
    /// First text of the assistant turn arrived.
    AssistantStarted,
    AssistantDelta {
        text: String,
    },
    AssistantFinished {
        content: String,
    },
    ToolCallStarted {
        call_id: String,
        name: String,
        /// Output of the tool's render hook, if it has one.
        rendered: Option<String>,
    },
    ToolCallDelta {
        call_id: String,
        arguments: String,
    },
    ToolResult {
        call_id: String,
        name: String,
        content: String,
        is_error: bool,
    },
    Notice {
        notice: Notice,
    },
    TurnFinished {
        turn: usize,
        finish_reason: FinishReason,
    },
}

/// Envelope for conversation events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatEvent {
    pub conversation_id: Uuid,
    /// Monotonic per conversation, starting at 1.
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    pub payload: ChatEventPayload,
}

/// Callback receiving conversation events.
pub type ChatEventSink = Arc<dyn Fn(ChatEvent) + Send + Sync>;

/// Stamps payloads with the conversation id and sequence number.
pub struct EventEmitter {
    conversation_id: Uuid,
    seq: AtomicU64,
    sink: Option<ChatEventSink>,
}

impl EventEmitter {
    pub fn new(conversation_id: Uuid, sink: Option<ChatEventSink>) -> Self {
        Self {
            conversation_id,
            seq: AtomicU64::new(1),
            sink,
        }
    }

    /// An emitter that drops everything.
    pub fn disabled() -> Self {
        Self::new(Uuid::nil(), None)
    }

    pub fn conversation_id(&self) -> Uuid {
        self.conversation_id
    }

    pub fn set_sink(&mut self, sink: Option<ChatEventSink>) {
        self.sink = sink;
    }

    pub fn emit(&self, payload: ChatEventPayload) {
        let Some(sink) = &self.sink else {
            return;
        };
        let seq = self.seq.fetch_add(1, Ordering::SeqCst);
        (sink)(ChatEvent {
            conversation_id: self.conversation_id,
            seq,
            timestamp: Utc::now(),
            payload,
        });
    }

    pub fn notice(&self, notice: Notice) {
        self.emit(ChatEventPayload::Notice { notice });
    }
}

impl fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventEmitter")
            .field("conversation_id", &self.conversation_id)
            .field("seq", &self.seq)
            .field("sink", &self.sink.as_ref().map(|_| ".."))
            .finish()
    }
}

/// A sink that records events, for tests and batch consumers.
pub fn collecting_sink() -> (ChatEventSink, Arc<std::sync::Mutex<Vec<ChatEvent>>>) {
    let events = Arc::new(std::sync::Mutex::new(Vec::new()));
    let captured = Arc::clone(&events);
    let sink: ChatEventSink = Arc::new(move |event: ChatEvent| {
        if let Ok(mut guard) = captured.lock() {
            guard.push(event);
        }
    });
    (sink, events)
}
