//! Conversation orchestration.
//!
//! A [`Chat`] owns the history and drives turns against a
//! [`CompletionService`](crate::provider::CompletionService). Streamed
//! responses are reduced by a [`StreamDemultiplexer`], which feeds text to an
//! [`AssistantTurnBuilder`] and tool call fragments to
//! [`ToolCallAccumulator`]s.

pub mod assistant;
pub mod demux;
pub mod extract;
pub mod orchestrator;
pub mod tool_call;

pub use assistant::{AssistantTurnBuilder, TurnState};
pub use demux::{StreamDemultiplexer, TurnOutcome};
pub use extract::extract_completion;
pub use orchestrator::Chat;
pub use tool_call::{ToolCallAccumulator, ToolCallRequest, ToolCallResult, LEGACY_CALL_ID};

pub use crate::tools::ToolFailure;
