//! Generation settings and related enums.

use std::fmt;

use bon::Builder;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::models::DEFAULT_MODEL;

/// Default cap on request/response cycles within one `submit`.
pub const DEFAULT_MAX_TURNS: usize = 20;

/// Default idle time allowed between two streamed chunks.
pub const DEFAULT_STREAM_IDLE_TIMEOUT_MS: u64 = 120_000;

/// Why the service ended a turn.
///
/// Unrecognized values are preserved in [`FinishReason::Other`] so they can
/// be reported rather than dropped.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FinishReason {
    Stop,
    Length,
    MaxTokens,
    ContentFilter,
    FunctionCall,
    ToolCalls,
    Other(String),
}

impl FinishReason {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "stop" => Self::Stop,
            "length" => Self::Length,
            "max_tokens" => Self::MaxTokens,
            "content_filter" => Self::ContentFilter,
            "function_call" => Self::FunctionCall,
            "tool_calls" => Self::ToolCalls,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Stop => "stop",
            Self::Length => "length",
            Self::MaxTokens => "max_tokens",
            Self::ContentFilter => "content_filter",
            Self::FunctionCall => "function_call",
            Self::ToolCalls => "tool_calls",
            Self::Other(raw) => raw,
        }
    }
}

impl fmt::Display for FinishReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for FinishReason {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

impl From<FinishReason> for String {
    fn from(reason: FinishReason) -> Self {
        reason.as_str().to_string()
    }
}

/// How the tool manifest is presented to the service.
#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ToolProtocol {
    /// Multi-call `tools` / `tool_calls` protocol.
    #[default]
    Tools,
    /// Single-call `functions` / `function_call` protocol.
    LegacyFunctions,
}

/// Settings controlling how a [`Chat`](crate::chat::Chat) talks to the service.
///
/// ```
/// use colloquy::types::{ChatOptions, ToolProtocol};
///
/// let options = ChatOptions::builder()
///     .model("gpt-4o")
///     .stream(false)
///     .protocol(ToolProtocol::LegacyFunctions)
///     .build();
/// assert_eq!(options.temperature, 0.0);
/// assert_eq!(options.max_turns, 20);
/// ```
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
pub struct ChatOptions {
    #[builder(into, default = DEFAULT_MODEL.to_string())]
    pub model: String,
    /// Sampling temperature; greedy decoding unless overridden.
    #[builder(default = 0.0)]
    pub temperature: f64,
    pub max_tokens: Option<u32>,
    #[builder(default = true)]
    pub stream: bool,
    #[builder(default)]
    pub protocol: ToolProtocol,
    #[builder(default = DEFAULT_MAX_TURNS)]
    pub max_turns: usize,
    /// Zero disables the idle timeout.
    #[builder(default = DEFAULT_STREAM_IDLE_TIMEOUT_MS)]
    pub stream_idle_timeout_ms: u64,
    /// Run the tool calls of one turn concurrently. Results are still
    /// appended in the order the calls were created.
    #[builder(default)]
    pub concurrent_tools: bool,
}

impl Default for ChatOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Per-call overrides for [`Chat::submit_with`](crate::chat::Chat::submit_with).
#[derive(Debug, Clone, Copy, Default, Builder)]
pub struct SubmitOptions {
    pub stream: Option<bool>,
    pub temperature: Option<f64>,
}
