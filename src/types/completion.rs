//! Wire shapes of chat completion responses, full and streamed.
//!
//! These mirror the OpenAI-compatible chat completions format. Every field
//! the service may omit is optional so that partial chunks deserialize.

use serde::{Deserialize, Serialize};

use super::message::{FunctionCall, ToolCall};

/// A complete (non-streamed) chat completion.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ChatCompletion {
    #[serde(default)]
    pub choices: Vec<CompletionChoice>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompletionChoice {
    #[serde(default)]
    pub message: CompletionMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CompletionMessage {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub function_call: Option<FunctionCall>,
    #[serde(default)]
    pub tool_calls: Option<Vec<ToolCall>>,
}

impl ChatCompletion {
    /// A single-choice completion carrying text.
    pub fn text(content: impl Into<String>, finish_reason: &str) -> Self {
        Self::single(
            CompletionMessage {
                content: Some(content.into()),
                ..Default::default()
            },
            finish_reason,
        )
    }

    /// A single-choice completion requesting tool calls.
    pub fn tool_calls(tool_calls: Vec<ToolCall>) -> Self {
        Self::single(
            CompletionMessage {
                tool_calls: Some(tool_calls),
                ..Default::default()
            },
            "tool_calls",
        )
    }

    /// A single-choice completion requesting a legacy function call.
    pub fn function_call(name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self::single(
            CompletionMessage {
                function_call: Some(FunctionCall {
                    name: name.into(),
                    arguments: arguments.into(),
                }),
                ..Default::default()
            },
            "function_call",
        )
    }

    fn single(message: CompletionMessage, finish_reason: &str) -> Self {
        Self {
            choices: vec![CompletionChoice {
                message,
                finish_reason: Some(finish_reason.to_string()),
            }],
        }
    }
}

/// One streamed chunk of a chat completion.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ChatCompletionChunk {
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ChunkChoice {
    #[serde(default)]
    pub delta: ChunkDelta,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Incremental content of a chunk.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ChunkDelta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallDelta>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_call: Option<FunctionCallDelta>,
}

/// A fragment of one tool call, addressed by its position in the turn.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ToolCallDelta {
    pub index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function: Option<FunctionCallDelta>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FunctionCallDelta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
}

impl ChatCompletionChunk {
    /// A chunk with no choices at all.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A chunk carrying a text fragment.
    pub fn text(fragment: impl Into<String>) -> Self {
        Self::with_delta(ChunkDelta {
            content: Some(fragment.into()),
            ..Default::default()
        })
    }

    /// A chunk opening a tool call at `index`.
    pub fn tool_call_start(
        index: usize,
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self::with_tool_deltas(vec![ToolCallDelta {
            index,
            id: Some(id.into()),
            function: Some(FunctionCallDelta {
                name: Some(name.into()),
                arguments: Some(arguments.into()),
            }),
        }])
    }

    /// A chunk continuing the arguments of the tool call at `index`.
    pub fn tool_call_arguments(index: usize, fragment: impl Into<String>) -> Self {
        Self::with_tool_deltas(vec![ToolCallDelta {
            index,
            id: None,
            function: Some(FunctionCallDelta {
                name: None,
                arguments: Some(fragment.into()),
            }),
        }])
    }

    pub fn with_tool_deltas(deltas: Vec<ToolCallDelta>) -> Self {
        Self::with_delta(ChunkDelta {
            tool_calls: Some(deltas),
            ..Default::default()
        })
    }

    /// A chunk naming a legacy function call.
    pub fn function_call_name(name: impl Into<String>) -> Self {
        Self::with_delta(ChunkDelta {
            function_call: Some(FunctionCallDelta {
                name: Some(name.into()),
                arguments: None,
            }),
            ..Default::default()
        })
    }

    /// A chunk continuing the arguments of the legacy function call.
    pub fn function_call_arguments(fragment: impl Into<String>) -> Self {
        Self::with_delta(ChunkDelta {
            function_call: Some(FunctionCallDelta {
                name: None,
                arguments: Some(fragment.into()),
            }),
            ..Default::default()
        })
    }

    /// A chunk carrying only a finish reason.
    pub fn finish(reason: &str) -> Self {
        Self {
            choices: vec![ChunkChoice {
                delta: ChunkDelta::default(),
                finish_reason: Some(reason.to_string()),
            }],
        }
    }

    pub fn with_delta(delta: ChunkDelta) -> Self {
        Self {
            choices: vec![ChunkChoice {
                delta,
                finish_reason: None,
            }],
        }
    }
}
