//! Conversation messages.

use serde::{Deserialize, Serialize};
use strum::Display;

/// One entry of conversation history.
///
/// Each role has its own variant, and an assistant message holds exactly one
/// kind of payload (see [`AssistantContent`]).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Message {
    System {
        content: String,
    },
    User {
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    Assistant(AssistantContent),
    /// Result of a tool call, correlated by id.
    Tool {
        tool_call_id: String,
        name: String,
        content: String,
    },
    /// Result of a legacy function call.
    Function {
        name: String,
        content: String,
    },
}

/// Payload of an assistant message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum AssistantContent {
    ToolCalls { tool_calls: Vec<ToolCall> },
    FunctionCall { function_call: FunctionCall },
    Text { content: String },
}

impl Message {
    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::System {
            content: content.into(),
        }
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::User {
            content: content.into(),
            name: None,
        }
    }

    /// Create a user message attributed to a named participant.
    pub fn user_named(content: impl Into<String>, name: impl Into<String>) -> Self {
        Self::User {
            content: content.into(),
            name: Some(name.into()),
        }
    }

    /// Create an assistant text message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::Assistant(AssistantContent::Text {
            content: content.into(),
        })
    }

    /// Create an assistant message requesting a legacy function call.
    pub fn assistant_function_call(name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self::Assistant(AssistantContent::FunctionCall {
            function_call: FunctionCall {
                name: name.into(),
                arguments: arguments.into(),
            },
        })
    }

    /// Create an assistant message requesting one or more tool calls.
    pub fn assistant_tool_calls(tool_calls: Vec<ToolCall>) -> Self {
        Self::Assistant(AssistantContent::ToolCalls { tool_calls })
    }

    /// Create a tool result message.
    pub fn tool_result(
        tool_call_id: impl Into<String>,
        name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self::Tool {
            tool_call_id: tool_call_id.into(),
            name: name.into(),
            content: content.into(),
        }
    }

    /// Create a legacy function result message.
    pub fn function_result(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self::Function {
            name: name.into(),
            content: content.into(),
        }
    }

    pub fn role(&self) -> Role {
        match self {
            Self::System { .. } => Role::System,
            Self::User { .. } => Role::User,
            Self::Assistant(_) => Role::Assistant,
            Self::Tool { .. } => Role::Tool,
            Self::Function { .. } => Role::Function,
        }
    }

    /// Text content, if this message carries any.
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::System { content }
            | Self::User { content, .. }
            | Self::Assistant(AssistantContent::Text { content })
            | Self::Tool { content, .. }
            | Self::Function { content, .. } => Some(content.as_str()),
            Self::Assistant(_) => None,
        }
    }

    /// Tool calls requested by this message (empty unless it is an
    /// assistant tool-call message).
    pub fn tool_calls(&self) -> &[ToolCall] {
        match self {
            Self::Assistant(AssistantContent::ToolCalls { tool_calls }) => tool_calls,
            _ => &[],
        }
    }

    /// Legacy function call requested by this message.
    pub fn function_call(&self) -> Option<&FunctionCall> {
        match self {
            Self::Assistant(AssistantContent::FunctionCall { function_call }) => {
                Some(function_call)
            }
            _ => None,
        }
    }
}

impl From<&str> for Message {
    fn from(content: &str) -> Self {
        Self::user(content)
    }
}

impl From<String> for Message {
    fn from(content: String) -> Self {
        Self::user(content)
    }
}

/// Conversation role.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
    Function,
}

/// A function name plus its raw JSON argument text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default)]
    pub arguments: String,
}

/// A tool call requested by the model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolCall {
    pub id: String,
    pub function: FunctionCall,
}

impl ToolCall {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            function: FunctionCall {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }
}
