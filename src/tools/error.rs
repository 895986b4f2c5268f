//! Failures reported back to the model instead of aborting the conversation.

use thiserror::Error;

/// Why a tool call produced no value.
///
/// These never propagate out of [`Chat::submit`](crate::chat::Chat::submit);
/// they become the content of the tool result so the model can correct itself.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ToolFailure {
    #[error("Unknown tool '{0}'")]
    UnknownTool(String),

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("Tool execution failed: {0}")]
    Execution(String),
}

impl ToolFailure {
    pub fn execution(message: impl std::fmt::Display) -> Self {
        Self::Execution(message.to_string())
    }

    /// Stable machine-readable kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnknownTool(_) => "unknown_tool",
            Self::InvalidArguments(_) => "invalid_arguments",
            Self::Execution(_) => "execution",
        }
    }
}
