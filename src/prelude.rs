//! Convenience re-exports for common use.

pub use crate::chat::{Chat, ToolCallResult};
pub use crate::config::{ColloquyConfig, CredentialSource};
pub use crate::error::{ColloquyError, Result};
pub use crate::events::{ChatEvent, ChatEventPayload, ChatEventSink, Notice};
pub use crate::provider::{CompletionService, ToolDefinition};
pub use crate::tools::{FnTool, Tool, ToolArguments, ToolFailure, ToolParameters};
pub use crate::types::{ChatOptions, FinishReason, Message, Role, SubmitOptions, ToolProtocol};
pub use crate::util::RetryPolicy;
