//! Completion service trait and the OpenAI-compatible implementation.

pub mod http;
pub mod openai;

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::config::ColloquyConfig;
use crate::error::ColloquyError;
use crate::types::{ChatCompletion, ChatCompletionChunk, Message};

pub use openai::OpenAiService;

/// A request sent to the completion service.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub tools: ToolManifest,
    pub temperature: f64,
    pub max_tokens: Option<u32>,
}

/// Tool definition sent to the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// Tools offered with a request, in the shape of the selected protocol.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum ToolManifest {
    #[default]
    None,
    /// Sent as `tools`; the model answers with `tool_calls`.
    Tools(Vec<ToolDefinition>),
    /// Sent as `functions`; the model answers with a single `function_call`.
    Functions(Vec<ToolDefinition>),
}

impl ToolManifest {
    pub fn definitions(&self) -> &[ToolDefinition] {
        match self {
            Self::None => &[],
            Self::Tools(defs) | Self::Functions(defs) => defs,
        }
    }
}

/// Ordered chunks of one streamed completion.
pub type ChunkStream = BoxStream<'static, Result<ChatCompletionChunk, ColloquyError>>;

/// The remote completion service.
///
/// Implementations report throttling as [`ColloquyError::RateLimited`] so
/// callers can tell it apart from other failures.
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Service name used in logs (e.g., "openai").
    fn provider_name(&self) -> &str;

    /// Request a complete response.
    async fn complete(&self, request: &CompletionRequest) -> Result<ChatCompletion, ColloquyError>;

    /// Request a streamed response.
    async fn stream(&self, request: &CompletionRequest) -> Result<ChunkStream, ColloquyError>;
}

/// Create the OpenAI-compatible service described by `config`.
///
/// Fails with [`ColloquyError::MissingCredential`] when no API key resolves.
pub fn create_service(
    config: &ColloquyConfig,
) -> Result<Arc<dyn CompletionService>, ColloquyError> {
    let api_key = config.resolve_api_key()?;
    Ok(Arc::new(OpenAiService::new(
        api_key,
        config.base_url().map(str::to_string),
        config.organization().map(str::to_string),
    )))
}
