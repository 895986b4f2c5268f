//! Name-indexed collection of tools offered to the model.

use std::future::Future;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use super::arguments::ToolArguments;
use super::tool::{FnTool, Tool, ToolExecutionContext};
use super::types::ToolParameters;
use super::validation::validate_arguments;
use super::ToolFailure;
use crate::provider::{ToolDefinition, ToolManifest};
use crate::types::ToolProtocol;

/// What a render hook sees when a tool call first appears in the stream.
#[derive(Debug, Clone, Copy)]
pub struct ToolCallPreview<'a> {
    pub id: &'a str,
    pub name: &'a str,
    /// Argument text received so far; usually incomplete.
    pub arguments: &'a str,
}

/// Custom display for a tool's calls.
pub type ToolRenderer = Arc<dyn Fn(&ToolCallPreview<'_>) -> String + Send + Sync>;

/// A tool plus its optional render hook.
#[derive(Clone)]
pub struct RegisteredTool {
    tool: Arc<dyn Tool>,
    renderer: Option<ToolRenderer>,
}

impl RegisteredTool {
    pub fn tool(&self) -> &Arc<dyn Tool> {
        &self.tool
    }

    pub fn renderer(&self) -> Option<&ToolRenderer> {
        self.renderer.as_ref()
    }

    /// The API-visible description of this tool.
    pub fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.tool.name().to_string(),
            description: self.tool.description().to_string(),
            parameters: self.tool.parameters().schema.clone(),
        }
    }
}

impl std::fmt::Debug for RegisteredTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredTool")
            .field("name", &self.tool.name())
            .field("renderer", &self.renderer.as_ref().map(|_| ".."))
            .finish()
    }
}

/// Tools in registration order.
///
/// Registration order is what the manifest lists, so requests are
/// deterministic for a given registry.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<RegisteredTool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.tool.name()).collect()
    }

    /// Register a tool, replacing any tool of the same name.
    pub fn register(&mut self, tool: impl Tool + 'static) -> ToolDefinition {
        self.insert(Arc::new(tool), None)
    }

    pub fn register_shared(&mut self, tool: Arc<dyn Tool>) -> ToolDefinition {
        self.insert(tool, None)
    }

    /// Register a tool whose calls are displayed through `renderer`.
    pub fn register_with_renderer(
        &mut self,
        tool: impl Tool + 'static,
        renderer: ToolRenderer,
    ) -> ToolDefinition {
        self.insert(Arc::new(tool), Some(renderer))
    }

    /// Register a closure as a tool.
    pub fn register_fn<F, Fut>(
        &mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: ToolParameters,
        handler: F,
    ) -> ToolDefinition
    where
        F: Fn(ToolArguments, ToolExecutionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ToolFailure>> + Send + 'static,
    {
        self.register(FnTool::new(name, description, parameters, handler))
    }

    fn insert(&mut self, tool: Arc<dyn Tool>, renderer: Option<ToolRenderer>) -> ToolDefinition {
        let entry = RegisteredTool { tool, renderer };
        let definition = entry.definition();
        match self.tools.iter_mut().find(|t| t.tool.name() == definition.name) {
            Some(existing) => {
                debug!(tool = %definition.name, "replacing registered tool");
                *existing = entry;
            }
            None => self.tools.push(entry),
        }
        definition
    }

    pub fn lookup(&self, name: &str) -> Option<&RegisteredTool> {
        self.tools.iter().find(|t| t.tool.name() == name)
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(RegisteredTool::definition).collect()
    }

    /// The tool listing to attach to a request.
    pub fn manifest(&self, protocol: ToolProtocol) -> ToolManifest {
        if self.tools.is_empty() {
            return ToolManifest::None;
        }
        match protocol {
            ToolProtocol::Tools => ToolManifest::Tools(self.definitions()),
            ToolProtocol::LegacyFunctions => ToolManifest::Functions(self.definitions()),
        }
    }

    /// Validate `args` against the named tool's schema and run it.
    pub async fn invoke(
        &self,
        name: &str,
        args: &ToolArguments,
        ctx: &ToolExecutionContext,
    ) -> Result<Value, ToolFailure> {
        let entry = self
            .lookup(name)
            .ok_or_else(|| ToolFailure::UnknownTool(name.to_string()))?;
        validate_arguments(args.raw(), &entry.tool.parameters().schema)
            .map_err(ToolFailure::InvalidArguments)?;
        entry.tool.execute(args, ctx).await
    }
}
