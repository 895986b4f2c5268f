//! Streamed tool call reconstruction and invocation.

use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::events::{ChatEventPayload, EventEmitter};
use crate::tools::{
    ToolArguments, ToolCallPreview, ToolExecutionContext, ToolFailure, ToolRegistry, ToolRenderer,
};
use crate::types::{Message, ToolCall};

/// Id given to legacy function calls, which carry none on the wire.
pub const LEGACY_CALL_ID: &str = "TBD";

/// One tool call being reassembled from stream fragments.
///
/// The name is fixed at creation. Argument text is concatenated as it
/// arrives and never parsed here.
pub struct ToolCallAccumulator {
    id: String,
    name: String,
    arguments: String,
    renderer: Option<ToolRenderer>,
    displayed: bool,
}

impl ToolCallAccumulator {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
        renderer: Option<ToolRenderer>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
            renderer,
            displayed: false,
        }
    }

    /// Accumulator for a legacy `function_call`.
    pub fn legacy(
        name: impl Into<String>,
        arguments: impl Into<String>,
        renderer: Option<ToolRenderer>,
    ) -> Self {
        Self::new(LEGACY_CALL_ID, name, arguments, renderer)
    }

    /// Create an accumulator, picking the render hook up from `registry`.
    pub fn from_registry(
        registry: &ToolRegistry,
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        let name = name.into();
        let renderer = registry.lookup(&name).and_then(|t| t.renderer().cloned());
        Self::new(id, name, arguments, renderer)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arguments(&self) -> &str {
        &self.arguments
    }

    pub fn is_displayed(&self) -> bool {
        self.displayed
    }

    pub fn append_arguments(&mut self, fragment: &str) {
        self.arguments.push_str(fragment);
    }

    /// Text produced by the render hook for the call as seen so far.
    pub fn render(&self) -> Option<String> {
        self.renderer.as_ref().map(|render| {
            render(&ToolCallPreview {
                id: &self.id,
                name: &self.name,
                arguments: &self.arguments,
            })
        })
    }

    /// Announce the call once. Later calls do nothing.
    pub fn display(&mut self, events: &EventEmitter) {
        if self.displayed {
            return;
        }
        self.displayed = true;
        events.emit(ChatEventPayload::ToolCallStarted {
            call_id: self.id.clone(),
            name: self.name.clone(),
            rendered: self.render(),
        });
    }

    pub fn finish(self) -> ToolCallRequest {
        ToolCallRequest {
            id: self.id,
            name: self.name,
            arguments: self.arguments,
        }
    }
}

impl std::fmt::Debug for ToolCallAccumulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolCallAccumulator")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("arguments", &self.arguments)
            .field("displayed", &self.displayed)
            .finish_non_exhaustive()
    }
}

/// A complete tool call, ready to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    /// Raw JSON text as streamed.
    pub arguments: String,
}

impl ToolCallRequest {
    pub fn is_legacy(&self) -> bool {
        self.id == LEGACY_CALL_ID
    }

    pub fn to_tool_call(&self) -> ToolCall {
        ToolCall::new(&self.id, &self.name, &self.arguments)
    }

    /// The assistant message recording this legacy call.
    pub fn function_call_message(&self) -> Message {
        Message::assistant_function_call(&self.name, &self.arguments)
    }

    /// Run the call against `registry`. Failures become part of the result.
    pub async fn invoke(self, registry: &ToolRegistry) -> ToolCallResult {
        let outcome = self.run(registry).await;
        match &outcome {
            Ok(_) => debug!(tool = %self.name, call_id = %self.id, "tool call succeeded"),
            Err(e) => warn!(
                tool = %self.name,
                call_id = %self.id,
                kind = e.kind(),
                error = %e,
                "tool call failed"
            ),
        }
        ToolCallResult {
            request: self,
            outcome,
        }
    }

    async fn run(&self, registry: &ToolRegistry) -> Result<Value, ToolFailure> {
        if registry.lookup(&self.name).is_none() {
            return Err(ToolFailure::UnknownTool(self.name.clone()));
        }
        let args = ToolArguments::parse(&self.arguments)?;
        let ctx = ToolExecutionContext {
            tool_call_id: self.id.clone(),
            tool_name: self.name.clone(),
        };
        registry.invoke(&self.name, &args, &ctx).await
    }
}

/// A tool call paired with what it returned.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallResult {
    pub request: ToolCallRequest,
    pub outcome: Result<Value, ToolFailure>,
}

impl ToolCallResult {
    pub fn is_error(&self) -> bool {
        self.outcome.is_err()
    }

    /// JSON text handed back to the model.
    ///
    /// Failures are encoded as `{"error": "..."}` so the model can react.
    pub fn payload(&self) -> String {
        match &self.outcome {
            Ok(value) => value.to_string(),
            Err(failure) => json!({ "error": failure.to_string() }).to_string(),
        }
    }

    pub fn tool_message(&self) -> Message {
        Message::tool_result(&self.request.id, &self.request.name, self.payload())
    }

    pub fn function_message(&self) -> Message {
        Message::function_result(&self.request.name, self.payload())
    }

    /// The result message matching the protocol the call came in on.
    pub fn to_message(&self) -> Message {
        if self.request.is_legacy() {
            self.function_message()
        } else {
            self.tool_message()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::collecting_sink;
    use crate::tools::ToolParameters;
    use std::sync::Arc;

    fn registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry.register_fn(
            "square",
            "Square a number",
            ToolParameters::object().number("x", "value", true).build(),
            |args, _| async move {
                let x = args.get_f64("x")?;
                Ok(json!(x * x))
            },
        );
        registry.register_fn("fail", "Always fails", ToolParameters::empty(), |_, _| async {
            Err(ToolFailure::execution("disk on fire"))
        });
        registry
    }

    fn request(name: &str, arguments: &str) -> ToolCallRequest {
        ToolCallAccumulator::new("call_1", name, arguments, None).finish()
    }

    #[test]
    fn fragments_concatenate_in_arrival_order() {
        let mut acc = ToolCallAccumulator::new("c", "square", "{\"x\"", None);
        acc.append_arguments(": ");
        acc.append_arguments("2}");
        assert_eq!(acc.arguments(), "{\"x\": 2}");
    }

    #[test]
    fn display_fires_once_with_rendered_text() {
        let renderer: ToolRenderer =
            Arc::new(|call: &ToolCallPreview<'_>| format!("computing {}", call.name));
        let mut acc = ToolCallAccumulator::new("c", "square", "", Some(renderer));
        let (sink, events) = collecting_sink();
        let emitter = EventEmitter::new(uuid::Uuid::new_v4(), Some(sink));

        acc.display(&emitter);
        acc.display(&emitter);

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(
            events[0].payload,
            ChatEventPayload::ToolCallStarted {
                call_id: "c".into(),
                name: "square".into(),
                rendered: Some("computing square".into()),
            }
        );
    }

    #[test]
    fn legacy_calls_use_placeholder_id() {
        let req = ToolCallAccumulator::legacy("square", "{}", None).finish();
        assert!(req.is_legacy());
        assert_eq!(req.id, "TBD");
    }

    #[tokio::test]
    async fn successful_call_payload_is_json_value() {
        let result = request("square", r#"{"x": 2}"#).invoke(&registry()).await;
        assert!(!result.is_error());
        let payload: Value = serde_json::from_str(&result.payload()).unwrap();
        assert_eq!(payload, json!(4.0));
    }

    #[tokio::test]
    async fn unknown_tool_becomes_error_result() {
        let result = request("cube", "{}").invoke(&registry()).await;
        assert_eq!(result.outcome, Err(ToolFailure::UnknownTool("cube".into())));
        assert_eq!(result.payload(), r#"{"error":"Unknown tool 'cube'"}"#);
    }

    #[tokio::test]
    async fn unparseable_arguments_become_error_result() {
        let result = request("square", "{\"x\": ").invoke(&registry()).await;
        assert!(matches!(result.outcome, Err(ToolFailure::InvalidArguments(_))));
    }

    #[tokio::test]
    async fn execution_failure_is_reported_not_raised() {
        let result = request("fail", "").invoke(&registry()).await;
        assert_eq!(result.outcome, Err(ToolFailure::Execution("disk on fire".into())));
    }

    #[tokio::test]
    async fn result_message_follows_protocol() {
        let tool = request("square", r#"{"x": 3}"#).invoke(&registry()).await;
        assert_eq!(tool.to_message(), Message::tool_result("call_1", "square", "9.0"));

        let legacy = ToolCallAccumulator::legacy("square", r#"{"x": 3}"#, None)
            .finish()
            .invoke(&registry())
            .await;
        assert_eq!(legacy.to_message(), Message::function_result("square", "9.0"));
    }
}
