//! The conversation driver: owns history, runs turns, dispatches tools.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use super::demux::{StreamDemultiplexer, TurnOutcome};
use super::extract::extract_completion;
use super::tool_call::{ToolCallRequest, ToolCallResult};
use crate::config::ColloquyConfig;
use crate::error::ColloquyError;
use crate::events::{ChatEventPayload, ChatEventSink, EventEmitter, Notice};
use crate::provider::{
    create_service, ChunkStream, CompletionRequest, CompletionService, ToolDefinition,
};
use crate::tools::{
    Tool, ToolArguments, ToolExecutionContext, ToolFailure, ToolParameters, ToolRegistry,
    ToolRenderer,
};
use crate::types::{ChatCompletion, ChatOptions, FinishReason, Message, SubmitOptions};
use crate::util::RetryPolicy;

/// What to do after a turn has been dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Next {
    Continue,
    Stop,
}

/// An interactive conversation with a completion service and its tools.
///
/// `submit` takes `&mut self`, so one conversation can only ever have a
/// single request chain in flight.
///
/// ```no_run
/// use colloquy::prelude::*;
///
/// # async fn run() -> colloquy::Result<()> {
/// let config = ColloquyConfig::from_env();
/// let mut chat = Chat::new(&config)?.with_context([Message::system("Answer briefly.")]);
/// chat.submit(["What are you?"]).await?;
/// println!("{}", chat.history().last().and_then(Message::text).unwrap_or_default());
/// # Ok(())
/// # }
/// ```
pub struct Chat {
    service: Arc<dyn CompletionService>,
    registry: ToolRegistry,
    history: Vec<Message>,
    options: ChatOptions,
    retry: RetryPolicy,
    events: EventEmitter,
}

impl Chat {
    /// Connect to the OpenAI-compatible service described by `config`.
    ///
    /// Fails with `MissingCredential` when no API key resolves.
    pub fn new(config: &ColloquyConfig) -> Result<Self, ColloquyError> {
        let service = create_service(config)?;
        let mut chat = Self::with_service(service);
        if let Some(model) = config.model() {
            chat.options.model = model.to_string();
        }
        Ok(chat)
    }

    pub fn with_service(service: Arc<dyn CompletionService>) -> Self {
        Self {
            service,
            registry: ToolRegistry::new(),
            history: Vec::new(),
            options: ChatOptions::default(),
            retry: RetryPolicy::throttling(),
            events: EventEmitter::new(Uuid::new_v4(), None),
        }
    }

    pub fn with_options(mut self, options: ChatOptions) -> Self {
        self.options = options;
        self
    }

    /// Seed the history. Strings become user messages.
    pub fn with_context<I, M>(mut self, messages: I) -> Self
    where
        I: IntoIterator<Item = M>,
        M: Into<Message>,
    {
        self.append(messages);
        self
    }

    pub fn with_tools(mut self, registry: ToolRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_event_sink(mut self, sink: ChatEventSink) -> Self {
        self.events.set_sink(Some(sink));
        self
    }

    /// Policy for retrying throttled requests.
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    pub fn id(&self) -> Uuid {
        self.events.conversation_id()
    }

    pub fn options(&self) -> &ChatOptions {
        &self.options
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn register(&mut self, tool: impl Tool + 'static) -> ToolDefinition {
        self.registry.register(tool)
    }

    pub fn register_with_renderer(
        &mut self,
        tool: impl Tool + 'static,
        renderer: ToolRenderer,
    ) -> ToolDefinition {
        self.registry.register_with_renderer(tool, renderer)
    }

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
        self.registry.register_fn(name, description, parameters, handler)
    }

    /// Append messages to history as-is. No deduplication.
    pub fn append<I, M>(&mut self, messages: I)
    where
        I: IntoIterator<Item = M>,
        M: Into<Message>,
    {
        self.history.extend(messages.into_iter().map(Into::into));
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    /// Send `inputs` and keep the exchange going until the model stops.
    pub async fn submit<I, M>(&mut self, inputs: I) -> Result<(), ColloquyError>
    where
        I: IntoIterator<Item = M>,
        M: Into<Message>,
    {
        self.submit_with(inputs, SubmitOptions::default()).await
    }

    /// Continue the conversation without new input.
    pub async fn resume(&mut self) -> Result<(), ColloquyError> {
        self.submit_with(Vec::<Message>::new(), SubmitOptions::default()).await
    }

    /// [`submit`](Self::submit) with per-call overrides that hold for every
    /// continuation of this chain.
    pub async fn submit_with<I, M>(
        &mut self,
        inputs: I,
        overrides: SubmitOptions,
    ) -> Result<(), ColloquyError>
    where
        I: IntoIterator<Item = M>,
        M: Into<Message>,
    {
        let mut pending: Vec<Message> = inputs.into_iter().map(Into::into).collect();
        let stream = overrides.stream.unwrap_or(self.options.stream);
        let temperature = overrides.temperature.unwrap_or(self.options.temperature);
        let max_turns = self.options.max_turns.max(1);

        for turn in 1..=max_turns {
            self.events.emit(ChatEventPayload::TurnStarted { turn });
            let request = self.build_request(&pending, temperature);
            debug!(
                provider = self.service.provider_name(),
                model = %request.model,
                turn,
                stream,
                messages = request.messages.len(),
                "sending completion request"
            );

            let outcome = if stream {
                let chunks = self.open_stream(&request).await?;
                self.history.append(&mut pending);
                StreamDemultiplexer::new(&self.registry, &self.events)
                    .consume(chunks, self.idle_timeout())
                    .await?
            } else {
                let completion = self.complete(&request).await?;
                self.history.append(&mut pending);
                extract_completion(completion, &self.registry, &self.events)?
            };

            let TurnOutcome {
                finish_reason,
                messages,
                function_call,
                tool_calls,
            } = outcome;
            self.history.extend(messages);
            self.events.emit(ChatEventPayload::TurnFinished {
                turn,
                finish_reason: finish_reason.clone(),
            });

            match self.dispatch(finish_reason, function_call, tool_calls).await? {
                Next::Continue => continue,
                Next::Stop => return Ok(()),
            }
        }

        Err(ColloquyError::MaxTurnsExceeded(max_turns))
    }

    fn build_request(&self, pending: &[Message], temperature: f64) -> CompletionRequest {
        CompletionRequest {
            model: self.options.model.clone(),
            messages: self.history.iter().chain(pending).cloned().collect(),
            tools: self.registry.manifest(self.options.protocol),
            temperature,
            max_tokens: self.options.max_tokens,
        }
    }

    fn idle_timeout(&self) -> Option<Duration> {
        (self.options.stream_idle_timeout_ms > 0)
            .then(|| Duration::from_millis(self.options.stream_idle_timeout_ms))
    }

    async fn open_stream(&self, request: &CompletionRequest) -> Result<ChunkStream, ColloquyError> {
        let service = &self.service;
        self.retry
            .execute_if(ColloquyError::is_throttled, move || service.stream(request))
            .await
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<ChatCompletion, ColloquyError> {
        let service = &self.service;
        self.retry
            .execute_if(ColloquyError::is_throttled, move || service.complete(request))
            .await
    }

    async fn dispatch(
        &mut self,
        finish_reason: FinishReason,
        function_call: Option<ToolCallRequest>,
        tool_calls: Vec<ToolCallRequest>,
    ) -> Result<Next, ColloquyError> {
        match finish_reason {
            FinishReason::FunctionCall => {
                let call = function_call.ok_or(ColloquyError::MissingFunctionCall)?;
                self.history.push(call.function_call_message());
                let result = call.invoke(&self.registry).await;
                self.record(&result);
                Ok(Next::Continue)
            }
            FinishReason::ToolCalls if tool_calls.is_empty() => {
                warn!("finish reason was tool_calls but no calls were streamed");
                self.events.notice(Notice::MissingToolCalls);
                Ok(Next::Stop)
            }
            FinishReason::ToolCalls => {
                self.history.push(Message::assistant_tool_calls(
                    tool_calls.iter().map(ToolCallRequest::to_tool_call).collect(),
                ));
                for result in self.run_tools(tool_calls).await {
                    self.record(&result);
                }
                Ok(Next::Continue)
            }
            FinishReason::Stop => Ok(Next::Stop),
            reason @ (FinishReason::Length | FinishReason::MaxTokens) => {
                warn!(finish_reason = %reason, "response truncated");
                self.events.notice(Notice::Truncated { reason });
                Ok(Next::Stop)
            }
            FinishReason::ContentFilter => {
                warn!("response withheld by content filter");
                self.events.notice(Notice::ContentFiltered);
                Ok(Next::Stop)
            }
            FinishReason::Other(reason) => {
                warn!(finish_reason = %reason, "unknown finish reason; stopping");
                self.events.notice(Notice::UnknownFinishReason { reason });
                Ok(Next::Stop)
            }
        }
    }

    /// Results come back in creation order either way.
    async fn run_tools(&self, calls: Vec<ToolCallRequest>) -> Vec<ToolCallResult> {
        if self.options.concurrent_tools {
            let invocations = calls.into_iter().map(|call| call.invoke(&self.registry));
            futures::future::join_all(invocations).await
        } else {
            let mut results = Vec::with_capacity(calls.len());
            for call in calls {
                results.push(call.invoke(&self.registry).await);
            }
            results
        }
    }

    fn record(&mut self, result: &ToolCallResult) {
        let message = result.to_message();
        self.events.emit(ChatEventPayload::ToolResult {
            call_id: result.request.id.clone(),
            name: result.request.name.clone(),
            content: message.text().unwrap_or_default().to_string(),
            is_error: result.is_error(),
        });
        self.history.push(message);
    }
}

impl fmt::Display for Chat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.history.len() {
            1 => f.write_str("<Chat 1 message>"),
            n => write!(f, "<Chat {n} messages>"),
        }
    }
}

impl fmt::Debug for Chat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chat")
            .field("id", &self.id())
            .field("provider", &self.service.provider_name())
            .field("options", &self.options)
            .field("tools", &self.registry.names())
            .field("history", &self.history.len())
            .finish()
    }
}
