//! Shared test helpers and scripted completion service.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use colloquy::chat::Chat;
use colloquy::error::ColloquyError;
use colloquy::provider::{ChunkStream, CompletionRequest, CompletionService};
use colloquy::types::{ChatCompletion, ChatCompletionChunk, ChatOptions};

/// One canned reply.
pub enum Reply {
    /// A stream of chunks, delivered in order.
    Stream(Vec<ChatCompletionChunk>),
    /// A stream that yields `chunks` and then fails with a malformed-stream error.
    BrokenStream(Vec<ChatCompletionChunk>),
    /// A full completion.
    Complete(ChatCompletion),
    /// The service asks us to slow down.
    Throttled { retry_after_ms: Option<u64> },
    /// Any other API failure.
    Fail { status: u16, message: String },
}

/// A completion service that plays back queued replies and records requests.
#[derive(Default)]
pub struct ScriptedService {
    replies: Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedService {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push(&self, reply: Reply) -> &Self {
        self.replies.lock().unwrap().push_back(reply);
        self
    }

    /// Queue a streamed text reply ending in `stop`.
    pub fn push_text(&self, fragments: &[&str]) -> &Self {
        let mut chunks: Vec<_> = fragments.iter().map(|f| ChatCompletionChunk::text(*f)).collect();
        chunks.push(ChatCompletionChunk::finish("stop"));
        self.push(Reply::Stream(chunks))
    }

    pub fn push_stream(&self, chunks: Vec<ChatCompletionChunk>) -> &Self {
        self.push(Reply::Stream(chunks))
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn remaining(&self) -> usize {
        self.replies.lock().unwrap().len()
    }

    fn next(&self, request: &CompletionRequest) -> Result<Reply, ColloquyError> {
        self.requests.lock().unwrap().push(request.clone());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| ColloquyError::InvalidState("no scripted reply left".into()))
    }
}

#[async_trait]
impl CompletionService for ScriptedService {
    fn provider_name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<ChatCompletion, ColloquyError> {
        match self.next(request)? {
            Reply::Complete(completion) => Ok(completion),
            Reply::Throttled { retry_after_ms } => {
                Err(ColloquyError::RateLimited { retry_after_ms })
            }
            Reply::Fail { status, message } => Err(ColloquyError::api(status, message)),
            _ => Err(ColloquyError::InvalidState("expected a streaming request".into())),
        }
    }

    async fn stream(&self, request: &CompletionRequest) -> Result<ChunkStream, ColloquyError> {
        match self.next(request)? {
            Reply::Stream(chunks) => {
                Ok(Box::pin(futures::stream::iter(chunks.into_iter().map(Ok))))
            }
            Reply::BrokenStream(chunks) => {
                let items: Vec<Result<ChatCompletionChunk, ColloquyError>> = chunks
                    .into_iter()
                    .map(Ok)
                    .chain(std::iter::once(Err(ColloquyError::malformed("connection reset"))))
                    .collect();
                Ok(Box::pin(futures::stream::iter(items)))
            }
            Reply::Throttled { retry_after_ms } => {
                Err(ColloquyError::RateLimited { retry_after_ms })
            }
            Reply::Fail { status, message } => Err(ColloquyError::api(status, message)),
            Reply::Complete(_) => {
                Err(ColloquyError::InvalidState("expected a full request".into()))
            }
        }
    }
}

/// A chat over `service` with default options.
pub fn chat_with(service: &Arc<ScriptedService>) -> Chat {
    Chat::with_service(service.clone())
}

/// A chat over `service` that requests full completions.
pub fn non_streaming_chat(service: &Arc<ScriptedService>) -> Chat {
    Chat::with_service(service.clone()).with_options(ChatOptions::builder().stream(false).build())
}
