//! OpenAI Chat Completions API service.

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::error::ColloquyError;
use crate::types::{AssistantContent, ChatCompletion, ChatCompletionChunk, Message};

use super::http::{
    bearer_headers, error_message, is_sse_done, parse_sse_data, shared_client, status_to_error,
};
use super::{ChunkStream, CompletionRequest, CompletionService, ToolManifest};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Client for any service speaking the OpenAI chat completions protocol.
pub struct OpenAiService {
    api_key: String,
    base_url: String,
    organization: Option<String>,
}

impl OpenAiService {
    pub fn new(api_key: String, base_url: Option<String>, organization: Option<String>) -> Self {
        let base_url = base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            organization,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    async fn post(
        &self,
        request: &CompletionRequest,
        stream: bool,
    ) -> Result<reqwest::Response, ColloquyError> {
        let body = build_request_body(request, stream);
        let resp = shared_client()
            .post(self.endpoint())
            .headers(bearer_headers(&self.api_key, self.organization.as_deref()))
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let headers = resp.headers().clone();
            let body_text = resp.text().await.unwrap_or_default();
            return Err(status_to_error(status.as_u16(), &headers, &body_text));
        }
        Ok(resp)
    }
}

impl std::fmt::Debug for OpenAiService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiService")
            .field("base_url", &self.base_url)
            .field("organization", &self.organization)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl CompletionService for OpenAiService {
    fn provider_name(&self) -> &str {
        "openai"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<ChatCompletion, ColloquyError> {
        debug!(model = %request.model, "OpenAI complete");
        let resp = self.post(request, false).await?;
        let text = resp.text().await?;
        let value: Value = serde_json::from_str(&text)?;
        if let Some(message) = in_band_error(&value) {
            return Err(ColloquyError::api(200, message));
        }
        Ok(serde_json::from_value(value)?)
    }

    async fn stream(&self, request: &CompletionRequest) -> Result<ChunkStream, ColloquyError> {
        debug!(model = %request.model, "OpenAI stream");
        let resp = self.post(request, true).await?;
        let byte_stream = resp.bytes_stream();

        let stream = async_stream::stream! {
            // Raw bytes: a UTF-8 sequence may be split across network chunks,
            // but never across a newline.
            let mut buffer: Vec<u8> = Vec::new();
            futures::pin_mut!(byte_stream);

            'read: while let Some(chunk_result) = byte_stream.next().await {
                let chunk = match chunk_result {
                    Ok(c) => c,
                    Err(e) => {
                        yield Err(ColloquyError::Network(e));
                        break;
                    }
                };
                buffer.extend_from_slice(&chunk);

                while let Some(line_end) = buffer.iter().position(|b| *b == b'\n') {
                    let raw: Vec<u8> = buffer.drain(..=line_end).collect();
                    let line = String::from_utf8_lossy(&raw);
                    let line = line.trim();

                    if line.is_empty() || line.starts_with(':') {
                        continue;
                    }
                    if is_sse_done(line) {
                        break 'read;
                    }
                    let Some(data) = parse_sse_data(line) else {
                        continue;
                    };
                    match decode_chunk(data) {
                        Ok(Some(chunk)) => yield Ok(chunk),
                        Ok(None) => {}
                        Err(e) => {
                            yield Err(e);
                            break 'read;
                        }
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }
}

/// Decode one SSE data payload. Payloads that are not chunks are skipped.
fn decode_chunk(data: &str) -> Result<Option<ChatCompletionChunk>, ColloquyError> {
    let value: Value = match serde_json::from_str(data) {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %e, "skipping unparseable stream payload");
            return Ok(None);
        }
    };
    if let Some(message) = in_band_error(&value) {
        return Err(ColloquyError::api(200, message));
    }
    serde_json::from_value(value)
        .map(Some)
        .map_err(|e| ColloquyError::malformed(format!("invalid chunk: {e}")))
}

fn in_band_error(value: &Value) -> Option<String> {
    value
        .get("error")
        .filter(|e| !e.is_null())
        .map(|e| error_message(&json!({ "error": e }).to_string()))
}

pub(crate) fn build_request_body(request: &CompletionRequest, stream: bool) -> Value {
    let messages: Vec<Value> = request.messages.iter().map(message_to_openai).collect();

    let mut body = json!({
        "model": request.model,
        "messages": messages,
        "temperature": request.temperature,
        "stream": stream,
    });

    if let Some(obj) = body.as_object_mut() {
        if let Some(max) = request.max_tokens {
            obj.insert("max_tokens".into(), max.into());
        }
        match &request.tools {
            ToolManifest::None => {}
            ToolManifest::Tools(defs) => {
                let tools: Vec<Value> = defs
                    .iter()
                    .map(|d| {
                        json!({
                            "type": "function",
                            "function": {
                                "name": d.name,
                                "description": d.description,
                                "parameters": d.parameters,
                            }
                        })
                    })
                    .collect();
                obj.insert("tools".into(), Value::Array(tools));
            }
            ToolManifest::Functions(defs) => {
                obj.insert("functions".into(), json!(defs));
            }
        }
    }

    body
}

pub(crate) fn message_to_openai(msg: &Message) -> Value {
    match msg {
        Message::System { content } => json!({ "role": "system", "content": content }),
        Message::User { content, name } => {
            let mut v = json!({ "role": "user", "content": content });
            if let (Some(name), Some(obj)) = (name, v.as_object_mut()) {
                obj.insert("name".into(), name.clone().into());
            }
            v
        }
        Message::Assistant(AssistantContent::Text { content }) => {
            json!({ "role": "assistant", "content": content })
        }
        Message::Assistant(AssistantContent::FunctionCall { function_call }) => json!({
            "role": "assistant",
            "content": null,
            "function_call": {
                "name": function_call.name,
                "arguments": function_call.arguments,
            },
        }),
        Message::Assistant(AssistantContent::ToolCalls { tool_calls }) => {
            let calls: Vec<Value> = tool_calls
                .iter()
                .map(|tc| {
                    json!({
                        "id": tc.id,
                        "type": "function",
                        "function": {
                            "name": tc.function.name,
                            "arguments": tc.function.arguments,
                        }
                    })
                })
                .collect();
            json!({ "role": "assistant", "content": null, "tool_calls": calls })
        }
        Message::Tool {
            tool_call_id,
            name,
            content,
        } => json!({
            "role": "tool",
            "tool_call_id": tool_call_id,
            "name": name,
            "content": content,
        }),
        Message::Function { name, content } => {
            json!({ "role": "function", "name": name, "content": content })
        }
    }
}
