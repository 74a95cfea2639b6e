//! Uniform chat/stream interface over LLM back-ends.
//!
//! [`LlmProvider`] is the seam every concrete back-end implements. The SDK
//! ships one reference implementation, [`OpenAiCompatProvider`], built on
//! the existing OpenAI-compatible REST/SSE client (LM Studio, Ollama,
//! llama.cpp, vLLM, or any hosted OpenAI-compatible endpoint). Additional
//! back-ends are expected to implement [`LlmProvider`] out-of-tree.

use crate::types::{OpenAIContent, OpenAIMessage, OpenAIRequest, OpenAIToolCall};
use crate::utils::parse_sse_stream;
use crate::{Error, Result};
use async_trait::async_trait;
use futures::stream::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::time::Duration;

/// A chat message in provider-neutral form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Tool calls the assistant requested in this message, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: "system".into(), content: content.into(), tool_call_id: None, name: None, tool_calls: None }
    }
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".into(), content: content.into(), tool_call_id: None, name: None, tool_calls: None }
    }
    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: "assistant".into(), content: content.into(), tool_call_id: None, name: None, tool_calls: None }
    }
    pub fn assistant_with_tool_calls(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: "assistant".into(),
            content: content.into(),
            tool_call_id: None,
            name: None,
            tool_calls: Some(tool_calls),
        }
    }
    pub fn tool(tool_call_id: impl Into<String>, name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: "tool".into(),
            content: content.into(),
            tool_call_id: Some(tool_call_id.into()),
            name: Some(name.into()),
            tool_calls: None,
        }
    }
}

/// A tool call emitted by the model, in the uniform `{id, type, function}` shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    /// Raw JSON-object string; callers parse this themselves.
    pub arguments: String,
}

/// Normalized token accounting, zeroed when the back-end doesn't report usage.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl std::ops::Add for Usage {
    type Output = Usage;
    fn add(self, other: Usage) -> Usage {
        Usage {
            prompt_tokens: self.prompt_tokens + other.prompt_tokens,
            completion_tokens: self.completion_tokens + other.completion_tokens,
            total_tokens: self.total_tokens + other.total_tokens,
        }
    }
}

/// A complete, non-streaming response from a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub content: String,
    pub model: String,
    pub usage: Usage,
    pub finish_reason: Option<String>,
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
}

/// One delta from a streaming response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamChunk {
    pub content: String,
    pub finish_reason: Option<String>,
    /// Tool calls assembled from this response's accumulated deltas.
    /// Always empty until `finish_reason` is set, at which point it carries
    /// every tool call the model requested over the course of the stream.
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
}

/// Stream of [`StreamChunk`]s. Consumer controls pull cadence; the provider
/// must not buffer the whole response before yielding.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<StreamChunk>> + Send>>;

/// Parameters common to every provider call.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub messages: Vec<Message>,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    /// OpenAI-format function schemas, or empty for no tool access.
    pub tool_schemas: Vec<serde_json::Value>,
}

/// Uniform chat/stream contract every LLM back-end implements.
///
/// An unknown provider name at selection time is a distinct error
/// ([`Error::UnknownProvider`]), never conflated with a transport failure.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Non-streaming completion.
    async fn complete(&self, request: CompletionRequest) -> Result<Response>;

    /// Streaming completion. Back-pressure is the consumer's: nothing is
    /// buffered ahead of what has been polled.
    async fn stream(&self, request: CompletionRequest) -> Result<ChunkStream>;

    /// Alias for `complete`. Back-ends that distinguish a blocking call from
    /// an async one collapse onto a single async implementation here, so
    /// this exists only so callers ported from such a back-end have a
    /// matching name to call; override it only if a provider genuinely
    /// needs a different code path for the two.
    async fn complete_async(&self, request: CompletionRequest) -> Result<Response> {
        self.complete(request).await
    }

    /// Alias for `stream`, for the same reason as `complete_async`.
    async fn stream_async(&self, request: CompletionRequest) -> Result<ChunkStream> {
        self.stream(request).await
    }
}

/// Reference [`LlmProvider`] implementation for OpenAI-compatible REST/SSE endpoints.
pub struct OpenAiCompatProvider {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl OpenAiCompatProvider {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(Error::Http)?;

        Ok(Self { http, base_url: base_url.into(), api_key: api_key.into() })
    }

    fn to_wire_messages(messages: &[Message]) -> Vec<OpenAIMessage> {
        messages
            .iter()
            .map(|m| OpenAIMessage {
                role: m.role.clone(),
                content: Some(OpenAIContent::Text(m.content.clone())),
                tool_calls: m.tool_calls.as_ref().map(|calls| {
                    calls
                        .iter()
                        .map(|c| OpenAIToolCall {
                            id: c.id.clone(),
                            call_type: "function".to_string(),
                            function: crate::types::OpenAIFunction {
                                name: c.name.clone(),
                                arguments: c.arguments.clone(),
                            },
                        })
                        .collect()
                }),
                tool_call_id: m.tool_call_id.clone(),
            })
            .collect()
    }

    fn to_wire_request(request: &CompletionRequest, stream: bool) -> OpenAIRequest {
        OpenAIRequest {
            model: request.model.clone(),
            messages: Self::to_wire_messages(&request.messages),
            stream,
            max_tokens: request.max_tokens,
            temperature: Some(request.temperature),
            tools: if request.tool_schemas.is_empty() { None } else { Some(request.tool_schemas.clone()) },
        }
    }

    async fn send(&self, body: &OpenAIRequest) -> Result<reqwest::Response> {
        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(Error::Http)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_else(|_| "unknown error".to_string());
            return Err(Error::provider(format!("{status}: {body}")));
        }

        Ok(response)
    }
}

/// Wire shape of a non-streaming `/chat/completions` response.
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    model: String,
    choices: Vec<ChatCompletionChoice>,
    #[serde(default)]
    usage: Option<ChatCompletionUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChoice {
    message: ChatCompletionMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<OpenAIToolCall>,
}

#[derive(Debug, Deserialize, Default)]
struct ChatCompletionUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}

#[async_trait]
impl LlmProvider for OpenAiCompatProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<Response> {
        let wire_request = Self::to_wire_request(&request, false);
        let response = self.send(&wire_request).await?;

        let parsed: ChatCompletionResponse = response.json().await.map_err(Error::Http)?;
        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| Error::provider("empty choices in completion response"))?;

        let tool_calls = choice
            .message
            .tool_calls
            .into_iter()
            .map(|tc| ToolCall { id: tc.id, name: tc.function.name, arguments: tc.function.arguments })
            .collect();

        let usage = parsed.usage.unwrap_or_default();

        Ok(Response {
            content: choice.message.content.unwrap_or_default(),
            model: parsed.model,
            usage: Usage {
                prompt_tokens: usage.prompt_tokens,
                completion_tokens: usage.completion_tokens,
                total_tokens: usage.total_tokens,
            },
            finish_reason: choice.finish_reason,
            tool_calls,
        })
    }

    async fn stream(&self, request: CompletionRequest) -> Result<ChunkStream> {
        let wire_request = Self::to_wire_request(&request, true);
        let response = self.send(&wire_request).await?;

        let chunks = parse_sse_stream(response).scan(ToolCallAggregator::default(), |aggregator, chunk_result| {
            let mapped = chunk_result.map(|chunk| {
                let choice = chunk.choices.into_iter().next();
                let (content, finish_reason, tool_call_deltas) = match choice {
                    Some(c) => (c.delta.content.unwrap_or_default(), c.finish_reason, c.delta.tool_calls),
                    None => (String::new(), None, None),
                };

                if let Some(deltas) = tool_call_deltas {
                    aggregator.accumulate(&deltas);
                }

                let tool_calls = if finish_reason.is_some() { aggregator.flush() } else { Vec::new() };

                StreamChunk { content, finish_reason, tool_calls }
            });

            futures::future::ready(Some(mapped))
        });

        Ok(Box::pin(chunks))
    }
}

/// Assembles tool-call argument fragments streamed across many chunks,
/// keyed by the API-provided `index`, into complete [`ToolCall`]s.
///
/// Unlike the non-streaming path, arguments arrive as pieces of a JSON
/// string split at arbitrary byte boundaries — concatenation only, no
/// parsing, since [`ToolCall::arguments`] stays a raw string either way.
#[derive(Default)]
struct ToolCallAggregator {
    partial: std::collections::HashMap<u32, PartialToolCall>,
}

#[derive(Default)]
struct PartialToolCall {
    id: Option<String>,
    name: Option<String>,
    arguments: String,
}

impl ToolCallAggregator {
    fn accumulate(&mut self, deltas: &[crate::types::OpenAIToolCallDelta]) {
        for delta in deltas {
            let entry = self.partial.entry(delta.index).or_default();
            if let Some(id) = &delta.id {
                entry.id = Some(id.clone());
            }
            if let Some(function) = &delta.function {
                if let Some(name) = &function.name {
                    entry.name = Some(name.clone());
                }
                if let Some(arguments) = &function.arguments {
                    entry.arguments.push_str(arguments);
                }
            }
        }
    }

    /// Drains every accumulated tool call in ascending index order. A call
    /// that never received both an id and a name (malformed stream) is
    /// dropped rather than surfaced half-built.
    fn flush(&mut self) -> Vec<ToolCall> {
        let mut entries: Vec<_> = self.partial.drain().collect();
        entries.sort_by_key(|(index, _)| *index);
        entries
            .into_iter()
            .filter_map(|(_, partial)| match (partial.id, partial.name) {
                (Some(id), Some(name)) => Some(ToolCall { id, name, arguments: partial.arguments }),
                _ => None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{OpenAIFunctionDelta, OpenAIToolCallDelta};
    use serde_json::json;

    #[test]
    fn tool_call_aggregator_assembles_fragments_split_across_deltas() {
        let mut aggregator = ToolCallAggregator::default();

        aggregator.accumulate(&[OpenAIToolCallDelta {
            index: 0,
            id: Some("call_1".to_string()),
            call_type: Some("function".to_string()),
            function: Some(OpenAIFunctionDelta { name: Some("search".to_string()), arguments: Some("{\"q\":".to_string()) }),
        }]);
        aggregator.accumulate(&[OpenAIToolCallDelta {
            index: 0,
            id: None,
            call_type: None,
            function: Some(OpenAIFunctionDelta { name: None, arguments: Some("\"rust\"}".to_string()) }),
        }]);

        let calls = aggregator.flush();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].id, "call_1");
        assert_eq!(calls[0].name, "search");
        assert_eq!(calls[0].arguments, "{\"q\":\"rust\"}");
    }

    #[test]
    fn tool_call_aggregator_drops_calls_missing_id_or_name() {
        let mut aggregator = ToolCallAggregator::default();
        aggregator.accumulate(&[OpenAIToolCallDelta {
            index: 0,
            id: None,
            call_type: None,
            function: Some(OpenAIFunctionDelta { name: None, arguments: Some("{}".to_string()) }),
        }]);

        assert!(aggregator.flush().is_empty());
    }

    #[test]
    fn tool_call_aggregator_orders_by_index() {
        let mut aggregator = ToolCallAggregator::default();
        aggregator.accumulate(&[
            OpenAIToolCallDelta {
                index: 1,
                id: Some("call_b".to_string()),
                call_type: None,
                function: Some(OpenAIFunctionDelta { name: Some("second".to_string()), arguments: Some("{}".to_string()) }),
            },
            OpenAIToolCallDelta {
                index: 0,
                id: Some("call_a".to_string()),
                call_type: None,
                function: Some(OpenAIFunctionDelta { name: Some("first".to_string()), arguments: Some("{}".to_string()) }),
            },
        ]);

        let calls = aggregator.flush();
        assert_eq!(calls[0].name, "first");
        assert_eq!(calls[1].name, "second");
    }

    struct EchoProvider;

    #[async_trait]
    impl LlmProvider for EchoProvider {
        async fn complete(&self, request: CompletionRequest) -> Result<Response> {
            Ok(Response {
                content: request.messages.last().map(|m| m.content.clone()).unwrap_or_default(),
                model: request.model,
                usage: Usage::default(),
                finish_reason: Some("stop".to_string()),
                tool_calls: Vec::new(),
            })
        }

        async fn stream(&self, _request: CompletionRequest) -> Result<ChunkStream> {
            let chunk = StreamChunk { content: "hi".to_string(), finish_reason: Some("stop".to_string()), tool_calls: Vec::new() };
            Ok(Box::pin(futures::stream::iter(vec![Ok(chunk)])))
        }
    }

    #[tokio::test]
    async fn complete_async_default_delegates_to_complete() {
        let provider = EchoProvider;
        let request = CompletionRequest {
            messages: vec![Message::user("hello")],
            model: "test-model".to_string(),
            temperature: 0.7,
            max_tokens: None,
            tool_schemas: Vec::new(),
        };

        let response = provider.complete_async(request).await.unwrap();
        assert_eq!(response.content, "hello");
    }

    #[tokio::test]
    async fn stream_async_default_delegates_to_stream() {
        let provider = EchoProvider;
        let request = CompletionRequest {
            messages: vec![Message::user("hello")],
            model: "test-model".to_string(),
            temperature: 0.7,
            max_tokens: None,
            tool_schemas: Vec::new(),
        };

        let mut stream = provider.stream_async(request).await.unwrap();
        let chunk = stream.next().await.unwrap().unwrap();
        assert_eq!(chunk.content, "hi");
    }

    #[test]
    fn usage_add_sums_fields() {
        let a = Usage { prompt_tokens: 10, completion_tokens: 5, total_tokens: 15 };
        let b = Usage { prompt_tokens: 2, completion_tokens: 3, total_tokens: 5 };
        let sum = a + b;
        assert_eq!(sum.prompt_tokens, 12);
        assert_eq!(sum.completion_tokens, 8);
        assert_eq!(sum.total_tokens, 20);
    }

    #[test]
    fn message_constructors_set_expected_roles() {
        assert_eq!(Message::system("s").role, "system");
        assert_eq!(Message::user("u").role, "user");
        assert_eq!(Message::assistant("a").role, "assistant");

        let tool_msg = Message::tool("call_1", "search", "result");
        assert_eq!(tool_msg.role, "tool");
        assert_eq!(tool_msg.tool_call_id.as_deref(), Some("call_1"));
        assert_eq!(tool_msg.name.as_deref(), Some("search"));
    }

    #[test]
    fn assistant_with_tool_calls_round_trips_through_wire_messages() {
        let calls = vec![ToolCall { id: "call_1".into(), name: "search".into(), arguments: "{}".into() }];
        let msg = Message::assistant_with_tool_calls("", calls);

        let wire = OpenAiCompatProvider::to_wire_messages(std::slice::from_ref(&msg));
        let wire_calls = wire[0].tool_calls.as_ref().unwrap();
        assert_eq!(wire_calls.len(), 1);
        assert_eq!(wire_calls[0].function.name, "search");
    }

    #[test]
    fn to_wire_request_omits_tools_when_empty() {
        let request = CompletionRequest {
            messages: vec![Message::user("hi")],
            model: "test-model".to_string(),
            temperature: 0.7,
            max_tokens: None,
            tool_schemas: Vec::new(),
        };

        let wire = OpenAiCompatProvider::to_wire_request(&request, false);
        assert!(wire.tools.is_none());
        assert!(!wire.stream);
    }

    #[test]
    fn to_wire_request_includes_tools_when_present() {
        let request = CompletionRequest {
            messages: vec![Message::user("hi")],
            model: "test-model".to_string(),
            temperature: 0.7,
            max_tokens: Some(256),
            tool_schemas: vec![json!({"type": "function", "function": {"name": "x"}})],
        };

        let wire = OpenAiCompatProvider::to_wire_request(&request, true);
        assert!(wire.stream);
        assert_eq!(wire.tools.unwrap().len(), 1);
    }
}
