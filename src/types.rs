//! Wire-format types for OpenAI-compatible chat completion APIs.
//!
//! Everything in this module exists to be serialized into (or deserialized
//! out of) an HTTP request/response body — it is the on-the-wire shape, not
//! the crate's own [`crate::provider::Message`]/[`crate::provider::Response`]
//! types that callers work with. [`crate::provider::OpenAiCompatProvider`]
//! is the only consumer: it builds an [`OpenAIRequest`] from a
//! [`crate::provider::CompletionRequest`] and, on the streaming path, decodes
//! a sequence of [`OpenAIChunk`]s back into a [`crate::provider::Response`].
//!
//! # Streaming accumulation
//!
//! A streamed completion arrives as many [`OpenAIChunk`]s, each carrying an
//! [`OpenAIDelta`] with whatever text or tool-call fragment is new in that
//! chunk. Tool call arguments in particular are streamed as fragments of a
//! JSON string, keyed by `index`, and must be concatenated before parsing —
//! see [`OpenAIToolCallDelta`].

use serde::{Deserialize, Serialize};

/// Content of an [`OpenAIMessage`].
///
/// Always constructed as `Text` by this crate — the `Parts` shape OpenAI
/// defines for multimodal (text + image) messages has no caller here, since
/// nothing upstream builds messages with image content. Kept as an enum
/// rather than a bare `String` so deserializing a response that happens to
/// use the array form doesn't fail.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OpenAIContent {
    /// Plain text content — the only form this crate sends.
    Text(String),
    /// Array-of-parts content, accepted on deserialize for compatibility
    /// with servers that echo messages back in this shape.
    Parts(Vec<serde_json::Value>),
}

impl OpenAIContent {
    /// Returns the text content, joining part fragments if necessary.
    pub fn as_text(&self) -> String {
        match self {
            OpenAIContent::Text(s) => s.clone(),
            OpenAIContent::Parts(parts) => parts
                .iter()
                .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
                .collect::<Vec<_>>()
                .join(""),
        }
    }
}

/// A single message in an [`OpenAIRequest`]'s conversation history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAIMessage {
    /// Message role as a string ("system", "user", "assistant", "tool").
    pub role: String,

    /// Message content. Omitted entirely for assistant messages that only
    /// carry tool calls.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<OpenAIContent>,

    /// Tool calls requested by the assistant (assistant messages only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<OpenAIToolCall>>,

    /// ID of the tool call this message is responding to (tool messages only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

/// A tool invocation requested by the model, in OpenAI's wire format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAIToolCall {
    /// Unique identifier for this tool call, used to correlate the result
    /// sent back via [`OpenAIMessage::tool_call_id`].
    pub id: String,

    /// Call type, always `"function"` in the current API.
    #[serde(rename = "type")]
    pub call_type: String,

    /// Name and arguments of the function being called.
    pub function: OpenAIFunction,
}

/// Function name and arguments for a tool call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAIFunction {
    /// Name of the function/tool to call.
    pub name: String,

    /// Function arguments as a **JSON string** (OpenAI API quirk) —
    /// callers must parse this before use.
    pub arguments: String,
}

/// Request payload for an OpenAI-compatible `/chat/completions` call.
#[derive(Debug, Clone, Serialize)]
pub struct OpenAIRequest {
    /// Model identifier (e.g. "gpt-4", "qwen2.5-32b-instruct").
    pub model: String,

    /// Conversation history: system prompt, user/assistant turns, and any
    /// tool results, in order.
    pub messages: Vec<OpenAIMessage>,

    /// Whether to request a streaming response.
    pub stream: bool,

    /// Maximum tokens to generate. `None` uses the provider's default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Sampling temperature. `None` uses the provider's default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Tool/function definitions available to the model, as raw JSON
    /// schema values. `None` disables function calling for this request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<serde_json::Value>>,
}

/// A single chunk from a streamed `/chat/completions` response.
///
/// Chunks arrive as Server-Sent Events; [`crate::utils::parse_sse_stream`]
/// decodes the raw SSE frames into a stream of these.
#[derive(Debug, Clone, Deserialize)]
pub struct OpenAIChunk {
    /// Completion ID, shared across every chunk of one response.
    #[allow(dead_code)]
    pub id: String,

    /// Object type, always `"chat.completion.chunk"`.
    #[allow(dead_code)]
    pub object: String,

    /// Unix timestamp the completion was created at.
    #[allow(dead_code)]
    pub created: i64,

    /// Model that generated this chunk.
    #[allow(dead_code)]
    pub model: String,

    /// Completion choices in this chunk — in practice always one.
    pub choices: Vec<OpenAIChoice>,
}

/// One choice in a streaming chunk: an incremental delta plus, on the final
/// chunk, the reason generation stopped.
#[derive(Debug, Clone, Deserialize)]
pub struct OpenAIChoice {
    /// Index of this choice among the chunk's choices.
    #[allow(dead_code)]
    pub index: u32,

    /// Incremental update carried by this chunk.
    pub delta: OpenAIDelta,

    /// `None` while generation is in progress; `Some("stop")`,
    /// `Some("length")`, `Some("tool_calls")`, or `Some("content_filter")`
    /// on the chunk that ends the stream.
    pub finish_reason: Option<String>,
}

/// Incremental content added by one streaming chunk.
#[derive(Debug, Clone, Deserialize)]
pub struct OpenAIDelta {
    /// Role of the speaker, present only on the first delta of a response.
    #[allow(dead_code)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,

    /// Text fragment added by this chunk, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    /// Tool call fragments added by this chunk, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<OpenAIToolCallDelta>>,
}

/// Incremental update to one tool call in a streaming response.
///
/// Tool calls are streamed piece by piece: the first delta for a given
/// `index` usually carries `id` and the function name, and later deltas for
/// the same `index` append fragments of the arguments JSON string.
#[derive(Debug, Clone, Deserialize)]
pub struct OpenAIToolCallDelta {
    /// Position of the tool call being updated, when multiple tool calls
    /// are streamed in the same response.
    pub index: u32,

    /// Tool call ID — present in the first delta for this index only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Call type, `"function"`, present in the first delta only.
    #[allow(dead_code)]
    #[serde(skip_serializing_if = "Option::is_none", rename = "type")]
    pub call_type: Option<String>,

    /// Partial function name/arguments carried by this delta.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function: Option<OpenAIFunctionDelta>,
}

/// Incremental function name/arguments fragment within a tool call delta.
#[derive(Debug, Clone, Deserialize)]
pub struct OpenAIFunctionDelta {
    /// Function name, present in the first delta for this tool call only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Fragment of the arguments JSON string. Concatenate all fragments
    /// for a given tool call index, then parse the result as JSON.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
}
