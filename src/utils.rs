//! SSE parsing for streaming chat completions.
//!
//! The API returns streaming responses in Server-Sent Events format:
//!
//! ```text
//! data: {"id":"msg_123","object":"chat.completion.chunk","choices":[...]}
//!
//! data: {"id":"msg_123","object":"chat.completion.chunk","choices":[...]}
//!
//! data: [DONE]
//! ```
//!
//! [`parse_sse_stream`] turns the raw HTTP response body into a stream of
//! parsed [`OpenAIChunk`]s. Accumulating those chunks into a complete
//! [`crate::provider::Response`] (text and tool calls alike) is
//! [`crate::provider::OpenAiCompatProvider`]'s job, not this module's.

use crate::types::OpenAIChunk;
use crate::{Error, Result};
use futures::stream::{Stream, StreamExt};
use std::pin::Pin;

/// Parses a raw HTTP response body as a Server-Sent Events stream of
/// [`OpenAIChunk`]s.
///
/// Lines not starting with `data: ` are ignored (heartbeats, comments), and
/// the `data: [DONE]` sentinel is swallowed rather than parsed as JSON.
/// Parse failures surface as an [`Error::Stream`] item rather than ending
/// the stream outright — it's the caller's choice whether one bad chunk is
/// fatal.
pub fn parse_sse_stream(body: reqwest::Response) -> Pin<Box<dyn Stream<Item = Result<OpenAIChunk>> + Send>> {
    let stream = body.bytes_stream().filter_map(move |result| async move {
        let bytes = match result.map_err(Error::Http) {
            Ok(b) => b,
            Err(e) => return Some(Err(e)),
        };

        // Lossy conversion guards against a multi-byte UTF-8 sequence split
        // across a chunk boundary.
        let text = String::from_utf8_lossy(&bytes);

        for line in text.lines() {
            if let Some(data) = line.strip_prefix("data: ") {
                if data == "[DONE]" {
                    continue;
                }

                let chunk: OpenAIChunk = match serde_json::from_str(data) {
                    Ok(c) => c,
                    Err(e) => return Some(Err(Error::stream(format!("failed to parse chunk: {e}")))),
                };

                return Some(Ok(chunk));
            }
        }

        None
    });

    Box::pin(stream)
}

// `parse_sse_stream` takes a `reqwest::Response` directly, and reqwest
// offers no public way to build one from an in-memory body without pulling
// in the server half of the HTTP stack. It's exercised indirectly through
// `OpenAiCompatProvider::stream` against a live endpoint instead of in unit
// tests here.
