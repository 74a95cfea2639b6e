//! External surfaces embedding applications build on: the interactive input
//! grammar (slash commands, steering/follow-up prefixes, `@file` inlining),
//! a JSON event emitter for pipe consumers, and a line-delimited RPC mode
//! for stdio process integration.

use crate::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// One parsed line of interactive input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedInput {
    /// `/name args...` — a slash command, dispatched before reaching the loop.
    Command { name: String, args: Option<String> },
    /// `!text` — drained between tool batches, redirecting the current turn.
    Steering(String),
    /// `>>text` — queued to run as the next turn once this one completes.
    Followup(String),
    /// Anything else, with `@file` references already expanded.
    User(String),
}

/// Classify one line of interactive input per the prefix grammar:
/// `/` = command, `!` = steering, `>>` = follow-up, otherwise a user message.
///
/// `@file` expansion for `User` lines is the caller's job — see
/// [`FileReferenceResolver::expand`] — because it needs a workspace root this
/// function doesn't have.
pub fn parse_input(line: &str) -> ParsedInput {
    if let Some(rest) = line.strip_prefix('/') {
        let mut parts = rest.splitn(2, char::is_whitespace);
        let name = parts.next().unwrap_or("").to_string();
        let args = parts.next().map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        return ParsedInput::Command { name, args };
    }
    if let Some(rest) = line.strip_prefix(">>") {
        return ParsedInput::Followup(rest.to_string());
    }
    if let Some(rest) = line.strip_prefix('!') {
        return ParsedInput::Steering(rest.trim_start_matches('!').to_string());
    }
    ParsedInput::User(line.to_string())
}

fn file_reference_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"@([\w\-./]+\.\w+)").expect("valid file-reference regex"))
}

/// Resolves `@<path>` tokens in user text against a workspace root and
/// inlines the referenced file's contents.
pub struct FileReferenceResolver {
    workspace: PathBuf,
}

impl FileReferenceResolver {
    pub fn new(workspace: impl Into<PathBuf>) -> Self {
        Self { workspace: workspace.into() }
    }

    /// File paths referenced by `@<path>` tokens in `text`, in appearance order.
    pub fn parse_references(&self, text: &str) -> Vec<String> {
        file_reference_pattern().captures_iter(text).map(|c| c[1].to_string()).collect()
    }

    /// Resolve one reference against the workspace, refusing anything that
    /// would escape it.
    fn resolve_file(&self, reference: &str) -> Result<(PathBuf, String)> {
        let candidate = self.workspace.join(reference);
        let workspace_canonical = self.workspace.canonicalize().map_err(|e| Error::invalid_input(format!("bad workspace: {e}")))?;

        let resolved = if candidate.exists() {
            candidate.canonicalize().ok()
        } else {
            None
        };

        let resolved = match resolved {
            Some(path) if path.starts_with(&workspace_canonical) => path,
            Some(_) => return Err(Error::invalid_input(format!("file outside workspace: {reference}"))),
            None => self.find_by_name(reference)?,
        };

        if !resolved.starts_with(&workspace_canonical) {
            return Err(Error::invalid_input(format!("file outside workspace: {reference}")));
        }

        let content = std::fs::read_to_string(&resolved).map_err(|e| Error::invalid_input(format!("error reading file: {e}")))?;
        Ok((resolved, content))
    }

    fn find_by_name(&self, reference: &str) -> Result<PathBuf> {
        let name = Path::new(reference).file_name().ok_or_else(|| Error::invalid_input(format!("file not found: {reference}")))?;

        for entry in walk(&self.workspace) {
            if entry.file_name() == Some(name) {
                return entry.canonicalize().map_err(|e| Error::invalid_input(format!("error resolving file: {e}")));
            }
        }

        Err(Error::invalid_input(format!("file not found: {reference}")))
    }

    /// Expand every `@<path>` reference in `text`, appending each file's
    /// contents as a fenced `--- File: ... ---` section. References that
    /// fail to resolve get an inline `[Error: ...]` note instead.
    pub fn expand(&self, text: &str) -> String {
        let references = self.parse_references(text);
        if references.is_empty() {
            return text.to_string();
        }

        let mut expanded = text.to_string();
        for reference in references {
            match self.resolve_file(&reference) {
                Ok((path, content)) => {
                    let rel = path.strip_prefix(&self.workspace.canonicalize().unwrap_or_else(|_| self.workspace.clone())).unwrap_or(&path).display();
                    expanded.push_str(&format!("\n\n--- File: {rel} ---\n{content}\n--- End of {rel} ---"));
                }
                Err(e) => expanded.push_str(&format!("\n\n[Error: {e}]")),
            }
        }
        expanded
    }
}

fn walk(root: &Path) -> Vec<PathBuf> {
    let mut found = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let Ok(entries) = std::fs::read_dir(&dir) else { continue };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            } else {
                found.push(path);
            }
        }
    }
    found
}

/// Writes one JSON-encoded event per line — `message`, `tool_call_start`,
/// `tool_call_end`, `token`, `done`, `error` — each stamped with `type` and
/// an ISO-8601 `timestamp`, flushed immediately after every write.
pub struct JsonEventEmitter<W: Write> {
    out: W,
}

impl<W: Write> JsonEventEmitter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    fn emit(&mut self, event_type: &str, mut data: serde_json::Map<String, Value>) -> Result<()> {
        data.insert("type".to_string(), Value::String(event_type.to_string()));
        data.insert("timestamp".to_string(), Value::String(chrono::Utc::now().to_rfc3339()));

        let line = serde_json::to_string(&Value::Object(data)).map_err(Error::Json)?;
        writeln!(self.out, "{line}").map_err(|e| Error::other(format!("failed to write event: {e}")))?;
        self.out.flush().map_err(|e| Error::other(format!("failed to flush event stream: {e}")))
    }

    pub fn message(&mut self, role: &str, content: &str) -> Result<()> {
        let mut data = serde_json::Map::new();
        data.insert("role".to_string(), Value::String(role.to_string()));
        data.insert("content".to_string(), Value::String(content.to_string()));
        self.emit("message", data)
    }

    pub fn tool_call_start(&mut self, tool_name: &str, arguments: &Value) -> Result<()> {
        let mut data = serde_json::Map::new();
        data.insert("tool".to_string(), Value::String(tool_name.to_string()));
        data.insert("args".to_string(), arguments.clone());
        self.emit("tool_call_start", data)
    }

    pub fn tool_call_end(&mut self, tool_name: &str, result: &Value, error: Option<&str>) -> Result<()> {
        let mut data = serde_json::Map::new();
        data.insert("tool".to_string(), Value::String(tool_name.to_string()));
        data.insert("result".to_string(), result.clone());
        data.insert("error".to_string(), error.map(Value::from).unwrap_or(Value::Null));
        data.insert("success".to_string(), Value::Bool(error.is_none()));
        self.emit("tool_call_end", data)
    }

    pub fn token(&mut self, content: &str) -> Result<()> {
        let mut data = serde_json::Map::new();
        data.insert("content".to_string(), Value::String(content.to_string()));
        self.emit("token", data)
    }

    pub fn done(&mut self, final_content: Option<&str>) -> Result<()> {
        let mut data = serde_json::Map::new();
        if let Some(content) = final_content {
            data.insert("content".to_string(), Value::String(content.to_string()));
        }
        self.emit("done", data)
    }

    pub fn error(&mut self, error: &str) -> Result<()> {
        let mut data = serde_json::Map::new();
        data.insert("error".to_string(), Value::String(error.to_string()));
        self.emit("error", data)
    }
}

/// One RPC request line: `{"id":<int>,"method":<string>,"params":<object>}`.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcRequest {
    pub id: i64,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

/// One RPC response line: `{"id":<int>,"result":<value|null>,"error":<string|null>}`.
#[derive(Debug, Clone, Serialize)]
pub struct RpcResponse {
    pub id: Option<i64>,
    pub result: Option<Value>,
    pub error: Option<String>,
}

impl RpcResponse {
    pub fn ok(id: i64, result: Value) -> Self {
        Self { id: Some(id), result: Some(result), error: None }
    }

    pub fn err(id: Option<i64>, error: impl Into<String>) -> Self {
        Self { id, result: None, error: Some(error.into()) }
    }
}

/// One `{"event":<string>,"data":<object>}` notification line, used by
/// streaming RPC methods to push intermediate events ahead of the final response.
#[derive(Debug, Clone, Serialize)]
pub struct RpcEvent {
    pub event: String,
    pub data: Value,
}

/// Parses one RPC request line. Malformed JSON becomes an error response
/// carrying no request id, per the reference stdio contract.
pub fn parse_rpc_request(line: &str) -> std::result::Result<RpcRequest, RpcResponse> {
    serde_json::from_str(line).map_err(|e| RpcResponse::err(None, format!("invalid JSON: {e}")))
}

/// Serialize a response as one line of JSON, newline-terminated.
pub fn render_rpc_response(response: &RpcResponse) -> String {
    format!("{}\n", serde_json::to_string(response).expect("RpcResponse is always serializable"))
}

/// Serialize an event notification as one line of JSON, newline-terminated.
pub fn render_rpc_event(event: &RpcEvent) -> String {
    format!("{}\n", serde_json::to_string(event).expect("RpcEvent is always serializable"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn parse_input_recognizes_slash_command_with_args() {
        let parsed = parse_input("/compact 10 5");
        assert_eq!(parsed, ParsedInput::Command { name: "compact".to_string(), args: Some("10 5".to_string()) });
    }

    #[test]
    fn parse_input_recognizes_slash_command_without_args() {
        let parsed = parse_input("/help");
        assert_eq!(parsed, ParsedInput::Command { name: "help".to_string(), args: None });
    }

    #[test]
    fn parse_input_recognizes_steering() {
        assert_eq!(parse_input("!stop and summarize"), ParsedInput::Steering("stop and summarize".to_string()));
    }

    #[test]
    fn parse_input_recognizes_followup() {
        assert_eq!(parse_input(">>what about tomorrow?"), ParsedInput::Followup("what about tomorrow?".to_string()));
    }

    #[test]
    fn parse_input_defaults_to_user_message() {
        assert_eq!(parse_input("hello there"), ParsedInput::User("hello there".to_string()));
    }

    #[test]
    fn parse_references_finds_at_file_tokens() {
        let dir = tempdir().unwrap();
        let resolver = FileReferenceResolver::new(dir.path());
        let refs = resolver.parse_references("Review @src/main.rs and @README.md please");
        assert_eq!(refs, vec!["src/main.rs", "README.md"]);
    }

    #[test]
    fn expand_inlines_file_contents() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("README.md"), "hello readme").unwrap();

        let resolver = FileReferenceResolver::new(dir.path());
        let expanded = resolver.expand("check @README.md");

        assert!(expanded.contains("--- File: README.md ---"));
        assert!(expanded.contains("hello readme"));
        assert!(expanded.contains("--- End of README.md ---"));
    }

    #[test]
    fn expand_notes_missing_file_inline_instead_of_erroring() {
        let dir = tempdir().unwrap();
        let resolver = FileReferenceResolver::new(dir.path());
        let expanded = resolver.expand("check @missing.txt");
        assert!(expanded.contains("[Error:"));
    }

    #[test]
    fn expand_refuses_path_escaping_workspace() {
        let dir = tempdir().unwrap();
        let outside = tempdir().unwrap();
        fs::write(outside.path().join("secret.txt"), "nope").unwrap();

        let escape_token = format!("@{}", outside.path().join("secret.txt").display());
        let resolver = FileReferenceResolver::new(dir.path());

        // Not matched by the @path.ext pattern when it contains no extension
        // boundary our regex can't parse as a single token is fine; exercise
        // the direct resolver path instead.
        let result = resolver.resolve_file(&format!("../{}", outside.path().file_name().unwrap().to_string_lossy()));
        assert!(result.is_err());
        let _ = escape_token;
    }

    #[test]
    fn json_event_emitter_writes_one_line_per_event() {
        let mut buf = Vec::new();
        {
            let mut emitter = JsonEventEmitter::new(&mut buf);
            emitter.message("user", "hi").unwrap();
            emitter.done(Some("bye")).unwrap();
        }
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["type"], "message");
        assert_eq!(first["role"], "user");
        assert!(first["timestamp"].is_string());
    }

    #[test]
    fn tool_call_end_reports_success_based_on_error_presence() {
        let mut buf = Vec::new();
        let mut emitter = JsonEventEmitter::new(&mut buf);
        emitter.tool_call_end("search", &Value::String("ok".to_string()), None).unwrap();

        let text = String::from_utf8(buf).unwrap();
        let event: Value = serde_json::from_str(text.trim()).unwrap();
        assert_eq!(event["success"], true);
        assert_eq!(event["error"], Value::Null);
    }

    #[test]
    fn parse_rpc_request_rejects_malformed_json() {
        let result = parse_rpc_request("not json");
        assert!(result.is_err());
    }

    #[test]
    fn parse_rpc_request_parses_valid_request() {
        let request = parse_rpc_request(r#"{"id":1,"method":"ping","params":{}}"#).unwrap();
        assert_eq!(request.id, 1);
        assert_eq!(request.method, "ping");
    }

    #[test]
    fn render_rpc_response_round_trips_as_one_json_line() {
        let response = RpcResponse::ok(1, Value::String("pong".to_string()));
        let rendered = render_rpc_response(&response);
        assert!(rendered.ends_with('\n'));
        let parsed: Value = serde_json::from_str(rendered.trim()).unwrap();
        assert_eq!(parsed["id"], 1);
        assert_eq!(parsed["result"], "pong");
    }
}
