//! # agent-runtime
//!
//! A runtime for conversational tool-using agents: a bounded agent loop that
//! drives LLM-to-tool-to-LLM cycles, a typed tool registry, a two-class
//! steering/follow-up message queue, a branchable session tree with
//! append-only JSONL persistence, and a multi-platform bot dispatcher — all
//! sitting on top of a uniform [`LlmProvider`] abstraction.
//!
//! ## Key Features
//!
//! - **Bounded Agent Loop**: iteration-ceiling LLM↔tool orchestration with
//!   live steering and queued follow-ups.
//! - **Typed Tool Registry**: JSON-schema export, replace-on-collision
//!   registration, uniform error surfacing back to the model.
//! - **Branchable Session Tree**: a parent-pointer conversation DAG with
//!   forking, compaction, and write-then-rename JSONL persistence.
//! - **Multi-Platform Dispatcher**: per-`(platform, channel)` session
//!   routing over any number of concurrent [`PlatformAdapter`]s.
//! - **Layered Prompt Assembly**: `SYSTEM.md`/`AGENTS.md`/`APPEND_SYSTEM.md`
//!   discovery plus a skills appendix.
//! - **Extension Surface**: an ordered, compiled registration API for tools,
//!   slash commands, and lifecycle events.
//!
//! ## Example: a single bounded turn
//!
//! ```rust,no_run
//! use agent_runtime::{AgentLoop, AgentLoopConfig, MessageQueue, OpenAiCompatProvider, Session, ToolRegistry};
//! use std::sync::Arc;
//! use tokio::sync::Mutex;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let provider = Arc::new(OpenAiCompatProvider::new("http://localhost:1234/v1", "not-needed")?);
//!     let registry = ToolRegistry::shared();
//!     let queue = Arc::new(Mutex::new(MessageQueue::new()));
//!     let session = Session::new(None, std::env::current_dir()?, true);
//!
//!     let config = AgentLoopConfig { model: "qwen2.5-32b-instruct".to_string(), ..Default::default() };
//!     let mut agent = AgentLoop::new(provider, registry, queue, session, config);
//!
//!     let response = agent.run("What's 2 + 2?", true).await?;
//!     println!("{}", response.content);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - **provider**: uniform chat/stream contract over LLM back-ends, plus the
//!   OpenAI-compatible reference implementation.
//! - **registry**: named, replace-on-collision tool registry.
//! - **queue**: two-class (steering/follow-up) message queue.
//! - **session**: branchable conversation tree with JSONL persistence.
//! - **agent_loop**: the bounded LLM↔tool orchestration loop.
//! - **prompt**: layered system-prompt assembly plus skill discovery.
//! - **extensions**: registration API for user-supplied tools/commands/events.
//! - **dispatcher**: multi-platform bot front end over a shared agent.
//! - **interfaces**: interactive input grammar, JSON event stream, RPC mode.
//! - **tools**: tool definition system with JSON-schema generation.
//! - **context**: token estimation and history truncation utilities.
//! - **config**: provider endpoint/model resolution helpers.
//! - **error**: the runtime's error taxonomy.
//! - **retry**: exponential backoff with jitter.

// ============================================================================
// MODULE DECLARATIONS
// ============================================================================

/// The bounded LLM↔tool orchestration loop: iteration ceilings, steering and
/// follow-up draining, tool-call round-tripping.
mod agent_loop;

/// Provider configuration helpers for LM Studio, Ollama, llama.cpp, and vLLM.
mod config;

/// Token estimation and message-history truncation utilities.
mod context;

/// Bot dispatcher and platform adapter contract for fronting one agent onto
/// multiple chat platforms.
mod dispatcher;

/// Error types and conversions used across all public APIs.
mod error;

/// Extension registration surface: tools, slash commands, lifecycle events.
mod extensions;

/// Interactive input grammar, JSON event emitter, and stdio RPC mode.
mod interfaces;

/// Layered system-prompt assembly (`SYSTEM.md`/`AGENTS.md`/`APPEND_SYSTEM.md`)
/// and skill discovery.
mod prompt;

/// Uniform chat/stream contract over LLM back-ends.
mod provider;

/// Two-class (steering/follow-up) message queue.
mod queue;

/// Named, replace-on-collision tool registry.
mod registry;

/// Branchable conversation tree with append-only JSONL persistence.
mod session;

/// Tool definition and execution system with JSON-schema generation.
mod tools;

/// OpenAI-compatible wire types: request/response/streaming-chunk shapes.
mod types;

/// Server-Sent Events parsing for the streaming completion path.
mod utils;

// ============================================================================
// PUBLIC EXPORTS
// ============================================================================

pub mod retry;

// --- Agent Loop ---

pub use agent_loop::{AgentLoop, AgentLoopConfig, ToolObserver};

// --- Provider Abstraction ---

pub use provider::{
    ChunkStream, CompletionRequest, LlmProvider, Message, OpenAiCompatProvider, Response, StreamChunk, ToolCall, Usage,
};

// --- Tool Registry and Definitions ---

pub use registry::ToolRegistry;
pub use tools::{Tool, ToolBuilder, tool};

// --- Message Queue ---

pub use queue::{DrainMode, MessageClass, MessageQueue, QueuedMessage};

// --- Session Tree and Store ---

pub use session::{Session, SessionEntry, SessionTree};

// --- Prompt Assembly ---

pub use prompt::{PromptAssembler, Skill, discover_skills};

// --- Extension Surface ---

pub use extensions::{CommandHandler, Event, Extension, ExtensionApi, ExtensionManager, EventHandler};

// --- Bot Dispatcher and Adapters ---

pub use dispatcher::{AgentRunner, Attachment, Dispatcher, PlatformAdapter, UniversalMessage, UniversalResponse};

// --- External Interfaces ---

pub use interfaces::{
    FileReferenceResolver, JsonEventEmitter, ParsedInput, RpcEvent, RpcRequest, RpcResponse, parse_input,
    parse_rpc_request, render_rpc_event, render_rpc_response,
};

// --- Provider Configuration ---

pub use config::{Provider as ConfigProvider, get_base_url, get_model};

// --- Context Management ---

pub use context::{estimate_tokens, is_approaching_limit, truncate_messages};

// --- Error Handling ---

pub use error::{Error, Result};

// ============================================================================
// CONVENIENCE PRELUDE
// ============================================================================

/// The most commonly used types and functions. Import with
/// `use agent_runtime::prelude::*;`.
pub mod prelude {
    pub use crate::{
        AgentLoop, AgentLoopConfig, CompletionRequest, Dispatcher, Error, LlmProvider, Message, MessageQueue,
        OpenAiCompatProvider, PlatformAdapter, PromptAssembler, Response, Result, Session, Tool, ToolCall,
        ToolRegistry, UniversalMessage, tool,
    };
}
