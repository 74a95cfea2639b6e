//! Steering Demo
//!
//! The old interrupt()-mid-stream capability has no direct equivalent in
//! this architecture: the agent loop runs one bounded turn at a time rather
//! than a cancellable stream. The redesigned mechanism is the message
//! queue's *steering* class — a message pushed from another task that gets
//! drained and inserted into history between tool batches, redirecting the
//! loop without tearing down any in-flight state.
//!
//! This demonstrates:
//! 1. A concurrent task pushing a steering message while the loop runs.
//! 2. The iteration ceiling as a hard upper bound when a model never
//!    settles on a tool-free response.

use agent_runtime::{AgentLoop, AgentLoopConfig, CompletionRequest, ChunkStream, LlmProvider, MessageQueue, Response, Session, ToolCall, ToolRegistry, Usage, tool};
use agent_runtime::Result;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// A provider stand-in that keeps calling a tool until a steering message
/// has been observed in the conversation, then stops. This lets the demo
/// run without a live LLM endpoint.
struct RedirectableProvider;

#[async_trait::async_trait]
impl LlmProvider for RedirectableProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<Response> {
        let redirected = request.messages.iter().any(|m| m.content.contains("stop and summarize"));
        if redirected {
            return Ok(Response {
                content: "Understood, stopping here with a summary.".to_string(),
                model: "demo".to_string(),
                usage: Usage::default(),
                finish_reason: Some("stop".to_string()),
                tool_calls: Vec::new(),
            });
        }
        Ok(Response {
            content: String::new(),
            model: "demo".to_string(),
            usage: Usage::default(),
            finish_reason: Some("tool_calls".to_string()),
            tool_calls: vec![ToolCall { id: "t1".to_string(), name: "tick".to_string(), arguments: "{}".to_string() }],
        })
    }

    async fn stream(&self, _request: CompletionRequest) -> Result<ChunkStream> {
        unimplemented!("this demo only exercises complete()")
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    println!("{}", "=".repeat(60));
    println!("STEERING DEMO");
    println!("{}", "=".repeat(60));
    println!();

    let registry = ToolRegistry::shared();
    registry
        .register(tool("tick", "advances one step").build(|_args| async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok(json!("ticked"))
        }))
        .await;

    let queue = Arc::new(Mutex::new(MessageQueue::new()));
    let provider = Arc::new(RedirectableProvider);
    let session = Session::new(None, std::env::current_dir()?, false);
    let config = AgentLoopConfig { max_iterations: 20, ..Default::default() };

    // Simulate a user hitting "cancel" two ticks in: push a steering
    // message onto the shared queue from a concurrent task.
    let steering_queue = queue.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        println!("(user interjects: \"stop and summarize\")");
        steering_queue.lock().await.add_steering("stop and summarize");
    });

    let mut agent = AgentLoop::new(provider, registry, queue, session, config);
    let response = agent.run("keep ticking until I say stop", true).await?;

    println!("\nFinal response: {}", response.content);
    println!("Turns recorded: {}", agent.session().current_conversation().len());

    Ok(())
}
