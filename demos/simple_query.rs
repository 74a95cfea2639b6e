//! Simple query example
//!
//! Demonstrates the minimal agent loop: no tools, one user turn, one
//! assistant reply.

use agent_runtime::{AgentLoop, AgentLoopConfig, MessageQueue, OpenAiCompatProvider, Session, ToolRegistry};
use std::sync::Arc;
use tokio::sync::Mutex;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let base_url = std::env::var("AGENT_BASE_URL").unwrap_or_else(|_| "http://localhost:11434/v1".to_string());
    let model = std::env::var("AGENT_MODEL").unwrap_or_else(|_| "qwen3:8b".to_string());

    let provider = Arc::new(OpenAiCompatProvider::new(base_url, "not-needed")?);
    let registry = ToolRegistry::shared();
    let queue = Arc::new(Mutex::new(MessageQueue::new()));
    let session = Session::new(Some("simple-query".to_string()), std::env::current_dir()?, false);

    let config = AgentLoopConfig { model, max_tokens: Some(500), ..Default::default() };
    let mut agent =
        AgentLoop::new(provider, registry, queue, session, config).with_system_prompt("You are a helpful assistant");

    println!("Sending query to model...\n");
    let response = agent.run("What's the capital of France? Please be brief.", true).await?;
    println!("Response: {}", response.content);

    Ok(())
}
