//! Agent Loop Demo
//!
//! A fuller walkthrough of the bounded agent loop: a tool registry, a
//! persisted session, a steering message pushed mid-run, and a follow-up
//! chained onto the next turn — the same mechanics exercised in
//! `tests/agent_loop_scenarios.rs`, wired up against a live provider.

use agent_runtime::{AgentLoop, AgentLoopConfig, MessageQueue, OpenAiCompatProvider, Session, ToolRegistry, tool};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::Mutex;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let registry = ToolRegistry::shared();
    registry
        .register(tool("word_count", "counts words in a string").param("text", "string").build(|args| async move {
            let text = args["text"].as_str().unwrap_or("");
            Ok(json!({"words": text.split_whitespace().count()}))
        }))
        .await;

    let base_url = std::env::var("AGENT_BASE_URL").unwrap_or_else(|_| "http://localhost:11434/v1".to_string());
    let provider = Arc::new(OpenAiCompatProvider::new(base_url, "not-needed")?);
    let queue = Arc::new(Mutex::new(MessageQueue::new()));

    let workspace = std::env::current_dir()?;
    let session = Session::new(Some("agent-loop-demo".to_string()), workspace, true);

    let config = AgentLoopConfig { model: "qwen3:8b".to_string(), max_iterations: 8, ..Default::default() };
    let mut agent = AgentLoop::new(provider, registry, queue.clone(), session, config)
        .with_system_prompt("You are a helpful assistant with a word-counting tool.");

    // Queue a follow-up now; it's only drained once the first turn settles
    // on a tool-free response.
    queue.lock().await.add_followup("Now count the words in your previous answer.");

    match agent.run("How many words are in the sentence 'the quick brown fox jumps'?", true).await {
        Ok(response) => {
            println!("Final response: {}", response.content);
            println!("Entries recorded: {}", agent.session().current_conversation().len());
        }
        Err(e) => println!("(no live provider reachable: {e})"),
    }

    Ok(())
}
