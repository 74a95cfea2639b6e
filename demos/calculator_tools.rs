//! Calculator with Tools Example
//!
//! Demonstrates registering tools into a [`ToolRegistry`] and driving them
//! through the agent loop's automatic tool-call round-trip.

use agent_runtime::{AgentLoop, AgentLoopConfig, MessageQueue, OpenAiCompatProvider, Session, ToolRegistry, tool};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::Mutex;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let registry = ToolRegistry::shared();

    registry
        .register(tool("add", "Add two numbers").param("a", "number").param("b", "number").build(|args| async move {
            let a = args["a"].as_f64().unwrap_or(0.0);
            let b = args["b"].as_f64().unwrap_or(0.0);
            Ok(json!({"result": a + b}))
        }))
        .await;

    registry
        .register(
            tool("subtract", "Subtract two numbers").param("a", "number").param("b", "number").build(|args| async move {
                let a = args["a"].as_f64().unwrap_or(0.0);
                let b = args["b"].as_f64().unwrap_or(0.0);
                Ok(json!({"result": a - b}))
            }),
        )
        .await;

    registry
        .register(
            tool("multiply", "Multiply two numbers").param("a", "number").param("b", "number").build(|args| async move {
                let a = args["a"].as_f64().unwrap_or(0.0);
                let b = args["b"].as_f64().unwrap_or(0.0);
                Ok(json!({"result": a * b}))
            }),
        )
        .await;

    registry
        .register(tool("divide", "Divide two numbers").param("a", "number").param("b", "number").build(|args| async move {
            let a = args["a"].as_f64().unwrap_or(0.0);
            let b = args["b"].as_f64().unwrap_or(0.0);
            if b == 0.0 {
                return Ok(json!({"error": "Cannot divide by zero"}));
            }
            Ok(json!({"result": a / b}))
        }))
        .await;

    let base_url = std::env::var("AGENT_BASE_URL").unwrap_or_else(|_| "http://localhost:11434/v1".to_string());
    let provider = Arc::new(OpenAiCompatProvider::new(base_url, "not-needed")?);
    let config = AgentLoopConfig { model: "qwen3:8b".to_string(), temperature: 0.1, max_iterations: 5, ..Default::default() };

    println!("{}", "=".repeat(70));
    println!("CALCULATOR TOOLS EXAMPLE");
    println!("{}", "=".repeat(70));
    println!();

    for query in ["What is 25 plus 17?", "Calculate 144 divided by 12", "What's 7 times 8, then add 5?"] {
        println!("User: {query}");
        println!("{}", "-".repeat(50));

        let queue = Arc::new(Mutex::new(MessageQueue::new()));
        let session = Session::new(None, std::env::current_dir()?, false);
        let mut agent = AgentLoop::new(provider.clone(), registry.clone(), queue, session, config.clone())
            .with_system_prompt(
                "You are a helpful calculator assistant. Use the provided tools to perform calculations. \
                 Always show your work and explain the result.",
            )
            .on_tool_start(Arc::new(|name, args| {
                println!("🔧 Tool call: {name}");
                println!("   Arguments: {args}");
                Ok(())
            }));

        let response = agent.run(query, false).await?;
        println!("Assistant: {}", response.content);
        println!();
    }

    println!("{}", "=".repeat(70));
    println!("Example complete!");

    Ok(())
}
