//! Observer Hooks Example
//!
//! Demonstrates the two lifecycle-observation points this architecture
//! actually exposes: the agent loop's `on_tool_start`/`on_tool_end`
//! observers, and the extension surface's `Event` subscriptions. Both are
//! pure observation — neither can block or rewrite a tool call — and a
//! failing observer is isolated rather than aborting the turn.

use agent_runtime::{AgentLoop, AgentLoopConfig, Event, ExtensionApi, MessageQueue, OpenAiCompatProvider, Session, ToolRegistry, tool};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", "=".repeat(70));
    println!("OBSERVER HOOKS EXAMPLE");
    println!("{}", "=".repeat(70));
    println!();

    // ------------------------------------------------------------------
    // Example 1: on_tool_start / on_tool_end observers on the agent loop
    // ------------------------------------------------------------------
    println!("Example 1: Agent loop tool observers");
    println!("{}", "-".repeat(70));

    let registry = ToolRegistry::shared();
    registry
        .register(tool("lookup", "look up a fact").param("topic", "string").build(|args| async move {
            Ok(json!({"fact": format!("{} is interesting", args["topic"].as_str().unwrap_or("that"))}))
        }))
        .await;

    let base_url = std::env::var("AGENT_BASE_URL").unwrap_or_else(|_| "http://localhost:11434/v1".to_string());
    let provider = Arc::new(OpenAiCompatProvider::new(base_url, "not-needed")?);
    let queue = Arc::new(Mutex::new(MessageQueue::new()));
    let session = Session::new(None, std::env::current_dir()?, false);
    let config = AgentLoopConfig { model: "qwen3:8b".to_string(), ..Default::default() };

    let mut agent = AgentLoop::new(provider, registry, queue, session, config)
        .with_system_prompt("You are a helpful assistant with access to a lookup tool.")
        .on_tool_start(Arc::new(|name, args| {
            println!("-> tool starting: {name}({args})");
            Ok(())
        }))
        .on_tool_end(Arc::new(|name, result| {
            println!("<- tool finished: {name} => {result}");
            Ok(())
        }));

    match agent.run("Look up something about Rust", true).await {
        Ok(response) => println!("Assistant: {}", response.content),
        Err(e) => println!("(skipping live call, no endpoint reachable: {e})"),
    }

    println!();
    println!("{}", "=".repeat(70));

    // ------------------------------------------------------------------
    // Example 2: ExtensionApi lifecycle events — multiple subscribers,
    // one failing handler isolated from the rest.
    // ------------------------------------------------------------------
    println!("\nExample 2: Extension event subscriptions");
    println!("{}", "-".repeat(70));

    let api = ExtensionApi::new();
    let call_count = Arc::new(AtomicUsize::new(0));

    let counter = call_count.clone();
    api.on(
        Event::ToolCallStart,
        Arc::new(move |data| {
            counter.fetch_add(1, Ordering::SeqCst);
            println!("subscriber 1 saw: {data}");
            Ok(())
        }),
    );
    api.on(
        Event::ToolCallStart,
        Arc::new(|_data| {
            println!("subscriber 2: deliberately failing");
            Err(agent_runtime::Error::other("simulated handler failure"))
        }),
    );
    let counter = call_count.clone();
    api.on(
        Event::ToolCallStart,
        Arc::new(move |_data| {
            counter.fetch_add(1, Ordering::SeqCst);
            println!("subscriber 3 still ran despite subscriber 2 failing");
            Ok(())
        }),
    );

    api.emit(Event::ToolCallStart, &json!({"tool": "lookup"}));
    println!("Handlers that completed successfully: {}", call_count.load(Ordering::SeqCst));

    println!();
    println!("{}", "=".repeat(70));
    println!("Observer hooks example complete!");
    println!("{}", "=".repeat(70));

    Ok(())
}
