//! Context Management Examples
//!
//! This demonstrates manual history management patterns using the context
//! utilities directly on a caller-owned `Vec<Message>`.
//!
//! `estimate_tokens`/`truncate_messages`/`is_approaching_limit` are opt-in:
//! nothing in the agent loop calls them on your behalf. You decide when and
//! how to manage history based on your domain-specific needs.
//!
//! Patterns demonstrated:
//! 1. Stateless agents (recommended for single-task agents)
//! 2. Manual truncation at natural breakpoints
//! 3. Token budget monitoring with periodic checks

use agent_runtime::{Message, estimate_tokens, is_approaching_limit, truncate_messages};

fn main() {
    println!("{}", "=".repeat(70));
    println!("CONTEXT MANAGEMENT EXAMPLES");
    println!("{}", "=".repeat(70));
    println!();

    pattern_1_stateless();
    pattern_2_manual_truncation();
    pattern_3_token_monitoring();
}

/// Best for: single-task agents (copy editor, code formatter, etc.) with no
/// context needed between tasks — start a fresh history for each one.
fn pattern_1_stateless() {
    println!("=== Pattern 1: Stateless Agents ===");
    println!("Best for: single-task agents with no context needed");
    println!();

    for task in ["Explain Rust", "Explain Python", "Explain JavaScript"] {
        let history = vec![Message::system("You are a helpful assistant"), Message::user(task)];
        println!("Task: {task}");
        println!("History size: {} messages", history.len());
        println!("Estimated tokens: {}", estimate_tokens(&history));
        println!();
    }

    println!("{}", "-".repeat(70));
    println!();
}

/// Best for: multi-turn conversations with clear task boundaries — truncate
/// after completing a milestone rather than on every turn.
fn pattern_2_manual_truncation() {
    println!("=== Pattern 2: Manual Truncation ===");
    println!("Best for: multi-turn conversations with task boundaries");
    println!();

    let mut history = vec![Message::system("You are a helpful coding assistant")];

    println!("Task 1: adding messages to history...");
    history.push(Message::user("Analyze this: def add(a, b): return a + b"));
    history.push(Message::assistant("This defines a function that adds two numbers."));
    println!("After task 1: {} messages", history.len());

    println!("\nTask 2: adding more messages...");
    history.push(Message::user("Write unit tests for the add function"));
    history.push(Message::assistant("Here are some unit tests..."));
    println!("After task 2: {} messages", history.len());

    println!("\nTruncating history (keeping last 3 messages)...");
    history = truncate_messages(&history, 3, true);
    println!("After truncation: {} messages", history.len());

    println!();
    println!("{}", "-".repeat(70));
    println!();
}

/// Best for: long-running conversations with a real token limit — check the
/// budget before each turn and truncate proactively rather than letting a
/// provider call fail on an oversized request.
fn pattern_3_token_monitoring() {
    println!("=== Pattern 3: Token Budget Monitoring ===");
    println!("Best for: long-running conversations with token limits");
    println!();

    let mut history = vec![Message::system("You are a helpful assistant")];
    let interactions = ["What is Rust?", "Explain ownership", "What are lifetimes?", "How do traits work?", "Explain async/await"];

    let token_limit = 1000; // artificially low, for demonstration
    let margin = 0.8;

    for (i, prompt) in interactions.iter().enumerate() {
        println!("Interaction {}: {}", i + 1, prompt);

        let current_tokens = estimate_tokens(&history);
        println!("  Current tokens: {current_tokens}");

        if is_approaching_limit(&history, token_limit, margin) {
            println!("  Approaching token limit, truncating...");
            history = truncate_messages(&history, 3, true);
            println!("  After truncation: {} tokens", estimate_tokens(&history));
        }

        history.push(Message::user(*prompt));
        history.push(Message::assistant(format!("(response to: {prompt})")));
        println!();
    }

    println!("Final history size: {} messages", history.len());
    println!("Final token count: {}", estimate_tokens(&history));
    println!();
    println!("{}", "-".repeat(70));
    println!();
}
