//! Multi-Platform Bot Demo
//!
//! Fronts a single agent onto two in-memory [`PlatformAdapter`]s to show
//! how the dispatcher routes messages by `(platform, channel)`, keeping one
//! [`Session`] transcript per channel while sharing the same underlying
//! agent across every platform.

use agent_runtime::{AgentRunner, Attachment, Dispatcher, PlatformAdapter, Result, UniversalMessage};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

/// An agent that just echoes the input back. Stands in for a real
/// `AgentLoop`-backed implementation so this demo runs without a live
/// provider.
struct EchoAgent;

#[async_trait]
impl AgentRunner for EchoAgent {
    async fn run(&self, text: &str) -> Result<String> {
        Ok(format!("you said: {text}"))
    }
}

/// A toy adapter that "sends" by printing to stdout and records what it sent.
struct ConsoleAdapter {
    name: String,
    sent: Mutex<Vec<String>>,
}

impl ConsoleAdapter {
    fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), sent: Mutex::new(Vec::new()) }
    }
}

#[async_trait]
impl PlatformAdapter for ConsoleAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, channel_id: &str, text: &str, thread_id: Option<&str>) -> Result<String> {
        println!("[{}] -> #{channel_id}{}: {text}", self.name, thread_id.map(|t| format!(" (thread {t})")).unwrap_or_default());
        self.sent.lock().unwrap().push(text.to_string());
        Ok(format!("{}-msg-{}", self.name, self.sent.lock().unwrap().len()))
    }

    async fn upload(&self, _channel_id: &str, _file: &[u8], _caption: Option<&str>, _thread_id: Option<&str>) -> Result<String> {
        Ok("not supported in this demo".to_string())
    }

    async fn history(&self, _channel_id: &str, _limit: usize) -> Result<Vec<UniversalMessage>> {
        Ok(Vec::new())
    }

    async fn download(&self, _attachment: &Attachment) -> Result<Vec<u8>> {
        Ok(Vec::new())
    }

    async fn start(&self) -> Result<()> {
        println!("[{}] adapter started", self.name);
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        println!("[{}] adapter stopped", self.name);
        Ok(())
    }
}

fn sample_message(platform: &str, channel_id: &str, text: &str) -> UniversalMessage {
    UniversalMessage {
        id: uuid::Uuid::new_v4().to_string(),
        platform: platform.to_string(),
        channel_id: channel_id.to_string(),
        channel_name: None,
        thread_id: None,
        user_id: "u1".to_string(),
        username: "alice".to_string(),
        text: text.to_string(),
        attachments: Vec::new(),
        timestamp: chrono::Utc::now(),
        is_mention: true,
        is_dm: false,
        is_thread: false,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut dispatcher = Dispatcher::new(Arc::new(EchoAgent), std::env::current_dir().unwrap());
    dispatcher.add_platform(Arc::new(ConsoleAdapter::new("slack")));
    dispatcher.add_platform(Arc::new(ConsoleAdapter::new("discord")));

    println!("Platforms: {:?}", dispatcher.platform_names());

    dispatcher.handle_message(sample_message("slack", "general", "hello from slack")).await;
    dispatcher.handle_message(sample_message("discord", "general", "hello from discord")).await;
    dispatcher.handle_message(sample_message("slack", "general", "second message, same channel")).await;

    dispatcher.stop().await;

    Ok(())
}
