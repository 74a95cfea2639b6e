//! Universal multi-platform bot: a single agent fronted by any number of
//! chat platform adapters, each normalizing its wire format into
//! [`UniversalMessage`].
//!
//! The dispatcher keeps a `(platform, channel)` to [`Session`] map purely as
//! a transcript/audit trail — it mirrors the source system, where the
//! session manager and the agent's own conversation history are two
//! independent things: the session is appended to for every message but
//! never fed back into the agent, and the agent (an [`AgentRunner`]) is a
//! single shared instance regardless of which channel triggered it.

use crate::session::Session;
use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;

/// A file attached to a message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub id: String,
    pub filename: String,
    pub content_type: String,
    pub size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Platform-agnostic inbound message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UniversalMessage {
    pub id: String,
    pub platform: String,
    pub channel_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
    pub user_id: String,
    pub username: String,
    pub text: String,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    #[serde(default)]
    pub is_mention: bool,
    #[serde(default)]
    pub is_dm: bool,
    #[serde(default)]
    pub is_thread: bool,
}

/// Outbound, platform-agnostic response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UniversalResponse {
    pub text: String,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub reply_to_thread: bool,
}

/// A chat platform adapter. The dispatcher drives every adapter through the
/// same five operations regardless of the underlying wire protocol.
#[async_trait]
pub trait PlatformAdapter: Send + Sync {
    fn name(&self) -> &str;

    async fn send(&self, channel_id: &str, text: &str, thread_id: Option<&str>) -> Result<String>;

    async fn upload(&self, channel_id: &str, file: &[u8], caption: Option<&str>, thread_id: Option<&str>) -> Result<String>;

    async fn history(&self, channel_id: &str, limit: usize) -> Result<Vec<UniversalMessage>>;

    async fn download(&self, attachment: &Attachment) -> Result<Vec<u8>>;

    /// Start listening for messages. Blocking for the lifetime of the adapter.
    async fn start(&self) -> Result<()>;

    /// Stop listening. Must be safe to call even if `start` never ran.
    async fn stop(&self) -> Result<()>;
}

/// The thing that actually turns user text into a reply. Usually an
/// [`crate::agent_loop::AgentLoop`] wrapped to hide its session/queue
/// plumbing behind this one method.
#[async_trait]
pub trait AgentRunner: Send + Sync {
    async fn run(&self, text: &str) -> Result<String>;
}

type SessionKey = (String, String);

/// Routes inbound messages from any number of platforms to one shared agent,
/// and outbound replies back to the originating platform.
pub struct Dispatcher {
    agent: Arc<dyn AgentRunner>,
    platforms: HashMap<String, Arc<dyn PlatformAdapter>>,
    sessions: Mutex<HashMap<SessionKey, Session>>,
    workspace: PathBuf,
}

impl Dispatcher {
    pub fn new(agent: Arc<dyn AgentRunner>, workspace: PathBuf) -> Self {
        Self { agent, platforms: HashMap::new(), sessions: Mutex::new(HashMap::new()), workspace }
    }

    /// Register a platform adapter by name.
    pub fn add_platform(&mut self, platform: Arc<dyn PlatformAdapter>) {
        let name = platform.name().to_string();
        tracing::info!(platform = %name, "added platform");
        self.platforms.insert(name, platform);
    }

    /// Deregister a platform adapter. Returns it so the caller can `stop` it
    /// outside any lock this dispatcher holds.
    pub fn remove_platform(&mut self, name: &str) -> Option<Arc<dyn PlatformAdapter>> {
        self.platforms.remove(name)
    }

    pub fn platform_names(&self) -> Vec<String> {
        self.platforms.keys().cloned().collect()
    }

    /// Handle one inbound message: log it, run the agent, log the reply,
    /// and send it back. Errors never escape into the adapter — on failure
    /// this makes a best-effort attempt to notify the channel instead.
    pub async fn handle_message(&self, message: UniversalMessage) {
        if let Err(e) = self.handle_message_inner(&message).await {
            tracing::error!(platform = %message.platform, channel = %message.channel_id, error = %e, "error handling message");

            if let Some(platform) = self.platforms.get(&message.platform) {
                let thread_id = message.is_thread.then(|| message.thread_id.clone()).flatten();
                let _ = platform.send(&message.channel_id, &format!("Error: {e}"), thread_id.as_deref()).await;
            }
        }
    }

    async fn handle_message_inner(&self, message: &UniversalMessage) -> Result<()> {
        let key = (message.platform.clone(), message.channel_id.clone());

        {
            let mut sessions = self.sessions.lock().await;
            let session = self.session_for(&mut sessions, &key);
            session.add_message("user", message.text.clone(), None, Default::default())?;
        }

        let response = self.agent.run(&message.text).await?;

        {
            let mut sessions = self.sessions.lock().await;
            let session = self.session_for(&mut sessions, &key);
            session.add_message("assistant", response.clone(), None, Default::default())?;
        }

        if let Some(platform) = self.platforms.get(&message.platform) {
            let thread_id = message.is_thread.then(|| message.thread_id.clone()).flatten();
            platform.send(&message.channel_id, &response, thread_id.as_deref()).await?;
        }

        Ok(())
    }

    fn session_for<'a>(&self, sessions: &'a mut HashMap<SessionKey, Session>, key: &SessionKey) -> &'a mut Session {
        sessions.entry(key.clone()).or_insert_with(|| {
            let name = format!("{}-{}", key.0, key.1);
            Session::new(Some(name), self.workspace.clone(), false)
        })
    }

    /// Start every registered platform.
    ///
    /// With one platform, this simply awaits its `start()`. With more than
    /// one, every adapter runs concurrently and this returns once all of
    /// them do (normally only on shutdown, since `start` is meant to block).
    pub async fn start(&self) -> Result<()> {
        if self.platforms.is_empty() {
            tracing::warn!("no platforms configured");
            return Ok(());
        }

        if self.platforms.len() == 1 {
            let platform = self.platforms.values().next().unwrap().clone();
            return platform.start().await;
        }

        let handles: Vec<_> = self
            .platforms
            .values()
            .cloned()
            .map(|platform| tokio::spawn(async move { platform.start().await }))
            .collect();

        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "platform task panicked");
            }
        }

        Ok(())
    }

    /// Stop every registered platform. Best-effort: one adapter failing to
    /// stop does not prevent the others from being asked to stop.
    pub async fn stop(&self) {
        for platform in self.platforms.values() {
            if let Err(e) = platform.stop().await {
                tracing::error!(platform = platform.name(), error = %e, "error stopping platform");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    struct EchoAgent;

    #[async_trait]
    impl AgentRunner for EchoAgent {
        async fn run(&self, text: &str) -> Result<String> {
            Ok(format!("echo: {text}"))
        }
    }

    struct FailingAgent;

    #[async_trait]
    impl AgentRunner for FailingAgent {
        async fn run(&self, _text: &str) -> Result<String> {
            Err(crate::Error::other("agent exploded"))
        }
    }

    struct RecordingPlatform {
        name: String,
        sent: Arc<Mutex<Vec<(String, String, Option<String>)>>>,
        stopped: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl PlatformAdapter for RecordingPlatform {
        fn name(&self) -> &str {
            &self.name
        }

        async fn send(&self, channel_id: &str, text: &str, thread_id: Option<&str>) -> Result<String> {
            self.sent.lock().await.push((channel_id.to_string(), text.to_string(), thread_id.map(str::to_string)));
            Ok("msg-1".to_string())
        }

        async fn upload(&self, _channel_id: &str, _file: &[u8], _caption: Option<&str>, _thread_id: Option<&str>) -> Result<String> {
            Ok("upload-1".to_string())
        }

        async fn history(&self, _channel_id: &str, _limit: usize) -> Result<Vec<UniversalMessage>> {
            Ok(Vec::new())
        }

        async fn download(&self, _attachment: &Attachment) -> Result<Vec<u8>> {
            Ok(Vec::new())
        }

        async fn start(&self) -> Result<()> {
            Ok(())
        }

        async fn stop(&self) -> Result<()> {
            self.stopped.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn sample_message(platform: &str, channel: &str, text: &str) -> UniversalMessage {
        UniversalMessage {
            id: "m1".to_string(),
            platform: platform.to_string(),
            channel_id: channel.to_string(),
            channel_name: None,
            thread_id: None,
            user_id: "u1".to_string(),
            username: "alice".to_string(),
            text: text.to_string(),
            attachments: Vec::new(),
            timestamp: chrono::Utc::now(),
            is_mention: false,
            is_dm: true,
            is_thread: false,
        }
    }

    #[tokio::test]
    async fn handle_message_logs_and_replies() {
        let dir = tempdir().unwrap();
        let sent = Arc::new(Mutex::new(Vec::new()));
        let platform = Arc::new(RecordingPlatform { name: "slack".to_string(), sent: sent.clone(), stopped: Arc::new(AtomicUsize::new(0)) });

        let mut dispatcher = Dispatcher::new(Arc::new(EchoAgent), dir.path().to_path_buf());
        dispatcher.add_platform(platform);

        dispatcher.handle_message(sample_message("slack", "general", "hi")).await;

        let sent = sent.lock().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1, "echo: hi");
    }

    #[tokio::test]
    async fn handle_message_creates_session_per_channel() {
        let dir = tempdir().unwrap();
        let platform = Arc::new(RecordingPlatform {
            name: "slack".to_string(),
            sent: Arc::new(Mutex::new(Vec::new())),
            stopped: Arc::new(AtomicUsize::new(0)),
        });

        let mut dispatcher = Dispatcher::new(Arc::new(EchoAgent), dir.path().to_path_buf());
        dispatcher.add_platform(platform);

        dispatcher.handle_message(sample_message("slack", "general", "hi")).await;
        dispatcher.handle_message(sample_message("slack", "random", "yo")).await;

        let sessions = dispatcher.sessions.lock().await;
        assert_eq!(sessions.len(), 2);
        assert!(sessions.contains_key(&("slack".to_string(), "general".to_string())));
        assert!(sessions.contains_key(&("slack".to_string(), "random".to_string())));
    }

    #[tokio::test]
    async fn agent_failure_sends_error_notice_instead_of_propagating() {
        let dir = tempdir().unwrap();
        let sent = Arc::new(Mutex::new(Vec::new()));
        let platform = Arc::new(RecordingPlatform { name: "slack".to_string(), sent: sent.clone(), stopped: Arc::new(AtomicUsize::new(0)) });

        let mut dispatcher = Dispatcher::new(Arc::new(FailingAgent), dir.path().to_path_buf());
        dispatcher.add_platform(platform);

        dispatcher.handle_message(sample_message("slack", "general", "hi")).await;

        let sent = sent.lock().await;
        assert_eq!(sent.len(), 1);
        assert!(sent[0].1.contains("agent exploded"));
    }

    #[tokio::test]
    async fn stop_stops_every_platform_even_if_one_errors() {
        let dir = tempdir().unwrap();
        let stopped_a = Arc::new(AtomicUsize::new(0));
        let stopped_b = Arc::new(AtomicUsize::new(0));

        let mut dispatcher = Dispatcher::new(Arc::new(EchoAgent), dir.path().to_path_buf());
        dispatcher.add_platform(Arc::new(RecordingPlatform { name: "a".to_string(), sent: Arc::new(Mutex::new(Vec::new())), stopped: stopped_a.clone() }));
        dispatcher.add_platform(Arc::new(RecordingPlatform { name: "b".to_string(), sent: Arc::new(Mutex::new(Vec::new())), stopped: stopped_b.clone() }));

        dispatcher.stop().await;

        assert_eq!(stopped_a.load(Ordering::SeqCst), 1);
        assert_eq!(stopped_b.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn remove_platform_drops_it_from_the_map() {
        let dir = tempdir().unwrap();
        let mut dispatcher = Dispatcher::new(Arc::new(EchoAgent), dir.path().to_path_buf());
        dispatcher.add_platform(Arc::new(RecordingPlatform {
            name: "slack".to_string(),
            sent: Arc::new(Mutex::new(Vec::new())),
            stopped: Arc::new(AtomicUsize::new(0)),
        }));

        assert_eq!(dispatcher.platform_names(), vec!["slack".to_string()]);
        dispatcher.remove_platform("slack");
        assert!(dispatcher.platform_names().is_empty());
    }
}
