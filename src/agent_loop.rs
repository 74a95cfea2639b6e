//! The agent loop: drives LLM -> tool -> LLM cycles against a registry,
//! honoring a steering/follow-up queue and persisting every entry to a
//! session tree.
//!
//! Follow-up chaining is implemented with an explicit work queue rather
//! than literal recursion, so a long chain of follow-ups never grows the
//! call stack.

use crate::provider::{CompletionRequest, LlmProvider, Message as ProviderMessage, Response, ToolCall, Usage};
use crate::queue::MessageQueue;
use crate::registry::ToolRegistry;
use crate::session::Session;
use crate::Result;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Observer invoked around tool execution. Errors are logged and isolated;
/// they never abort the turn.
pub type ToolObserver = Arc<dyn Fn(&str, &Value) -> Result<()> + Send + Sync>;

/// Tunables for one [`AgentLoop`].
#[derive(Clone)]
pub struct AgentLoopConfig {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    /// Iteration ceiling per `run` invocation. A follow-up gets a fresh budget.
    pub max_iterations: usize,
}

impl Default for AgentLoopConfig {
    fn default() -> Self {
        Self { model: String::new(), temperature: 0.7, max_tokens: None, max_iterations: 10 }
    }
}

/// Orchestrates a provider, a tool registry, a message queue, and a session
/// across one or more chained turns.
pub struct AgentLoop {
    provider: Arc<dyn LlmProvider>,
    registry: Arc<ToolRegistry>,
    queue: Arc<Mutex<MessageQueue>>,
    session: Session,
    history: Vec<ProviderMessage>,
    config: AgentLoopConfig,
    on_tool_start: Option<ToolObserver>,
    on_tool_end: Option<ToolObserver>,
}

impl AgentLoop {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        registry: Arc<ToolRegistry>,
        queue: Arc<Mutex<MessageQueue>>,
        session: Session,
        config: AgentLoopConfig,
    ) -> Self {
        Self {
            provider,
            registry,
            queue,
            session,
            history: Vec::new(),
            config,
            on_tool_start: None,
            on_tool_end: None,
        }
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.history.push(ProviderMessage::system(system_prompt));
        self
    }

    pub fn on_tool_start(mut self, observer: ToolObserver) -> Self {
        self.on_tool_start = Some(observer);
        self
    }

    pub fn on_tool_end(mut self, observer: ToolObserver) -> Self {
        self.on_tool_end = Some(observer);
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    pub fn history(&self) -> &[ProviderMessage] {
        &self.history
    }

    /// Run a turn to completion, chaining through any queued follow-ups.
    ///
    /// Returns the response for the *last* turn in the chain.
    pub async fn run(&mut self, user_text: impl Into<String>, check_queue: bool) -> Result<Response> {
        let mut pending: VecDeque<String> = VecDeque::new();
        pending.push_back(user_text.into());

        let mut last_response = None;

        while let Some(next) = pending.pop_front() {
            let response = self.run_turn(&next, check_queue).await?;

            if check_queue {
                let followup = {
                    let mut queue = self.queue.lock().await;
                    if queue.has_followup() {
                        queue.take_followup().into_iter().next()
                    } else {
                        None
                    }
                };
                if let Some(followup) = followup {
                    pending.push_back(followup.content);
                }
            }

            last_response = Some(response);
        }

        Ok(last_response.expect("pending always starts with one item"))
    }

    /// One `Idle -> AwaitingModel -> (ToolBatch -> AwaitingModel)* -> Complete` cycle.
    async fn run_turn(&mut self, user_text: &str, check_queue: bool) -> Result<Response> {
        self.append("user", user_text, None)?;

        let mut iteration = 0usize;
        loop {
            if iteration >= self.config.max_iterations {
                let content = "Maximum iterations reached without completion.";
                self.append("assistant", content, None)?;
                return Ok(Response {
                    content: content.to_string(),
                    model: self.config.model.clone(),
                    usage: Usage::default(),
                    finish_reason: Some("max_iterations".to_string()),
                    tool_calls: Vec::new(),
                });
            }

            let schemas = self.registry.list_schemas().await;
            let request = CompletionRequest {
                messages: self.history.clone(),
                model: self.config.model.clone(),
                temperature: self.config.temperature,
                max_tokens: self.config.max_tokens,
                tool_schemas: schemas,
            };

            let response = self.provider.complete(request).await?;

            if response.tool_calls.is_empty() {
                self.append("assistant", &response.content, None)?;
                return Ok(response);
            }

            self.run_tool_batch(&response).await?;

            if check_queue {
                let steering = {
                    let mut queue = self.queue.lock().await;
                    if queue.has_steering() { queue.take_steering() } else { Vec::new() }
                };
                for msg in steering {
                    self.append("user", &msg.content, None)?;
                }
            }

            iteration += 1;
        }
    }

    async fn run_tool_batch(&mut self, response: &Response) -> Result<()> {
        self.history.push(ProviderMessage::assistant_with_tool_calls(
            response.content.clone(),
            response.tool_calls.clone(),
        ));
        let mut metadata = serde_json::Map::new();
        metadata.insert(
            "tool_calls".to_string(),
            serde_json::to_value(&response.tool_calls).unwrap_or(Value::Null),
        );
        self.session.add_message("assistant", response.content.clone(), None, metadata)?;

        for tool_call in &response.tool_calls {
            self.execute_one_tool_call(tool_call).await?;
        }

        Ok(())
    }

    async fn execute_one_tool_call(&mut self, tool_call: &ToolCall) -> Result<()> {
        let args: Value = serde_json::from_str(&tool_call.arguments).unwrap_or_else(|_| serde_json::json!({}));

        if let Some(observer) = &self.on_tool_start {
            if let Err(e) = observer(&tool_call.name, &args) {
                tracing::warn!(tool = %tool_call.name, error = %e, "on_tool_start observer failed");
            }
        }

        let result = self.registry.execute(&tool_call.name, args).await;
        let content = match &result {
            Ok(value) => value.to_string(),
            Err(e) => format!("Error: {e}"),
        };

        self.history.push(ProviderMessage::tool(&tool_call.id, &tool_call.name, &content));

        let mut metadata = serde_json::Map::new();
        metadata.insert("tool_call_id".to_string(), Value::String(tool_call.id.clone()));
        metadata.insert("name".to_string(), Value::String(tool_call.name.clone()));
        self.session.add_message("tool", content, None, metadata)?;

        if let Some(observer) = &self.on_tool_end {
            let observed = result.unwrap_or(Value::Null);
            if let Err(e) = observer(&tool_call.name, &observed) {
                tracing::warn!(tool = %tool_call.name, error = %e, "on_tool_end observer failed");
            }
        }

        Ok(())
    }

    fn append(&mut self, role: &str, content: &str, parent: Option<&str>) -> Result<()> {
        self.history.push(ProviderMessage { role: role.to_string(), content: content.to_string(), tool_call_id: None, name: None, tool_calls: None });
        self.session.add_message(role, content, parent, serde_json::Map::new())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{ChunkStream, StreamChunk};
    use crate::tools::Tool;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    struct ScriptedProvider {
        responses: Mutex<VecDeque<Response>>,
    }

    impl ScriptedProvider {
        fn new(responses: Vec<Response>) -> Self {
            Self { responses: Mutex::new(responses.into()) }
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        async fn complete(&self, _request: CompletionRequest) -> Result<Response> {
            Ok(self.responses.lock().await.pop_front().expect("scripted response available"))
        }

        async fn stream(&self, _request: CompletionRequest) -> Result<ChunkStream> {
            let chunk =
                StreamChunk { content: String::new(), finish_reason: Some("stop".to_string()), tool_calls: Vec::new() };
            Ok(Box::pin(futures::stream::iter(vec![Ok(chunk)])))
        }
    }

    fn new_session() -> Session {
        let dir = tempdir().unwrap();
        Session::new(Some("test".to_string()), dir.path().to_path_buf(), false)
    }

    fn text_response(content: &str) -> Response {
        Response {
            content: content.to_string(),
            model: "test-model".to_string(),
            usage: Usage::default(),
            finish_reason: Some("stop".to_string()),
            tool_calls: Vec::new(),
        }
    }

    fn tool_call_response(name: &str, args: &str) -> Response {
        Response {
            content: String::new(),
            model: "test-model".to_string(),
            usage: Usage::default(),
            finish_reason: Some("tool_calls".to_string()),
            tool_calls: vec![ToolCall { id: "call_1".to_string(), name: name.to_string(), arguments: args.to_string() }],
        }
    }

    #[tokio::test]
    async fn run_with_no_tool_calls_returns_text_response() {
        let provider: Arc<dyn LlmProvider> = Arc::new(ScriptedProvider::new(vec![text_response("hello")]));
        let registry = ToolRegistry::shared();
        let queue = Arc::new(Mutex::new(MessageQueue::new()));

        let mut agent_loop = AgentLoop::new(provider, registry, queue, new_session(), AgentLoopConfig::default());
        let response = agent_loop.run("hi", true).await.unwrap();

        assert_eq!(response.content, "hello");
        assert_eq!(agent_loop.session().tree.len(), 2);
    }

    #[tokio::test]
    async fn tool_call_is_executed_and_result_appended() {
        let registry = ToolRegistry::shared();
        registry
            .register(Tool::new("add", "add two numbers", json!({}), |args| async move {
                let a = args["a"].as_f64().unwrap_or(0.0);
                let b = args["b"].as_f64().unwrap_or(0.0);
                Ok(json!({"result": a + b}))
            }))
            .await;

        let provider: Arc<dyn LlmProvider> = Arc::new(ScriptedProvider::new(vec![
            tool_call_response("add", r#"{"a":2,"b":3}"#),
            text_response("the answer is 5"),
        ]));
        let queue = Arc::new(Mutex::new(MessageQueue::new()));

        let mut agent_loop = AgentLoop::new(provider, registry, queue, new_session(), AgentLoopConfig::default());
        let response = agent_loop.run("what is 2+3?", true).await.unwrap();

        assert_eq!(response.content, "the answer is 5");
        // user, assistant(tool_calls), tool, assistant = 4 entries
        assert_eq!(agent_loop.session().tree.len(), 4);
    }

    #[tokio::test]
    async fn failing_tool_surfaces_as_tool_message_not_abort() {
        let registry = ToolRegistry::shared();
        registry
            .register(Tool::new("fail", "always fails", json!({}), |_| async move {
                Err(crate::Error::tool("boom"))
            }))
            .await;

        let provider: Arc<dyn LlmProvider> = Arc::new(ScriptedProvider::new(vec![
            tool_call_response("fail", "{}"),
            text_response("recovered"),
        ]));
        let queue = Arc::new(Mutex::new(MessageQueue::new()));

        let mut agent_loop = AgentLoop::new(provider, registry, queue, new_session(), AgentLoopConfig::default());
        let response = agent_loop.run("try it", true).await.unwrap();

        assert_eq!(response.content, "recovered");
        let tool_entry = agent_loop
            .history()
            .iter()
            .find(|m| m.role == "tool")
            .expect("tool message present");
        assert!(tool_entry.content.starts_with("Error:"));
    }

    #[tokio::test]
    async fn max_iterations_reached_returns_fixed_message() {
        let registry = ToolRegistry::shared();
        registry
            .register(Tool::new("loop", "loops forever", json!({}), |_| async move { Ok(json!({})) }))
            .await;

        let responses = (0..5).map(|_| tool_call_response("loop", "{}")).collect();
        let provider: Arc<dyn LlmProvider> = Arc::new(ScriptedProvider::new(responses));
        let queue = Arc::new(Mutex::new(MessageQueue::new()));

        let config = AgentLoopConfig { max_iterations: 2, ..AgentLoopConfig::default() };
        let mut agent_loop = AgentLoop::new(provider, registry, queue, new_session(), config);
        let response = agent_loop.run("go", true).await.unwrap();

        assert_eq!(response.content, "Maximum iterations reached without completion.");
    }

    #[tokio::test]
    async fn steering_message_drained_between_iterations() {
        let registry = ToolRegistry::shared();
        registry
            .register(Tool::new("noop", "no-op", json!({}), |_| async move { Ok(json!({})) }))
            .await;

        let provider: Arc<dyn LlmProvider> = Arc::new(ScriptedProvider::new(vec![
            tool_call_response("noop", "{}"),
            text_response("done"),
        ]));
        let queue = Arc::new(Mutex::new(MessageQueue::new()));
        queue.lock().await.add_steering("redirect please");

        let mut agent_loop = AgentLoop::new(provider, registry, queue, new_session(), AgentLoopConfig::default());
        agent_loop.run("go", true).await.unwrap();

        let steering_entry = agent_loop
            .history()
            .iter()
            .find(|m| m.role == "user" && m.content == "redirect please");
        assert!(steering_entry.is_some());
    }

    #[tokio::test]
    async fn followup_is_chained_as_next_turn_with_fresh_budget() {
        let provider: Arc<dyn LlmProvider> = Arc::new(ScriptedProvider::new(vec![
            text_response("first done"),
            text_response("second done"),
        ]));
        let registry = ToolRegistry::shared();
        let queue = Arc::new(Mutex::new(MessageQueue::new()));
        queue.lock().await.add_followup("and then what?");

        let mut agent_loop = AgentLoop::new(provider, registry, queue, new_session(), AgentLoopConfig::default());
        let response = agent_loop.run("first question", true).await.unwrap();

        assert_eq!(response.content, "second done");
        let user_messages: Vec<_> = agent_loop.history().iter().filter(|m| m.role == "user").collect();
        assert_eq!(user_messages.len(), 2);
        assert_eq!(user_messages[1].content, "and then what?");
    }

    #[tokio::test]
    async fn observer_error_is_isolated_and_does_not_abort_turn() {
        let registry = ToolRegistry::shared();
        registry
            .register(Tool::new("noop", "no-op", json!({}), |_| async move { Ok(json!({})) }))
            .await;

        let provider: Arc<dyn LlmProvider> = Arc::new(ScriptedProvider::new(vec![
            tool_call_response("noop", "{}"),
            text_response("done"),
        ]));
        let queue = Arc::new(Mutex::new(MessageQueue::new()));

        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        let observer: ToolObserver = Arc::new(move |_name, _args| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
            Err(crate::Error::other("observer blew up"))
        });

        let mut agent_loop = AgentLoop::new(provider, registry, queue, new_session(), AgentLoopConfig::default())
            .on_tool_start(observer);
        let response = agent_loop.run("go", true).await.unwrap();

        assert_eq!(response.content, "done");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
