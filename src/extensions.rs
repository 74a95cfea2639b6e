//! Extension surface: a registration API user-provided extensions call into
//! to add tools, slash commands, and lifecycle event handlers.
//!
//! Unlike the system this is modeled on, extensions here are not discovered
//! by scanning a directory for loadable modules at runtime — there is no
//! dynamic-load story in a compiled language, and an `inventory`-style
//! static-registration trick would hide load order behind macro magic. An
//! extension is instead a compiled [`Extension`] implementation, and the
//! embedding application builds an explicit, ordered `Vec<Box<dyn Extension>>`
//! and passes it to [`ExtensionManager::load_all`]. Load order is therefore
//! always the order the caller supplied — for directory-style manifests that
//! means the caller should sort by file name before building the vector.

use crate::tools::Tool;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Lifecycle events an extension may subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Event {
    ToolCallStart,
    ToolCallEnd,
    MessageReceived,
    ResponseGenerated,
    SessionStart,
    SessionEnd,
}

/// A slash-command handler. Runs synchronously and its return value is
/// displayed directly; it never goes through the LLM.
pub type CommandHandler = Arc<dyn Fn(Option<&str>) -> String + Send + Sync>;

/// An event handler. Errors are logged and isolated — they must never
/// propagate out of `emit`.
pub type EventHandler = Arc<dyn Fn(&Value) -> crate::Result<()> + Send + Sync>;

/// The API surface an [`Extension`] registers against.
///
/// Held behind an `Arc` so an extension can clone it into async tool
/// handlers if it needs to emit events from within a tool call.
#[derive(Default)]
pub struct ExtensionApi {
    tools: RwLock<Vec<Tool>>,
    commands: RwLock<HashMap<String, CommandDescriptor>>,
    handlers: RwLock<HashMap<Event, Vec<EventHandler>>>,
}

struct CommandDescriptor {
    handler: CommandHandler,
    description: String,
}

impl ExtensionApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Collected tools are later drained into a
    /// [`crate::registry::ToolRegistry`] by the embedding application.
    pub fn register_tool(&self, tool: Tool) {
        self.tools.write().unwrap().push(tool);
    }

    /// Register a slash-command handler under `name` (without the leading `/`).
    pub fn register_command(&self, name: impl Into<String>, description: impl Into<String>, handler: CommandHandler) {
        self.commands.write().unwrap().insert(name.into(), CommandDescriptor { handler, description: description.into() });
    }

    /// Subscribe a handler to `event`.
    pub fn on(&self, event: Event, handler: EventHandler) {
        self.handlers.write().unwrap().entry(event).or_default().push(handler);
    }

    /// Emit `event` with `data` to every subscribed handler.
    ///
    /// A handler returning `Err` is logged and skipped; it never stops the
    /// remaining handlers from running and never propagates to the caller.
    pub fn emit(&self, event: Event, data: &Value) {
        let handlers = self.handlers.read().unwrap();
        let Some(subscribers) = handlers.get(&event) else { return };
        for handler in subscribers {
            if let Err(e) = handler(data) {
                tracing::warn!(?event, error = %e, "event handler failed");
            }
        }
    }

    /// Every tool registered so far.
    pub fn tools(&self) -> Vec<Tool> {
        self.tools.read().unwrap().clone()
    }

    /// Look up and invoke a command by name. Returns `None` if unregistered.
    pub fn handle_command(&self, name: &str, args: Option<&str>) -> Option<String> {
        let commands = self.commands.read().unwrap();
        commands.get(name).map(|descriptor| (descriptor.handler)(args))
    }

    /// `(name, description)` pairs for every registered command, in
    /// registration order is not guaranteed (backed by a `HashMap`); sort at
    /// the call site if a stable listing order matters.
    pub fn command_descriptions(&self) -> Vec<(String, String)> {
        self.commands.read().unwrap().iter().map(|(name, d)| (name.clone(), d.description.clone())).collect()
    }
}

/// A compiled extension. `register` is called once, in caller-supplied
/// order, during [`ExtensionManager::load_all`].
pub trait Extension: Send + Sync {
    /// A short identifier used only for logging.
    fn name(&self) -> &str;

    /// Register this extension's tools, commands, and event handlers
    /// against `api`.
    fn register(&self, api: &ExtensionApi);
}

/// Loads a caller-supplied, ordered list of extensions against one
/// [`ExtensionApi`].
pub struct ExtensionManager {
    api: Arc<ExtensionApi>,
    loaded: Vec<String>,
}

impl ExtensionManager {
    pub fn new(api: Arc<ExtensionApi>) -> Self {
        Self { api, loaded: Vec::new() }
    }

    pub fn api(&self) -> &Arc<ExtensionApi> {
        &self.api
    }

    /// Register every extension in `extensions`, in the order given.
    ///
    /// A panicking `register` would poison the whole load; extensions are
    /// expected to do registration only (no I/O, no fallible setup) inside
    /// `register`, matching the reference implementation's contract.
    pub fn load_all(&mut self, extensions: &[Box<dyn Extension>]) {
        for extension in extensions {
            tracing::debug!(extension = extension.name(), "loading extension");
            extension.register(&self.api);
            self.loaded.push(extension.name().to_string());
        }
    }

    /// Names of every extension loaded so far, in load order.
    pub fn loaded(&self) -> &[String] {
        &self.loaded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingExtension {
        name: String,
        counter: Arc<AtomicUsize>,
    }

    impl Extension for CountingExtension {
        fn name(&self) -> &str {
            &self.name
        }

        fn register(&self, api: &ExtensionApi) {
            let counter_for_on = self.counter.clone();
            api.on(
                Event::ToolCallStart,
                Arc::new(move |_data| {
                    counter_for_on.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }),
            );
        }
    }

    #[test]
    fn register_tool_accumulates_tools() {
        let api = ExtensionApi::new();
        api.register_tool(Tool::new("echo", "echo", json!({}), |args| async move { Ok(args) }));
        assert_eq!(api.tools().len(), 1);
    }

    #[test]
    fn register_and_handle_command() {
        let api = ExtensionApi::new();
        api.register_command(
            "stats",
            "show stats",
            Arc::new(|_args| "Statistics...".to_string()),
        );

        let result = api.handle_command("stats", None);
        assert_eq!(result.as_deref(), Some("Statistics..."));
    }

    #[test]
    fn unknown_command_returns_none() {
        let api = ExtensionApi::new();
        assert!(api.handle_command("nope", None).is_none());
    }

    #[test]
    fn emit_calls_every_subscribed_handler() {
        let api = ExtensionApi::new();
        let calls = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let calls = calls.clone();
            api.on(Event::SessionStart, Arc::new(move |_data| {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }));
        }

        api.emit(Event::SessionStart, &json!({}));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn emit_isolates_a_failing_handler_from_the_rest() {
        let api = ExtensionApi::new();
        let calls = Arc::new(AtomicUsize::new(0));

        api.on(Event::ToolCallEnd, Arc::new(|_data| Err(crate::Error::other("boom"))));
        let calls_clone = calls.clone();
        api.on(
            Event::ToolCallEnd,
            Arc::new(move |_data| {
                calls_clone.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
        );

        api.emit(Event::ToolCallEnd, &json!({}));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn emit_on_event_with_no_subscribers_is_a_noop() {
        let api = ExtensionApi::new();
        api.emit(Event::MessageReceived, &json!({}));
    }

    #[test]
    fn load_all_registers_in_caller_supplied_order() {
        let api = Arc::new(ExtensionApi::new());
        let counter = Arc::new(AtomicUsize::new(0));
        let mut manager = ExtensionManager::new(api);

        let extensions: Vec<Box<dyn Extension>> = vec![
            Box::new(CountingExtension { name: "first".to_string(), counter: counter.clone() }),
            Box::new(CountingExtension { name: "second".to_string(), counter: counter.clone() }),
        ];

        manager.load_all(&extensions);

        assert_eq!(manager.loaded(), &["first".to_string(), "second".to_string()]);
    }
}
