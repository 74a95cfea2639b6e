//! Error taxonomy for the agent runtime.
//!
//! Each variant corresponds to one of the propagation policies described by the
//! runtime's error handling design: [`Error::Config`] and [`Error::Provider`] are
//! fatal for the turn (and, for `Config`, typically for the process); [`Error::Tool`]
//! is always converted to a tool message by the agent loop and never escapes it;
//! [`Error::Session`] propagates but is recoverable (the caller may keep running
//! in-memory); [`Error::Dispatcher`] is caught at the bot dispatcher boundary and
//! never reaches the platform adapter.

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the runtime.
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP request error
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// API error from the model server
    #[error("API error: {0}")]
    Api(String),

    /// Streaming error
    #[error("Streaming error: {0}")]
    Stream(String),

    /// Transport failure, rate limiting, or malformed response from an LLM provider.
    ///
    /// Propagates out of the agent loop; the in-flight turn aborts but the session
    /// remains consistent because appends are strictly ordered.
    #[error("Provider error: {0}")]
    Provider(String),

    /// Lookup by provider name found no registered factory.
    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    /// Tool execution error
    #[error("Tool execution error: {0}")]
    Tool(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Session persistence or corruption failure.
    ///
    /// Propagates out of the session store, but an agent loop that receives one
    /// from an autosave MAY log a warning and keep running in memory.
    #[error("Session error: {0}")]
    Session(String),

    /// Adapter-level failure at the bot dispatcher boundary.
    ///
    /// Caught by the dispatcher itself; never reaches the originating adapter.
    #[error("Dispatcher error: {0}")]
    Dispatcher(String),

    /// Timeout error
    #[error("Request timeout")]
    Timeout,

    /// Other errors
    #[error("Error: {0}")]
    Other(String),
}

impl Error {
    /// Create a new config error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create a new API error
    pub fn api(msg: impl Into<String>) -> Self {
        Error::Api(msg.into())
    }

    /// Create a new stream error
    pub fn stream(msg: impl Into<String>) -> Self {
        Error::Stream(msg.into())
    }

    /// Create a new provider error
    pub fn provider(msg: impl Into<String>) -> Self {
        Error::Provider(msg.into())
    }

    /// Create a new unknown-provider error
    pub fn unknown_provider(name: impl Into<String>) -> Self {
        Error::UnknownProvider(name.into())
    }

    /// Create a new tool error
    pub fn tool(msg: impl Into<String>) -> Self {
        Error::Tool(msg.into())
    }

    /// Create a new invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Error::InvalidInput(msg.into())
    }

    /// Create a new session error
    pub fn session(msg: impl Into<String>) -> Self {
        Error::Session(msg.into())
    }

    /// Create a new dispatcher error
    pub fn dispatcher(msg: impl Into<String>) -> Self {
        Error::Dispatcher(msg.into())
    }

    /// Create a new other error
    pub fn other(msg: impl Into<String>) -> Self {
        Error::Other(msg.into())
    }

    /// Create a timeout error
    pub fn timeout() -> Self {
        Error::Timeout
    }
}
