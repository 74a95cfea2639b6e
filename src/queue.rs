//! Two-class message queue for steering and follow-up input.
//!
//! While the agent loop is mid-turn, callers may want to redirect it (a
//! *steering* message, drained between tool batches) or queue up the next
//! thing to ask once the current turn finishes cleanly (a *follow-up*
//! message, drained only after a tool-free response). This module keeps the
//! two classes in separate FIFOs behind one queue object so the agent loop
//! never has to reason about ordering between them itself.
//!
//! # Examples
//!
//! ```
//! use agent_runtime::{MessageQueue, DrainMode};
//!
//! let mut queue = MessageQueue::new();
//! queue.add_steering("stop and summarize");
//! queue.add_followup("what about tomorrow?");
//!
//! assert!(queue.has_steering());
//! let drained = queue.take_steering();
//! assert_eq!(drained.len(), 1);
//! assert!(!queue.has_steering());
//! assert!(queue.has_followup());
//! # let _ = DrainMode::All;
//! ```

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Which FIFO a [`QueuedMessage`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageClass {
    /// Drained between tool batches, interrupting the loop at the next safe point.
    Steering,
    /// Drained only after a tool-free response, chained as the next turn.
    Followup,
}

/// How a `take_*` call drains its FIFO.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DrainMode {
    /// Remove and return only the head of the FIFO. Default.
    #[default]
    OneAtATime,
    /// Remove and return the entire FIFO.
    All,
}

/// A single queued message with its class and arrival time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedMessage {
    /// The message text.
    pub content: String,
    /// Which FIFO this message was enqueued into.
    pub class: MessageClass,
    /// When the message was enqueued.
    pub enqueued_at: chrono::DateTime<chrono::Utc>,
}

impl QueuedMessage {
    fn new(content: impl Into<String>, class: MessageClass) -> Self {
        Self {
            content: content.into(),
            class,
            enqueued_at: chrono::Utc::now(),
        }
    }
}

/// Two ordered FIFOs — steering and follow-up — behind one queue object.
///
/// All operations lock the same internal state briefly and return; none of
/// them block on I/O, so the queue is safe to share between an enqueuing
/// thread (e.g. a CLI input reader) and the agent loop's dequeuing thread via
/// `Arc<tokio::sync::Mutex<MessageQueue>>` or a plain `Mutex` if the embedder
/// is synchronous.
#[derive(Debug, Default)]
pub struct MessageQueue {
    steering: VecDeque<QueuedMessage>,
    followup: VecDeque<QueuedMessage>,
    steering_mode: DrainMode,
    followup_mode: DrainMode,
}

impl MessageQueue {
    /// Create an empty queue with the default `one-at-a-time` drain mode for both classes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a queue with explicit drain modes for each class.
    pub fn with_modes(steering_mode: DrainMode, followup_mode: DrainMode) -> Self {
        Self {
            steering_mode,
            followup_mode,
            ..Self::default()
        }
    }

    /// Append a steering message.
    pub fn add_steering(&mut self, content: impl Into<String>) {
        self.steering.push_back(QueuedMessage::new(content, MessageClass::Steering));
    }

    /// Append a follow-up message.
    pub fn add_followup(&mut self, content: impl Into<String>) {
        self.followup.push_back(QueuedMessage::new(content, MessageClass::Followup));
    }

    /// Remove and return steering messages per the configured drain mode.
    ///
    /// Leaves the follow-up FIFO untouched.
    pub fn take_steering(&mut self) -> Vec<QueuedMessage> {
        Self::drain(&mut self.steering, self.steering_mode)
    }

    /// Remove and return follow-up messages per the configured drain mode.
    ///
    /// Leaves the steering FIFO untouched.
    pub fn take_followup(&mut self) -> Vec<QueuedMessage> {
        Self::drain(&mut self.followup, self.followup_mode)
    }

    fn drain(fifo: &mut VecDeque<QueuedMessage>, mode: DrainMode) -> Vec<QueuedMessage> {
        if fifo.is_empty() {
            return Vec::new();
        }
        match mode {
            DrainMode::All => std::mem::take(fifo).into(),
            DrainMode::OneAtATime => vec![fifo.pop_front().expect("checked non-empty above")],
        }
    }

    /// `true` if any steering message is queued.
    pub fn has_steering(&self) -> bool {
        !self.steering.is_empty()
    }

    /// `true` if any follow-up message is queued.
    pub fn has_followup(&self) -> bool {
        !self.followup.is_empty()
    }

    /// Human-readable summary, e.g. `"Queued: 2 steering, 1 follow-up"`.
    pub fn status(&self) -> String {
        if self.steering.is_empty() && self.followup.is_empty() {
            return "Queue empty".to_string();
        }

        let mut parts = Vec::new();
        if !self.steering.is_empty() {
            parts.push(format!("{} steering", self.steering.len()));
        }
        if !self.followup.is_empty() {
            parts.push(format!("{} follow-up", self.followup.len()));
        }
        format!("Queued: {}", parts.join(", "))
    }

    /// Empty both FIFOs, returning everything that was drained (steering first).
    pub fn clear(&mut self) -> Vec<QueuedMessage> {
        let mut drained: Vec<QueuedMessage> = std::mem::take(&mut self.steering).into();
        drained.extend(std::mem::take(&mut self.followup));
        drained
    }

    /// Total number of queued messages across both classes.
    pub fn len(&self) -> usize {
        self.steering.len() + self.followup.len()
    }

    /// `true` if neither FIFO holds any message.
    pub fn is_empty(&self) -> bool {
        self.steering.is_empty() && self.followup.is_empty()
    }
}
