//! Framework-agnostic change notification.
//!
//! The [`EventBus`] distributes [`ChangeEvent`]s to any number of
//! presentation surfaces (desktop IPC, WebSocket clients, tests) from a
//! single source. Subscribing is optional; with no subscribers events are
//! dropped.
//!
//! # Example
//!
//! ```rust
//! use threadline_core::events::{ChangeEvent, EventBus};
//! use threadline_core::session::InstanceId;
//!
//! let event_bus = EventBus::new();
//!
//! // Subscribe to events
//! let mut rx = event_bus.subscribe();
//!
//! // Emit an event
//! event_bus.emit(ChangeEvent::SessionChanged {
//!     instances: vec![InstanceId::from("page")],
//! });
//!
//! // Receive the event (in async context)
//! // let event = rx.recv().await.unwrap();
//! ```

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::session::InstanceId;
use crate::uploads::{UploadId, UploadStatus};

/// Default channel capacity for the event bus.
/// Slow subscribers that fall further behind than this miss events (lag).
const DEFAULT_CAPACITY: usize = 256;

/// A state change worth re-rendering for.
///
/// Events carry ids, not state - subscribers read the current state back
/// through the registry/queue accessors.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ChangeEvent {
    /// One or more session views changed (content, streaming flag, error,
    /// binding, or clear). Lists every instance that was touched.
    SessionChanged { instances: Vec<InstanceId> },

    /// Queue membership changed: files admitted, removed, or cleared.
    UploadsChanged { ids: Vec<UploadId> },

    /// A single queued upload moved through its lifecycle.
    UploadStatusChanged { id: UploadId, status: UploadStatus },
}

/// Broadcasts [`ChangeEvent`]s to multiple subscribers.
///
/// Wraps a tokio broadcast channel, so every subscriber receives every
/// event emitted after it subscribed.
pub struct EventBus {
    sender: broadcast::Sender<ChangeEvent>,
}

impl EventBus {
    /// Create a new EventBus with default capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a new EventBus with specified capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Emit an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event; with no
    /// subscribers the event is dropped and 0 is returned.
    pub fn emit(&self, event: ChangeEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    /// Subscribe to all future events on this bus.
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.sender.subscribe()
    }

    /// Get the current number of subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
