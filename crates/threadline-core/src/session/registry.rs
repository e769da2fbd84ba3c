//! SessionRegistry - keeps every view of a conversation consistent.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::state::{ConversationId, ConversationSession, InstanceId, Message, MessageId, MessagePatch};
use crate::events::{ChangeEvent, EventBus};

/// Shared handle for embedding one registry behind several surfaces.
pub type SharedSessionRegistry = Arc<Mutex<SessionRegistry>>;

/// Owns every open conversation view, keyed by instance id.
///
/// Content mutations (messages, streaming flag, error) targeting one
/// instance are propagated to every other instance bound to the same
/// conversation, so all open views of a conversation converge after each
/// call. Binding changes and clears stay local to their instance.
///
/// No operation fails: addressing an unknown instance id materializes a
/// default session first, so callers never need a separate "create" step
/// before mutating a view.
pub struct SessionRegistry {
    sessions: HashMap<InstanceId, ConversationSession>,
    events: EventBus,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: HashMap::new(),
            events: EventBus::new(),
        }
    }

    /// Get a copy of the session for `instance`, or a default session if
    /// none exists yet. Never mutates the registry.
    pub fn session(&self, instance: &InstanceId) -> ConversationSession {
        self.sessions.get(instance).cloned().unwrap_or_default()
    }

    /// Replace the message list of `instance` and its conversation group.
    pub fn set_messages(&mut self, instance: &InstanceId, messages: Vec<Message>) {
        self.apply_to_group(instance, |session| session.messages = messages.clone());
    }

    /// Append messages to `instance` and its conversation group.
    pub fn add_messages(&mut self, instance: &InstanceId, messages: Vec<Message>) {
        self.apply_to_group(instance, |session| {
            session.messages.extend(messages.iter().cloned())
        });
    }

    /// Patch a single message in `instance` and its conversation group.
    /// Unknown message ids leave the sessions unchanged.
    pub fn update_message(&mut self, instance: &InstanceId, message: &MessageId, patch: MessagePatch) {
        self.apply_to_group(instance, |session| {
            if let Some(target) = session.messages.iter_mut().find(|m| &m.id == message) {
                patch.apply(target);
            }
        });
    }

    /// Remove a message from `instance` and its conversation group.
    pub fn remove_message(&mut self, instance: &InstanceId, message: &MessageId) {
        self.apply_to_group(instance, |session| {
            session.messages.retain(|m| &m.id != message)
        });
    }

    /// Set the streaming flag on `instance` and its conversation group.
    pub fn set_streaming(&mut self, instance: &InstanceId, is_streaming: bool) {
        self.apply_to_group(instance, |session| session.is_streaming = is_streaming);
    }

    /// Record (or clear) an error on `instance` and its conversation group.
    pub fn set_error(&mut self, instance: &InstanceId, error: Option<String>) {
        self.apply_to_group(instance, |session| session.error = error.clone());
    }

    /// Rebind `instance` to a conversation (or unbind with `None`).
    ///
    /// Local to the target: rebinding establishes or breaks group
    /// membership for subsequent content mutations and copies no state
    /// between views.
    pub fn set_conversation_id(&mut self, instance: &InstanceId, conversation: Option<ConversationId>) {
        self.sessions
            .entry(instance.clone())
            .or_default()
            .conversation_id = conversation;
        self.events.emit(ChangeEvent::SessionChanged {
            instances: vec![instance.clone()],
        });
    }

    /// Reset exactly `instance` to the default session. Other views of
    /// the same conversation are untouched.
    pub fn clear_session(&mut self, instance: &InstanceId) {
        self.sessions
            .insert(instance.clone(), ConversationSession::default());
        self.events.emit(ChangeEvent::SessionChanged {
            instances: vec![instance.clone()],
        });
    }

    /// Force-set the message list on every view bound to `conversation`.
    ///
    /// Called when a conversation is reloaded from storage into one view
    /// and every other open view of it must refresh. A conversation with
    /// zero bound views is a no-op.
    pub fn sync_conversation(&mut self, conversation: &ConversationId, messages: Vec<Message>) {
        let mut next = self.sessions.clone();
        let mut touched = Vec::new();

        for (id, session) in next.iter_mut() {
            if session.is_bound_to(conversation) {
                session.messages = messages.clone();
                touched.push(id.clone());
            }
        }

        if touched.is_empty() {
            return;
        }

        log::debug!(
            "synced conversation {} into {} view(s)",
            conversation,
            touched.len()
        );
        self.sessions = next;
        self.events.emit(ChangeEvent::SessionChanged { instances: touched });
    }

    /// Drop a view entirely (e.g. its surface closed).
    pub fn remove_session(&mut self, instance: &InstanceId) -> Option<ConversationSession> {
        let removed = self.sessions.remove(instance);
        if removed.is_some() {
            self.events.emit(ChangeEvent::SessionChanged {
                instances: vec![instance.clone()],
            });
        }
        removed
    }

    /// List all known instance ids.
    pub fn instances(&self) -> Vec<InstanceId> {
        self.sessions.keys().cloned().collect()
    }

    /// List the instances currently bound to `conversation`.
    pub fn instances_for(&self, conversation: &ConversationId) -> Vec<InstanceId> {
        self.sessions
            .iter()
            .filter(|(_, session)| session.is_bound_to(conversation))
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Subscribe to change notifications from this registry.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<ChangeEvent> {
        self.events.subscribe()
    }

    /// Apply `mutate` to the target view and to every other view bound to
    /// the target's conversation.
    ///
    /// The update is computed on a snapshot and installed in a single
    /// assignment, so an observer holding a previous clone of any session
    /// never sees a group half-updated. Resolution order: materialize the
    /// target (default if absent), read its binding, then fan out to the
    /// bound group - views bound to a different or null conversation are
    /// untouched.
    fn apply_to_group<F>(&mut self, instance: &InstanceId, mutate: F)
    where
        F: Fn(&mut ConversationSession),
    {
        let mut next = self.sessions.clone();

        let target = next.entry(instance.clone()).or_default();
        let group = target.conversation_id.clone();
        mutate(target);

        let mut touched = vec![instance.clone()];
        if let Some(group) = group {
            for (id, session) in next.iter_mut() {
                if id != instance && session.is_bound_to(&group) {
                    mutate(session);
                    touched.push(id.clone());
                }
            }
            if touched.len() > 1 {
                log::debug!(
                    "propagated mutation on {} to {} other view(s) of {}",
                    instance,
                    touched.len() - 1,
                    group
                );
            }
        }

        self.sessions = next;
        self.events.emit(ChangeEvent::SessionChanged { instances: touched });
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
