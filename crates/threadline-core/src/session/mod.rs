//! Conversation sessions, shareable across UI surfaces.
//!
//! Open the same conversation in the main page and a side panel and both
//! views converge after every mutation.

mod registry;
mod state;

pub use registry::{SessionRegistry, SharedSessionRegistry};
pub use state::{
    ConversationId, ConversationSession, InstanceId, Message, MessageId, MessagePatch,
    MessageRole,
};
