//! # threadline-core
//!
//! Client-side state for Threadline, the team chat frontend.
//!
//! This crate is framework-agnostic and can be used by:
//! - Desktop app (via commands)
//! - Web frontend (via WASM bindings)
//! - Integration tests (directly)
//!
//! ## Key Concepts
//!
//! - **Session**: one UI surface's view of a conversation; any number of
//!   surfaces can mirror the same conversation and stay consistent
//! - **Upload queue**: files selected by the user, validated and driven
//!   through upload with per-item status tracking
//! - **ChangeEvent**: notification feed so presentation layers can react
//!   to state changes without polling

pub mod events;
pub mod session;
pub mod uploads;

// Re-export commonly used types
pub use events::{ChangeEvent, EventBus};
pub use session::{
    ConversationId, ConversationSession, InstanceId, Message, MessageId, MessagePatch,
    MessageRole, SessionRegistry, SharedSessionRegistry,
};
pub use uploads::{
    AttachmentCounts, AttachmentKind, FilePayload, MemoryPreviewStore, PendingUpload,
    PreviewStore, RemoteAttachment, UploadError, UploadId, UploadPolicy, UploadQueue,
    UploadScope, UploadService, UploadStatus,
};
