//! File attachment intake and upload.
//!
//! Files picked by the user are classified, validated against the upload
//! policy, admitted into a queue with a preview handle, and driven through
//! the upload service one at a time with per-item status tracking.

mod classifier;
mod preview;
mod queue;
mod service;

pub use classifier::{classify, classify_with_name, AttachmentKind, UploadPolicy};
pub use preview::{MemoryPreviewStore, PreviewStore};
pub use queue::{AttachmentCounts, PendingUpload, UploadError, UploadId, UploadQueue, UploadStatus};
pub use service::{FilePayload, RemoteAttachment, UploadScope, UploadService};
