//! Attachment classification and upload policy.
//!
//! Pure MIME-type mapping; the queue consults it before admission.

use serde::{Deserialize, Serialize};

const MIB: u64 = 1024 * 1024;

/// Non-image MIME types accepted as document attachments.
const DOCUMENT_TYPES: &[&str] = &[
    "application/pdf",
    "text/plain",
    "text/markdown",
    "text/csv",
    "application/json",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/vnd.ms-excel",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
];

/// Category of an admitted attachment; fixed at admission time and
/// decides the size ceiling and availability policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AttachmentKind {
    Image,
    Document,
}

/// Map a MIME type to an attachment category.
///
/// Any `image/*` type is an image; a fixed set of document types is a
/// document; everything else is unsupported (`None`). Parameters after a
/// `;` are ignored, comparison is case-insensitive.
pub fn classify(mime: &str) -> Option<AttachmentKind> {
    let essence = mime
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    if essence.starts_with("image/") {
        return Some(AttachmentKind::Image);
    }
    if DOCUMENT_TYPES.contains(&essence.as_str()) {
        return Some(AttachmentKind::Document);
    }
    None
}

/// Like [`classify`], but falls back to guessing the MIME type from the
/// file name when the declared type is empty or unsupported. Browsers and
/// OS file pickers routinely hand over blank or generic types.
pub fn classify_with_name(mime: &str, name: &str) -> Option<AttachmentKind> {
    if let Some(kind) = classify(mime) {
        return Some(kind);
    }
    mime_guess::from_path(name)
        .first()
        .and_then(|guessed| classify(guessed.essence_str()))
}

/// What the queue is willing to admit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadPolicy {
    /// Maximum number of admitted files in the queue.
    pub max_files: usize,

    /// Size ceiling for image attachments, in bytes.
    pub max_image_bytes: u64,

    /// Size ceiling for document attachments, in bytes.
    pub max_document_bytes: u64,

    /// Whether document attachments are accepted at all.
    pub allow_documents: bool,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            max_files: 5,
            max_image_bytes: 10 * MIB,
            max_document_bytes: 32 * MIB,
            allow_documents: true,
        }
    }
}

impl UploadPolicy {
    /// Size ceiling for the given category.
    pub fn max_bytes_for(&self, kind: AttachmentKind) -> u64 {
        match kind {
            AttachmentKind::Image => self.max_image_bytes,
            AttachmentKind::Document => self.max_document_bytes,
        }
    }
}
