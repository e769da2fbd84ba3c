//! The upload service seam and the records that cross it.
//!
//! The core never talks to the network itself; it hands files to an
//! [`UploadService`] implementation and books the outcome.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A file as selected by the user: raw bytes plus declared metadata.
#[derive(Debug, Clone, Serialize)]
pub struct FilePayload {
    /// Original file name.
    pub name: String,

    /// MIME type as declared by the picker; may be empty or generic.
    pub mime_type: String,

    /// Declared size in bytes.
    pub size: u64,

    /// Raw contents. Not serialized into state snapshots.
    #[serde(skip_serializing)]
    pub bytes: Vec<u8>,
}

impl FilePayload {
    /// Build a payload from raw bytes; `size` is taken from the buffer.
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            size: bytes.len() as u64,
            bytes,
        }
    }
}

/// Who an upload belongs to on the server side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadScope {
    pub organization_id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub team_id: Option<String>,
}

impl UploadScope {
    pub fn organization(organization_id: impl Into<String>) -> Self {
        Self {
            organization_id: organization_id.into(),
            team_id: None,
        }
    }

    pub fn team(organization_id: impl Into<String>, team_id: impl Into<String>) -> Self {
        Self {
            organization_id: organization_id.into(),
            team_id: Some(team_id.into()),
        }
    }
}

/// Server-side representation of a completed upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteAttachment {
    /// Server-assigned attachment id.
    pub id: String,

    /// Where the stored file can be fetched from.
    pub url: String,

    /// File name as stored.
    pub file_name: String,

    /// MIME type as stored.
    pub mime_type: String,

    /// Stored size in bytes.
    pub size: u64,
}

/// Performs the actual transfer.
///
/// Implementations live outside this crate (HTTP client, mock, ...). Any
/// error is reported as a human-readable string, which the queue records
/// verbatim on the failing item.
#[async_trait]
pub trait UploadService: Send + Sync {
    async fn upload(
        &self,
        file: &FilePayload,
        scope: &UploadScope,
    ) -> Result<RemoteAttachment, String>;
}
