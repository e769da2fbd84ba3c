//! UploadQueue - admission, status lifecycle, and upload driving.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::classifier::{classify_with_name, AttachmentKind, UploadPolicy};
use super::preview::{MemoryPreviewStore, PreviewStore};
use super::service::{FilePayload, RemoteAttachment, UploadScope, UploadService};
use crate::events::{ChangeEvent, EventBus};

/// Progress recorded while a transfer is in flight.
const UPLOADING_PROGRESS: u8 = 10;

/// Unique identifier for a queued upload, generated at admission.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UploadId(pub String);

impl UploadId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for UploadId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for UploadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of a queued upload.
///
/// `pending -> uploading -> {success | error}`; the terminal states are
/// left only by removing the record from the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum UploadStatus {
    Pending,
    Uploading,
    Success,
    Error,
}

impl UploadStatus {
    /// Whether the record still needs driving through the service.
    fn is_unsettled(&self) -> bool {
        matches!(self, UploadStatus::Pending | UploadStatus::Uploading)
    }
}

/// Why a file was not admitted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UploadError {
    #[error("Unsupported file type for {name}: {mime}")]
    UnsupportedType { name: String, mime: String },

    #[error("Document uploads are disabled: {name}")]
    DocumentsDisabled { name: String },

    #[error("{name} is too large: {size} bytes (limit {limit})")]
    TooLarge { name: String, size: u64, limit: u64 },

    #[error("Upload queue is full (limit {limit})")]
    QueueFull { limit: usize },
}

/// One file from admission to terminal status.
#[derive(Debug, Clone, Serialize)]
pub struct PendingUpload {
    /// Generated at admission.
    pub id: UploadId,

    /// The file as selected by the user.
    pub file: FilePayload,

    /// Locally-resolvable preview handle; owned by this record and
    /// released when the record is discarded.
    pub preview_url: String,

    pub status: UploadStatus,

    /// 0-100.
    pub progress: u8,

    /// Failure reason; present only in `error` status.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Category, fixed at admission time.
    pub kind: AttachmentKind,

    /// Server-side handle once uploaded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote: Option<RemoteAttachment>,
}

/// Admitted items per category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentCounts {
    pub images: usize,
    pub documents: usize,
}

/// Ordered queue of pending uploads.
///
/// Admission validates against the [`UploadPolicy`]; [`upload_all`]
/// drives unsettled items through the service sequentially, in admission
/// order, so completion order matches admission order and at most one
/// transfer is outbound at a time.
///
/// [`upload_all`]: UploadQueue::upload_all
pub struct UploadQueue {
    items: Vec<PendingUpload>,
    policy: UploadPolicy,
    previews: Arc<dyn PreviewStore>,
    events: EventBus,
    busy: bool,
}

impl UploadQueue {
    pub fn new() -> Self {
        Self::with_policy(UploadPolicy::default())
    }

    pub fn with_policy(policy: UploadPolicy) -> Self {
        Self::with_preview_store(policy, Arc::new(MemoryPreviewStore::new()))
    }

    pub fn with_preview_store(policy: UploadPolicy, previews: Arc<dyn PreviewStore>) -> Self {
        Self {
            items: Vec::new(),
            policy,
            previews,
            events: EventBus::new(),
            busy: false,
        }
    }

    /// Check a file against the classifier and policy without touching
    /// the queue.
    pub fn validate_file(&self, file: &FilePayload) -> Result<AttachmentKind, UploadError> {
        let Some(kind) = classify_with_name(&file.mime_type, &file.name) else {
            return Err(UploadError::UnsupportedType {
                name: file.name.clone(),
                mime: file.mime_type.clone(),
            });
        };

        if kind == AttachmentKind::Document && !self.policy.allow_documents {
            return Err(UploadError::DocumentsDisabled {
                name: file.name.clone(),
            });
        }

        let limit = self.policy.max_bytes_for(kind);
        if file.size > limit {
            return Err(UploadError::TooLarge {
                name: file.name.clone(),
                size: file.size,
                limit,
            });
        }

        Ok(kind)
    }

    /// Admit files into the queue, in input order.
    ///
    /// Files failing validation are skipped (the rest of the batch still
    /// goes through); once the queue is at capacity the remainder is
    /// dropped and the overflow is reported exactly once. Returns every
    /// rejection.
    pub fn add_files(&mut self, files: Vec<FilePayload>) -> Vec<UploadError> {
        let mut rejected = Vec::new();
        let mut admitted = Vec::new();

        for file in files {
            if self.items.len() >= self.policy.max_files {
                log::warn!(
                    "upload queue full ({} files), dropping {} and the rest of the batch",
                    self.policy.max_files,
                    file.name
                );
                rejected.push(UploadError::QueueFull {
                    limit: self.policy.max_files,
                });
                break;
            }

            match self.validate_file(&file) {
                Err(error) => {
                    log::warn!("rejected {}: {}", file.name, error);
                    rejected.push(error);
                }
                Ok(kind) => {
                    let preview_url = self.previews.open(&file);
                    let id = UploadId::new();
                    self.items.push(PendingUpload {
                        id: id.clone(),
                        file,
                        preview_url,
                        status: UploadStatus::Pending,
                        progress: 0,
                        error: None,
                        kind,
                        remote: None,
                    });
                    admitted.push(id);
                }
            }
        }

        if !admitted.is_empty() {
            self.events.emit(ChangeEvent::UploadsChanged { ids: admitted });
        }
        rejected
    }

    /// Release the record's preview handle and drop it from the queue.
    /// Unknown ids are a no-op.
    pub fn remove_upload(&mut self, id: &UploadId) {
        let Some(index) = self.items.iter().position(|item| &item.id == id) else {
            return;
        };
        let removed = self.items.remove(index);
        self.previews.release(&removed.preview_url);
        self.events.emit(ChangeEvent::UploadsChanged {
            ids: vec![removed.id],
        });
    }

    /// Release every preview handle and empty the queue.
    pub fn clear(&mut self) {
        if self.items.is_empty() {
            return;
        }
        let mut ids = Vec::with_capacity(self.items.len());
        for item in self.items.drain(..) {
            self.previews.release(&item.preview_url);
            ids.push(item.id);
        }
        self.events.emit(ChangeEvent::UploadsChanged { ids });
    }

    /// Drive every unsettled item through the service, one at a time, in
    /// admission order.
    ///
    /// Each item is marked `uploading` before its transfer and settles to
    /// `success` (remote result attached) or `error` (failure text
    /// attached); one item failing does not stop the batch. The queue
    /// reports busy until the last item settles. Returns the remote
    /// results in queue order, omitting failed items; items that were
    /// already `success` contribute their stored result without another
    /// service call.
    pub async fn upload_all(
        &mut self,
        service: &dyn UploadService,
        scope: &UploadScope,
    ) -> Vec<RemoteAttachment> {
        self.busy = true;

        let unsettled: Vec<UploadId> = self
            .items
            .iter()
            .filter(|item| item.status.is_unsettled())
            .map(|item| item.id.clone())
            .collect();

        for id in unsettled {
            // Re-locate by id on both sides of the await: the record may
            // have been removed while a transfer was in flight, in which
            // case its result is discarded.
            let file = match self.items.iter_mut().find(|item| item.id == id) {
                Some(item) => {
                    item.status = UploadStatus::Uploading;
                    item.progress = UPLOADING_PROGRESS;
                    item.file.clone()
                }
                None => continue,
            };
            self.events.emit(ChangeEvent::UploadStatusChanged {
                id: id.clone(),
                status: UploadStatus::Uploading,
            });

            let result = service.upload(&file, scope).await;

            let Some(item) = self.items.iter_mut().find(|item| item.id == id) else {
                continue;
            };
            match result {
                Ok(remote) => {
                    item.status = UploadStatus::Success;
                    item.progress = 100;
                    item.remote = Some(remote);
                }
                Err(message) => {
                    log::warn!("upload of {} failed: {}", item.file.name, message);
                    item.status = UploadStatus::Error;
                    item.error = Some(message);
                }
            }
            self.events.emit(ChangeEvent::UploadStatusChanged {
                id,
                status: item.status,
            });
        }

        self.busy = false;
        self.items
            .iter()
            .filter_map(|item| item.remote.clone())
            .collect()
    }

    /// True while an `upload_all` batch is being driven.
    pub fn is_busy(&self) -> bool {
        self.busy
    }

    /// Admitted items per category.
    pub fn counts(&self) -> AttachmentCounts {
        let mut counts = AttachmentCounts::default();
        for item in &self.items {
            match item.kind {
                AttachmentKind::Image => counts.images += 1,
                AttachmentKind::Document => counts.documents += 1,
            }
        }
        counts
    }

    pub fn items(&self) -> &[PendingUpload] {
        &self.items
    }

    pub fn get(&self, id: &UploadId) -> Option<&PendingUpload> {
        self.items.iter().find(|item| &item.id == id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// How many more files the queue will admit.
    pub fn remaining_capacity(&self) -> usize {
        self.policy.max_files.saturating_sub(self.items.len())
    }

    /// Whether any item settled to `error`.
    pub fn has_failures(&self) -> bool {
        self.items
            .iter()
            .any(|item| item.status == UploadStatus::Error)
    }

    pub fn policy(&self) -> &UploadPolicy {
        &self.policy
    }

    /// Subscribe to change notifications from this queue.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<ChangeEvent> {
        self.events.subscribe()
    }
}

impl Default for UploadQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn image(name: &str) -> FilePayload {
        FilePayload::new(name, "image/png", vec![0u8; 64])
    }

    fn document(name: &str) -> FilePayload {
        FilePayload::new(name, "application/pdf", vec![0u8; 64])
    }

    /// Upload service double: counts calls, fails for listed file names.
    struct MockService {
        calls: AtomicUsize,
        fail: Vec<&'static str>,
    }

    impl MockService {
        fn ok() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail: Vec::new(),
            }
        }

        fn failing(names: Vec<&'static str>) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail: names,
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl UploadService for MockService {
        async fn upload(
            &self,
            file: &FilePayload,
            _scope: &UploadScope,
        ) -> Result<RemoteAttachment, String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail.contains(&file.name.as_str()) {
                return Err(format!("server rejected {}", file.name));
            }
            Ok(RemoteAttachment {
                id: format!("att-{}", file.name),
                url: format!("https://files.example.com/{}", file.name),
                file_name: file.name.clone(),
                mime_type: file.mime_type.clone(),
                size: file.size,
            })
        }
    }

    fn scope() -> UploadScope {
        UploadScope::organization("org-1")
    }

    mod validation {
        use super::*;

        #[test]
        fn accepts_image_within_limit() {
            let queue = UploadQueue::new();
            assert_eq!(
                queue.validate_file(&image("a.png")),
                Ok(AttachmentKind::Image)
            );
        }

        #[test]
        fn rejects_unrecognized_type() {
            let queue = UploadQueue::new();
            let file = FilePayload::new("movie.mp4", "video/mp4", vec![]);

            let error = queue.validate_file(&file).unwrap_err();
            assert!(matches!(error, UploadError::UnsupportedType { .. }));
        }

        #[test]
        fn rejects_document_when_disabled() {
            let queue = UploadQueue::with_policy(UploadPolicy {
                allow_documents: false,
                ..Default::default()
            });

            let error = queue.validate_file(&document("notes.pdf")).unwrap_err();
            assert_eq!(
                error,
                UploadError::DocumentsDisabled {
                    name: "notes.pdf".to_string()
                }
            );
        }

        #[test]
        fn rejects_oversize_image() {
            let queue = UploadQueue::new();
            let mut file = image("huge.png");
            file.size = 11 * 1024 * 1024;

            let error = queue.validate_file(&file).unwrap_err();
            assert!(matches!(error, UploadError::TooLarge { .. }));
        }

        #[test]
        fn document_limit_is_wider_than_image_limit() {
            let queue = UploadQueue::new();
            let mut file = document("big.pdf");
            file.size = 11 * 1024 * 1024;

            assert_eq!(queue.validate_file(&file), Ok(AttachmentKind::Document));
        }

        #[test]
        fn validate_does_not_mutate_queue() {
            let queue = UploadQueue::new();
            let _ = queue.validate_file(&image("a.png"));
            assert!(queue.is_empty());
        }
    }

    mod admission {
        use super::*;

        #[test]
        fn admits_valid_files_in_order() {
            let mut queue = UploadQueue::new();

            let rejected = queue.add_files(vec![image("a.png"), document("b.pdf")]);

            assert!(rejected.is_empty());
            assert_eq!(queue.len(), 2);
            assert_eq!(queue.items()[0].file.name, "a.png");
            assert_eq!(queue.items()[1].file.name, "b.pdf");
        }

        #[test]
        fn admitted_records_start_pending() {
            let mut queue = UploadQueue::new();
            queue.add_files(vec![image("a.png")]);

            let item = &queue.items()[0];
            assert_eq!(item.status, UploadStatus::Pending);
            assert_eq!(item.progress, 0);
            assert!(item.error.is_none());
            assert!(item.remote.is_none());
            assert_eq!(item.kind, AttachmentKind::Image);
            assert!(item.preview_url.starts_with("preview://"));
        }

        #[test]
        fn unrecognized_type_admits_nothing_with_one_error() {
            let mut queue = UploadQueue::new();
            let rejected =
                queue.add_files(vec![FilePayload::new("movie.mp4", "video/mp4", vec![])]);

            assert!(queue.is_empty());
            assert_eq!(rejected.len(), 1);
            assert!(matches!(rejected[0], UploadError::UnsupportedType { .. }));
        }

        #[test]
        fn invalid_file_does_not_stop_the_batch() {
            let mut queue = UploadQueue::new();

            let rejected = queue.add_files(vec![
                image("a.png"),
                FilePayload::new("movie.mp4", "video/mp4", vec![]),
                image("c.png"),
            ]);

            assert_eq!(queue.len(), 2);
            assert_eq!(rejected.len(), 1);
        }

        #[test]
        fn overflow_is_reported_exactly_once() {
            let mut queue = UploadQueue::new();
            let files: Vec<FilePayload> =
                (0..7).map(|i| image(&format!("{i}.png"))).collect();

            let rejected = queue.add_files(files);

            assert_eq!(queue.len(), 5);
            assert_eq!(rejected, vec![UploadError::QueueFull { limit: 5 }]);
        }

        #[test]
        fn overflow_applies_across_batches() {
            let mut queue = UploadQueue::new();
            queue.add_files((0..5).map(|i| image(&format!("{i}.png"))).collect());

            let rejected = queue.add_files(vec![image("late.png")]);

            assert_eq!(queue.len(), 5);
            assert_eq!(rejected, vec![UploadError::QueueFull { limit: 5 }]);
        }

        #[test]
        fn ids_are_unique() {
            let mut queue = UploadQueue::new();
            queue.add_files(vec![image("a.png"), image("b.png")]);
            assert_ne!(queue.items()[0].id, queue.items()[1].id);
        }

        #[test]
        fn counts_by_category() {
            let mut queue = UploadQueue::new();
            queue.add_files(vec![image("a.png"), image("b.png"), document("c.pdf")]);

            assert_eq!(
                queue.counts(),
                AttachmentCounts {
                    images: 2,
                    documents: 1
                }
            );
        }

        #[test]
        fn remaining_capacity_shrinks() {
            let mut queue = UploadQueue::new();
            assert_eq!(queue.remaining_capacity(), 5);
            queue.add_files(vec![image("a.png")]);
            assert_eq!(queue.remaining_capacity(), 4);
        }
    }

    mod removal {
        use super::*;

        #[test]
        fn remove_upload_drops_record_and_releases_preview() {
            let store = Arc::new(MemoryPreviewStore::new());
            let mut queue =
                UploadQueue::with_preview_store(UploadPolicy::default(), store.clone());
            queue.add_files(vec![image("a.png"), image("b.png")]);
            assert_eq!(store.live_handles(), 2);

            let id = queue.items()[0].id.clone();
            queue.remove_upload(&id);

            assert_eq!(queue.len(), 1);
            assert_eq!(store.live_handles(), 1);
            assert!(queue.get(&id).is_none());
        }

        #[test]
        fn remove_unknown_id_is_a_no_op() {
            let mut queue = UploadQueue::new();
            queue.add_files(vec![image("a.png")]);

            queue.remove_upload(&UploadId("missing".to_string()));

            assert_eq!(queue.len(), 1);
        }

        #[test]
        fn clear_releases_every_preview() {
            let store = Arc::new(MemoryPreviewStore::new());
            let mut queue =
                UploadQueue::with_preview_store(UploadPolicy::default(), store.clone());
            queue.add_files(vec![image("a.png"), document("b.pdf")]);

            queue.clear();

            assert!(queue.is_empty());
            assert_eq!(store.live_handles(), 0);
        }
    }

    mod driving {
        use super::*;

        #[tokio::test]
        async fn upload_all_settles_every_item() {
            let mut queue = UploadQueue::new();
            queue.add_files(vec![image("a.png"), image("b.png")]);
            let service = MockService::ok();

            let results = queue.upload_all(&service, &scope()).await;

            assert_eq!(results.len(), 2);
            assert_eq!(results[0].id, "att-a.png");
            assert_eq!(results[1].id, "att-b.png");
            for item in queue.items() {
                assert_eq!(item.status, UploadStatus::Success);
                assert_eq!(item.progress, 100);
                assert!(item.remote.is_some());
            }
            assert!(!queue.is_busy());
        }

        #[tokio::test]
        async fn one_failure_does_not_stop_the_batch() {
            let mut queue = UploadQueue::new();
            queue.add_files(vec![image("a.png"), image("b.png"), image("c.png")]);
            let service = MockService::failing(vec!["b.png"]);

            let results = queue.upload_all(&service, &scope()).await;

            let statuses: Vec<UploadStatus> =
                queue.items().iter().map(|item| item.status).collect();
            assert_eq!(
                statuses,
                vec![
                    UploadStatus::Success,
                    UploadStatus::Error,
                    UploadStatus::Success
                ]
            );
            assert_eq!(
                queue.items()[1].error.as_deref(),
                Some("server rejected b.png")
            );

            // Results keep queue order and omit the failed item.
            let ids: Vec<&str> = results.iter().map(|r| r.id.as_str()).collect();
            assert_eq!(ids, vec!["att-a.png", "att-c.png"]);

            assert!(queue.has_failures());
            assert!(!queue.is_busy());
        }

        #[tokio::test]
        async fn replay_reuses_stored_results() {
            let mut queue = UploadQueue::new();
            queue.add_files(vec![image("a.png")]);
            let service = MockService::ok();

            let first = queue.upload_all(&service, &scope()).await;
            let second = queue.upload_all(&service, &scope()).await;

            assert_eq!(service.call_count(), 1);
            assert_eq!(first, second);
            assert_eq!(queue.items()[0].status, UploadStatus::Success);
        }

        #[tokio::test]
        async fn errored_items_are_not_redriven() {
            let mut queue = UploadQueue::new();
            queue.add_files(vec![image("a.png")]);
            let service = MockService::failing(vec!["a.png"]);

            queue.upload_all(&service, &scope()).await;
            queue.upload_all(&service, &scope()).await;

            // Terminal states are left only by removal.
            assert_eq!(service.call_count(), 1);
            assert_eq!(queue.items()[0].status, UploadStatus::Error);
        }

        #[tokio::test]
        async fn files_added_after_a_batch_are_driven_next_time() {
            let mut queue = UploadQueue::new();
            queue.add_files(vec![image("a.png")]);
            let service = MockService::ok();

            queue.upload_all(&service, &scope()).await;
            queue.add_files(vec![image("b.png")]);
            let results = queue.upload_all(&service, &scope()).await;

            assert_eq!(service.call_count(), 2);
            assert_eq!(results.len(), 2);
        }

        #[tokio::test]
        async fn empty_queue_returns_no_results() {
            let mut queue = UploadQueue::new();
            let service = MockService::ok();

            let results = queue.upload_all(&service, &scope()).await;

            assert!(results.is_empty());
            assert_eq!(service.call_count(), 0);
            assert!(!queue.is_busy());
        }
    }

    mod notifications {
        use super::*;

        #[tokio::test]
        async fn admission_emits_uploads_changed() {
            let mut queue = UploadQueue::new();
            let mut rx = queue.subscribe();

            queue.add_files(vec![image("a.png")]);

            match rx.recv().await.unwrap() {
                ChangeEvent::UploadsChanged { ids } => assert_eq!(ids.len(), 1),
                _ => panic!("Expected UploadsChanged event"),
            }
        }

        #[tokio::test]
        async fn driving_emits_status_transitions() {
            let mut queue = UploadQueue::new();
            queue.add_files(vec![image("a.png")]);
            let mut rx = queue.subscribe();
            let service = MockService::ok();

            queue.upload_all(&service, &scope()).await;

            let first = rx.recv().await.unwrap();
            let second = rx.recv().await.unwrap();
            assert!(matches!(
                first,
                ChangeEvent::UploadStatusChanged {
                    status: UploadStatus::Uploading,
                    ..
                }
            ));
            assert!(matches!(
                second,
                ChangeEvent::UploadStatusChanged {
                    status: UploadStatus::Success,
                    ..
                }
            ));
        }

        #[test]
        fn rejection_emits_nothing() {
            let mut queue = UploadQueue::new();
            let mut rx = queue.subscribe();

            queue.add_files(vec![FilePayload::new("movie.mp4", "video/mp4", vec![])]);

            assert!(matches!(
                rx.try_recv(),
                Err(tokio::sync::broadcast::error::TryRecvError::Empty)
            ));
        }
    }

    mod status {
        use super::*;

        #[test]
        fn serializes_camel_case_tag() {
            let json = serde_json::to_string(&UploadStatus::Uploading).unwrap();
            assert!(json.contains("uploading"));
        }

        #[test]
        fn unsettled_covers_pending_and_uploading() {
            assert!(UploadStatus::Pending.is_unsettled());
            assert!(UploadStatus::Uploading.is_unsettled());
            assert!(!UploadStatus::Success.is_unsettled());
            assert!(!UploadStatus::Error.is_unsettled());
        }
    }
}
