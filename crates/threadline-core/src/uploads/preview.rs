//! Preview handles for queued files.
//!
//! Every admitted upload owns a locally-resolvable preview URL. The queue
//! opens one handle per record and releases it exactly once, when the
//! record is removed or the queue is cleared.

use std::collections::HashSet;
use std::sync::Mutex;

use uuid::Uuid;

use super::service::FilePayload;

/// Allocates and reclaims preview handles.
///
/// Implementations back the URL with whatever the surface can render
/// (object URLs, temp files, a thumbnail cache).
pub trait PreviewStore: Send + Sync {
    /// Open a preview handle for a file and return its URL.
    fn open(&self, file: &FilePayload) -> String;

    /// Release a previously opened handle. Must be called exactly once
    /// per handle.
    fn release(&self, url: &str);
}

/// In-memory [`PreviewStore`] handing out `preview://` URLs.
///
/// Tracks live handles, which makes release accounting observable in
/// tests; releasing an unknown handle is logged, not fatal.
#[derive(Default)]
pub struct MemoryPreviewStore {
    live: Mutex<HashSet<String>>,
}

impl MemoryPreviewStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of handles opened and not yet released.
    pub fn live_handles(&self) -> usize {
        self.live.lock().unwrap().len()
    }
}

impl PreviewStore for MemoryPreviewStore {
    fn open(&self, file: &FilePayload) -> String {
        let url = format!("preview://{}", Uuid::new_v4());
        log::debug!("opened preview {} for {}", url, file.name);
        self.live.lock().unwrap().insert(url.clone());
        url
    }

    fn release(&self, url: &str) {
        if !self.live.lock().unwrap().remove(url) {
            log::warn!("released unknown preview handle: {}", url);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload() -> FilePayload {
        FilePayload::new("photo.png", "image/png", vec![0u8; 16])
    }

    #[test]
    fn open_returns_unique_urls() {
        let store = MemoryPreviewStore::new();
        let url1 = store.open(&payload());
        let url2 = store.open(&payload());

        assert_ne!(url1, url2);
        assert!(url1.starts_with("preview://"));
        assert_eq!(store.live_handles(), 2);
    }

    #[test]
    fn release_reclaims_handle() {
        let store = MemoryPreviewStore::new();
        let url = store.open(&payload());

        store.release(&url);
        assert_eq!(store.live_handles(), 0);
    }

    #[test]
    fn releasing_unknown_handle_does_not_panic() {
        let store = MemoryPreviewStore::new();
        store.release("preview://never-opened");
        assert_eq!(store.live_handles(), 0);
    }
}
