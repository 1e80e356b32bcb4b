use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{check_version, DocumentError, DocumentResult};
use crate::traits::DocumentService;
use crate::version::{Document, Version};

fn poisoned<T>(e: PoisonError<T>) -> DocumentError {
    DocumentError::Transport(format!("lock poisoned: {e}"))
}

#[derive(Default)]
struct Slots {
    live: HashMap<String, Document>,
    /// Last version of each deleted document.
    retired: HashMap<String, Version>,
}

impl Slots {
    fn current(&self, identifier: &str) -> Version {
        self.live
            .get(identifier)
            .map(|d| d.version)
            .unwrap_or(Version::Absent)
    }

    /// Write `value` under the revision after the last one ever used.
    fn put(&mut self, identifier: &str, value: Value) -> Version {
        let last = match self.live.get(identifier) {
            Some(doc) => doc.version,
            None => self
                .retired
                .remove(identifier)
                .unwrap_or(Version::Absent),
        };
        let next = last.next();
        self.live
            .insert(identifier.to_string(), Document::new(value, next));
        next
    }

    fn retire(&mut self, identifier: &str) -> bool {
        match self.live.remove(identifier) {
            Some(doc) => {
                self.retired.insert(identifier.to_string(), doc.version);
                true
            }
            None => false,
        }
    }
}

/// In-memory, HashMap-based document service.
///
/// Intended for tests and embedding. Documents live behind a `RwLock`; the
/// version check and the write of a conditional save or delete happen under
/// the same write guard, so two racing writers against one version cannot
/// both win. Deleted documents leave their last version behind so that a
/// recreated document never reuses a revision.
pub struct InMemoryDocumentService {
    slots: RwLock<Slots>,
}

impl InMemoryDocumentService {
    /// Create a new empty service.
    pub fn new() -> Self {
        Self {
            slots: RwLock::new(Slots::default()),
        }
    }

    /// Number of documents currently stored.
    pub fn len(&self) -> usize {
        self.slots.read().map(|s| s.live.len()).unwrap_or(0)
    }

    /// Returns `true` if no documents are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every document.
    pub fn clear(&self) -> DocumentResult<()> {
        let mut slots = self.slots.write().map_err(poisoned)?;
        let ids: Vec<String> = slots.live.keys().cloned().collect();
        for id in ids {
            slots.retire(&id);
        }
        Ok(())
    }

    /// Store `value` under `identifier` without a version check.
    ///
    /// Used to seed documents that were not written through a store, such as
    /// unrelated data sharing an identifier. Returns the new version.
    pub fn put_raw(&self, identifier: &str, value: Value) -> DocumentResult<Version> {
        let mut slots = self.slots.write().map_err(poisoned)?;
        Ok(slots.put(identifier, value))
    }
}

impl Default for InMemoryDocumentService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentService for InMemoryDocumentService {
    async fn load(&self, identifier: &str) -> DocumentResult<Document> {
        let slots = self.slots.read().map_err(poisoned)?;
        slots
            .live
            .get(identifier)
            .cloned()
            .ok_or_else(|| DocumentError::NotFound(identifier.to_string()))
    }

    async fn save(
        &self,
        identifier: &str,
        value: Value,
        expected: &Version,
    ) -> DocumentResult<Version> {
        let mut slots = self.slots.write().map_err(poisoned)?;
        check_version(identifier, *expected, slots.current(identifier))?;
        Ok(slots.put(identifier, value))
    }

    async fn delete(&self, identifier: &str, expected: &Version) -> DocumentResult<bool> {
        let mut slots = self.slots.write().map_err(poisoned)?;
        check_version(identifier, *expected, slots.current(identifier))?;
        Ok(slots.retire(identifier))
    }

    async fn list(&self, prefix: &str) -> DocumentResult<Vec<String>> {
        let slots = self.slots.read().map_err(poisoned)?;
        let mut ids: Vec<String> = slots
            .live
            .keys()
            .filter(|id| id.starts_with(prefix))
            .cloned()
            .collect();
        ids.sort();
        Ok(ids)
    }

    async fn exists(&self, identifier: &str) -> DocumentResult<bool> {
        let slots = self.slots.read().map_err(poisoned)?;
        Ok(slots.live.contains_key(identifier))
    }
}

impl std::fmt::Debug for InMemoryDocumentService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryDocumentService")
            .field("document_count", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn load_missing_is_not_found() {
        let svc = InMemoryDocumentService::new();
        let err = svc.load("nope").await.unwrap_err();
        assert!(matches!(err, DocumentError::NotFound(id) if id == "nope"));
    }

    #[tokio::test]
    async fn save_from_absent_then_load() {
        let svc = InMemoryDocumentService::new();
        let v = svc
            .save("doc", json!({"a": 1}), &Version::Absent)
            .await
            .unwrap();
        assert_eq!(v, Version::Revision(1));

        let doc = svc.load("doc").await.unwrap();
        assert_eq!(doc.value, json!({"a": 1}));
        assert_eq!(doc.version, Version::Revision(1));
    }

    #[tokio::test]
    async fn save_advances_version() {
        let svc = InMemoryDocumentService::new();
        let v1 = svc.save("doc", json!(1), &Version::Absent).await.unwrap();
        let v2 = svc.save("doc", json!(2), &v1).await.unwrap();
        assert_eq!(v2, Version::Revision(2));
        assert_eq!(svc.load("doc").await.unwrap().value, json!(2));
    }

    #[tokio::test]
    async fn stale_version_is_rejected() {
        let svc = InMemoryDocumentService::new();
        let v1 = svc.save("doc", json!("first"), &Version::Absent).await.unwrap();
        svc.save("doc", json!("second"), &v1).await.unwrap();

        let err = svc.save("doc", json!("stale"), &v1).await.unwrap_err();
        match err {
            DocumentError::VersionConflict { expected, actual, .. } => {
                assert_eq!(expected, Version::Revision(1));
                assert_eq!(actual, Version::Revision(2));
            }
            other => panic!("expected conflict, got {other:?}"),
        }
        assert_eq!(svc.load("doc").await.unwrap().value, json!("second"));
    }

    #[tokio::test]
    async fn absent_expectation_fails_once_created() {
        let svc = InMemoryDocumentService::new();
        svc.save("doc", json!({}), &Version::Absent).await.unwrap();
        let err = svc.save("doc", json!({}), &Version::Absent).await.unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn exists_and_delete() {
        let svc = InMemoryDocumentService::new();
        assert!(!svc.exists("doc").await.unwrap());
        let v1 = svc.save("doc", json!(null), &Version::Absent).await.unwrap();
        assert!(svc.exists("doc").await.unwrap());

        assert!(svc.delete("doc", &v1).await.unwrap());
        assert!(!svc.delete("doc", &Version::Absent).await.unwrap());
        assert!(!svc.exists("doc").await.unwrap());
        assert!(svc.is_empty());
    }

    #[tokio::test]
    async fn delete_with_stale_version_is_rejected() {
        let svc = InMemoryDocumentService::new();
        let v1 = svc.save("doc", json!(1), &Version::Absent).await.unwrap();
        svc.save("doc", json!(2), &v1).await.unwrap();

        let err = svc.delete("doc", &v1).await.unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(svc.load("doc").await.unwrap().value, json!(2));

        let err = svc.delete("doc", &Version::Absent).await.unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn recreated_document_never_reuses_a_revision() {
        let svc = InMemoryDocumentService::new();
        let v1 = svc.save("doc", json!("old"), &Version::Absent).await.unwrap();
        assert!(svc.delete("doc", &v1).await.unwrap());

        let v2 = svc.save("doc", json!("new"), &Version::Absent).await.unwrap();
        assert_eq!(v2, Version::Revision(2));

        let err = svc.save("doc", json!("stale"), &v1).await.unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(svc.load("doc").await.unwrap().value, json!("new"));
    }

    #[tokio::test]
    async fn clear_keeps_revisions_moving_forward() {
        let svc = InMemoryDocumentService::new();
        svc.put_raw("doc", json!(1)).unwrap();
        svc.put_raw("doc", json!(2)).unwrap();
        svc.clear().unwrap();
        let v = svc.save("doc", json!(3), &Version::Absent).await.unwrap();
        assert_eq!(v, Version::Revision(3));
    }

    #[tokio::test]
    async fn list_filters_and_sorts() {
        let svc = InMemoryDocumentService::new();
        for id in ["jsonkv-b", "other", "jsonkv-a"] {
            svc.save(id, json!({}), &Version::Absent).await.unwrap();
        }
        let ids = svc.list("jsonkv-").await.unwrap();
        assert_eq!(ids, vec!["jsonkv-a", "jsonkv-b"]);
        assert_eq!(svc.list("").await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn put_raw_bypasses_version_check() {
        let svc = InMemoryDocumentService::new();
        svc.save("doc", json!(1), &Version::Absent).await.unwrap();
        let v = svc.put_raw("doc", json!("foreign")).unwrap();
        assert_eq!(v, Version::Revision(2));
        assert_eq!(svc.load("doc").await.unwrap().value, json!("foreign"));
    }

    #[tokio::test]
    async fn clear_removes_everything() {
        let svc = InMemoryDocumentService::new();
        svc.put_raw("a", json!(1)).unwrap();
        svc.put_raw("b", json!(2)).unwrap();
        assert_eq!(svc.len(), 2);
        svc.clear().unwrap();
        assert!(svc.is_empty());
        assert!(svc.list("").await.unwrap().is_empty());
    }

    #[test]
    fn debug_shows_count() {
        let svc = InMemoryDocumentService::new();
        svc.put_raw("a", json!(1)).unwrap();
        assert_eq!(
            format!("{svc:?}"),
            "InMemoryDocumentService { document_count: 1 }"
        );
    }
}
