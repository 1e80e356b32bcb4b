use async_trait::async_trait;
use serde_json::Value;

use crate::error::DocumentResult;
use crate::version::{Document, Version};

/// A service that persists versioned JSON documents by identifier.
///
/// All implementations must satisfy these invariants:
/// - `load` of an identifier that was never saved (or was deleted) fails
///   with `DocumentError::NotFound`.
/// - `save` and `delete` succeed only when `expected` equals the current
///   version, where a missing document has version `Version::Absent`.
///   Otherwise they fail with `DocumentError::VersionConflict` and leave the
///   document untouched.
/// - A successful `save` replaces the whole value and returns the new version.
/// - Revisions never repeat for an identifier. A document recreated after a
///   delete continues from the revision it was deleted at, so a writer
///   holding a version from before the delete always conflicts.
/// - Implementations are shared between tasks and must be `Send + Sync`.
#[async_trait]
pub trait DocumentService: Send + Sync {
    /// Load the document stored under `identifier`.
    async fn load(&self, identifier: &str) -> DocumentResult<Document>;

    /// Replace the document under `identifier` if it is still at `expected`.
    ///
    /// Returns the version the document now has.
    async fn save(&self, identifier: &str, value: Value, expected: &Version)
        -> DocumentResult<Version>;

    /// Remove the document under `identifier` if it is still at `expected`.
    ///
    /// Returns `true` if a document was removed. Deleting a missing document
    /// with `expected == Version::Absent` returns `false`.
    async fn delete(&self, identifier: &str, expected: &Version) -> DocumentResult<bool>;

    /// List identifiers starting with `prefix`, sorted.
    async fn list(&self, prefix: &str) -> DocumentResult<Vec<String>>;

    /// Check whether a document exists under `identifier`.
    ///
    /// Default implementation calls `load()` and maps `NotFound` to `false`.
    /// Backends may override to avoid reading the document.
    async fn exists(&self, identifier: &str) -> DocumentResult<bool> {
        match self.load(identifier).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }
}
