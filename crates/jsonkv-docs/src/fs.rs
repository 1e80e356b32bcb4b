use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::error::{check_version, DocumentError, DocumentResult};
use crate::traits::DocumentService;
use crate::version::{Document, Version};

/// File extension used for document files.
const DOCUMENT_EXT: &str = "json";

/// On-disk envelope for a single document.
///
/// ```text
/// {"revision": 3, "value": <stored JSON value>}
/// ```
#[derive(Serialize, Deserialize)]
struct Envelope {
    revision: u64,
    value: Value,
}

/// Last revision of a deleted document, kept in `.<identifier>.retired`.
#[derive(Serialize, Deserialize)]
struct Retired {
    revision: u64,
}

/// Filesystem-backed document service.
///
/// Each identifier maps to `<root>/<identifier>.json`. Saves write a
/// uniquely named temp file and rename it over the target, so readers
/// observe either the old or the new document. The version check and the
/// write of every save and delete run under an exclusive OS lock on
/// `<root>/.<identifier>.lock`, so the compare-and-swap holds between any
/// handles on the same directory, including separate processes.
///
/// Deleting a document records its last revision in a hidden
/// `.<identifier>.retired` file, and a recreated document continues from
/// there.
#[derive(Clone)]
pub struct FsDocumentService {
    inner: Arc<FsInner>,
}

struct FsInner {
    root: PathBuf,
}

impl FsDocumentService {
    /// Open (or create) a document directory at `root`.
    pub fn open(root: impl AsRef<Path>) -> DocumentResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        info!(root = %root.display(), "document directory opened");
        Ok(Self {
            inner: Arc::new(FsInner { root }),
        })
    }

    /// The directory holding the document files.
    pub fn root(&self) -> &Path {
        &self.inner.root
    }

    async fn run<T, F>(&self, f: F) -> DocumentResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&FsInner) -> DocumentResult<T> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || f(&inner))
            .await
            .map_err(|e| DocumentError::Io(io::Error::other(e)))?
    }
}

/// Reject identifiers that would escape the root or collide with the
/// hidden lock, temp and retired files.
fn check_identifier(identifier: &str) -> DocumentResult<()> {
    let reason = if identifier.is_empty() {
        Some("identifier must not be empty")
    } else if identifier.contains(['/', '\\', '\0']) {
        Some("identifier must not contain path separators")
    } else if identifier.contains("..") {
        Some("identifier must not contain '..'")
    } else if identifier.starts_with('.') {
        Some("identifier must not start with '.'")
    } else {
        None
    };
    match reason {
        Some(reason) => Err(DocumentError::InvalidIdentifier {
            identifier: identifier.to_string(),
            reason: reason.into(),
        }),
        None => Ok(()),
    }
}

fn remove_if_present(path: &Path) -> io::Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

fn encode<T: Serialize>(value: &T) -> DocumentResult<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| DocumentError::Serialization(e.to_string()))
}

impl FsInner {
    fn path_for(&self, identifier: &str) -> PathBuf {
        self.root.join(format!("{identifier}.{DOCUMENT_EXT}"))
    }

    fn lock_path(&self, identifier: &str) -> PathBuf {
        self.root.join(format!(".{identifier}.lock"))
    }

    fn retired_path(&self, identifier: &str) -> PathBuf {
        self.root.join(format!(".{identifier}.retired"))
    }

    /// Take the exclusive lock for `identifier`. Dropping the file releases it.
    fn lock(&self, identifier: &str) -> DocumentResult<fs::File> {
        let file = fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(self.lock_path(identifier))?;
        fs2::FileExt::lock_exclusive(&file)?;
        Ok(file)
    }

    /// Write `bytes` to a fresh temp file and rename it over `target`.
    fn write_atomic(&self, target: &Path, bytes: &[u8]) -> DocumentResult<()> {
        let mut tmp = NamedTempFile::new_in(&self.root)?;
        tmp.write_all(bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(target).map_err(|e| DocumentError::Io(e.error))?;
        Ok(())
    }

    fn read_json<T: DeserializeOwned>(
        &self,
        path: &Path,
        identifier: &str,
    ) -> DocumentResult<Option<T>> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let parsed = serde_json::from_slice(&bytes).map_err(|e| {
            DocumentError::Serialization(format!("corrupt document {identifier}: {e}"))
        })?;
        Ok(Some(parsed))
    }

    fn read_envelope(&self, identifier: &str) -> DocumentResult<Option<Envelope>> {
        check_identifier(identifier)?;
        self.read_json(&self.path_for(identifier), identifier)
    }

    fn current(&self, identifier: &str) -> DocumentResult<Version> {
        Ok(self
            .read_envelope(identifier)?
            .map(|env| Version::Revision(env.revision))
            .unwrap_or(Version::Absent))
    }

    fn load(&self, identifier: &str) -> DocumentResult<Document> {
        match self.read_envelope(identifier)? {
            Some(env) => Ok(Document::new(env.value, Version::Revision(env.revision))),
            None => Err(DocumentError::NotFound(identifier.to_string())),
        }
    }

    fn save(&self, identifier: &str, value: Value, expected: Version) -> DocumentResult<Version> {
        check_identifier(identifier)?;
        let _lock = self.lock(identifier)?;

        let current = self.current(identifier)?;
        check_version(identifier, expected, current)?;

        let retired = if current.is_absent() {
            self.read_json::<Retired>(&self.retired_path(identifier), identifier)?
        } else {
            None
        };
        let last = current
            .revision()
            .or(retired.as_ref().map(|r| r.revision))
            .unwrap_or(0);
        let revision = last.saturating_add(1);
        let next = Version::Revision(revision);

        let bytes = encode(&Envelope { revision, value })?;
        self.write_atomic(&self.path_for(identifier), &bytes)?;
        if retired.is_some() {
            remove_if_present(&self.retired_path(identifier))?;
        }

        debug!(identifier, version = %next, len = bytes.len(), "document saved");
        Ok(next)
    }

    fn delete(&self, identifier: &str, expected: Version) -> DocumentResult<bool> {
        check_identifier(identifier)?;
        let _lock = self.lock(identifier)?;

        let current = self.current(identifier)?;
        check_version(identifier, expected, current)?;
        let Some(revision) = current.revision() else {
            return Ok(false);
        };

        self.write_atomic(&self.retired_path(identifier), &encode(&Retired { revision })?)?;
        remove_if_present(&self.path_for(identifier))?;
        debug!(identifier, version = %current, "document deleted");
        Ok(true)
    }

    fn list(&self, prefix: &str) -> DocumentResult<Vec<String>> {
        let suffix = format!(".{DOCUMENT_EXT}");
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            // Lock, temp and retired files are hidden.
            if name.starts_with('.') {
                continue;
            }
            if let Some(id) = name.strip_suffix(&suffix) {
                if id.starts_with(prefix) {
                    ids.push(id.to_string());
                }
            }
        }
        ids.sort();
        Ok(ids)
    }
}

#[async_trait]
impl DocumentService for FsDocumentService {
    async fn load(&self, identifier: &str) -> DocumentResult<Document> {
        let identifier = identifier.to_string();
        self.run(move |inner| inner.load(&identifier)).await
    }

    async fn save(
        &self,
        identifier: &str,
        value: Value,
        expected: &Version,
    ) -> DocumentResult<Version> {
        let identifier = identifier.to_string();
        let expected = *expected;
        self.run(move |inner| inner.save(&identifier, value, expected))
            .await
    }

    async fn delete(&self, identifier: &str, expected: &Version) -> DocumentResult<bool> {
        let identifier = identifier.to_string();
        let expected = *expected;
        self.run(move |inner| inner.delete(&identifier, expected))
            .await
    }

    async fn list(&self, prefix: &str) -> DocumentResult<Vec<String>> {
        let prefix = prefix.to_string();
        self.run(move |inner| inner.list(&prefix)).await
    }

    async fn exists(&self, identifier: &str) -> DocumentResult<bool> {
        let identifier = identifier.to_string();
        self.run(move |inner| {
            check_identifier(&identifier)?;
            Ok(inner.path_for(&identifier).is_file())
        })
        .await
    }
}

impl std::fmt::Debug for FsDocumentService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FsDocumentService")
            .field("root", &self.inner.root)
            .finish()
    }
}
