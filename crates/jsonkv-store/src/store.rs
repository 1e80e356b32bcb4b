//! The async key-value store client.

use std::sync::Arc;

use jsonkv_docs::{DocumentError, DocumentResult, DocumentService, Version};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::config::StoreConfig;
use crate::document::{is_reserved_key, StoreDocument, STATE_KEY};
use crate::error::{KvError, KvResult};
use crate::names::{resolve, STORE_PREFIX};

/// What a mutation did to the loaded document.
enum Change<R> {
    /// Nothing to persist.
    Unchanged(R),
    /// The document must be saved.
    Changed(R),
    /// The whole document must be deleted.
    Removed(R),
}

fn check_key(key: &str) -> KvResult<()> {
    if is_reserved_key(key) {
        return Err(KvError::InvalidArgument(format!(
            "{STATE_KEY:?} is reserved for store metadata"
        )));
    }
    Ok(())
}

/// A named key-value store persisted as one document.
///
/// Every operation loads the document afresh, so handles never serve stale
/// data and any number of handles (in this process or elsewhere) may share a
/// store. Writes are compare-and-swap saves against the version that was
/// loaded; when another writer wins the race the whole load-modify-save
/// cycle is repeated, up to [`RetryPolicy::max_attempts`] times.
///
/// [`RetryPolicy::max_attempts`]: crate::config::RetryPolicy::max_attempts
#[derive(Clone)]
pub struct KvStore {
    name: String,
    full_name: String,
    service: Arc<dyn DocumentService>,
    config: StoreConfig,
}

impl KvStore {
    /// Open the store called `name` on `service` with default settings.
    ///
    /// Nothing is read or written until the first operation.
    pub fn new(name: impl Into<String>, service: Arc<dyn DocumentService>) -> Self {
        Self::with_config(name, service, StoreConfig::default())
    }

    pub fn with_config(
        name: impl Into<String>,
        service: Arc<dyn DocumentService>,
        config: StoreConfig,
    ) -> Self {
        let name = name.into();
        let full_name = resolve(&name);
        Self {
            name,
            full_name,
            service,
            config,
        }
    }

    /// The name the store was opened with.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The identifier of the backing document.
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    // ---- Reads ----

    /// Value stored under `key`, or `default` if there is none.
    pub async fn get(&self, key: &str, default: Value) -> KvResult<Value> {
        Ok(self.get_opt(key).await?.unwrap_or(default))
    }

    /// Value stored under `key`, if any.
    pub async fn get_opt(&self, key: &str) -> KvResult<Option<Value>> {
        let doc = self.load().await?;
        Ok(doc.get(key).cloned())
    }

    /// Index-style lookup: fails with [`KvError::KeyNotFound`] if `key` is absent.
    pub async fn get_item(&self, key: &str) -> KvResult<Value> {
        self.get_opt(key).await?.ok_or_else(|| KvError::KeyNotFound {
            key: key.to_string(),
            full_name: self.full_name.clone(),
        })
    }

    /// Deserialize the value under `key` into `T`.
    pub async fn get_as<T: DeserializeOwned>(&self, key: &str) -> KvResult<Option<T>> {
        match self.get_opt(key).await? {
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|e| KvError::Serialization(format!("key {key:?}: {e}"))),
            None => Ok(None),
        }
    }

    pub async fn contains(&self, key: &str) -> KvResult<bool> {
        Ok(self.load().await?.contains_key(key))
    }

    /// All keys, in document order.
    pub async fn keys(&self) -> KvResult<Vec<String>> {
        Ok(self.load().await?.keys().cloned().collect())
    }

    /// A copy of every entry, in document order.
    pub async fn dict(&self) -> KvResult<Map<String, Value>> {
        Ok(self.load().await?.into_entries())
    }

    /// Whether the backing document has been written yet.
    pub async fn exists(&self) -> KvResult<bool> {
        Ok(self.service.exists(&self.full_name).await?)
    }

    // ---- Writes ----

    /// Store `value` under `key`.
    pub async fn set(&self, key: &str, value: impl Into<Value>) -> KvResult<()> {
        check_key(key)?;
        let value = value.into();
        self.transact("set", |doc| {
            if doc.get(key) == Some(&value) {
                return Change::Unchanged(());
            }
            doc.insert(key.to_string(), value.clone());
            Change::Changed(())
        })
        .await
    }

    /// Index-style assignment; same as [`KvStore::set`].
    pub async fn set_item(&self, key: &str, value: impl Into<Value>) -> KvResult<()> {
        self.set(key, value).await
    }

    /// Serialize `value` to JSON and store it under `key`.
    pub async fn set_as<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> KvResult<()> {
        let value = serde_json::to_value(value)
            .map_err(|e| KvError::Serialization(format!("key {key:?}: {e}")))?;
        self.set(key, value).await
    }

    /// Remove `key`. Returns `true` if it was present.
    pub async fn delete(&self, key: &str) -> KvResult<bool> {
        check_key(key)?;
        self.transact("delete", |doc| match doc.remove(key) {
            Some(_) => Change::Changed(true),
            None => Change::Unchanged(false),
        })
        .await
    }

    /// Replace the value under `key` with one computed from the current value.
    ///
    /// `f` receives the current value (or `None`) and returns the new one;
    /// returning `None` removes the key. `f` runs once per attempt, so it may
    /// be called several times under contention and must not have side
    /// effects. Returns the value that was committed.
    pub async fn update<F>(&self, key: &str, mut f: F) -> KvResult<Option<Value>>
    where
        F: FnMut(Option<&Value>) -> Option<Value>,
    {
        check_key(key)?;
        self.transact("update", |doc| {
            let current = doc.get(key);
            let next = f(current);
            if next.as_ref() == current {
                return Change::Unchanged(next);
            }
            match &next {
                Some(value) => {
                    doc.insert(key.to_string(), value.clone());
                }
                None => {
                    doc.remove(key);
                }
            }
            Change::Changed(next)
        })
        .await
    }

    /// Delete the backing document. Returns `true` if it existed.
    ///
    /// The delete is conditional on the version that was loaded and
    /// validated, so unrelated data sharing the identifier is never removed,
    /// not even when it is written while the store is being destroyed.
    pub async fn destroy(&self) -> KvResult<bool> {
        self.transact("destroy", |doc| {
            if doc.version().is_absent() {
                Change::Unchanged(false)
            } else {
                Change::Removed(true)
            }
        })
        .await
    }

    // ---- Internals ----

    /// Load and validate the backing document.
    ///
    /// A missing document is a store that has never been written to and is
    /// returned as a fresh, empty one.
    async fn load(&self) -> KvResult<StoreDocument> {
        let loaded = match self.service.load(&self.full_name).await {
            Ok(doc) => doc,
            Err(DocumentError::NotFound(_)) => {
                debug!(store = %self.full_name, "no document yet; using empty store");
                return Ok(StoreDocument::fresh());
            }
            Err(e) => return Err(e.into()),
        };
        debug!(store = %self.full_name, version = %loaded.version, "document loaded");
        StoreDocument::validate(loaded.value, loaded.version).map_err(|e| {
            KvError::InvalidStore {
                full_name: self.full_name.clone(),
                reason: e.to_string(),
            }
        })
    }

    /// Commit a mutated document, conditional on the version it was loaded at.
    async fn commit(&self, doc: StoreDocument, remove: bool) -> DocumentResult<Version> {
        let expected = doc.version();
        if remove {
            self.service.delete(&self.full_name, &expected).await?;
            Ok(Version::Absent)
        } else {
            self.service
                .save(&self.full_name, doc.into_value(), &expected)
                .await
        }
    }

    /// Run a load-modify-commit cycle, retrying on version conflicts.
    async fn transact<R, F>(&self, op: &'static str, mut mutate: F) -> KvResult<R>
    where
        F: FnMut(&mut StoreDocument) -> Change<R>,
    {
        let policy = &self.config.retry;
        let max_attempts = policy.attempts();
        let mut attempt = 0;
        loop {
            attempt += 1;
            let mut doc = self.load().await?;
            let (output, remove) = match mutate(&mut doc) {
                Change::Unchanged(output) => {
                    debug!(store = %self.full_name, op, "nothing to save");
                    return Ok(output);
                }
                Change::Changed(output) => (output, false),
                Change::Removed(output) => (output, true),
            };

            match self.commit(doc, remove).await {
                Ok(version) => {
                    debug!(store = %self.full_name, op, attempt, %version, "document committed");
                    return Ok(output);
                }
                Err(e) if e.is_conflict() => {
                    if attempt >= max_attempts {
                        warn!(
                            store = %self.full_name,
                            op,
                            attempts = attempt,
                            "giving up after repeated version conflicts"
                        );
                        return Err(KvError::ConcurrentModification {
                            full_name: self.full_name.clone(),
                            attempts: attempt,
                        });
                    }
                    let delay = policy.backoff_for(attempt);
                    debug!(
                        store = %self.full_name,
                        op,
                        attempt,
                        error = %e,
                        delay_ms = delay.as_millis() as u64,
                        "version conflict; retrying"
                    );
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

/// Identifiers of every store held by `service`, sorted.
pub async fn list_stores(service: &dyn DocumentService) -> KvResult<Vec<String>> {
    Ok(service.list(STORE_PREFIX).await?)
}

impl std::fmt::Display for KvStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "KvStore(name={:?})", self.name)
    }
}

impl std::fmt::Debug for KvStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KvStore")
            .field("name", &self.name)
            .field("full_name", &self.full_name)
            .field("config", &self.config)
            .finish()
    }
}
