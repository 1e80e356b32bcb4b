//! Blocking facade over [`KvStore`].
//!
//! [`BlockingKvStore`] owns a single-threaded tokio runtime and drives each
//! async operation to completion on it. Semantics are identical to the
//! async store. It must not be used from inside another tokio runtime;
//! async callers should use [`KvStore`] directly.

use std::future::Future;
use std::sync::Arc;

use jsonkv_docs::DocumentService;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::runtime::{Builder, Runtime};

use crate::config::StoreConfig;
use crate::error::{KvError, KvResult};
use crate::store::KvStore;

/// A [`KvStore`] whose operations block the calling thread.
pub struct BlockingKvStore {
    store: KvStore,
    runtime: Runtime,
}

impl BlockingKvStore {
    pub fn new(name: impl Into<String>, service: Arc<dyn DocumentService>) -> KvResult<Self> {
        Self::from_async(KvStore::new(name, service))
    }

    pub fn with_config(
        name: impl Into<String>,
        service: Arc<dyn DocumentService>,
        config: StoreConfig,
    ) -> KvResult<Self> {
        Self::from_async(KvStore::with_config(name, service, config))
    }

    /// Wrap an existing async store.
    pub fn from_async(store: KvStore) -> KvResult<Self> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| KvError::Runtime(e.to_string()))?;
        Ok(Self { store, runtime })
    }

    /// The async store this facade drives.
    pub fn as_async(&self) -> &KvStore {
        &self.store
    }

    pub fn name(&self) -> &str {
        self.store.name()
    }

    pub fn full_name(&self) -> &str {
        self.store.full_name()
    }

    fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }

    pub fn get(&self, key: &str, default: Value) -> KvResult<Value> {
        self.block_on(self.store.get(key, default))
    }

    pub fn get_opt(&self, key: &str) -> KvResult<Option<Value>> {
        self.block_on(self.store.get_opt(key))
    }

    pub fn get_item(&self, key: &str) -> KvResult<Value> {
        self.block_on(self.store.get_item(key))
    }

    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> KvResult<Option<T>> {
        self.block_on(self.store.get_as(key))
    }

    pub fn contains(&self, key: &str) -> KvResult<bool> {
        self.block_on(self.store.contains(key))
    }

    pub fn keys(&self) -> KvResult<Vec<String>> {
        self.block_on(self.store.keys())
    }

    pub fn dict(&self) -> KvResult<Map<String, Value>> {
        self.block_on(self.store.dict())
    }

    pub fn exists(&self) -> KvResult<bool> {
        self.block_on(self.store.exists())
    }

    pub fn set(&self, key: &str, value: impl Into<Value>) -> KvResult<()> {
        self.block_on(self.store.set(key, value))
    }

    pub fn set_item(&self, key: &str, value: impl Into<Value>) -> KvResult<()> {
        self.block_on(self.store.set_item(key, value))
    }

    pub fn set_as<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> KvResult<()> {
        self.block_on(self.store.set_as(key, value))
    }

    pub fn delete(&self, key: &str) -> KvResult<bool> {
        self.block_on(self.store.delete(key))
    }

    pub fn update<F>(&self, key: &str, f: F) -> KvResult<Option<Value>>
    where
        F: FnMut(Option<&Value>) -> Option<Value>,
    {
        self.block_on(self.store.update(key, f))
    }

    pub fn destroy(&self) -> KvResult<bool> {
        self.block_on(self.store.destroy())
    }
}

impl std::fmt::Display for BlockingKvStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.store, f)
    }
}

impl std::fmt::Debug for BlockingKvStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockingKvStore")
            .field("store", &self.store)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::STATE_KEY;
    use jsonkv_docs::{FsDocumentService, InMemoryDocumentService};
    use serde_json::json;

    #[test]
    fn blocking_walkthrough() {
        let store =
            BlockingKvStore::new("demo-store", Arc::new(InMemoryDocumentService::new())).unwrap();
        assert_eq!(store.to_string(), "KvStore(name=\"demo-store\")");

        store.set("foo", "test").unwrap();
        assert_eq!(store.get("foo", Value::Null).unwrap(), json!("test"));

        store.set_item("bar", "another test").unwrap();
        assert_eq!(store.get_item("bar").unwrap(), json!("another test"));

        store.set_item("bar", "hello").unwrap();
        assert_eq!(store.get_item("bar").unwrap(), json!("hello"));

        assert_eq!(
            Value::Object(store.dict().unwrap()),
            json!({"foo": "test", "bar": "hello"})
        );
    }

    #[test]
    fn blocking_errors_match_async() {
        let store = BlockingKvStore::new("errs", Arc::new(InMemoryDocumentService::new())).unwrap();
        assert!(matches!(
            store.set(STATE_KEY, 1),
            Err(KvError::InvalidArgument(_))
        ));
        assert!(matches!(
            store.get_item("missing"),
            Err(KvError::KeyNotFound { .. })
        ));
        assert_eq!(store.get("missing", json!(5)).unwrap(), json!(5));
    }

    #[test]
    fn blocking_and_async_handles_share_state() {
        let service = Arc::new(InMemoryDocumentService::new());
        let blocking = BlockingKvStore::new("mix", service.clone()).unwrap();
        blocking.set("k", json!({"a": [1, 2]})).unwrap();

        let rt = Builder::new_current_thread().build().unwrap();
        let async_store = KvStore::new("jsonkv-mix", service);
        let value = rt.block_on(async_store.get_item("k")).unwrap();
        assert_eq!(value, json!({"a": [1, 2]}));
    }

    #[test]
    fn filesystem_backed_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let service = Arc::new(FsDocumentService::open(dir.path()).unwrap());
            let store = BlockingKvStore::new("persisted", service).unwrap();
            store.set("count", 1).unwrap();
            store.update("count", |v| Some(json!(v.and_then(Value::as_i64).unwrap_or(0) + 1)))
                .unwrap();
        }

        let service = Arc::new(FsDocumentService::open(dir.path()).unwrap());
        let store = BlockingKvStore::new("persisted", service).unwrap();
        assert_eq!(store.get_item("count").unwrap(), json!(2));
        assert!(store.exists().unwrap());
        assert!(dir.path().join("jsonkv-persisted.json").is_file());

        assert!(store.destroy().unwrap());
        assert!(!store.exists().unwrap());
    }

    #[test]
    fn typed_round_trip() {
        let store = BlockingKvStore::new("typed", Arc::new(InMemoryDocumentService::new())).unwrap();
        store.set_as("list", &vec![1u8, 2, 3]).unwrap();
        assert_eq!(store.get_as::<Vec<u8>>("list").unwrap(), Some(vec![1, 2, 3]));
        assert!(store.delete("list").unwrap());
        assert_eq!(store.keys().unwrap(), Vec::<String>::new());
    }
}
