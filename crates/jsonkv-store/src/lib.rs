//! Named key-value stores persisted as a single versioned JSON document.
//!
//! A store called `demo` lives in a [`DocumentService`] under the identifier
//! `jsonkv-demo`, as one JSON object mapping keys to arbitrary JSON values.
//! The object also carries a reserved state marker (`__kv_state__`) that
//! identifies it as a store; documents without it are refused rather than
//! treated as empty.
//!
//! # Consistency
//!
//! - No document state is cached: every operation loads afresh.
//! - Writes are conditional on the version that was loaded. A lost race
//!   re-runs the whole load-modify-save cycle, so concurrent writers to
//!   different keys never drop each other's updates.
//! - After [`RetryPolicy::max_attempts`] lost races the write fails with
//!   [`KvError::ConcurrentModification`].
//!
//! # Modules
//!
//! - [`names`] — identifier resolution
//! - [`document`] — the store document and its validation
//! - [`store`] — the async [`KvStore`]
//! - [`blocking`] — [`BlockingKvStore`], the same API for synchronous callers
//! - [`config`] — [`StoreConfig`] and [`RetryPolicy`]
//! - [`error`] — [`KvError`]
//!
//! [`DocumentService`]: jsonkv_docs::DocumentService

pub mod blocking;
pub mod config;
pub mod document;
pub mod error;
pub mod names;
pub mod store;

pub use blocking::BlockingKvStore;
pub use config::{RetryPolicy, StoreConfig};
pub use document::{StoreDocument, StoreState, STATE_KEY};
pub use error::{KvError, KvResult};
pub use names::{resolve, STORE_PREFIX};
pub use store::{list_stores, KvStore};

// Re-export the service layer so most users need a single dependency.
pub use jsonkv_docs::{
    DocumentError, DocumentService, FsDocumentService, InMemoryDocumentService, Version,
};
