//! Errors surfaced by store operations.

use jsonkv_docs::DocumentError;
use thiserror::Error;

/// Errors surfaced by key-value store operations.
///
/// Variants fall in three groups so callers can react differently:
/// data problems (`InvalidStore`, `InvalidArgument`, `KeyNotFound`),
/// contention (`ConcurrentModification`), and everything the document
/// service reported (`Service`).
#[derive(Debug, Error)]
pub enum KvError {
    /// The identifier holds a document that is not a store.
    #[error("{full_name:?} is not a valid key value store: {reason}")]
    InvalidStore { full_name: String, reason: String },

    /// The caller passed an argument the store refuses, such as a reserved key.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Index-style lookup of a key that is not in the store.
    #[error("key {key:?} not found in store {full_name:?}")]
    KeyNotFound { key: String, full_name: String },

    /// Conditional saves kept losing to other writers.
    #[error("{full_name:?} modified concurrently; gave up after {attempts} attempts")]
    ConcurrentModification { full_name: String, attempts: u32 },

    /// A value could not be converted to or from JSON.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Store configuration could not be parsed or is out of range.
    #[error("config error: {0}")]
    Config(String),

    /// The blocking facade could not start its runtime.
    #[error("runtime error: {0}")]
    Runtime(String),

    /// Error reported by the document service, passed through unchanged.
    #[error("document service error: {0}")]
    Service(#[from] DocumentError),
}

impl KvError {
    /// Returns `true` if repeating the operation later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ConcurrentModification { .. })
    }

    /// Returns `true` for errors caused by the data or the arguments.
    pub fn is_data_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidStore { .. } | Self::InvalidArgument(_) | Self::KeyNotFound { .. }
        )
    }
}

/// Result alias for key-value store operations.
pub type KvResult<T> = Result<T, KvError>;
