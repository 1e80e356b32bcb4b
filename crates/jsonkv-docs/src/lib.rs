//! Versioned JSON document service for jsonkv.
//!
//! A document service stores one opaque JSON value per identifier and stamps
//! every save with a monotonically increasing [`Version`]. Saves are
//! conditional: the caller passes the version it last observed and the
//! service rejects the write with [`DocumentError::VersionConflict`] if
//! somebody else got there first. This is the only isolation primitive the
//! key-value layer above relies on.
//!
//! # Backends
//!
//! All backends implement the [`DocumentService`] trait:
//!
//! - [`InMemoryDocumentService`] -- `HashMap`-based service for tests and embedding
//! - [`FsDocumentService`] -- one JSON file per identifier under a root directory
//!
//! # Design Rules
//!
//! 1. A missing document is reported as [`DocumentError::NotFound`], never as
//!    an empty value.
//! 2. `save` either replaces the whole document or changes nothing, and
//!    `delete` is conditional on the version in the same way.
//! 3. Versions start at `r1` for the first save and advance by one per save.
//!    They never repeat for an identifier, even across a delete.
//! 4. The service never interprets document contents.
//! 5. Transport and I/O errors are propagated, never silently ignored.

pub mod error;
pub mod fs;
pub mod memory;
pub mod traits;
pub mod version;

// Re-export primary types at crate root for ergonomic imports.
pub use error::{DocumentError, DocumentResult};
pub use fs::FsDocumentService;
pub use memory::InMemoryDocumentService;
pub use traits::DocumentService;
pub use version::{Document, Version};
