use crate::version::Version;

/// Errors from document service operations.
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    /// No document exists under the identifier.
    #[error("document not found: {0}")]
    NotFound(String),

    /// A conditional save observed a different current version.
    #[error("version conflict on {identifier}: expected {expected}, found {actual}")]
    VersionConflict {
        identifier: String,
        expected: Version,
        actual: Version,
    },

    /// The identifier cannot be used by this backend.
    #[error("invalid identifier {identifier:?}: {reason}")]
    InvalidIdentifier { identifier: String, reason: String },

    /// The service could not be reached or answered with a failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// The service refused the credentials or the operation.
    #[error("authorization error: {0}")]
    Auth(String),

    /// A stored document could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DocumentError {
    /// Returns `true` for [`DocumentError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Returns `true` for [`DocumentError::VersionConflict`].
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::VersionConflict { .. })
    }
}

/// Result alias for document service operations.
pub type DocumentResult<T> = Result<T, DocumentError>;

/// Fail with [`DocumentError::VersionConflict`] unless `current == expected`.
pub(crate) fn check_version(
    identifier: &str,
    expected: Version,
    current: Version,
) -> DocumentResult<()> {
    if current == expected {
        return Ok(());
    }
    Err(DocumentError::VersionConflict {
        identifier: identifier.to_string(),
        expected,
        actual: current,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_display_names_both_versions() {
        let err = DocumentError::VersionConflict {
            identifier: "jsonkv-demo".into(),
            expected: Version::Revision(3),
            actual: Version::Revision(4),
        };
        assert_eq!(
            err.to_string(),
            "version conflict on jsonkv-demo: expected r3, found r4"
        );
        assert!(err.is_conflict());
        assert!(!err.is_not_found());
    }

    #[test]
    fn not_found_predicate() {
        let err = DocumentError::NotFound("x".into());
        assert!(err.is_not_found());
        assert!(!err.is_conflict());
        assert!(!DocumentError::Transport("down".into()).is_not_found());
    }
}
