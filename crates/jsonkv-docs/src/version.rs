use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Revision token attached to a stored document.
///
/// `Absent` stands for "no document yet" and is what a caller passes to
/// `save` when creating a document for the first time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Version {
    /// No document exists under the identifier.
    Absent,
    /// The document has been saved `n` times.
    Revision(u64),
}

impl Version {
    /// The version a successful save produces on top of `self`.
    pub fn next(&self) -> Self {
        match self {
            Self::Absent => Self::Revision(1),
            Self::Revision(n) => Self::Revision(n.saturating_add(1)),
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    /// The revision number, if a document exists.
    pub fn revision(&self) -> Option<u64> {
        match self {
            Self::Absent => None,
            Self::Revision(n) => Some(*n),
        }
    }
}

impl Default for Version {
    fn default() -> Self {
        Self::Absent
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Absent => write!(f, "absent"),
            Self::Revision(n) => write!(f, "r{n}"),
        }
    }
}

/// A loaded document: the stored JSON value and the version it was read at.
#[derive(Clone, Debug, PartialEq)]
pub struct Document {
    pub value: Value,
    pub version: Version,
}

impl Document {
    pub fn new(value: Value, version: Version) -> Self {
        Self { value, version }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_advances_from_absent() {
        assert_eq!(Version::Absent.next(), Version::Revision(1));
        assert_eq!(Version::Revision(7).next(), Version::Revision(8));
    }

    #[test]
    fn next_saturates() {
        assert_eq!(Version::Revision(u64::MAX).next(), Version::Revision(u64::MAX));
    }

    #[test]
    fn display() {
        assert_eq!(Version::Absent.to_string(), "absent");
        assert_eq!(Version::Revision(12).to_string(), "r12");
    }

    #[test]
    fn revision_number() {
        assert_eq!(Version::Absent.revision(), None);
        assert_eq!(Version::Revision(3).revision(), Some(3));
    }

    #[test]
    fn default_is_absent() {
        assert!(Version::default().is_absent());
        assert!(!Version::Revision(1).is_absent());
    }
}
