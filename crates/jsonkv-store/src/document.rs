//! The persisted store document.
//!
//! A store is one JSON object. User entries sit next to a reserved
//! [`STATE_KEY`] marker, which is what tells a store apart from unrelated
//! data under the same identifier:
//!
//! ```text
//! {"__kv_state__": "READY", "foo": "test", "bar": [1, 2]}
//! ```

use jsonkv_docs::Version;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Reserved key holding the store state marker inside the document.
pub const STATE_KEY: &str = "__kv_state__";

/// Returns `true` if `key` is reserved for store metadata.
pub fn is_reserved_key(key: &str) -> bool {
    key == STATE_KEY
}

/// State recorded under [`STATE_KEY`].
///
/// Only `Ready` exists today; the marker leaves room for a locking protocol.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StoreState {
    Ready,
}

impl StoreState {
    /// The persisted form, as produced by the serde representation.
    pub fn to_value(self) -> Value {
        serde_json::json!(self)
    }
}

/// Why a loaded document cannot back a store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidDocument {
    #[error("document is {0}, not an object")]
    NotAnObject(&'static str),

    #[error("document has no state marker")]
    MissingState,
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// The JSON object backing a store, plus the version it was loaded at.
///
/// The state marker is kept in `contents` so it round-trips on save, but
/// every read accessor hides it.
#[derive(Clone, Debug, PartialEq)]
pub struct StoreDocument {
    contents: Map<String, Value>,
    version: Version,
}

impl StoreDocument {
    /// A document for a store that has never been saved.
    pub fn fresh() -> Self {
        let mut contents = Map::new();
        contents.insert(STATE_KEY.to_string(), StoreState::Ready.to_value());
        Self {
            contents,
            version: Version::Absent,
        }
    }

    /// Check that `raw` has the shape of a store document.
    ///
    /// The value must be an object carrying a non-null state marker.
    /// Anything else means the identifier holds unrelated data.
    pub fn validate(raw: Value, version: Version) -> Result<Self, InvalidDocument> {
        let contents = match raw {
            Value::Object(map) => map,
            other => return Err(InvalidDocument::NotAnObject(json_kind(&other))),
        };
        match contents.get(STATE_KEY) {
            None | Some(Value::Null) => Err(InvalidDocument::MissingState),
            Some(_) => Ok(Self { contents, version }),
        }
    }

    pub fn version(&self) -> Version {
        self.version
    }

    /// The parsed state marker, or `None` if it holds an unknown value.
    pub fn state(&self) -> Option<StoreState> {
        self.contents
            .get(STATE_KEY)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        if is_reserved_key(key) {
            return None;
        }
        self.contents.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Number of user entries.
    pub fn len(&self) -> usize {
        self.entries().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// User entries in document order.
    pub fn entries(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.contents.iter().filter(|(k, _)| !is_reserved_key(k))
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.entries().map(|(k, _)| k)
    }

    /// Consume the document, returning the user entries only.
    pub fn into_entries(mut self) -> Map<String, Value> {
        self.contents.retain(|k, _| !is_reserved_key(k));
        self.contents
    }

    /// The full persisted form, state marker included.
    pub fn to_value(&self) -> Value {
        Value::Object(self.contents.clone())
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.contents)
    }

    /// Callers must reject reserved keys before inserting.
    pub(crate) fn insert(&mut self, key: String, value: Value) -> Option<Value> {
        debug_assert!(!is_reserved_key(&key));
        self.contents.insert(key, value)
    }

    /// Callers must reject reserved keys before removing.
    ///
    /// `retain` keeps the order of the remaining entries intact.
    pub(crate) fn remove(&mut self, key: &str) -> Option<Value> {
        debug_assert!(!is_reserved_key(key));
        let old = self.contents.get(key).cloned();
        if old.is_some() {
            self.contents.retain(|k, _| k != key);
        }
        old
    }
}
