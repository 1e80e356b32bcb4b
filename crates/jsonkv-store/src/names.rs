//! Store name resolution.
//!
//! Every store lives in the document service under a canonical identifier
//! made of a fixed prefix followed by the logical store name:
//!
//! - `demo` resolves to `jsonkv-demo`
//! - `jsonkv-demo` is already canonical and resolves to itself
//!
//! The prefix is applied at most once, so resolution is idempotent and two
//! handles built from `demo` and `jsonkv-demo` address the same document.

/// Prefix carried by every canonical store identifier.
pub const STORE_PREFIX: &str = "jsonkv-";

/// Map a logical store name to its canonical identifier.
///
/// # Examples
///
/// ```
/// use jsonkv_store::names::resolve;
///
/// assert_eq!(resolve("demo"), "jsonkv-demo");
/// assert_eq!(resolve("jsonkv-demo"), "jsonkv-demo");
/// ```
pub fn resolve(name: &str) -> String {
    if is_canonical(name) {
        name.to_string()
    } else {
        format!("{STORE_PREFIX}{name}")
    }
}

/// Returns `true` if `identifier` is in canonical (prefixed) form.
pub fn is_canonical(identifier: &str) -> bool {
    identifier.starts_with(STORE_PREFIX)
}
