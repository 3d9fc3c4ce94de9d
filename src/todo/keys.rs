//! Cache keys for todo queries
//!
//! All todo keys share the `["todo"]` prefix so the whole namespace can be
//! invalidated at once.

use crate::cache::QueryKey;

const TODO: &str = "todo";

/// Prefix covering every todo entry
pub fn all() -> QueryKey {
    QueryKey::new([TODO])
}

/// Key for the ordered id sequence
pub fn list() -> QueryKey {
    QueryKey::new([TODO, "list"])
}

/// Key for a single todo record
pub fn detail(id: &str) -> QueryKey {
    QueryKey::new([TODO, "detail", id])
}
