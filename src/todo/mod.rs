//! Todo domain types

pub mod keys;

use serde::{Deserialize, Serialize};

/// A todo record as served by the remote `todos` resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Todo {
    /// Server-assigned identifier, never changes
    pub id: String,

    /// Free-text content
    pub content: String,

    /// Completion flag
    pub is_done: bool,
}

impl Todo {
    /// Return a copy with `patch` merged in
    pub fn merged(&self, patch: &TodoPatch) -> Self {
        Self {
            id: self.id.clone(),
            content: patch.content.clone().unwrap_or_else(|| self.content.clone()),
            is_done: patch.is_done.unwrap_or(self.is_done),
        }
    }
}

/// Partial field set for an update
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TodoPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_done: Option<bool>,
}

impl TodoPatch {
    pub fn content(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            is_done: None,
        }
    }

    pub fn done(is_done: bool) -> Self {
        Self {
            content: None,
            is_done: Some(is_done),
        }
    }

    /// True when no field is set
    pub fn is_empty(&self) -> bool {
        self.content.is_none() && self.is_done.is_none()
    }
}

/// Request body for creating a todo
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTodo<'a> {
    pub content: &'a str,
    pub is_done: bool,
}

impl<'a> NewTodo<'a> {
    pub fn new(content: &'a str) -> Self {
        Self {
            content,
            is_done: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn todo() -> Todo {
        Todo {
            id: "1".to_string(),
            content: "a".to_string(),
            is_done: false,
        }
    }

    #[test]
    fn wire_format_uses_camel_case() {
        let json = serde_json::to_value(todo()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"id": "1", "content": "a", "isDone": false})
        );
    }

    #[test]
    fn patch_merges_only_set_fields() {
        let merged = todo().merged(&TodoPatch::done(true));
        assert_eq!(merged.content, "a");
        assert!(merged.is_done);

        let merged = todo().merged(&TodoPatch::content("b"));
        assert_eq!(merged.content, "b");
        assert!(!merged.is_done);
    }

    #[test]
    fn patch_omits_unset_fields_on_the_wire() {
        let json = serde_json::to_string(&TodoPatch::done(true)).unwrap();
        assert_eq!(json, r#"{"isDone":true}"#);
        assert!(TodoPatch::default().is_empty());
    }

    #[test]
    fn new_todo_starts_undone() {
        let json = serde_json::to_value(NewTodo::new("buy milk")).unwrap();
        assert_eq!(json["isDone"], false);
        assert_eq!(json["content"], "buy milk");
    }
}
