//! Remote todo service abstraction
//!
//! The cache layer talks to the `todos` resource through this trait so the
//! transport can be swapped:
//! - `HttpTodoService`: the REST API (json-server compatible)
//! - `MemoryTodoService`: an in-process backend for tests and offline use

mod factory;
mod http;
mod memory;

pub use factory::{create_service, Backend};
pub use http::HttpTodoService;
pub use memory::{MemoryTodoService, Operation, UpdateGate};

use crate::error::TallyResult;
use crate::todo::{Todo, TodoPatch};
use async_trait::async_trait;

/// Abstract remote `todos` collection
///
/// Every failure surfaces as `TallyError::Service`; there is no
/// distinction between not-found, validation and server faults.
#[async_trait]
pub trait TodoService: Send + Sync {
    /// Fetch all todos in server order
    async fn list(&self) -> TallyResult<Vec<Todo>>;

    /// Fetch one todo
    async fn get_by_id(&self, id: &str) -> TallyResult<Todo>;

    /// Create a todo; the server assigns the id and `is_done = false`
    async fn create(&self, content: &str) -> TallyResult<Todo>;

    /// Merge `patch` into a todo and return the merged record
    async fn update(&self, id: &str, patch: &TodoPatch) -> TallyResult<Todo>;

    /// Delete a todo and return the deleted record
    async fn delete(&self, id: &str) -> TallyResult<Todo>;

    /// Human-readable backend name for display
    fn backend_name(&self) -> &'static str;
}
