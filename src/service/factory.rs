//! Service factory for picking a todo backend
//!
//! The CLI talks to the REST API unless `--memory` asks for the in-process
//! backend.

use crate::config::Config;
use crate::service::{HttpTodoService, MemoryTodoService, TodoService};
use std::sync::Arc;

/// Selected todo backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// REST API at `api.base_url`
    Http,
    /// In-process store, empty at startup and gone at exit
    Memory,
}

impl Backend {
    pub fn from_flag(memory: bool) -> Self {
        if memory {
            Backend::Memory
        } else {
            Backend::Http
        }
    }

    /// Get a human-readable backend name
    pub fn name(&self) -> &'static str {
        match self {
            Backend::Http => "http",
            Backend::Memory => "memory",
        }
    }
}

/// Create the todo service for `backend`
pub fn create_service(config: &Config, backend: Backend) -> Arc<dyn TodoService> {
    match backend {
        Backend::Http => Arc::new(HttpTodoService::new(&config.api)),
        Backend::Memory => Arc::new(MemoryTodoService::new()),
    }
}
