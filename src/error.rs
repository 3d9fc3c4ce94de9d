//! Error types for Tally
//!
//! All modules use `TallyResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for Tally operations
pub type TallyResult<T> = Result<T, TallyError>;

/// All errors that can occur in Tally
#[derive(Error, Debug)]
pub enum TallyError {
    // Remote service errors
    #[error("{message}")]
    Service { message: String },

    // Cache errors
    #[error("Todo {id} is not in the cache. Run a list query first")]
    CacheConsistency { id: String },

    // Caller-side errors
    #[error("{0}")]
    Precondition(String),

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Counter storage errors
    #[error("Corrupt storage file {path}: {reason}")]
    StorageCorrupt { path: PathBuf, reason: String },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    User(String),
}

impl TallyError {
    /// Create a service error from an operation label and transport detail
    pub fn service(operation: &str, detail: impl std::fmt::Display) -> Self {
        Self::Service {
            message: format!("{}: {}", operation, detail),
        }
    }

    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Whether the error came from the remote todo service
    pub fn is_service(&self) -> bool {
        matches!(self, Self::Service { .. })
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::Service { .. } => {
                Some("Is the todo server running? Check api.base_url, or pass --memory")
            }
            Self::CacheConsistency { .. } => Some("Run: tally list"),
            Self::ConfigInvalid { .. } => Some("Run: tally config init --force"),
            _ => None,
        }
    }
}
