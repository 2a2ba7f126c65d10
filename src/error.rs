//! Error types for tally
//!
//! Exit codes:
//! - 0: Success
//! - 2: User error (bad args, malformed records, unknown ids)
//! - 4: Operation failed (persistence, IO, lock contention)

use std::path::PathBuf;
use thiserror::Error;

/// Exit codes for the tally CLI
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const USER_ERROR: i32 = 2;
    pub const OPERATION_FAILED: i32 = 4;
}

/// Main error type for tally operations
#[derive(Error, Debug)]
pub enum Error {
    // User errors (exit code 2)
    #[error("Malformed task {task_id}: {reason}")]
    MalformedTask { task_id: String, reason: String },

    #[error("Project not found: {0}")]
    ProjectNotFound(String),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Store not initialized: {0}")]
    NotInitialized(PathBuf),

    // Operation failures (exit code 4)
    #[error("Failed to persist aggregates for project {project_id}: {reason}")]
    PersistenceWriteFailed { project_id: String, reason: String },

    #[error("Statistics unavailable: {0}")]
    StatisticsUnavailable(#[source] Box<Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Lock acquisition failed: {0}")]
    LockFailed(PathBuf),
}

impl Error {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::MalformedTask { .. }
            | Error::ProjectNotFound(_)
            | Error::TaskNotFound(_)
            | Error::InvalidConfig(_)
            | Error::InvalidArgument(_)
            | Error::NotInitialized(_) => exit_codes::USER_ERROR,

            Error::PersistenceWriteFailed { .. }
            | Error::StatisticsUnavailable(_)
            | Error::Io(_)
            | Error::Json(_)
            | Error::TomlParse(_)
            | Error::TomlSerialize(_)
            | Error::LockFailed(_) => exit_codes::OPERATION_FAILED,
        }
    }

    /// Structured fields for JSON error output
    pub fn details(&self) -> Option<serde_json::Value> {
        use serde_json::json;

        match self {
            Error::MalformedTask { task_id, reason } => {
                Some(json!({ "task_id": task_id, "reason": reason }))
            }
            Error::ProjectNotFound(project_id) => Some(json!({ "project_id": project_id })),
            Error::TaskNotFound(task_id) => Some(json!({ "task_id": task_id })),
            Error::PersistenceWriteFailed { project_id, reason } => {
                Some(json!({ "project_id": project_id, "reason": reason }))
            }
            Error::StatisticsUnavailable(source) => Some(json!({ "source": source.to_string() })),
            Error::InvalidConfig(message) | Error::InvalidArgument(message) => {
                Some(json!({ "message": message }))
            }
            Error::LockFailed(path) | Error::NotInitialized(path) => {
                Some(json!({ "path": path.to_string_lossy() }))
            }
            _ => None,
        }
    }
}

/// Result type alias for tally operations
pub type Result<T> = std::result::Result<T, Error>;
