//! Error types for tasksync operations

use thiserror::Error;

/// Discriminant of [`TaskError`], used by callers deciding whether to retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Transport,
    Storage,
    NotFound,
    Unknown,
}

/// Failure payload carried by [`crate::Resource::Failure`].
///
/// Failures cross the engine boundary as values, so this type is `Clone`
/// (replayed to late subscribers) and `PartialEq` (compared in tests).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TaskError {
    #[error("Transport failure: {reason}")]
    Transport { reason: String },

    #[error("Storage failure: {reason}")]
    Storage { reason: String },

    #[error("Task not found: {id}")]
    NotFound { id: String },

    #[error("Unknown failure: {reason}")]
    Unknown { reason: String },
}

impl TaskError {
    pub fn transport(reason: impl Into<String>) -> Self {
        Self::Transport {
            reason: reason.into(),
        }
    }

    pub fn storage(reason: impl Into<String>) -> Self {
        Self::Storage {
            reason: reason.into(),
        }
    }

    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    pub fn unknown(reason: impl Into<String>) -> Self {
        Self::Unknown {
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Transport { .. } => ErrorKind::Transport,
            Self::Storage { .. } => ErrorKind::Storage,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Unknown { .. } => ErrorKind::Unknown,
        }
    }

    /// Whether re-running the same operation may succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::NotFound { .. })
    }
}

/// Result type alias for tasksync operations.
pub type TaskResult<T> = Result<T, TaskError>;

// =============================================================================
// TESTS
// =============================================================================
