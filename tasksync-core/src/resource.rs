//! Tagged outcome wrapper.

use crate::error::{TaskError, TaskResult};

/// Outcome of a fetch, delivered as a value on every stream and subscription.
///
/// Exactly one variant is active. Failures are data, not stream termination:
/// a `Failure` never closes the channel it travels on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resource<T> {
    Loading,
    Success(T),
    Failure(TaskError),
}

impl<T> Resource<T> {
    pub fn data(&self) -> Option<&T> {
        match self {
            Self::Success(data) => Some(data),
            _ => None,
        }
    }

    pub fn into_data(self) -> Option<T> {
        match self {
            Self::Success(data) => Some(data),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&TaskError> {
        match self {
            Self::Failure(err) => Some(err),
            _ => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure(_))
    }

    pub fn as_ref(&self) -> Resource<&T> {
        match self {
            Self::Loading => Resource::Loading,
            Self::Success(data) => Resource::Success(data),
            Self::Failure(err) => Resource::Failure(err.clone()),
        }
    }

    pub fn map<U, F>(self, f: F) -> Resource<U>
    where
        F: FnOnce(T) -> U,
    {
        match self {
            Self::Loading => Resource::Loading,
            Self::Success(data) => Resource::Success(f(data)),
            Self::Failure(err) => Resource::Failure(err),
        }
    }
}

impl<T> From<TaskResult<T>> for Resource<T> {
    fn from(result: TaskResult<T>) -> Self {
        match result {
            Ok(data) => Self::Success(data),
            Err(err) => Self::Failure(err),
        }
    }
}
