//! Cached record type and the remote collection envelope.

use serde::{Deserialize, Serialize};

/// Identifier of a task. Opaque string assigned by whichever side persisted it.
pub type TaskId = String;

/// A task record.
///
/// `id` is absent for drafts that have not been persisted anywhere yet.
/// Equality is structural over all three fields, which is what change
/// detection between the cache, the local store and the remote relies on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Task {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<TaskId>,
    pub title: String,
    #[serde(default)]
    pub description: String,
}

impl Task {
    /// Create a persisted task.
    pub fn new(
        id: impl Into<TaskId>,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: Some(id.into()),
            title: title.into(),
            description: description.into(),
        }
    }

    /// Create a task that has no id yet.
    pub fn draft(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: None,
            title: title.into(),
            description: description.into(),
        }
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Case-insensitive prefix match on title or description.
    ///
    /// An empty prefix matches every task.
    pub fn matches_prefix(&self, prefix: &str) -> bool {
        starts_with_ignore_case(&self.title, prefix)
            || starts_with_ignore_case(&self.description, prefix)
    }
}

fn starts_with_ignore_case(haystack: &str, prefix: &str) -> bool {
    let mut hay = haystack.chars().flat_map(char::to_lowercase);
    prefix
        .chars()
        .flat_map(char::to_lowercase)
        .all(|p| hay.next() == Some(p))
}

/// Envelope used by the remote collection endpoint: `{"records": [...]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub records: Vec<T>,
}
