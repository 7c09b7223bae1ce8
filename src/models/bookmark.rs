// src/models/bookmark.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::{Collection, Document};

/// Represents the 'taskBookmarks' collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskBookmark {
    pub id: String,
    pub student_id: String,
    pub task_id: String,
    pub batch_id: String,
    pub created_at: DateTime<Utc>,
}

impl TaskBookmark {
    /// Bookmarks are keyed by (student, task) so toggling never duplicates.
    pub fn key(student_id: &str, task_id: &str) -> String {
        format!("{}_{}", student_id, task_id)
    }
}

impl Document for TaskBookmark {
    const COLLECTION: Collection = Collection::TaskBookmarks;

    fn id(&self) -> &str {
        &self.id
    }
}
