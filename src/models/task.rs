// src/models/task.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::store::{Collection, Document};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TaskType {
    DailyListening,
    Cba,
    Oba,
    SlokaMemorization,
    Announcement,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::DailyListening => "dailyListening",
            TaskType::Cba => "cba",
            TaskType::Oba => "oba",
            TaskType::SlokaMemorization => "slokaMemorization",
            TaskType::Announcement => "announcement",
        }
    }
}

/// Teacher-controlled; nothing closes a task automatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TaskStatus {
    #[default]
    Draft,
    Published,
    Closed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Draft => "draft",
            TaskStatus::Published => "published",
            TaskStatus::Closed => "closed",
        }
    }

    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        matches!(
            (self, next),
            (TaskStatus::Draft, TaskStatus::Published) | (TaskStatus::Published, TaskStatus::Closed)
        )
    }
}

/// Represents the 'tasks' collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub batch_id: String,
    pub teacher_id: String,
    #[serde(rename = "type")]
    pub task_type: TaskType,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Students see the task from local midnight of this date.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub max_points: u32,
    #[serde(default)]
    pub allowed_file_types: Vec<String>,
    #[serde(default)]
    pub allow_late_submission: bool,
    #[serde(default)]
    pub late_submission_days: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    #[serde(default)]
    pub submission_count: i64,
}

impl Document for Task {
    const COLLECTION: Collection = Collection::Tasks;

    fn id(&self) -> &str {
        &self.id
    }
}

impl Task {
    /// Announcements carry no due date, points or lateness rules.
    pub fn normalize_for_type(&mut self) {
        if self.task_type == TaskType::Announcement {
            self.due_date = None;
            self.max_points = 0;
            self.allow_late_submission = false;
            self.late_submission_days = 0;
        }
    }

    pub fn accepts_submissions(&self) -> bool {
        self.task_type != TaskType::Announcement
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskRequest {
    #[validate(length(min = 1, max = 200, message = "Title length must be between 1 and 200 chars"))]
    pub title: String,
    #[validate(length(max = 20000))]
    #[serde(default)]
    pub description: String,
    #[validate(length(min = 1))]
    pub batch_id: String,
    #[serde(rename = "type")]
    pub task_type: TaskType,
    pub status: Option<TaskStatus>,
    pub start_date: Option<DateTime<Utc>>,
    pub due_date: Option<DateTime<Utc>>,
    #[validate(range(max = 10000))]
    #[serde(default)]
    pub max_points: u32,
    #[serde(default)]
    pub allowed_file_types: Vec<String>,
    #[serde(default)]
    pub allow_late_submission: bool,
    #[validate(range(max = 365))]
    #[serde(default)]
    pub late_submission_days: u32,
    #[validate(length(max = 5000))]
    pub instructions: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTaskRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    #[validate(length(max = 20000))]
    pub description: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub due_date: Option<DateTime<Utc>>,
    #[validate(range(max = 10000))]
    pub max_points: Option<u32>,
    pub allowed_file_types: Option<Vec<String>>,
    pub allow_late_submission: Option<bool>,
    #[validate(range(max = 365))]
    pub late_submission_days: Option<u32>,
    #[validate(length(max = 5000))]
    pub instructions: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SetTaskStatusRequest {
    pub status: TaskStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_type_wire_names() {
        assert_eq!(
            serde_json::to_value(TaskType::DailyListening).unwrap(),
            serde_json::json!("dailyListening")
        );
        assert_eq!(
            serde_json::to_value(TaskType::SlokaMemorization).unwrap(),
            serde_json::json!("slokaMemorization")
        );
        assert_eq!(TaskType::Cba.as_str(), "cba");
    }

    #[test]
    fn status_moves_forward_only() {
        assert!(TaskStatus::Draft.can_transition_to(TaskStatus::Published));
        assert!(TaskStatus::Published.can_transition_to(TaskStatus::Closed));
        assert!(!TaskStatus::Closed.can_transition_to(TaskStatus::Published));
        assert!(!TaskStatus::Published.can_transition_to(TaskStatus::Draft));
        assert!(!TaskStatus::Draft.can_transition_to(TaskStatus::Closed));
    }
}
