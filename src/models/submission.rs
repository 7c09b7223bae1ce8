// src/models/submission.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::store::{Collection, Document};

/// `draft -> submitted -> graded`. Grading is teacher-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SubmissionStatus {
    Draft,
    Submitted,
    Graded,
}

impl SubmissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionStatus::Draft => "draft",
            SubmissionStatus::Submitted => "submitted",
            SubmissionStatus::Graded => "graded",
        }
    }

    /// Counts towards completion statistics.
    pub fn is_turned_in(&self) -> bool {
        matches!(self, SubmissionStatus::Submitted | SubmissionStatus::Graded)
    }
}

/// Represents the 'submissions' collection. One per (task, student).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub id: String,
    pub task_id: String,
    pub student_id: String,
    pub batch_id: String,
    pub status: SubmissionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub file_urls: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recording_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grade: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graded_at: Option<DateTime<Utc>>,
}

impl Document for Submission {
    const COLLECTION: Collection = Collection::Submissions;

    fn id(&self) -> &str {
        &self.id
    }
}

impl Submission {
    /// Every blob URL this submission references.
    pub fn all_file_urls(&self) -> Vec<String> {
        let mut urls = self.file_urls.clone();
        urls.extend(self.recording_url.iter().cloned());
        urls
    }
}

/// DTO for turning in (or, within the grace period, editing) a submission.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequest {
    #[validate(length(max = 20, message = "At most 20 files per submission"))]
    #[serde(default)]
    pub file_urls: Vec<String>,
    #[validate(length(max = 500))]
    pub recording_url: Option<String>,
    #[validate(length(max = 5000))]
    pub notes: Option<String>,
}

impl SubmitRequest {
    pub fn has_notes(&self) -> bool {
        self.notes.as_deref().is_some_and(|n| !n.trim().is_empty())
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GradeRequest {
    #[validate(range(min = 0.0, message = "Grade cannot be negative"))]
    pub grade: f64,
    #[validate(length(max = 5000))]
    pub feedback: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteFileRequest {
    pub file_url: String,
}

/// Query parameters for a student's own submissions.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MySubmissionsParams {
    pub batch_id: Option<String>,
}
