// src/models/enrollment.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::{Collection, Document};

/// Enrollment lifecycle:
/// `pending -> active -> completed`, `pending -> declined`, `active -> dropped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EnrollmentStatus {
    Pending,
    Active,
    Completed,
    Dropped,
    Declined,
}

impl EnrollmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnrollmentStatus::Pending => "pending",
            EnrollmentStatus::Active => "active",
            EnrollmentStatus::Completed => "completed",
            EnrollmentStatus::Dropped => "dropped",
            EnrollmentStatus::Declined => "declined",
        }
    }

    pub fn can_transition_to(&self, next: EnrollmentStatus) -> bool {
        use EnrollmentStatus::*;
        matches!(
            (self, next),
            (Pending, Active) | (Pending, Declined) | (Active, Completed) | (Active, Dropped)
        )
    }

    /// Whether an enrollment in this status prevents the student from joining the
    /// same batch again. Only declined and dropped enrollments free the slot.
    pub fn blocks_rejoin(&self) -> bool {
        !matches!(self, EnrollmentStatus::Declined | EnrollmentStatus::Dropped)
    }
}

/// Represents the 'enrollments' collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Enrollment {
    pub id: String,
    pub student_id: String,
    pub batch_id: String,
    pub course_group_id: String,
    pub status: EnrollmentStatus,
    pub enrolled_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dropped_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_code: Option<String>,
}

impl Document for Enrollment {
    const COLLECTION: Collection = Collection::Enrollments;

    fn id(&self) -> &str {
        &self.id
    }
}

/// Enrollment joined with the student's display details for teacher views.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentView {
    #[serde(flatten)]
    pub enrollment: Enrollment,
    pub student_name: Option<String>,
    pub student_email: Option<String>,
}

/// Query parameters for listing enrollments.
#[derive(Debug, Deserialize)]
pub struct EnrollmentListParams {
    pub status: Option<EnrollmentStatus>,
}
