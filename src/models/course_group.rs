// src/models/course_group.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::store::{Collection, Document};

/// Represents the 'courseGroups' collection.
/// `batch_count` is a denormalized counter maintained at batch create/delete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseGroup {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub teacher_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_active: bool,
    #[serde(default)]
    pub batch_count: i64,
}

impl Document for CourseGroup {
    const COLLECTION: Collection = Collection::CourseGroups;

    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateCourseGroupRequest {
    #[validate(length(min = 1, max = 100, message = "Name length must be between 1 and 100 chars"))]
    pub name: String,
    #[validate(length(max = 2000))]
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCourseGroupRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    pub is_active: Option<bool>,
}
