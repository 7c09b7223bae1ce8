// src/models/batch.rs

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::store::{Collection, Document};

static CLASS_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_-]{2,31}$").expect("valid class code pattern"));

/// Represents the 'batches' collection.
///
/// `class_code` is the only way a student can join. Lookups succeed only when exactly
/// one active batch carries the code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Batch {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub course_group_id: String,
    pub teacher_id: String,
    pub class_code: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_active: bool,
    #[serde(default)]
    pub student_count: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<DateTime<Utc>>,
}

impl Document for Batch {
    const COLLECTION: Collection = Collection::Batches;

    fn id(&self) -> &str {
        &self.id
    }
}

/// What a student learns from a class code: ids only, no batch details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassCodeMatch {
    pub batch_id: String,
    pub course_group_id: String,
}

fn validate_class_code_format(code: &str) -> Result<(), validator::ValidationError> {
    if !CLASS_CODE.is_match(code.trim()) {
        return Err(validator::ValidationError::new("invalid_class_code"));
    }
    Ok(())
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateBatchRequest {
    #[validate(length(min = 1, max = 100, message = "Name length must be between 1 and 100 chars"))]
    pub name: String,
    #[validate(length(max = 2000))]
    #[serde(default)]
    pub description: String,
    #[validate(length(min = 1))]
    pub course_group_id: String,
    #[validate(custom(function = validate_class_code_format))]
    pub class_code: String,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBatchRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    pub class_code: Option<String>,
    pub is_active: Option<bool>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

impl UpdateBatchRequest {
    /// Checks the fields `validator` cannot reach on optional values.
    pub fn class_code_is_valid(&self) -> bool {
        self.class_code
            .as_deref()
            .is_none_or(|code| validate_class_code_format(code).is_ok())
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct JoinBatchRequest {
    #[validate(length(min = 1, max = 64, message = "Class code is required"))]
    pub class_code: String,
}
