// src/models/user.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::store::{Collection, Document};

/// Portal role of a user. `Teacher` is sticky: enrollment never downgrades it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Role {
    Teacher,
    Student,
    #[default]
    Registered,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Teacher => "teacher",
            Role::Student => "student",
            Role::Registered => "registered",
        }
    }
}

/// Represents the 'users' collection. The id is the identity provider's uid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub whatsapp_number: Option<String>,
    #[serde(default)]
    pub role: Role,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_login_at: Option<DateTime<Utc>>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

impl Document for User {
    const COLLECTION: Collection = Collection::Users;

    fn id(&self) -> &str {
        &self.id
    }
}

/// Represents the 'teachers' collection, keyed by normalized email.
/// Removal is a soft delete: the record stays with `isActive: false`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeacherRecord {
    pub id: String,
    pub email: String,
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub added_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub added_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub removed_at: Option<DateTime<Utc>>,
}

impl Document for TeacherRecord {
    const COLLECTION: Collection = Collection::Teachers;

    fn id(&self) -> &str {
        &self.id
    }
}

/// Represents the 'userRoles' collection, keyed by uid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRoleRecord {
    pub id: String,
    #[serde(default)]
    pub email: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Document for UserRoleRecord {
    const COLLECTION: Collection = Collection::UserRoles;

    fn id(&self) -> &str {
        &self.id
    }
}

/// The authenticated caller, as carried by the identity provider's token.
/// Injected into request extensions by the auth middleware.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub uid: String,
    pub email: String,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
}

/// Returned by the session endpoint.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub user: User,
    pub role: Role,
}

/// DTO for a user editing their own profile.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    #[validate(length(min = 1, max = 100, message = "Name length must be between 1 and 100 characters."))]
    pub name: Option<String>,
    #[validate(length(min = 7, max = 20, message = "WhatsApp number must be between 7 and 20 characters."))]
    pub whatsapp_number: Option<String>,
    #[validate(length(max = 500))]
    pub profile_image_url: Option<String>,
}

/// Query parameters for listing teachers.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeacherListParams {
    #[serde(default)]
    pub active_only: bool,
}

/// DTO for granting teacher access.
#[derive(Debug, Deserialize, Validate)]
pub struct AddTeacherRequest {
    #[validate(email(message = "A valid email address is required."))]
    pub email: String,
}
