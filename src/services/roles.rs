// src/services/roles.rs

//! Who is a teacher, who is a student.
//!
//! Teacher status comes from the `teachers` collection (keyed by normalized email);
//! everyone else's role lives in `userRoles` (keyed by uid). Role checks never fail
//! the caller: a store error means "not a teacher".

use chrono::{DateTime, Utc};
use serde_json::{Map, Value, json};

use crate::{
    error::AppError,
    models::user::{Role, Session, TeacherRecord, UpdateProfileRequest, User, UserRoleRecord},
    store::{Filter, Store},
};

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// True iff an active teacher record exists for `email`.
pub async fn is_teacher_email(store: &Store, email: &str) -> bool {
    let key = normalize_email(email);
    if key.is_empty() {
        return false;
    }

    match store.get::<TeacherRecord>(&key).await {
        Ok(record) => record.is_some_and(|r| r.is_active),
        Err(e) => {
            tracing::error!("Teacher lookup failed for {}: {}", key, e);
            false
        }
    }
}

/// Resolves the caller's effective role.
pub async fn resolve_role(store: &Store, uid: &str, email: &str) -> Role {
    if is_teacher_email(store, email).await {
        return Role::Teacher;
    }

    match store.get::<UserRoleRecord>(uid).await {
        Ok(Some(record)) => record.role,
        Ok(None) => Role::Registered,
        Err(e) => {
            tracing::error!("Role lookup failed for {}: {}", uid, e);
            Role::Registered
        }
    }
}

/// Marks the user as a student unless they are already a teacher.
/// Returns the role the user ends up with.
pub async fn assign_student_role(
    store: &Store,
    uid: &str,
    email: &str,
    now: DateTime<Utc>,
) -> Result<Role, AppError> {
    if is_teacher_email(store, email).await {
        return Ok(Role::Teacher);
    }
    if let Some(existing) = store.get::<UserRoleRecord>(uid).await? {
        if existing.role == Role::Teacher {
            return Ok(Role::Teacher);
        }
    }

    store
        .upsert::<UserRoleRecord>(
            uid,
            json!({
                "email": normalize_email(email),
                "role": Role::Student,
                "updatedAt": now,
            }),
        )
        .await?;

    // The profile mirrors the role for display; it may not exist yet.
    store
        .update::<User>(uid, json!({ "role": Role::Student }))
        .await?;

    tracing::info!("Assigned student role to {}", uid);
    Ok(Role::Student)
}

/// Grants (or re-activates) teacher access.
pub async fn add_teacher(
    store: &Store,
    email: &str,
    added_by: Option<&str>,
    now: DateTime<Utc>,
) -> Result<TeacherRecord, AppError> {
    let key = normalize_email(email);
    if key.is_empty() {
        return Err(AppError::BadRequest("Email is required".to_string()));
    }

    store
        .upsert::<TeacherRecord>(
            &key,
            json!({
                "email": key,
                "isActive": true,
                "addedAt": now,
                "addedBy": added_by,
                "removedAt": null,
            }),
        )
        .await?;

    tracing::info!("Teacher access granted to {}", key);
    store
        .get::<TeacherRecord>(&key)
        .await?
        .ok_or_else(|| AppError::InternalServerError("Teacher record vanished after write".to_string()))
}

/// Revokes teacher access. The record stays, marked inactive.
pub async fn remove_teacher(store: &Store, email: &str, now: DateTime<Utc>) -> Result<(), AppError> {
    let key = normalize_email(email);
    let updated = store
        .update::<TeacherRecord>(&key, json!({ "isActive": false, "removedAt": now }))
        .await?;

    if !updated {
        return Err(AppError::NotFound("Teacher not found".to_string()));
    }

    tracing::info!("Teacher access revoked for {}", key);
    Ok(())
}

pub async fn list_teachers(store: &Store, active_only: bool) -> Result<Vec<TeacherRecord>, AppError> {
    let filters = if active_only {
        vec![Filter::eq("isActive", true)]
    } else {
        Vec::new()
    };
    let mut teachers: Vec<TeacherRecord> = store.find(&filters).await?;
    teachers.sort_by(|a, b| a.email.cmp(&b.email));
    Ok(teachers)
}

/// Creates the user on first authentication, otherwise refreshes login details.
pub async fn ensure_user(store: &Store, session: &Session, now: DateTime<Utc>) -> Result<User, AppError> {
    let role = resolve_role(store, &session.uid, &session.email).await;

    match store.get::<User>(&session.uid).await? {
        Some(mut user) => {
            user.last_login_at = Some(now);
            user.role = role;
            if let Some(photo) = &session.photo_url {
                user.profile_image_url = Some(photo.clone());
            }
            if user.name.is_empty() {
                user.name = display_name(session);
            }
            store.save(&user).await?;
            Ok(user)
        }
        None => {
            let user = User {
                id: session.uid.clone(),
                email: normalize_email(&session.email),
                name: display_name(session),
                profile_image_url: session.photo_url.clone(),
                whatsapp_number: None,
                role,
                created_at: now,
                last_login_at: Some(now),
                is_active: true,
            };
            store.save(&user).await?;
            tracing::info!("Created user {} ({})", user.id, user.email);
            Ok(user)
        }
    }
}

/// Applies the caller's own profile edits. Email and role are not editable here.
pub async fn update_profile(
    store: &Store,
    session: &Session,
    request: UpdateProfileRequest,
) -> Result<User, AppError> {
    let mut patch = Map::new();
    if let Some(name) = request.name {
        patch.insert("name".into(), json!(name.trim()));
    }
    if let Some(number) = request.whatsapp_number {
        patch.insert("whatsappNumber".into(), json!(number.trim()));
    }
    if let Some(url) = request.profile_image_url {
        patch.insert("profileImageUrl".into(), json!(url));
    }

    if !store.update::<User>(&session.uid, Value::Object(patch)).await? {
        return Err(AppError::NotFound("User not found".to_string()));
    }
    store
        .get::<User>(&session.uid)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))
}

fn display_name(session: &Session) -> String {
    session
        .display_name
        .clone()
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| {
            session
                .email
                .split('@')
                .next()
                .unwrap_or_default()
                .to_string()
        })
}

pub async fn list_users(store: &Store) -> Result<Vec<User>, AppError> {
    let mut users: Vec<User> = store.find(&[]).await?;
    users.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(users)
}
