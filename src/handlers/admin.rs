// src/handlers/admin.rs

use axum::{
    Json,
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use validator::Validate;

use crate::{
    error::AppError,
    models::user::{AddTeacherRequest, Session, TeacherListParams},
    services::roles,
    store::Store,
};

/// Lists all users in the system.
/// Teacher only.
pub async fn list_users(State(store): State<Store>) -> Result<impl IntoResponse, AppError> {
    let users = roles::list_users(&store).await?;
    Ok(Json(users))
}

pub async fn list_teachers(
    State(store): State<Store>,
    Query(params): Query<TeacherListParams>,
) -> Result<impl IntoResponse, AppError> {
    let teachers = roles::list_teachers(&store, params.active_only).await?;
    Ok(Json(teachers))
}

/// Grants teacher access to an email address.
pub async fn add_teacher(
    State(store): State<Store>,
    Extension(session): Extension<Session>,
    Json(payload): Json<AddTeacherRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let record = roles::add_teacher(&store, &payload.email, Some(&session.email), Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// Revokes teacher access. Teachers cannot revoke themselves.
pub async fn remove_teacher(
    State(store): State<Store>,
    Extension(session): Extension<Session>,
    Path(email): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    if roles::normalize_email(&email) == roles::normalize_email(&session.email) {
        return Err(AppError::BadRequest("You cannot remove your own teacher access".to_string()));
    }

    roles::remove_teacher(&store, &email, Utc::now()).await?;
    Ok(StatusCode::NO_CONTENT)
}
