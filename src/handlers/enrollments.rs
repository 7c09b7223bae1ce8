// src/handlers/enrollments.rs

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde_json::json;
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        batch::JoinBatchRequest,
        enrollment::EnrollmentListParams,
        user::Session,
    },
    services::enrollment,
    store::Store,
};

/// Checks a class code without joining. Reveals only whether it is valid.
pub async fn validate_code(
    State(store): State<Store>,
    Json(payload): Json<JoinBatchRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let found = enrollment::validate_class_code(&store, &payload.class_code).await?;
    Ok(Json(json!({
        "valid": found.is_some(),
        "match": found,
    })))
}

pub async fn join(
    State(store): State<Store>,
    Extension(session): Extension<Session>,
    Json(payload): Json<JoinBatchRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let created = enrollment::join_batch(&store, &session, &payload.class_code, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn list_mine(
    State(store): State<Store>,
    Extension(session): Extension<Session>,
) -> Result<impl IntoResponse, AppError> {
    let enrollments = enrollment::list_mine(&store, &session).await?;
    Ok(Json(enrollments))
}

pub async fn list_for_batch(
    State(store): State<Store>,
    Extension(session): Extension<Session>,
    Path(batch_id): Path<String>,
    Query(params): Query<EnrollmentListParams>,
) -> Result<impl IntoResponse, AppError> {
    let views = enrollment::list_for_batch(&store, &session, &batch_id, params.status).await?;
    Ok(Json(views))
}

pub async fn approve(
    State(store): State<Store>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(enrollment::approve(&store, &session, &id, Utc::now()).await?))
}

pub async fn decline(
    State(store): State<Store>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(enrollment::decline(&store, &session, &id, Utc::now()).await?))
}

pub async fn remove(
    State(store): State<Store>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(enrollment::remove(&store, &session, &id, Utc::now()).await?))
}

pub async fn complete(
    State(store): State<Store>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(enrollment::complete(&store, &session, &id, Utc::now()).await?))
}

pub async fn recount(
    State(store): State<Store>,
    Extension(session): Extension<Session>,
    Path(batch_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let count = enrollment::recount_students(&store, &session, &batch_id).await?;
    Ok(Json(json!({ "studentCount": count })))
}
