// src/handlers/submissions.rs

use axum::{
    Extension, Json,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde_json::json;
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        submission::{DeleteFileRequest, GradeRequest, MySubmissionsParams, SubmitRequest},
        user::Session,
    },
    services::submissions,
    state::AppState,
    store::Store,
};

/// Accepts a multipart form with a `file` field and stores it in the caller's
/// upload folder. The returned URL goes into a submission's `fileUrls` or `recordingUrl`.
pub async fn upload(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let mut file: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or("upload").to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(e.to_string()))?;
        file = Some((filename, data.to_vec()));
    }

    let (filename, data) =
        file.ok_or_else(|| AppError::BadRequest("Missing required 'file' field".to_string()))?;
    let url = submissions::upload_file(state.blobs.as_ref(), &session, &filename, data, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(json!({ "url": url }))))
}

pub async fn submit(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(task_id): Path<String>,
    Json(payload): Json<SubmitRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let submission = submissions::submit(
        &state.store,
        state.blobs.as_ref(),
        &session,
        &task_id,
        payload,
        Utc::now(),
        state.config.local_offset(),
    )
    .await?;
    Ok((StatusCode::CREATED, Json(submission)))
}

pub async fn edit_own(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
    Json(payload): Json<SubmitRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let submission =
        submissions::edit_own(&state.store, state.blobs.as_ref(), &session, &id, payload, Utc::now()).await?;
    Ok(Json(submission))
}

pub async fn delete_own(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    submissions::delete_own(&state.store, state.blobs.as_ref(), &session, &id, Utc::now()).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_mine(
    State(store): State<Store>,
    Extension(session): Extension<Session>,
    Query(params): Query<MySubmissionsParams>,
) -> Result<impl IntoResponse, AppError> {
    let list = submissions::list_mine(&store, &session, params.batch_id.as_deref()).await?;
    Ok(Json(list))
}

pub async fn list_for_task(
    State(store): State<Store>,
    Extension(session): Extension<Session>,
    Path(task_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let list = submissions::list_for_task(&store, &session, &task_id).await?;
    Ok(Json(list))
}

pub async fn grade(
    State(store): State<Store>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
    Json(payload): Json<GradeRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let submission = submissions::grade(&store, &session, &id, payload, Utc::now()).await?;
    Ok(Json(submission))
}

pub async fn delete_file(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
    Json(payload): Json<DeleteFileRequest>,
) -> Result<impl IntoResponse, AppError> {
    let submission = submissions::delete_file(
        &state.store,
        state.blobs.as_ref(),
        &session,
        &id,
        &payload.file_url,
        Utc::now(),
    )
    .await?;
    Ok(Json(submission))
}

/// Bulk cleanup of daily listening recordings for a batch.
pub async fn delete_daily_listening_files(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(batch_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let deleted = submissions::delete_all_daily_listening_files(
        &state.store,
        state.blobs.as_ref(),
        &session,
        &batch_id,
        Utc::now(),
    )
    .await?;
    Ok(Json(json!({ "deleted": deleted })))
}
