// src/handlers/tasks.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        task::{CreateTaskRequest, SetTaskStatusRequest, UpdateTaskRequest},
        user::Session,
    },
    services::tasks,
    state::AppState,
    store::Store,
};

pub async fn create_task(
    State(store): State<Store>,
    Extension(session): Extension<Session>,
    Json(payload): Json<CreateTaskRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let task = tasks::create_task(&store, &session, payload, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(task)))
}

pub async fn update_task(
    State(store): State<Store>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateTaskRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let task = tasks::update_task(&store, &session, &id, payload, Utc::now()).await?;
    Ok(Json(task))
}

pub async fn set_status(
    State(store): State<Store>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
    Json(payload): Json<SetTaskStatusRequest>,
) -> Result<impl IntoResponse, AppError> {
    let task = tasks::set_status(&store, &session, &id, payload.status, Utc::now()).await?;
    Ok(Json(task))
}

pub async fn delete_task(
    State(store): State<Store>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    tasks::delete_task(&store, &session, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Works for the owning teacher and for enrolled students (visibility applies).
pub async fn get_task(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let task = tasks::get_task(&state.store, &session, &id, Utc::now(), state.config.local_offset()).await?;
    Ok(Json(task))
}

pub async fn list_for_teacher(
    State(store): State<Store>,
    Extension(session): Extension<Session>,
    Path(batch_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let list = tasks::list_for_teacher(&store, &session, &batch_id).await?;
    Ok(Json(list))
}

pub async fn list_for_student(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(batch_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let list = tasks::list_for_student(
        &state.store,
        &session,
        &batch_id,
        Utc::now(),
        state.config.local_offset(),
    )
    .await?;
    Ok(Json(list))
}
