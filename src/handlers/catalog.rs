// src/handlers/catalog.rs

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
        batch::{CreateBatchRequest, UpdateBatchRequest},
        course_group::{CreateCourseGroupRequest, UpdateCourseGroupRequest},
        user::Session,
    },
    services::catalog,
    store::Store,
};

pub async fn list_course_groups(
    State(store): State<Store>,
    Extension(session): Extension<Session>,
) -> Result<impl IntoResponse, AppError> {
    let groups = catalog::list_course_groups(&store, &session.uid).await?;
    Ok(Json(groups))
}

pub async fn create_course_group(
    State(store): State<Store>,
    Extension(session): Extension<Session>,
    Json(payload): Json<CreateCourseGroupRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let group = catalog::create_course_group(&store, &session, payload, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(group)))
}

pub async fn update_course_group(
    State(store): State<Store>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateCourseGroupRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let group = catalog::update_course_group(&store, &session, &id, payload, Utc::now()).await?;
    Ok(Json(group))
}

pub async fn delete_course_group(
    State(store): State<Store>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    catalog::delete_course_group(&store, &session, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_group_batches(
    State(store): State<Store>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let batches = catalog::list_batches_for_group(&store, &id).await?;
    Ok(Json(batches))
}

pub async fn list_batches(
    State(store): State<Store>,
    Extension(session): Extension<Session>,
) -> Result<impl IntoResponse, AppError> {
    let batches = catalog::list_teacher_batches(&store, &session.uid).await?;
    Ok(Json(batches))
}

pub async fn get_batch(
    State(store): State<Store>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let batch = catalog::get_owned_batch(&store, &session, &id).await?;
    Ok(Json(batch))
}

pub async fn create_batch(
    State(store): State<Store>,
    Extension(session): Extension<Session>,
    Json(payload): Json<CreateBatchRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let batch = catalog::create_batch(&store, &session, payload, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(batch)))
}

pub async fn update_batch(
    State(store): State<Store>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateBatchRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let batch = catalog::update_batch(&store, &session, &id, payload, Utc::now()).await?;
    Ok(Json(batch))
}

pub async fn delete_batch(
    State(store): State<Store>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    catalog::delete_batch(&store, &session, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}
