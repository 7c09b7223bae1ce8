// src/handlers/bookmarks.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use chrono::Utc;
use serde_json::json;

use crate::{error::AppError, models::user::Session, services::bookmarks, state::AppState};

pub async fn toggle(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(task_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let bookmarked = bookmarks::toggle(
        &state.store,
        &session,
        &task_id,
        Utc::now(),
        state.config.local_offset(),
    )
    .await?;
    Ok(Json(json!({ "bookmarked": bookmarked })))
}

pub async fn list_mine(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(bookmarks::list_mine(&state.store, &session).await?))
}
