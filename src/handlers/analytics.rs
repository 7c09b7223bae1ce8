// src/handlers/analytics.rs

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};

use crate::{
    error::AppError,
    models::user::Session,
    services::analytics::{self, ReportRange},
    state::AppState,
};

/// Daily listening completion per student, optionally for `?from=YYYY-MM-DD&to=YYYY-MM-DD`.
pub async fn daily_listening(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(batch_id): Path<String>,
    Query(range): Query<ReportRange>,
) -> Result<impl IntoResponse, AppError> {
    let report = analytics::daily_listening_report(
        &state.store,
        &session,
        &batch_id,
        &range,
        state.config.local_offset(),
    )
    .await?;
    Ok(Json(report))
}
