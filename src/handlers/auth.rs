// src/handlers/auth.rs

use axum::{Extension, Json, extract::State, response::IntoResponse};
use chrono::Utc;
use validator::Validate;

use crate::{
    error::AppError,
    models::user::{Session, SessionResponse, UpdateProfileRequest, User},
    services::roles,
    store::Store,
};

/// Called by the client right after sign-in.
/// Creates the user on first visit and reports the resolved role.
pub async fn session(
    State(store): State<Store>,
    Extension(session): Extension<Session>,
) -> Result<impl IntoResponse, AppError> {
    let user = roles::ensure_user(&store, &session, Utc::now()).await?;
    let role = user.role;
    Ok(Json(SessionResponse { user, role }))
}

pub async fn get_me(
    State(store): State<Store>,
    Extension(session): Extension<Session>,
) -> Result<impl IntoResponse, AppError> {
    let user = store
        .get::<User>(&session.uid)
        .await?
        .ok_or(AppError::NotFound("User not found".to_string()))?;
    let role = roles::resolve_role(&store, &session.uid, &session.email).await;
    Ok(Json(SessionResponse { user, role }))
}

pub async fn update_me(
    State(store): State<Store>,
    Extension(session): Extension<Session>,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }
    let user = roles::update_profile(&store, &session, payload).await?;
    Ok(Json(user))
}
