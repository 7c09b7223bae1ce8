// src/utils/jwt.rs

use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    body::Body,
    extract::State,
    http::{Request, header},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::{config::Config, error::AppError, models::user::Session, services::roles, state::AppState};

/// Identity token claims.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Claims {
    /// Subject - the identity provider's user id.
    pub sub: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
    /// Expiration time as Unix timestamp.
    pub exp: usize,
}

impl From<Claims> for Session {
    fn from(claims: Claims) -> Self {
        Session {
            uid: claims.sub,
            email: claims.email,
            display_name: claims.name,
            photo_url: claims.picture,
        }
    }
}

/// Signs a token for `session`, valid for `expiration_seconds`.
pub fn sign_jwt(session: &Session, secret: &str, expiration_seconds: u64) -> Result<String, AppError> {
    // Calculate expiration: current time + expiration_seconds
    let expiration = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| AppError::InternalServerError(e.to_string()))?
        .as_secs() as usize
        + expiration_seconds as usize;

    let claims = Claims {
        sub: session.uid.clone(),
        email: session.email.clone(),
        name: session.display_name.clone(),
        picture: session.photo_url.clone(),
        exp: expiration,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::InternalServerError(e.to_string()))
}

/// Verifies and decodes a JWT string.
pub fn verify_jwt(token: &str, secret: &str) -> Result<Claims, AppError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| AppError::AuthError("Invalid token".to_string()))?;

    Ok(token_data.claims)
}

/// Axum Middleware: Authentication.
///
/// Validates the 'Authorization: Bearer <token>' header and injects the caller's
/// [`Session`] into the request extensions.
pub async fn auth_middleware(
    State(config): State<Config>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or_else(|| AppError::AuthError("Missing bearer token".to_string()))?;

    let claims = verify_jwt(token, &config.jwt_secret)?;
    if claims.email.trim().is_empty() {
        return Err(AppError::AuthError("Token carries no email".to_string()));
    }

    req.extensions_mut().insert(Session::from(claims));
    Ok(next.run(req).await)
}

/// Axum Middleware: Teacher Authorization.
///
/// Must be used AFTER `auth_middleware`. Lets the request through only when the
/// caller's email has an active teacher record.
pub async fn teacher_middleware(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let session = req
        .extensions()
        .get::<Session>()
        .ok_or_else(|| AppError::AuthError("Not authenticated".to_string()))?;

    if !roles::is_teacher_email(&state.store, &session.email).await {
        return Err(AppError::Forbidden("Teacher access required".to_string()));
    }

    Ok(next.run(req).await)
}
