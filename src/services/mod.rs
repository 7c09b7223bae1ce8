// src/services/mod.rs

//! Workflow operations shared by the HTTP handlers.
//!
//! Services take the store (and blob store where files are involved) explicitly, plus the
//! caller's [`Session`](crate::models::user::Session) and the current time, so every rule
//! can be exercised without a running server.

pub mod analytics;
pub mod bookmarks;
pub mod catalog;
pub mod content;
pub mod enrollment;
pub mod roles;
pub mod submissions;
pub mod tasks;

use crate::{
    error::AppError,
    store::{Document, Store},
};

/// Loads a document or fails with `NotFound("<what> not found")`.
pub(crate) async fn require<T: Document>(store: &Store, id: &str, what: &str) -> Result<T, AppError> {
    store
        .get::<T>(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("{} not found", what)))
}

/// Fails with `Forbidden` unless `owner` is the caller.
pub(crate) fn ensure_owner(owner: &str, caller: &str, what: &str) -> Result<(), AppError> {
    if owner != caller {
        return Err(AppError::Forbidden(format!(
            "You are not the teacher of this {}",
            what
        )));
    }
    Ok(())
}
