// src/handlers/documents.rs

//! Public PDF downloads by slug.

use axum::{
    extract::{Path, State},
    http::header,
    response::IntoResponse,
};

use crate::{error::AppError, state::AppState};

/// Slugs the site links to, and where each PDF lives in blob storage.
const DOCUMENTS: &[(&str, &str)] = &[
    ("prospectus", "documents/prospectus.pdf"),
    ("syllabus", "documents/syllabus.pdf"),
    ("academic-calendar", "documents/academic-calendar.pdf"),
    ("admission-form", "documents/admission-form.pdf"),
];

pub fn document_path(slug: &str) -> Option<&'static str> {
    DOCUMENTS
        .iter()
        .find(|(known, _)| *known == slug)
        .map(|(_, path)| *path)
}

pub async fn get_document(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let path = document_path(&slug).ok_or(AppError::NotFound("Document not found".to_string()))?;

    let bytes = state.blobs.get(path).await.map_err(|e| {
        tracing::error!("Failed to fetch document {}: {}", slug, e);
        AppError::InternalServerError(format!("Failed to fetch document {}", slug))
    })?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf"),
            (header::CACHE_CONTROL, "public, max-age=3600"),
        ],
        bytes,
    ))
}
