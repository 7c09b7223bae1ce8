// src/handlers/content.rs

//! Public reads and teacher writes for site content.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use validator::Validate;

use crate::{
    error::AppError,
    models::content::{AboutPageRequest, CourseRequest, QuoteRequest, TestimonialRequest},
    services::content,
    store::Store,
};

pub async fn list_quotes(State(store): State<Store>) -> Result<impl IntoResponse, AppError> {
    Ok(Json(content::list_quotes(&store).await?))
}

/// Quotes plus the layout to render them with.
pub async fn quote_showcase(State(store): State<Store>) -> Result<impl IntoResponse, AppError> {
    Ok(Json(content::quote_showcase(&store).await?))
}

pub async fn create_quote(
    State(store): State<Store>,
    Json(payload): Json<QuoteRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let quote = content::create_quote(&store, payload, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(quote)))
}

pub async fn update_quote(
    State(store): State<Store>,
    Path(id): Path<String>,
    Json(payload): Json<QuoteRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    Ok(Json(content::update_quote(&store, &id, payload, Utc::now()).await?))
}

pub async fn delete_quote(
    State(store): State<Store>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    content::delete_quote(&store, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_testimonials(State(store): State<Store>) -> Result<impl IntoResponse, AppError> {
    Ok(Json(content::list_testimonials(&store).await?))
}

pub async fn create_testimonial(
    State(store): State<Store>,
    Json(payload): Json<TestimonialRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let testimonial = content::create_testimonial(&store, payload, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(testimonial)))
}

pub async fn update_testimonial(
    State(store): State<Store>,
    Path(id): Path<String>,
    Json(payload): Json<TestimonialRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    Ok(Json(content::update_testimonial(&store, &id, payload, Utc::now()).await?))
}

pub async fn delete_testimonial(
    State(store): State<Store>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    content::delete_testimonial(&store, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_courses(State(store): State<Store>) -> Result<impl IntoResponse, AppError> {
    Ok(Json(content::list_courses(&store).await?))
}

pub async fn get_course(
    State(store): State<Store>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(content::get_course(&store, &id).await?))
}

pub async fn create_course(
    State(store): State<Store>,
    Json(payload): Json<CourseRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let course = content::create_course(&store, payload, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(course)))
}

pub async fn update_course(
    State(store): State<Store>,
    Path(id): Path<String>,
    Json(payload): Json<CourseRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    Ok(Json(content::update_course(&store, &id, payload, Utc::now()).await?))
}

pub async fn delete_course(
    State(store): State<Store>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    content::delete_course(&store, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_about_pages(State(store): State<Store>) -> Result<impl IntoResponse, AppError> {
    Ok(Json(content::list_about_pages(&store).await?))
}

pub async fn get_about_page(
    State(store): State<Store>,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(content::get_about_page(&store, &slug).await?))
}

pub async fn put_about_page(
    State(store): State<Store>,
    Path(slug): Path<String>,
    Json(payload): Json<AboutPageRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    Ok(Json(content::put_about_page(&store, &slug, payload, Utc::now()).await?))
}

pub async fn delete_about_page(
    State(store): State<Store>,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    content::delete_about_page(&store, &slug).await?;
    Ok(StatusCode::NO_CONTENT)
}
