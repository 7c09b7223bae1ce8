// src/services/content.rs

//! Public site content: quotes, testimonials, courses and about pages.
//! Anyone may read; only teachers reach the write operations (enforced by routing).

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;

use crate::{
    error::AppError,
    models::content::{
        AboutPage, AboutPageRequest, Course, CourseRequest, Quote, QuoteLayout, QuoteRequest,
        QuoteShowcase, Testimonial, TestimonialRequest,
    },
    services::require,
    store::{Document, Store},
    utils::html::{clean_html, non_blank},
};

static SLUG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9][a-z0-9-]{0,63}$").expect("valid slug pattern"));

async fn newest_first<T, F>(store: &Store, created_at: F) -> Result<Vec<T>, AppError>
where
    T: Document,
    F: Fn(&T) -> DateTime<Utc>,
{
    let mut items: Vec<T> = store.find(&[]).await?;
    items.sort_by_key(|item| std::cmp::Reverse(created_at(item)));
    Ok(items)
}

async fn remove<T: Document>(store: &Store, id: &str, what: &str) -> Result<(), AppError> {
    if !store.delete::<T>(id).await? {
        return Err(AppError::NotFound(format!("{} not found", what)));
    }
    tracing::info!("{} {} deleted", what, id);
    Ok(())
}

// Quotes

pub async fn list_quotes(store: &Store) -> Result<Vec<Quote>, AppError> {
    newest_first(store, |q: &Quote| q.created_at).await
}

/// Quotes together with the layout the home page should use for them.
pub async fn quote_showcase(store: &Store) -> Result<QuoteShowcase, AppError> {
    let quotes = list_quotes(store).await?;
    Ok(QuoteShowcase {
        layout: QuoteLayout::for_count(quotes.len()),
        quotes,
    })
}

pub async fn create_quote(store: &Store, request: QuoteRequest, now: DateTime<Utc>) -> Result<Quote, AppError> {
    let quote = Quote {
        id: Store::new_id(),
        text: request.text.trim().to_string(),
        author: request.author.trim().to_string(),
        image_url: non_blank(request.image_url),
        created_at: now,
        updated_at: now,
    };
    store.save(&quote).await?;
    Ok(quote)
}

pub async fn update_quote(
    store: &Store,
    id: &str,
    request: QuoteRequest,
    now: DateTime<Utc>,
) -> Result<Quote, AppError> {
    let current: Quote = require(store, id, "Quote").await?;
    let quote = Quote {
        text: request.text.trim().to_string(),
        author: request.author.trim().to_string(),
        image_url: non_blank(request.image_url),
        updated_at: now,
        ..current
    };
    store.save(&quote).await?;
    Ok(quote)
}

pub async fn delete_quote(store: &Store, id: &str) -> Result<(), AppError> {
    remove::<Quote>(store, id, "Quote").await
}

// Testimonials

pub async fn list_testimonials(store: &Store) -> Result<Vec<Testimonial>, AppError> {
    newest_first(store, |t: &Testimonial| t.created_at).await
}

pub async fn create_testimonial(
    store: &Store,
    request: TestimonialRequest,
    now: DateTime<Utc>,
) -> Result<Testimonial, AppError> {
    let testimonial = Testimonial {
        id: Store::new_id(),
        name: request.name.trim().to_string(),
        message: request.message.trim().to_string(),
        role: non_blank(request.role),
        image_url: non_blank(request.image_url),
        created_at: now,
        updated_at: now,
    };
    store.save(&testimonial).await?;
    Ok(testimonial)
}

pub async fn update_testimonial(
    store: &Store,
    id: &str,
    request: TestimonialRequest,
    now: DateTime<Utc>,
) -> Result<Testimonial, AppError> {
    let current: Testimonial = require(store, id, "Testimonial").await?;
    let testimonial = Testimonial {
        name: request.name.trim().to_string(),
        message: request.message.trim().to_string(),
        role: non_blank(request.role),
        image_url: non_blank(request.image_url),
        updated_at: now,
        ..current
    };
    store.save(&testimonial).await?;
    Ok(testimonial)
}

pub async fn delete_testimonial(store: &Store, id: &str) -> Result<(), AppError> {
    remove::<Testimonial>(store, id, "Testimonial").await
}

// Courses

pub async fn list_courses(store: &Store) -> Result<Vec<Course>, AppError> {
    newest_first(store, |c: &Course| c.created_at).await
}

pub async fn get_course(store: &Store, id: &str) -> Result<Course, AppError> {
    require(store, id, "Course").await
}

pub async fn create_course(store: &Store, request: CourseRequest, now: DateTime<Utc>) -> Result<Course, AppError> {
    let course = Course {
        id: Store::new_id(),
        title: request.title.trim().to_string(),
        description: request.description,
        image_url: non_blank(request.image_url),
        created_at: now,
        updated_at: now,
    };
    store.save(&course).await?;
    Ok(course)
}

pub async fn update_course(
    store: &Store,
    id: &str,
    request: CourseRequest,
    now: DateTime<Utc>,
) -> Result<Course, AppError> {
    let current: Course = require(store, id, "Course").await?;
    let course = Course {
        title: request.title.trim().to_string(),
        description: request.description,
        image_url: non_blank(request.image_url),
        updated_at: now,
        ..current
    };
    store.save(&course).await?;
    Ok(course)
}

pub async fn delete_course(store: &Store, id: &str) -> Result<(), AppError> {
    remove::<Course>(store, id, "Course").await
}

// About pages

fn check_slug(slug: &str) -> Result<(), AppError> {
    if !SLUG.is_match(slug) {
        return Err(AppError::BadRequest(format!("Invalid page slug '{}'", slug)));
    }
    Ok(())
}

pub async fn get_about_page(store: &Store, slug: &str) -> Result<AboutPage, AppError> {
    require(store, slug, "Page").await
}

pub async fn list_about_pages(store: &Store) -> Result<Vec<AboutPage>, AppError> {
    let mut pages: Vec<AboutPage> = store.find(&[]).await?;
    pages.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(pages)
}

/// Creates or replaces the page at `slug`. The body is sanitized before storing.
pub async fn put_about_page(
    store: &Store,
    slug: &str,
    request: AboutPageRequest,
    now: DateTime<Utc>,
) -> Result<AboutPage, AppError> {
    check_slug(slug)?;
    let page = AboutPage {
        id: slug.to_string(),
        title: request.title.trim().to_string(),
        body: clean_html(&request.body),
        image_url: non_blank(request.image_url),
        updated_at: now,
    };
    store.save(&page).await?;
    tracing::info!("About page '{}' saved", slug);
    Ok(page)
}

pub async fn delete_about_page(store: &Store, slug: &str) -> Result<(), AppError> {
    remove::<AboutPage>(store, slug, "Page").await
}
