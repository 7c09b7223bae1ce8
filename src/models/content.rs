// src/models/content.rs

//! Publicly readable site content that teachers maintain.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::store::{Collection, Document};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub author: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document for Quote {
    const COLLECTION: Collection = Collection::Quotes;

    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Testimonial {
    pub id: String,
    pub name: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document for Testimonial {
    const COLLECTION: Collection = Collection::Testimonials;

    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document for Course {
    const COLLECTION: Collection = Collection::Courses;

    fn id(&self) -> &str {
        &self.id
    }
}

/// Represents the 'aboutPages' collection, keyed by slug.
/// `body` is rich text and is always stored sanitized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AboutPage {
    pub id: String,
    pub title: String,
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl Document for AboutPage {
    const COLLECTION: Collection = Collection::AboutPages;

    fn id(&self) -> &str {
        &self.id
    }
}

/// How the home page should present the quotes it has.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum QuoteLayout {
    /// No quotes: show the placeholder.
    Empty,
    /// One or two quotes shown next to each other.
    SideBySide,
    Carousel { autoplay: bool },
}

impl QuoteLayout {
    pub fn for_count(count: usize) -> Self {
        match count {
            0 => QuoteLayout::Empty,
            1 | 2 => QuoteLayout::SideBySide,
            _ => QuoteLayout::Carousel { autoplay: true },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct QuoteShowcase {
    pub layout: QuoteLayout,
    pub quotes: Vec<Quote>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct QuoteRequest {
    #[validate(length(min = 1, max = 1000, message = "Quote must be between 1 and 1000 characters"))]
    pub text: String,
    #[validate(length(max = 200))]
    #[serde(default)]
    pub author: String,
    #[validate(length(max = 500))]
    pub image_url: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TestimonialRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(length(min = 1, max = 3000))]
    pub message: String,
    #[validate(length(max = 100))]
    pub role: Option<String>,
    #[validate(length(max = 500))]
    pub image_url: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CourseRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(max = 20000))]
    #[serde(default)]
    pub description: String,
    #[validate(length(max = 500))]
    pub image_url: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AboutPageRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(max = 100000))]
    pub body: String,
    #[validate(length(max = 500))]
    pub image_url: Option<String>,
}
