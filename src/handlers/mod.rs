// src/handlers/mod.rs

pub mod admin;
pub mod analytics;
pub mod auth;
pub mod bookmarks;
pub mod catalog;
pub mod content;
pub mod documents;
pub mod enrollments;
pub mod live;
pub mod submissions;
pub mod tasks;
