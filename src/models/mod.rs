// src/models/mod.rs

pub mod batch;
pub mod bookmark;
pub mod content;
pub mod course_group;
pub mod enrollment;
pub mod submission;
pub mod task;
pub mod user;
