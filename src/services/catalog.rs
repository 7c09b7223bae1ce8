// src/services/catalog.rs

//! Course groups and their batches.
//!
//! `CourseGroup.batchCount` is maintained with atomic increments at batch create and
//! delete. It can drift if a write fails halfway; nothing recomputes it automatically.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value, json};

use crate::{
    error::AppError,
    models::{
        batch::{Batch, CreateBatchRequest, UpdateBatchRequest},
        course_group::{CourseGroup, CreateCourseGroupRequest, UpdateCourseGroupRequest},
        enrollment::Enrollment,
        task::Task,
        user::Session,
    },
    services::{ensure_owner, require},
    store::{Filter, Store},
};

pub async fn create_course_group(
    store: &Store,
    teacher: &Session,
    request: CreateCourseGroupRequest,
    now: DateTime<Utc>,
) -> Result<CourseGroup, AppError> {
    let group = CourseGroup {
        id: Store::new_id(),
        name: request.name.trim().to_string(),
        description: request.description,
        teacher_id: teacher.uid.clone(),
        created_at: now,
        updated_at: now,
        is_active: true,
        batch_count: 0,
    };
    store.save(&group).await?;
    tracing::info!("Course group {} created by {}", group.id, teacher.uid);
    Ok(group)
}

pub async fn update_course_group(
    store: &Store,
    teacher: &Session,
    id: &str,
    request: UpdateCourseGroupRequest,
    now: DateTime<Utc>,
) -> Result<CourseGroup, AppError> {
    let group: CourseGroup = require(store, id, "Course group").await?;
    ensure_owner(&group.teacher_id, &teacher.uid, "course group")?;

    let mut patch = Map::new();
    if let Some(name) = request.name {
        patch.insert("name".into(), json!(name.trim()));
    }
    if let Some(description) = request.description {
        patch.insert("description".into(), json!(description));
    }
    if let Some(is_active) = request.is_active {
        patch.insert("isActive".into(), json!(is_active));
    }
    patch.insert("updatedAt".into(), json!(now));

    store.update::<CourseGroup>(id, Value::Object(patch)).await?;
    require(store, id, "Course group").await
}

/// Deletes an empty course group. Groups that still have batches are rejected.
pub async fn delete_course_group(store: &Store, teacher: &Session, id: &str) -> Result<(), AppError> {
    let group: CourseGroup = require(store, id, "Course group").await?;
    ensure_owner(&group.teacher_id, &teacher.uid, "course group")?;

    let batches: Vec<Batch> = store.find(&[Filter::eq("courseGroupId", id)]).await?;
    if !batches.is_empty() {
        return Err(AppError::Conflict(format!(
            "Course group still has {} batch(es)",
            batches.len()
        )));
    }

    store.delete::<CourseGroup>(id).await?;
    tracing::info!("Course group {} deleted", id);
    Ok(())
}

pub async fn list_course_groups(store: &Store, teacher_id: &str) -> Result<Vec<CourseGroup>, AppError> {
    let mut groups: Vec<CourseGroup> = store.find(&[Filter::eq("teacherId", teacher_id)]).await?;
    groups.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(groups)
}

/// Active batches carrying `code`, ignoring `except` (the batch being edited).
async fn active_batches_with_code(
    store: &Store,
    code: &str,
    except: Option<&str>,
) -> Result<Vec<Batch>, AppError> {
    let batches: Vec<Batch> = store
        .find(&[Filter::eq("classCode", code), Filter::eq("isActive", true)])
        .await?;
    Ok(batches
        .into_iter()
        .filter(|b| Some(b.id.as_str()) != except)
        .collect())
}

fn check_dates(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Result<(), AppError> {
    if let (Some(start), Some(end)) = (start, end) {
        if end < start {
            return Err(AppError::BadRequest("End date must not be before start date".to_string()));
        }
    }
    Ok(())
}

pub async fn create_batch(
    store: &Store,
    teacher: &Session,
    request: CreateBatchRequest,
    now: DateTime<Utc>,
) -> Result<Batch, AppError> {
    let group: CourseGroup = require(store, &request.course_group_id, "Course group").await?;
    ensure_owner(&group.teacher_id, &teacher.uid, "course group")?;
    check_dates(request.start_date, request.end_date)?;

    let class_code = request.class_code.trim().to_string();
    if !active_batches_with_code(store, &class_code, None).await?.is_empty() {
        return Err(AppError::Conflict(format!(
            "Class code '{}' is already in use",
            class_code
        )));
    }

    let batch = Batch {
        id: Store::new_id(),
        name: request.name.trim().to_string(),
        description: request.description,
        course_group_id: group.id.clone(),
        teacher_id: teacher.uid.clone(),
        class_code,
        created_at: now,
        updated_at: now,
        is_active: true,
        student_count: 0,
        start_date: request.start_date,
        end_date: request.end_date,
    };
    store.save(&batch).await?;
    store.increment::<CourseGroup>(&group.id, "batchCount", 1).await?;

    tracing::info!("Batch {} created in course group {}", batch.id, group.id);
    Ok(batch)
}

pub async fn update_batch(
    store: &Store,
    teacher: &Session,
    id: &str,
    request: UpdateBatchRequest,
    now: DateTime<Utc>,
) -> Result<Batch, AppError> {
    let batch: Batch = require(store, id, "Batch").await?;
    ensure_owner(&batch.teacher_id, &teacher.uid, "batch")?;

    if !request.class_code_is_valid() {
        return Err(AppError::BadRequest("Invalid class code".to_string()));
    }
    check_dates(
        request.start_date.or(batch.start_date),
        request.end_date.or(batch.end_date),
    )?;

    let mut patch = Map::new();
    if let Some(code) = request.class_code.as_deref().map(str::trim) {
        if code != batch.class_code
            && !active_batches_with_code(store, code, Some(id)).await?.is_empty()
        {
            return Err(AppError::Conflict(format!("Class code '{}' is already in use", code)));
        }
        patch.insert("classCode".into(), json!(code));
    }
    if let Some(name) = request.name {
        patch.insert("name".into(), json!(name.trim()));
    }
    if let Some(description) = request.description {
        patch.insert("description".into(), json!(description));
    }
    if let Some(is_active) = request.is_active {
        patch.insert("isActive".into(), json!(is_active));
    }
    if let Some(start) = request.start_date {
        patch.insert("startDate".into(), json!(start));
    }
    if let Some(end) = request.end_date {
        patch.insert("endDate".into(), json!(end));
    }
    patch.insert("updatedAt".into(), json!(now));

    store.update::<Batch>(id, Value::Object(patch)).await?;
    require(store, id, "Batch").await
}

/// Deletes an empty batch. Batches with tasks or enrollments are deactivated instead.
pub async fn delete_batch(store: &Store, teacher: &Session, id: &str) -> Result<(), AppError> {
    let batch: Batch = require(store, id, "Batch").await?;
    ensure_owner(&batch.teacher_id, &teacher.uid, "batch")?;

    let tasks: Vec<Task> = store.find(&[Filter::eq("batchId", id)]).await?;
    let enrollments: Vec<Enrollment> = store.find(&[Filter::eq("batchId", id)]).await?;
    if !tasks.is_empty() || !enrollments.is_empty() {
        return Err(AppError::Conflict(format!(
            "Batch still has {} task(s) and {} enrollment(s)",
            tasks.len(),
            enrollments.len()
        )));
    }

    if store.delete::<Batch>(id).await? {
        store
            .increment::<CourseGroup>(&batch.course_group_id, "batchCount", -1)
            .await?;
    }
    tracing::info!("Batch {} deleted", id);
    Ok(())
}

pub async fn list_batches_for_group(store: &Store, course_group_id: &str) -> Result<Vec<Batch>, AppError> {
    let mut batches: Vec<Batch> = store
        .find(&[Filter::eq("courseGroupId", course_group_id)])
        .await?;
    batches.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(batches)
}

pub async fn list_teacher_batches(store: &Store, teacher_id: &str) -> Result<Vec<Batch>, AppError> {
    let mut batches: Vec<Batch> = store.find(&[Filter::eq("teacherId", teacher_id)]).await?;
    batches.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(batches)
}

/// A batch the teacher owns.
pub async fn get_owned_batch(store: &Store, teacher: &Session, id: &str) -> Result<Batch, AppError> {
    let batch: Batch = require(store, id, "Batch").await?;
    ensure_owner(&batch.teacher_id, &teacher.uid, "batch")?;
    Ok(batch)
}
