// src/services/enrollment.rs

//! Class-code joins and the teacher's approval workflow.

use chrono::{DateTime, Utc};
use serde_json::json;

use crate::{
    error::AppError,
    models::{
        batch::{Batch, ClassCodeMatch},
        enrollment::{Enrollment, EnrollmentStatus, EnrollmentView},
        user::{Session, User},
    },
    services::{ensure_owner, require, roles},
    store::{Filter, Store},
};

/// Resolves a class code to its batch. Only an unambiguous match among active
/// batches counts; zero or several matches both yield `None`.
pub async fn validate_class_code(store: &Store, code: &str) -> Result<Option<ClassCodeMatch>, AppError> {
    let code = code.trim();
    if code.is_empty() {
        return Ok(None);
    }

    let mut matches: Vec<Batch> = store
        .find(&[Filter::eq("classCode", code), Filter::eq("isActive", true)])
        .await?;

    if matches.len() != 1 {
        if matches.len() > 1 {
            tracing::warn!("Class code {} matches {} active batches", code, matches.len());
        }
        return Ok(None);
    }

    let batch = matches.remove(0);
    Ok(Some(ClassCodeMatch {
        batch_id: batch.id,
        course_group_id: batch.course_group_id,
    }))
}

/// Creates a pending enrollment for the caller.
pub async fn join_batch(
    store: &Store,
    student: &Session,
    code: &str,
    now: DateTime<Utc>,
) -> Result<Enrollment, AppError> {
    let Some(target) = validate_class_code(store, code).await? else {
        return Err(AppError::BadRequest("Invalid class code".to_string()));
    };

    let existing: Vec<Enrollment> = store
        .find(&[
            Filter::eq("studentId", student.uid.as_str()),
            Filter::eq("batchId", target.batch_id.as_str()),
        ])
        .await?;
    if let Some(blocking) = existing.iter().find(|e| e.status.blocks_rejoin()) {
        return Err(AppError::Conflict(format!(
            "You already have a {} enrollment in this batch",
            blocking.status.as_str()
        )));
    }

    let enrollment = Enrollment {
        id: Store::new_id(),
        student_id: student.uid.clone(),
        batch_id: target.batch_id,
        course_group_id: target.course_group_id,
        status: EnrollmentStatus::Pending,
        enrolled_at: now,
        completed_at: None,
        dropped_at: None,
        class_code: Some(code.trim().to_string()),
    };
    store.save(&enrollment).await?;
    tracing::info!(
        "Student {} requested to join batch {}",
        student.uid,
        enrollment.batch_id
    );

    if let Err(e) = roles::assign_student_role(store, &student.uid, &student.email, now).await {
        tracing::warn!("Could not assign student role to {}: {}", student.uid, e);
    }

    Ok(enrollment)
}

/// Moves an enrollment of a batch the teacher owns to `next`.
async fn transition(
    store: &Store,
    teacher: &Session,
    enrollment_id: &str,
    next: EnrollmentStatus,
    now: DateTime<Utc>,
) -> Result<Enrollment, AppError> {
    let enrollment: Enrollment = require(store, enrollment_id, "Enrollment").await?;
    let batch: Batch = require(store, &enrollment.batch_id, "Batch").await?;
    ensure_owner(&batch.teacher_id, &teacher.uid, "batch")?;

    if !enrollment.status.can_transition_to(next) {
        return Err(AppError::BadRequest(format!(
            "Cannot move a {} enrollment to {}",
            enrollment.status.as_str(),
            next.as_str()
        )));
    }

    let patch = match next {
        EnrollmentStatus::Dropped => json!({ "status": next, "droppedAt": now }),
        EnrollmentStatus::Completed => json!({ "status": next, "completedAt": now }),
        _ => json!({ "status": next }),
    };
    store.update::<Enrollment>(enrollment_id, patch).await?;

    tracing::info!(
        "Enrollment {} moved from {} to {}",
        enrollment_id,
        enrollment.status.as_str(),
        next.as_str()
    );
    require(store, enrollment_id, "Enrollment").await
}

pub async fn approve(store: &Store, teacher: &Session, id: &str, now: DateTime<Utc>) -> Result<Enrollment, AppError> {
    transition(store, teacher, id, EnrollmentStatus::Active, now).await
}

pub async fn decline(store: &Store, teacher: &Session, id: &str, now: DateTime<Utc>) -> Result<Enrollment, AppError> {
    transition(store, teacher, id, EnrollmentStatus::Declined, now).await
}

pub async fn remove(store: &Store, teacher: &Session, id: &str, now: DateTime<Utc>) -> Result<Enrollment, AppError> {
    transition(store, teacher, id, EnrollmentStatus::Dropped, now).await
}

pub async fn complete(store: &Store, teacher: &Session, id: &str, now: DateTime<Utc>) -> Result<Enrollment, AppError> {
    transition(store, teacher, id, EnrollmentStatus::Completed, now).await
}

/// Enrollments of a batch joined with the students' names, newest first.
pub async fn list_for_batch(
    store: &Store,
    teacher: &Session,
    batch_id: &str,
    status: Option<EnrollmentStatus>,
) -> Result<Vec<EnrollmentView>, AppError> {
    let batch: Batch = require(store, batch_id, "Batch").await?;
    ensure_owner(&batch.teacher_id, &teacher.uid, "batch")?;

    let mut filters = vec![Filter::eq("batchId", batch_id)];
    if let Some(status) = status {
        filters.push(Filter::eq("status", status.as_str()));
    }
    let mut enrollments: Vec<Enrollment> = store.find(&filters).await?;
    enrollments.sort_by(|a, b| b.enrolled_at.cmp(&a.enrolled_at));

    let mut views = Vec::with_capacity(enrollments.len());
    for enrollment in enrollments {
        let student = store.get::<User>(&enrollment.student_id).await?;
        views.push(EnrollmentView {
            student_name: student.as_ref().map(|u| u.name.clone()),
            student_email: student.map(|u| u.email),
            enrollment,
        });
    }
    Ok(views)
}

pub async fn list_mine(store: &Store, student: &Session) -> Result<Vec<Enrollment>, AppError> {
    let mut enrollments: Vec<Enrollment> = store
        .find(&[Filter::eq("studentId", student.uid.as_str())])
        .await?;
    enrollments.sort_by(|a, b| b.enrolled_at.cmp(&a.enrolled_at));
    Ok(enrollments)
}

/// The caller's active enrollment in `batch_id`, if any.
pub async fn active_enrollment(
    store: &Store,
    student_id: &str,
    batch_id: &str,
) -> Result<Option<Enrollment>, AppError> {
    let mut found: Vec<Enrollment> = store
        .find(&[
            Filter::eq("studentId", student_id),
            Filter::eq("batchId", batch_id),
            Filter::eq("status", EnrollmentStatus::Active.as_str()),
        ])
        .await?;
    Ok(found.pop())
}

/// Recomputes `studentCount` from active enrollments and returns the new value.
pub async fn recount_students(store: &Store, teacher: &Session, batch_id: &str) -> Result<i64, AppError> {
    let batch: Batch = require(store, batch_id, "Batch").await?;
    ensure_owner(&batch.teacher_id, &teacher.uid, "batch")?;

    let active: Vec<Enrollment> = store
        .find(&[
            Filter::eq("batchId", batch_id),
            Filter::eq("status", EnrollmentStatus::Active.as_str()),
        ])
        .await?;
    let count = active.len() as i64;

    if count != batch.student_count {
        tracing::info!(
            "Batch {} studentCount reconciled: {} -> {}",
            batch_id,
            batch.student_count,
            count
        );
    }
    store
        .update::<Batch>(batch_id, json!({ "studentCount": count }))
        .await?;
    Ok(count)
}
