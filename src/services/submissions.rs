// src/services/submissions.rs

//! Turning in coursework, the short edit window afterwards, and grading.

use chrono::{DateTime, FixedOffset, Utc};
use futures::future::try_join_all;
use serde_json::json;

use crate::{
    blob::{self, BlobStore},
    error::AppError,
    models::{
        batch::Batch,
        submission::{GradeRequest, Submission, SubmissionStatus, SubmitRequest},
        task::{Task, TaskType},
        user::Session,
    },
    policy,
    services::{enrollment, ensure_owner, require},
    store::{Filter, Store},
    utils::html::non_blank,
};

/// Stores a file in the student's upload folder and returns its download URL.
pub async fn upload_file(
    blobs: &dyn BlobStore,
    student: &Session,
    filename: &str,
    bytes: Vec<u8>,
    now: DateTime<Utc>,
) -> Result<String, AppError> {
    if bytes.is_empty() {
        return Err(AppError::BadRequest("Uploaded file is empty".to_string()));
    }
    let path = blob::blob_path(&blob::student_folder(&student.uid), filename, now);
    let url = blobs.put(&path, bytes).await?;
    tracing::info!("Upload {} stored for {}", path, student.uid);
    Ok(url)
}

/// Storage path behind `url`, if it is a file the student uploaded.
fn student_blob_path(blobs: &dyn BlobStore, student_id: &str, url: &str) -> Option<String> {
    blobs
        .path_from_url(url)
        .ok()
        .filter(|path| blob::is_student_path(path, student_id))
}

/// Submissions may only reference the caller's own uploads.
fn check_own_files(blobs: &dyn BlobStore, student: &Session, request: &SubmitRequest) -> Result<(), AppError> {
    let recording = request.recording_url.iter().filter(|u| !u.trim().is_empty());
    for url in request.file_urls.iter().chain(recording) {
        if student_blob_path(blobs, &student.uid, url).is_none() {
            return Err(AppError::BadRequest(format!("Not one of your uploaded files: {}", url)));
        }
    }
    Ok(())
}

/// Deletes the student's blobs one by one, logging failures. URLs outside the
/// student's upload folder are left alone.
async fn delete_blobs_best_effort(blobs: &dyn BlobStore, student_id: &str, urls: &[String]) {
    for url in urls {
        let Some(path) = student_blob_path(blobs, student_id, url) else {
            tracing::warn!("Not deleting {}: outside the upload folder of {}", url, student_id);
            continue;
        };
        if let Err(e) = blobs.delete(&path).await {
            tracing::warn!("Failed to delete blob {}: {}", url, e);
        }
    }
}

pub async fn submit(
    store: &Store,
    blobs: &dyn BlobStore,
    student: &Session,
    task_id: &str,
    request: SubmitRequest,
    now: DateTime<Utc>,
    offset: FixedOffset,
) -> Result<Submission, AppError> {
    let task: Task = require(store, task_id, "Task").await?;

    if enrollment::active_enrollment(store, &student.uid, &task.batch_id)
        .await?
        .is_none()
    {
        return Err(AppError::Forbidden("You are not enrolled in this batch".to_string()));
    }

    policy::check_submission(&task, &request, now, offset)?;
    check_own_files(blobs, student, &request)?;

    let existing: Vec<Submission> = store
        .find(&[
            Filter::eq("taskId", task_id),
            Filter::eq("studentId", student.uid.as_str()),
        ])
        .await?;
    if !existing.is_empty() {
        return Err(AppError::Conflict(
            "You have already submitted this task".to_string(),
        ));
    }

    let submission = Submission {
        id: Store::new_id(),
        task_id: task.id.clone(),
        student_id: student.uid.clone(),
        batch_id: task.batch_id.clone(),
        status: SubmissionStatus::Submitted,
        created_at: now,
        updated_at: now,
        submitted_at: Some(now),
        file_urls: request.file_urls,
        recording_url: non_blank(request.recording_url),
        notes: non_blank(request.notes),
        grade: None,
        feedback: None,
        graded_at: None,
    };
    store.save(&submission).await?;
    store.increment::<Task>(&task.id, "submissionCount", 1).await?;

    if policy::is_late(&task, now) {
        tracing::info!("Late submission {} for task {} by {}", submission.id, task.id, student.uid);
    } else {
        tracing::info!("Submission {} for task {} by {}", submission.id, task.id, student.uid);
    }
    Ok(submission)
}

/// Loads the caller's own submission and checks it is still editable.
async fn own_editable(
    store: &Store,
    student: &Session,
    id: &str,
    now: DateTime<Utc>,
) -> Result<Submission, AppError> {
    let submission: Submission = require(store, id, "Submission").await?;
    if submission.student_id != student.uid {
        return Err(AppError::Forbidden("This is not your submission".to_string()));
    }
    if !policy::is_within_grace_period(&submission, now) {
        return Err(AppError::BadRequest(
            "Submissions can only be changed within 15 minutes of submitting".to_string(),
        ));
    }
    Ok(submission)
}

/// Replaces the content of a submission inside the edit window.
pub async fn edit_own(
    store: &Store,
    blobs: &dyn BlobStore,
    student: &Session,
    id: &str,
    request: SubmitRequest,
    now: DateTime<Utc>,
) -> Result<Submission, AppError> {
    let submission = own_editable(store, student, id, now).await?;
    let task: Task = require(store, &submission.task_id, "Task").await?;
    policy::check_content(&task, &request)?;
    check_own_files(blobs, student, &request)?;

    let recording_url = non_blank(request.recording_url);
    let notes = non_blank(request.notes);
    store
        .update::<Submission>(
            id,
            json!({
                "fileUrls": request.file_urls,
                "recordingUrl": recording_url,
                "notes": notes,
                "updatedAt": now,
            }),
        )
        .await?;

    let updated: Submission = require(store, id, "Submission").await?;
    let kept = updated.all_file_urls();
    let dropped: Vec<String> = submission
        .all_file_urls()
        .into_iter()
        .filter(|url| !kept.contains(url))
        .collect();
    delete_blobs_best_effort(blobs, &student.uid, &dropped).await;

    Ok(updated)
}

/// Withdraws a submission inside the edit window, removing its files.
pub async fn delete_own(
    store: &Store,
    blobs: &dyn BlobStore,
    student: &Session,
    id: &str,
    now: DateTime<Utc>,
) -> Result<(), AppError> {
    let submission = own_editable(store, student, id, now).await?;

    delete_blobs_best_effort(blobs, &student.uid, &submission.all_file_urls()).await;
    if store.delete::<Submission>(id).await? {
        store
            .increment::<Task>(&submission.task_id, "submissionCount", -1)
            .await?;
    }
    tracing::info!("Submission {} withdrawn by {}", id, student.uid);
    Ok(())
}

pub async fn grade(
    store: &Store,
    teacher: &Session,
    id: &str,
    request: GradeRequest,
    now: DateTime<Utc>,
) -> Result<Submission, AppError> {
    let submission: Submission = require(store, id, "Submission").await?;
    let task: Task = require(store, &submission.task_id, "Task").await?;
    ensure_owner(&task.teacher_id, &teacher.uid, "task")?;

    if !submission.status.is_turned_in() {
        return Err(AppError::BadRequest("Only turned-in submissions can be graded".to_string()));
    }
    if !request.grade.is_finite() || request.grade < 0.0 || request.grade > f64::from(task.max_points) {
        return Err(AppError::BadRequest(format!(
            "Grade must be between 0 and {}",
            task.max_points
        )));
    }

    store
        .update::<Submission>(
            id,
            json!({
                "status": SubmissionStatus::Graded,
                "grade": request.grade,
                "feedback": non_blank(request.feedback),
                "gradedAt": now,
                "updatedAt": now,
            }),
        )
        .await?;
    tracing::info!("Submission {} graded {} by {}", id, request.grade, teacher.uid);
    require(store, id, "Submission").await
}

/// Removes one file from a submission and deletes the blob behind it.
pub async fn delete_file(
    store: &Store,
    blobs: &dyn BlobStore,
    teacher: &Session,
    id: &str,
    file_url: &str,
    now: DateTime<Utc>,
) -> Result<Submission, AppError> {
    let submission: Submission = require(store, id, "Submission").await?;
    let task: Task = require(store, &submission.task_id, "Task").await?;
    ensure_owner(&task.teacher_id, &teacher.uid, "task")?;

    let patch = if submission.recording_url.as_deref() == Some(file_url) {
        json!({ "recordingUrl": null, "updatedAt": now })
    } else if submission.file_urls.iter().any(|u| u == file_url) {
        let remaining: Vec<&String> = submission.file_urls.iter().filter(|u| *u != file_url).collect();
        json!({ "fileUrls": remaining, "updatedAt": now })
    } else {
        return Err(AppError::NotFound("File not found on this submission".to_string()));
    };

    match student_blob_path(blobs, &submission.student_id, file_url) {
        Some(path) => blobs.delete(&path).await?,
        None => tracing::warn!("Unlinking {} without deleting it: not a student upload", file_url),
    }
    store.update::<Submission>(id, patch).await?;
    tracing::info!("File removed from submission {}", id);
    require(store, id, "Submission").await
}

/// Deletes every file attached to daily listening submissions of a batch.
///
/// Blob deletions run concurrently and the first failure aborts the rest; nothing is
/// rolled back. File references are cleared only once every deletion succeeded.
/// Only files inside the submitting student's upload folder are deleted.
/// Returns the number of files deleted.
pub async fn delete_all_daily_listening_files(
    store: &Store,
    blobs: &dyn BlobStore,
    teacher: &Session,
    batch_id: &str,
    now: DateTime<Utc>,
) -> Result<usize, AppError> {
    let batch: Batch = require(store, batch_id, "Batch").await?;
    ensure_owner(&batch.teacher_id, &teacher.uid, "batch")?;

    let tasks: Vec<Task> = store
        .find(&[
            Filter::eq("batchId", batch_id),
            Filter::eq("type", TaskType::DailyListening.as_str()),
        ])
        .await?;

    let mut affected = Vec::new();
    for task in &tasks {
        let submissions: Vec<Submission> = store.find(&[Filter::eq("taskId", task.id.as_str())]).await?;
        affected.extend(submissions.into_iter().filter(|s| !s.all_file_urls().is_empty()));
    }

    let paths: Vec<String> = affected
        .iter()
        .flat_map(|s| {
            s.all_file_urls()
                .into_iter()
                .filter_map(|url| student_blob_path(blobs, &s.student_id, &url))
                .collect::<Vec<_>>()
        })
        .collect();
    try_join_all(paths.iter().map(|path| blobs.delete(path))).await?;

    for submission in &affected {
        store
            .update::<Submission>(
                &submission.id,
                json!({ "fileUrls": [], "recordingUrl": null, "updatedAt": now }),
            )
            .await?;
    }

    tracing::info!(
        "Deleted {} daily listening files across {} submissions in batch {}",
        paths.len(),
        affected.len(),
        batch_id
    );
    Ok(paths.len())
}

pub async fn list_for_task(store: &Store, teacher: &Session, task_id: &str) -> Result<Vec<Submission>, AppError> {
    let task: Task = require(store, task_id, "Task").await?;
    ensure_owner(&task.teacher_id, &teacher.uid, "task")?;

    let mut submissions: Vec<Submission> = store.find(&[Filter::eq("taskId", task_id)]).await?;
    submissions.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));
    Ok(submissions)
}

/// The caller's submissions, optionally limited to one batch.
pub async fn list_mine(
    store: &Store,
    student: &Session,
    batch_id: Option<&str>,
) -> Result<Vec<Submission>, AppError> {
    let mut filters = vec![Filter::eq("studentId", student.uid.as_str())];
    if let Some(batch_id) = batch_id {
        filters.push(Filter::eq("batchId", batch_id));
    }
    let mut submissions: Vec<Submission> = store.find(&filters).await?;
    submissions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(submissions)
}
