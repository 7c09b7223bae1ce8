// src/services/tasks.rs

use chrono::{DateTime, FixedOffset, Utc};
use serde_json::{Map, Value, json};

use crate::{
    error::AppError,
    models::{
        batch::Batch,
        bookmark::TaskBookmark,
        submission::Submission,
        task::{CreateTaskRequest, Task, TaskStatus, UpdateTaskRequest},
        user::Session,
    },
    policy,
    services::{enrollment, ensure_owner, require},
    store::{Filter, Store},
};

fn check_dates(start: Option<DateTime<Utc>>, due: Option<DateTime<Utc>>) -> Result<(), AppError> {
    if let (Some(start), Some(due)) = (start, due) {
        if due < start {
            return Err(AppError::BadRequest("Due date must not be before start date".to_string()));
        }
    }
    Ok(())
}

pub async fn create_task(
    store: &Store,
    teacher: &Session,
    request: CreateTaskRequest,
    now: DateTime<Utc>,
) -> Result<Task, AppError> {
    let batch: Batch = require(store, &request.batch_id, "Batch").await?;
    ensure_owner(&batch.teacher_id, &teacher.uid, "batch")?;
    check_dates(request.start_date, request.due_date)?;

    let status = request.status.unwrap_or_default();
    if status == TaskStatus::Closed {
        return Err(AppError::BadRequest("A new task cannot start closed".to_string()));
    }

    let mut task = Task {
        id: Store::new_id(),
        title: request.title.trim().to_string(),
        description: request.description,
        batch_id: batch.id,
        teacher_id: teacher.uid.clone(),
        task_type: request.task_type,
        status,
        created_at: now,
        updated_at: now,
        start_date: request.start_date,
        due_date: request.due_date,
        max_points: request.max_points,
        allowed_file_types: request.allowed_file_types,
        allow_late_submission: request.allow_late_submission,
        late_submission_days: request.late_submission_days,
        instructions: request.instructions,
        submission_count: 0,
    };
    task.normalize_for_type();

    store.save(&task).await?;
    tracing::info!(
        "Task {} ({}) created in batch {} as {}",
        task.id,
        task.task_type.as_str(),
        task.batch_id,
        task.status.as_str()
    );
    Ok(task)
}

pub async fn update_task(
    store: &Store,
    teacher: &Session,
    id: &str,
    request: UpdateTaskRequest,
    now: DateTime<Utc>,
) -> Result<Task, AppError> {
    let current: Task = require(store, id, "Task").await?;
    ensure_owner(&current.teacher_id, &teacher.uid, "task")?;
    check_dates(
        request.start_date.or(current.start_date),
        request.due_date.or(current.due_date),
    )?;

    let mut patch = Map::new();
    if let Some(title) = request.title {
        patch.insert("title".into(), json!(title.trim()));
    }
    if let Some(description) = request.description {
        patch.insert("description".into(), json!(description));
    }
    if let Some(start) = request.start_date {
        patch.insert("startDate".into(), json!(start));
    }
    if let Some(due) = request.due_date {
        patch.insert("dueDate".into(), json!(due));
    }
    if let Some(points) = request.max_points {
        patch.insert("maxPoints".into(), json!(points));
    }
    if let Some(types) = request.allowed_file_types {
        patch.insert("allowedFileTypes".into(), json!(types));
    }
    if let Some(allow) = request.allow_late_submission {
        patch.insert("allowLateSubmission".into(), json!(allow));
    }
    if let Some(days) = request.late_submission_days {
        patch.insert("lateSubmissionDays".into(), json!(days));
    }
    if let Some(instructions) = request.instructions {
        patch.insert("instructions".into(), json!(instructions));
    }
    patch.insert("updatedAt".into(), json!(now));

    store.update::<Task>(id, Value::Object(patch)).await?;

    // Re-apply the announcement rules on the merged result.
    let mut task: Task = require(store, id, "Task").await?;
    let before = task.clone();
    task.normalize_for_type();
    if task != before {
        store.save(&task).await?;
    }
    Ok(task)
}

/// Moves a task forward: draft -> published -> closed.
pub async fn set_status(
    store: &Store,
    teacher: &Session,
    id: &str,
    next: TaskStatus,
    now: DateTime<Utc>,
) -> Result<Task, AppError> {
    let task: Task = require(store, id, "Task").await?;
    ensure_owner(&task.teacher_id, &teacher.uid, "task")?;

    if task.status == next {
        return Ok(task);
    }
    if !task.status.can_transition_to(next) {
        return Err(AppError::BadRequest(format!(
            "Cannot move a {} task to {}",
            task.status.as_str(),
            next.as_str()
        )));
    }

    store
        .update::<Task>(id, json!({ "status": next, "updatedAt": now }))
        .await?;
    tracing::info!("Task {} is now {}", id, next.as_str());
    require(store, id, "Task").await
}

/// Deletes a task nobody has submitted to yet, along with its bookmarks.
/// Tasks with submissions are closed instead.
pub async fn delete_task(store: &Store, teacher: &Session, id: &str) -> Result<(), AppError> {
    let task: Task = require(store, id, "Task").await?;
    ensure_owner(&task.teacher_id, &teacher.uid, "task")?;

    let submissions: Vec<Submission> = store.find(&[Filter::eq("taskId", id)]).await?;
    if !submissions.is_empty() {
        return Err(AppError::Conflict(format!(
            "Task still has {} submission(s); close it instead",
            submissions.len()
        )));
    }

    let bookmarks: Vec<TaskBookmark> = store.find(&[Filter::eq("taskId", id)]).await?;
    for bookmark in &bookmarks {
        store.delete::<TaskBookmark>(&bookmark.id).await?;
    }
    store.delete::<Task>(id).await?;
    tracing::info!("Task {} deleted with {} bookmark(s)", id, bookmarks.len());
    Ok(())
}

fn newest_first(tasks: &mut [Task]) {
    tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

/// Every task of a batch the teacher owns, drafts included.
pub async fn list_for_teacher(store: &Store, teacher: &Session, batch_id: &str) -> Result<Vec<Task>, AppError> {
    let batch: Batch = require(store, batch_id, "Batch").await?;
    ensure_owner(&batch.teacher_id, &teacher.uid, "batch")?;

    let mut tasks: Vec<Task> = store.find(&[Filter::eq("batchId", batch_id)]).await?;
    newest_first(&mut tasks);
    Ok(tasks)
}

/// Published and closed tasks a student of the batch may see today.
pub async fn list_for_student(
    store: &Store,
    student: &Session,
    batch_id: &str,
    now: DateTime<Utc>,
    offset: FixedOffset,
) -> Result<Vec<Task>, AppError> {
    if enrollment::active_enrollment(store, &student.uid, batch_id).await?.is_none() {
        return Err(AppError::Forbidden("You are not enrolled in this batch".to_string()));
    }

    let tasks: Vec<Task> = store.find(&[Filter::eq("batchId", batch_id)]).await?;
    let mut visible: Vec<Task> = tasks
        .into_iter()
        .filter(|t| policy::is_visible_to_students(t, now, offset))
        .collect();
    newest_first(&mut visible);
    Ok(visible)
}

/// A single task, as the teacher or an enrolled student sees it.
pub async fn get_task(
    store: &Store,
    caller: &Session,
    id: &str,
    now: DateTime<Utc>,
    offset: FixedOffset,
) -> Result<Task, AppError> {
    let task: Task = require(store, id, "Task").await?;
    if task.teacher_id == caller.uid {
        return Ok(task);
    }

    let enrolled = enrollment::active_enrollment(store, &caller.uid, &task.batch_id)
        .await?
        .is_some();
    if !enrolled || !policy::is_visible_to_students(&task, now, offset) {
        // Hidden tasks look the same as missing ones.
        return Err(AppError::NotFound("Task not found".to_string()));
    }
    Ok(task)
}
