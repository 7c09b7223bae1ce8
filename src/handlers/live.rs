// src/handlers/live.rs

//! Server-sent event streams of live query snapshots.
//!
//! Every stream owns its [`Subscription`]; when the client disconnects axum drops the
//! stream, which drops the subscription and cancels its refresh task.

use std::convert::Infallible;

use axum::{
    Extension,
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
};
use chrono::Utc;
use futures::{Stream, StreamExt};
use serde::Serialize;
use tokio_stream::wrappers::WatchStream;

use crate::{
    error::AppError,
    models::{
        batch::Batch,
        enrollment::Enrollment,
        submission::Submission,
        task::Task,
        user::Session,
    },
    policy,
    realtime::{Subscription, watch_query},
    services::{enrollment, ensure_owner, require},
    state::AppState,
    store::Filter,
};

fn snapshot_event<T: Serialize>(snapshot: &[T]) -> Event {
    Event::default()
        .event("snapshot")
        .json_data(snapshot)
        .unwrap_or_else(|e| {
            tracing::error!("Failed to encode snapshot: {}", e);
            Event::default().event("error").data("snapshot unavailable")
        })
}

/// Turns a subscription into an SSE response, passing each snapshot through `shape`.
fn stream<T, F>(subscription: Subscription<T>, shape: F) -> Sse<impl Stream<Item = Result<Event, Infallible>>>
where
    T: Serialize + Clone + Send + Sync + 'static,
    F: Fn(Vec<T>) -> Vec<T> + Send + 'static,
{
    let snapshots = WatchStream::new(subscription.receiver());
    let events = snapshots.map(move |snapshot| {
        // Keeps the subscription alive for as long as the client listens.
        let _keep = &subscription;
        Ok(snapshot_event(&shape(snapshot)))
    });
    Sse::new(events).keep_alive(KeepAlive::default())
}

/// Tasks of a batch. Teachers of the batch see everything; enrolled students see
/// what is visible to them at the moment each snapshot is sent.
pub async fn batch_tasks(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(batch_id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let batch: Batch = require(&state.store, &batch_id, "Batch").await?;
    let is_teacher = batch.teacher_id == session.uid;
    if !is_teacher
        && enrollment::active_enrollment(&state.store, &session.uid, &batch_id)
            .await?
            .is_none()
    {
        return Err(AppError::Forbidden("You are not enrolled in this batch".to_string()));
    }

    let subscription = watch_query::<Task>(&state.store, vec![Filter::eq("batchId", batch_id.as_str())]).await?;
    let offset = state.config.local_offset();
    Ok(stream(subscription, move |tasks| {
        if is_teacher {
            return tasks;
        }
        let now = Utc::now();
        tasks
            .into_iter()
            .filter(|t| policy::is_visible_to_students(t, now, offset))
            .collect()
    }))
}

pub async fn my_enrollments(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let subscription =
        watch_query::<Enrollment>(&state.store, vec![Filter::eq("studentId", session.uid.as_str())]).await?;
    Ok(stream(subscription, |list| list))
}

pub async fn teacher_batches(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let subscription =
        watch_query::<Batch>(&state.store, vec![Filter::eq("teacherId", session.uid.as_str())]).await?;
    Ok(stream(subscription, |list| list))
}

pub async fn batch_enrollments(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(batch_id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let batch: Batch = require(&state.store, &batch_id, "Batch").await?;
    ensure_owner(&batch.teacher_id, &session.uid, "batch")?;

    let subscription =
        watch_query::<Enrollment>(&state.store, vec![Filter::eq("batchId", batch_id.as_str())]).await?;
    Ok(stream(subscription, |list| list))
}

pub async fn task_submissions(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(task_id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let task: Task = require(&state.store, &task_id, "Task").await?;
    ensure_owner(&task.teacher_id, &session.uid, "task")?;

    let subscription =
        watch_query::<Submission>(&state.store, vec![Filter::eq("taskId", task_id.as_str())]).await?;
    Ok(stream(subscription, |list| list))
}
