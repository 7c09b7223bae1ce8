// src/services/analytics.rs

//! Daily listening completion per student. Computed on request, never stored.

use std::collections::HashSet;

use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    error::AppError,
    models::{
        batch::Batch,
        enrollment::{Enrollment, EnrollmentStatus},
        submission::Submission,
        task::{Task, TaskStatus, TaskType},
        user::{Session, User},
    },
    services::{ensure_owner, require},
    store::{Filter, Store},
};

/// Optional inclusive date range, in the institute's local calendar (`YYYY-MM-DD`).
#[derive(Debug, Default, Deserialize)]
pub struct ReportRange {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentProgress {
    pub student_id: String,
    pub student_name: Option<String>,
    pub submitted: usize,
    pub total: usize,
    pub percentage: u32,
}

/// UTC bounds of a local date range: `from 00:00:00` through `to 23:59:59`.
fn utc_bounds(
    range: &ReportRange,
    offset: FixedOffset,
) -> Result<(Option<DateTime<Utc>>, Option<DateTime<Utc>>), AppError> {
    if let (Some(from), Some(to)) = (range.from, range.to) {
        if to < from {
            return Err(AppError::BadRequest("'to' must not be before 'from'".to_string()));
        }
    }

    let local = |date: NaiveDate, (h, m, sec): (u32, u32, u32)| {
        date.and_hms_opt(h, m, sec)
            .and_then(|naive| offset.from_local_datetime(&naive).single())
            .map(|dt| dt.with_timezone(&Utc))
            .ok_or_else(|| AppError::BadRequest(format!("Invalid date {}", date)))
    };

    let start = range.from.map(|d| local(d, (0, 0, 0))).transpose()?;
    let end = range.to.map(|d| local(d, (23, 59, 59))).transpose()?;
    Ok((start, end))
}

fn in_range(at: DateTime<Utc>, start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> bool {
    start.is_none_or(|s| at >= s) && end.is_none_or(|e| at <= e)
}

pub fn percentage(submitted: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    ((submitted as f64 * 100.0) / total as f64).round() as u32
}

/// Daily listening completion for every active student of a batch.
pub async fn daily_listening_report(
    store: &Store,
    teacher: &Session,
    batch_id: &str,
    range: &ReportRange,
    offset: FixedOffset,
) -> Result<Vec<StudentProgress>, AppError> {
    let batch: Batch = require(store, batch_id, "Batch").await?;
    ensure_owner(&batch.teacher_id, &teacher.uid, "batch")?;
    let (start, end) = utc_bounds(range, offset)?;

    let tasks: Vec<Task> = store
        .find(&[
            Filter::eq("batchId", batch_id),
            Filter::eq("type", TaskType::DailyListening.as_str()),
        ])
        .await?;
    // Drafts never count.
    let counted: HashSet<String> = tasks
        .into_iter()
        .filter(|t| t.status != TaskStatus::Draft)
        .filter(|t| in_range(t.due_date.unwrap_or(t.created_at), start, end))
        .map(|t| t.id)
        .collect();
    let total = counted.len();

    let submissions: Vec<Submission> = store.find(&[Filter::eq("batchId", batch_id)]).await?;
    let enrollments: Vec<Enrollment> = store
        .find(&[
            Filter::eq("batchId", batch_id),
            Filter::eq("status", EnrollmentStatus::Active.as_str()),
        ])
        .await?;

    let mut report = Vec::with_capacity(enrollments.len());
    for enrollment in enrollments {
        let done: HashSet<&str> = submissions
            .iter()
            .filter(|s| s.student_id == enrollment.student_id && s.status.is_turned_in())
            .filter(|s| counted.contains(&s.task_id))
            .filter(|s| s.submitted_at.is_some_and(|at| in_range(at, start, end)))
            .map(|s| s.task_id.as_str())
            .collect();

        let student = store.get::<User>(&enrollment.student_id).await?;
        report.push(StudentProgress {
            student_name: student.map(|u| u.name),
            submitted: done.len(),
            total,
            percentage: percentage(done.len(), total),
            student_id: enrollment.student_id,
        });
    }

    report.sort_by(|a, b| b.percentage.cmp(&a.percentage).then(a.student_id.cmp(&b.student_id)));
    Ok(report)
}
