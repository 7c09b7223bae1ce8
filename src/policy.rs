// src/policy.rs

//! Timing and content rules for submissions.
//!
//! Two lateness concepts coexist and are evaluated independently:
//! a fixed window of `DUE_DATE_GRACE_HOURS` after the due date, and the task's own
//! `allowLateSubmission`/`lateSubmissionDays` extension. Daily listening tasks use
//! neither: they close at the end of the due date's local calendar day.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Utc};
use thiserror::Error;

use crate::{
    config::{DUE_DATE_GRACE_HOURS, SUBMISSION_EDIT_GRACE_MINUTES},
    models::{
        submission::{Submission, SubmissionStatus, SubmitRequest},
        task::{Task, TaskStatus, TaskType},
    },
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("This task is not open for submissions")]
    NotPublished,
    #[error("This task is not available yet")]
    NotYetVisible,
    #[error("Announcements do not accept submissions")]
    Announcement,
    #[error("Daily listening can only be submitted up to its due date")]
    DailyListeningClosed,
    #[error("The submission window for this task has closed")]
    WindowClosed,
    #[error("Attach at least one file or write a note")]
    Empty,
    #[error("File type not allowed for this task: {0}")]
    FileTypeNotAllowed(String),
}

/// Calendar date in the institute's time zone.
pub fn local_date(at: DateTime<Utc>, offset: FixedOffset) -> NaiveDate {
    at.with_timezone(&offset).date_naive()
}

/// True while a turned-in (not yet graded) submission may still be edited or withdrawn.
pub fn is_within_grace_period(submission: &Submission, now: DateTime<Utc>) -> bool {
    submission.status == SubmissionStatus::Submitted
        && submission
            .submitted_at
            .is_some_and(|at| now - at <= Duration::minutes(SUBMISSION_EDIT_GRACE_MINUTES))
}

/// The fixed post-due-date window. Always open when there is no due date.
pub fn is_submission_window_open(due_date: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    due_date.is_none_or(|due| now <= due + Duration::hours(DUE_DATE_GRACE_HOURS))
}

/// The task's own days-based extension.
pub fn is_late_window_open(task: &Task, now: DateTime<Utc>) -> bool {
    task.allow_late_submission
        && task
            .due_date
            .is_some_and(|due| now <= due + Duration::days(i64::from(task.late_submission_days)))
}

/// Daily listening compares calendar dates only: any time on the due date is fine,
/// any time on a later date is not.
pub fn is_daily_listening_open(task: &Task, now: DateTime<Utc>, offset: FixedOffset) -> bool {
    task.due_date
        .is_none_or(|due| local_date(now, offset) <= local_date(due, offset))
}

/// Students see published and closed tasks once the start date's local midnight has passed.
pub fn is_visible_to_students(task: &Task, now: DateTime<Utc>, offset: FixedOffset) -> bool {
    task.status != TaskStatus::Draft
        && task
            .start_date
            .is_none_or(|start| local_date(now, offset) >= local_date(start, offset))
}

/// Whether a submission made now counts as late (still accepted, but after the due date).
pub fn is_late(task: &Task, now: DateTime<Utc>) -> bool {
    task.due_date.is_some_and(|due| now > due)
}

fn file_extension(url: &str) -> Option<String> {
    let path = url::Url::parse(url)
        .map(|u| u.path().to_string())
        .unwrap_or_else(|_| url.to_string());
    let name = path.rsplit('/').next()?;
    let (_, ext) = name.rsplit_once('.')?;
    Some(ext.to_ascii_lowercase())
}

fn file_type_allowed(allowed: &[String], url: &str) -> bool {
    if allowed.is_empty() || allowed.iter().any(|a| a.trim() == "*") {
        return true;
    }
    let Some(ext) = file_extension(url) else {
        return false;
    };
    allowed
        .iter()
        .any(|a| a.trim().trim_start_matches('.').eq_ignore_ascii_case(&ext))
}

/// Content rules independent of timing.
pub fn check_content(task: &Task, request: &SubmitRequest) -> Result<(), Rejection> {
    if task.task_type != TaskType::DailyListening
        && request.file_urls.is_empty()
        && request.recording_url.is_none()
        && !request.has_notes()
    {
        return Err(Rejection::Empty);
    }

    if let Some(bad) = request
        .file_urls
        .iter()
        .find(|url| !file_type_allowed(&task.allowed_file_types, url))
    {
        return Err(Rejection::FileTypeNotAllowed(bad.clone()));
    }

    Ok(())
}

/// Full admission check for a new submission.
pub fn check_submission(
    task: &Task,
    request: &SubmitRequest,
    now: DateTime<Utc>,
    offset: FixedOffset,
) -> Result<(), Rejection> {
    if !task.accepts_submissions() {
        return Err(Rejection::Announcement);
    }
    if task.status != TaskStatus::Published {
        return Err(Rejection::NotPublished);
    }
    if !is_visible_to_students(task, now, offset) {
        return Err(Rejection::NotYetVisible);
    }

    match task.task_type {
        TaskType::DailyListening => {
            if !is_daily_listening_open(task, now, offset) {
                return Err(Rejection::DailyListeningClosed);
            }
        }
        _ => {
            if !is_submission_window_open(task.due_date, now) && !is_late_window_open(task, now) {
                return Err(Rejection::WindowClosed);
            }
        }
    }

    check_content(task, request)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    fn ist() -> FixedOffset {
        FixedOffset::east_opt(330 * 60).unwrap()
    }

    fn task(task_type: TaskType, due: Option<DateTime<Utc>>) -> Task {
        Task {
            id: "t1".to_string(),
            title: "Task".to_string(),
            description: String::new(),
            batch_id: "b1".to_string(),
            teacher_id: "teacher".to_string(),
            task_type,
            status: TaskStatus::Published,
            created_at: utc(2024, 1, 1, 0, 0),
            updated_at: utc(2024, 1, 1, 0, 0),
            start_date: None,
            due_date: due,
            max_points: 10,
            allowed_file_types: Vec::new(),
            allow_late_submission: false,
            late_submission_days: 0,
            instructions: None,
            submission_count: 0,
        }
    }

    fn submission(status: SubmissionStatus, submitted_at: Option<DateTime<Utc>>) -> Submission {
        Submission {
            id: "s1".to_string(),
            task_id: "t1".to_string(),
            student_id: "st".to_string(),
            batch_id: "b1".to_string(),
            status,
            created_at: utc(2024, 1, 1, 0, 0),
            updated_at: utc(2024, 1, 1, 0, 0),
            submitted_at,
            file_urls: Vec::new(),
            recording_url: None,
            notes: None,
            grade: None,
            feedback: None,
            graded_at: None,
        }
    }

    fn with_notes() -> SubmitRequest {
        SubmitRequest {
            notes: Some("done".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn grace_period_is_fifteen_minutes_for_submitted_only() {
        let at = utc(2024, 1, 10, 10, 0);
        let sub = submission(SubmissionStatus::Submitted, Some(at));
        assert!(is_within_grace_period(&sub, at + Duration::minutes(15)));
        assert!(!is_within_grace_period(&sub, at + Duration::minutes(16)));

        let graded = submission(SubmissionStatus::Graded, Some(at));
        assert!(!is_within_grace_period(&graded, at + Duration::minutes(1)));

        let draft = submission(SubmissionStatus::Draft, Some(at));
        assert!(!is_within_grace_period(&draft, at));

        let unstamped = submission(SubmissionStatus::Submitted, None);
        assert!(!is_within_grace_period(&unstamped, at));
    }

    #[test]
    fn window_stays_open_three_hours_past_due() {
        let due = utc(2024, 1, 10, 12, 0);
        assert!(is_submission_window_open(Some(due), due + Duration::hours(3)));
        assert!(!is_submission_window_open(Some(due), due + Duration::hours(3) + Duration::seconds(1)));
        assert!(is_submission_window_open(None, utc(2099, 1, 1, 0, 0)));
    }

    #[test]
    fn daily_listening_rejected_on_the_next_local_day() {
        // Due 2024-01-10 in institute time.
        let due = ist().with_ymd_and_hms(2024, 1, 10, 9, 0, 0).unwrap().with_timezone(&Utc);
        let t = task(TaskType::DailyListening, Some(due));

        let late_on_due_day = ist().with_ymd_and_hms(2024, 1, 10, 23, 59, 0).unwrap().with_timezone(&Utc);
        assert!(check_submission(&t, &SubmitRequest::default(), late_on_due_day, ist()).is_ok());

        for hour in [0, 1, 12, 23] {
            let next_day = ist().with_ymd_and_hms(2024, 1, 11, hour, 0, 0).unwrap().with_timezone(&Utc);
            assert_eq!(
                check_submission(&t, &SubmitRequest::default(), next_day, ist()),
                Err(Rejection::DailyListeningClosed)
            );
        }
    }

    #[test]
    fn daily_listening_ignores_late_settings() {
        let due = ist().with_ymd_and_hms(2024, 1, 10, 9, 0, 0).unwrap().with_timezone(&Utc);
        let mut t = task(TaskType::DailyListening, Some(due));
        t.allow_late_submission = true;
        t.late_submission_days = 5;

        let next_day = ist().with_ymd_and_hms(2024, 1, 11, 0, 30, 0).unwrap().with_timezone(&Utc);
        assert_eq!(
            check_submission(&t, &SubmitRequest::default(), next_day, ist()),
            Err(Rejection::DailyListeningClosed)
        );
    }

    #[test]
    fn late_days_extend_beyond_the_fixed_window() {
        let due = utc(2024, 1, 10, 12, 0);
        let mut t = task(TaskType::Cba, Some(due));
        let two_days_late = due + Duration::days(2);

        assert_eq!(
            check_submission(&t, &with_notes(), two_days_late, ist()),
            Err(Rejection::WindowClosed)
        );

        t.allow_late_submission = true;
        t.late_submission_days = 3;
        assert!(check_submission(&t, &with_notes(), two_days_late, ist()).is_ok());
        assert!(is_late(&t, two_days_late));

        // The fixed window still applies even with zero extension days.
        t.late_submission_days = 0;
        assert!(check_submission(&t, &with_notes(), due + Duration::hours(2), ist()).is_ok());
    }

    #[test]
    fn non_daily_tasks_need_files_or_notes() {
        let t = task(TaskType::Oba, None);
        let now = utc(2024, 1, 10, 0, 0);
        assert_eq!(
            check_submission(&t, &SubmitRequest::default(), now, ist()),
            Err(Rejection::Empty)
        );
        let blank_notes = SubmitRequest {
            notes: Some("   ".to_string()),
            ..Default::default()
        };
        assert_eq!(check_submission(&t, &blank_notes, now, ist()), Err(Rejection::Empty));

        let files = SubmitRequest {
            file_urls: vec!["http://localhost/files/a.pdf".to_string()],
            ..Default::default()
        };
        assert!(check_submission(&t, &files, now, ist()).is_ok());
    }

    #[test]
    fn allowed_file_types_match_extensions() {
        let mut t = task(TaskType::SlokaMemorization, None);
        t.allowed_file_types = vec![".mp3".to_string(), "PDF".to_string()];
        let now = utc(2024, 1, 10, 0, 0);

        let ok = SubmitRequest {
            file_urls: vec![
                "http://localhost/files/submissions/1_a.MP3".to_string(),
                "http://localhost/files/submissions/2_b.pdf?x=1".to_string(),
            ],
            ..Default::default()
        };
        assert!(check_submission(&t, &ok, now, ist()).is_ok());

        let bad = SubmitRequest {
            file_urls: vec!["http://localhost/files/submissions/3_c.exe".to_string()],
            ..Default::default()
        };
        assert!(matches!(
            check_submission(&t, &bad, now, ist()),
            Err(Rejection::FileTypeNotAllowed(_))
        ));
    }

    #[test]
    fn start_date_gates_from_local_midnight() {
        let mut t = task(TaskType::Cba, None);
        t.start_date = Some(ist().with_ymd_and_hms(2024, 1, 10, 15, 0, 0).unwrap().with_timezone(&Utc));

        let before = ist().with_ymd_and_hms(2024, 1, 9, 23, 59, 0).unwrap().with_timezone(&Utc);
        let midnight = ist().with_ymd_and_hms(2024, 1, 10, 0, 0, 0).unwrap().with_timezone(&Utc);
        assert!(!is_visible_to_students(&t, before, ist()));
        assert!(is_visible_to_students(&t, midnight, ist()));
        assert_eq!(
            check_submission(&t, &with_notes(), before, ist()),
            Err(Rejection::NotYetVisible)
        );

        t.status = TaskStatus::Draft;
        assert!(!is_visible_to_students(&t, midnight, ist()));
    }

    #[test]
    fn closed_tasks_and_announcements_reject() {
        let mut t = task(TaskType::Cba, None);
        t.status = TaskStatus::Closed;
        assert_eq!(
            check_submission(&t, &with_notes(), utc(2024, 1, 1, 0, 0), ist()),
            Err(Rejection::NotPublished)
        );

        let a = task(TaskType::Announcement, None);
        assert_eq!(
            check_submission(&a, &with_notes(), utc(2024, 1, 1, 0, 0), ist()),
            Err(Rejection::Announcement)
        );
    }
}
