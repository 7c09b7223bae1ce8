// src/services/bookmarks.rs

use chrono::{DateTime, FixedOffset, Utc};

use crate::{
    error::AppError,
    models::{bookmark::TaskBookmark, user::Session},
    services::tasks,
    store::{Filter, Store},
};

/// Bookmarks the task if it is not bookmarked yet, otherwise removes the bookmark.
/// Returns whether the task is bookmarked afterwards.
///
/// Only tasks the caller can open are bookmarkable; removing always works.
pub async fn toggle(
    store: &Store,
    student: &Session,
    task_id: &str,
    now: DateTime<Utc>,
    offset: FixedOffset,
) -> Result<bool, AppError> {
    let key = TaskBookmark::key(&student.uid, task_id);

    if store.delete::<TaskBookmark>(&key).await? {
        tracing::debug!("Bookmark {} removed", key);
        return Ok(false);
    }

    let task = tasks::get_task(store, student, task_id, now, offset).await?;
    store
        .save(&TaskBookmark {
            id: key,
            student_id: student.uid.clone(),
            task_id: task.id,
            batch_id: task.batch_id,
            created_at: now,
        })
        .await?;
    Ok(true)
}

pub async fn list_mine(store: &Store, student: &Session) -> Result<Vec<TaskBookmark>, AppError> {
    let mut bookmarks: Vec<TaskBookmark> = store
        .find(&[Filter::eq("studentId", student.uid.as_str())])
        .await?;
    bookmarks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(bookmarks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        enrollment::{Enrollment, EnrollmentStatus},
        task::{Task, TaskStatus, TaskType},
    };
    use crate::services::testing::{at, session};

    fn ist() -> FixedOffset {
        FixedOffset::east_opt(330 * 60).unwrap()
    }

    async fn seed(store: &Store, status: TaskStatus, start_date: Option<DateTime<Utc>>) {
        store
            .save(&Enrollment {
                id: "e1".to_string(),
                student_id: "s1".to_string(),
                batch_id: "b1".to_string(),
                course_group_id: "g1".to_string(),
                status: EnrollmentStatus::Active,
                enrolled_at: at(2024, 1, 1, 0),
                completed_at: None,
                dropped_at: None,
                class_code: None,
            })
            .await
            .unwrap();
        store
            .save(&Task {
                id: "t1".to_string(),
                title: "Listen".to_string(),
                description: String::new(),
                batch_id: "b1".to_string(),
                teacher_id: "teacher".to_string(),
                task_type: TaskType::DailyListening,
                status,
                created_at: at(2024, 1, 1, 0),
                updated_at: at(2024, 1, 1, 0),
                start_date,
                due_date: None,
                max_points: 0,
                allowed_file_types: vec![],
                allow_late_submission: false,
                late_submission_days: 0,
                instructions: None,
                submission_count: 0,
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn toggle_adds_then_removes() {
        let store = Store::in_memory();
        seed(&store, TaskStatus::Published, None).await;
        let student = session("s1", "s1@example.org");

        assert!(toggle(&store, &student, "t1", at(2024, 1, 2, 0), ist()).await.unwrap());
        let mine = list_mine(&store, &student).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].batch_id, "b1");

        assert!(!toggle(&store, &student, "t1", at(2024, 1, 2, 1), ist()).await.unwrap());
        assert!(list_mine(&store, &student).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_task_cannot_be_bookmarked() {
        let store = Store::in_memory();
        let result = toggle(&store, &session("s1", "s1@example.org"), "missing", at(2024, 1, 2, 0), ist()).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn hidden_tasks_cannot_be_bookmarked() {
        let store = Store::in_memory();
        seed(&store, TaskStatus::Draft, None).await;
        let draft = toggle(&store, &session("s1", "s1@example.org"), "t1", at(2024, 1, 2, 0), ist()).await;
        assert!(matches!(draft, Err(AppError::NotFound(_))));

        let store = Store::in_memory();
        seed(&store, TaskStatus::Published, Some(at(2024, 1, 5, 0))).await;
        let early = toggle(&store, &session("s1", "s1@example.org"), "t1", at(2024, 1, 2, 0), ist()).await;
        assert!(matches!(early, Err(AppError::NotFound(_))));

        // Students outside the batch cannot bookmark either.
        let outsider = toggle(&store, &session("s2", "s2@example.org"), "t1", at(2024, 1, 6, 0), ist()).await;
        assert!(matches!(outsider, Err(AppError::NotFound(_))));
        assert!(list_mine(&store, &session("s2", "s2@example.org")).await.unwrap().is_empty());
    }
}
