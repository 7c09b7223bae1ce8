// tests/api_tests.rs

use chrono::{Duration, Utc};
use portal::{
    blob::LocalBlobStore,
    config::Config,
    models::user::Session,
    routes,
    services::roles,
    state::AppState,
    store::Store,
    utils::jwt::sign_jwt,
};
use serde_json::{Value, json};
use std::sync::Arc;

const SECRET: &str = "test_secret_for_integration_tests";

struct TestApp {
    address: String,
    store: Store,
    client: reqwest::Client,
}

impl TestApp {
    fn token(&self, uid: &str, email: &str) -> String {
        let session = Session {
            uid: uid.to_string(),
            email: email.to_string(),
            display_name: Some(uid.to_string()),
            photo_url: None,
        };
        sign_jwt(&session, SECRET, 600).expect("token")
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }
}

/// Helper function to spawn the app on a random port for testing.
/// Uses the in-memory store and a throwaway blob directory.
async fn spawn_app() -> TestApp {
    let blob_root = std::env::temp_dir().join(format!("portal-it-{}", uuid::Uuid::new_v4()));

    let config = Config {
        database_url: None,
        jwt_secret: SECRET.to_string(),
        jwt_expiration: 600,
        rust_log: "error".to_string(),
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        blob_root: blob_root.to_string_lossy().to_string(),
        public_base_url: "http://localhost:3000".to_string(),
        utc_offset_minutes: 330,
        admin_email: None,
        cors_origins: vec![],
    };

    let store = Store::in_memory();
    let state = AppState {
        store: store.clone(),
        blobs: Arc::new(LocalBlobStore::new(&blob_root, &config.public_base_url)),
        config,
    };

    let app = routes::create_router(state);

    // Bind to port 0 to get a random available port
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestApp {
        address: format!("http://127.0.0.1:{}", port),
        store,
        client: reqwest::Client::new(),
    }
}

#[tokio::test]
async fn health_check_404() {
    let app = spawn_app().await;

    let response = app
        .client
        .get(app.url("/random_path_that_does_not_exist"))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn protected_routes_reject_missing_or_bad_tokens() {
    let app = spawn_app().await;

    let response = app.client.get(app.url("/api/me")).send().await.unwrap();
    assert_eq!(response.status().as_u16(), 401);

    let response = app
        .client
        .get(app.url("/api/me"))
        .bearer_auth("not-a-jwt")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 401);
    let body: Value = response.json().await.unwrap();
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn session_creates_a_registered_user() {
    let app = spawn_app().await;
    let token = app.token("u1", "U1@Example.org");

    let response = app
        .client
        .post(app.url("/api/auth/session"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["role"], "registered");
    assert_eq!(body["user"]["email"], "u1@example.org");

    let me: Value = app
        .client
        .get(app.url("/api/me"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(me["user"]["id"], "u1");
}

#[tokio::test]
async fn teacher_routes_require_a_teacher_record() {
    let app = spawn_app().await;
    let token = app.token("u1", "student@example.org");

    let response = app
        .client
        .get(app.url("/api/teacher/batches"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 403);

    roles::add_teacher(&app.store, "student@example.org", None, Utc::now())
        .await
        .unwrap();
    let response = app
        .client
        .get(app.url("/api/teacher/batches"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
}

#[tokio::test]
async fn invalid_class_code_is_rejected() {
    let app = spawn_app().await;
    let token = app.token("s1", "s1@example.org");

    let response = app
        .client
        .post(app.url("/api/enrollments/join"))
        .bearer_auth(&token)
        .json(&json!({ "classCode": "NO-SUCH-CODE" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);

    let check: Value = app
        .client
        .post(app.url("/api/enrollments/validate"))
        .bearer_auth(&token)
        .json(&json!({ "classCode": "NO-SUCH-CODE" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(check["valid"], false);
}

#[tokio::test]
async fn classroom_flow_from_join_to_grade() {
    let app = spawn_app().await;
    roles::add_teacher(&app.store, "guru@example.org", None, Utc::now())
        .await
        .unwrap();
    let teacher = app.token("t1", "guru@example.org");
    let student = app.token("s1", "s1@example.org");

    // Teacher sets up a course group and a batch.
    let group: Value = app
        .client
        .post(app.url("/api/teacher/course-groups"))
        .bearer_auth(&teacher)
        .json(&json!({ "name": "Bhagavad Gita", "description": "Weekly study" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let group_id = group["id"].as_str().unwrap().to_string();

    let response = app
        .client
        .post(app.url("/api/teacher/batches"))
        .bearer_auth(&teacher)
        .json(&json!({
            "name": "Morning",
            "courseGroupId": group_id,
            "classCode": "GITA-2024"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 201);
    let batch: Value = response.json().await.unwrap();
    let batch_id = batch["id"].as_str().unwrap().to_string();
    assert_eq!(batch["studentCount"], 0);

    // Student joins with the class code; a second attempt conflicts.
    let response = app
        .client
        .post(app.url("/api/enrollments/join"))
        .bearer_auth(&student)
        .json(&json!({ "classCode": " GITA-2024 " }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 201);
    let enrollment: Value = response.json().await.unwrap();
    assert_eq!(enrollment["status"], "pending");
    let enrollment_id = enrollment["id"].as_str().unwrap().to_string();

    let response = app
        .client
        .post(app.url("/api/enrollments/join"))
        .bearer_auth(&student)
        .json(&json!({ "classCode": "GITA-2024" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 409);

    // Pending students cannot see tasks yet.
    let response = app
        .client
        .get(app.url(&format!("/api/student/batches/{}/tasks", batch_id)))
        .bearer_auth(&student)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 403);

    // Teacher approves.
    let pending: Value = app
        .client
        .get(app.url(&format!("/api/teacher/batches/{}/enrollments?status=pending", batch_id)))
        .bearer_auth(&teacher)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(pending.as_array().unwrap().len(), 1);

    let approved: Value = app
        .client
        .post(app.url(&format!("/api/teacher/enrollments/{}/approve", enrollment_id)))
        .bearer_auth(&teacher)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(approved["status"], "active");

    // Teacher publishes a task due in two days.
    let due = Utc::now() + Duration::days(2);
    let response = app
        .client
        .post(app.url("/api/teacher/tasks"))
        .bearer_auth(&teacher)
        .json(&json!({
            "title": "Chapter 2 reflection",
            "batchId": batch_id,
            "type": "cba",
            "status": "published",
            "dueDate": due,
            "maxPoints": 10
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 201);
    let task: Value = response.json().await.unwrap();
    let task_id = task["id"].as_str().unwrap().to_string();

    let visible: Value = app
        .client
        .get(app.url(&format!("/api/student/batches/{}/tasks", batch_id)))
        .bearer_auth(&student)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(visible.as_array().unwrap().len(), 1);

    // Empty submissions are refused, a note is enough.
    let response = app
        .client
        .post(app.url(&format!("/api/student/tasks/{}/submissions", task_id)))
        .bearer_auth(&student)
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);

    let response = app
        .client
        .post(app.url(&format!("/api/student/tasks/{}/submissions", task_id)))
        .bearer_auth(&student)
        .json(&json!({ "notes": "Karma yoga is action without attachment." }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 201);
    let submission: Value = response.json().await.unwrap();
    let submission_id = submission["id"].as_str().unwrap().to_string();
    assert_eq!(submission["status"], "submitted");

    let response = app
        .client
        .post(app.url(&format!("/api/student/tasks/{}/submissions", task_id)))
        .bearer_auth(&student)
        .json(&json!({ "notes": "again" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 409);

    // Teacher grades within bounds.
    let response = app
        .client
        .put(app.url(&format!("/api/teacher/submissions/{}/grade", submission_id)))
        .bearer_auth(&teacher)
        .json(&json!({ "grade": 12 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);

    let graded: Value = app
        .client
        .put(app.url(&format!("/api/teacher/submissions/{}/grade", submission_id)))
        .bearer_auth(&teacher)
        .json(&json!({ "grade": 8, "feedback": "Well argued" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(graded["status"], "graded");
    assert_eq!(graded["grade"], 8.0);

    // The student's role was upgraded when they joined.
    let me: Value = app
        .client
        .post(app.url("/api/auth/session"))
        .bearer_auth(&student)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(me["role"], "student");

    // Recount reconciles the denormalized counter.
    let recount: Value = app
        .client
        .post(app.url(&format!("/api/teacher/batches/{}/recount", batch_id)))
        .bearer_auth(&teacher)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(recount["studentCount"], 1);
}

/// Teacher with one batch and one approved student. Returns (teacher, student, batch id).
async fn classroom(app: &TestApp) -> (String, String, String) {
    roles::add_teacher(&app.store, "guru@example.org", None, Utc::now())
        .await
        .unwrap();
    let teacher = app.token("t1", "guru@example.org");
    let student = app.token("s1", "s1@example.org");

    let group: Value = app
        .client
        .post(app.url("/api/teacher/course-groups"))
        .bearer_auth(&teacher)
        .json(&json!({ "name": "Srimad Bhagavatam" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let batch: Value = app
        .client
        .post(app.url("/api/teacher/batches"))
        .bearer_auth(&teacher)
        .json(&json!({
            "name": "Evening",
            "courseGroupId": group["id"],
            "classCode": "SB-EVE"
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let batch_id = batch["id"].as_str().unwrap().to_string();

    let enrollment: Value = app
        .client
        .post(app.url("/api/enrollments/join"))
        .bearer_auth(&student)
        .json(&json!({ "classCode": "SB-EVE" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let response = app
        .client
        .post(app.url(&format!(
            "/api/teacher/enrollments/{}/approve",
            enrollment["id"].as_str().unwrap()
        )))
        .bearer_auth(&teacher)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    (teacher, student, batch_id)
}

async fn create_task(app: &TestApp, teacher: &str, batch_id: &str, task_type: &str, status: &str) -> String {
    let response = app
        .client
        .post(app.url("/api/teacher/tasks"))
        .bearer_auth(teacher)
        .json(&json!({
            "title": format!("{} ({})", task_type, status),
            "batchId": batch_id,
            "type": task_type,
            "status": status,
            "dueDate": Utc::now() + Duration::days(2),
            "maxPoints": 10
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 201);
    let task: Value = response.json().await.unwrap();
    task["id"].as_str().unwrap().to_string()
}

/// Reads a live response until its first `snapshot` event and returns the payload.
async fn first_snapshot(mut response: reqwest::Response) -> Value {
    assert_eq!(response.status().as_u16(), 200);
    assert!(
        response.headers()["content-type"]
            .to_str()
            .unwrap()
            .starts_with("text/event-stream")
    );

    let mut buffer = String::new();
    loop {
        let chunk = tokio::time::timeout(std::time::Duration::from_secs(5), response.chunk())
            .await
            .expect("Timed out waiting for a snapshot")
            .expect("Failed to read the event stream")
            .expect("Stream ended before a snapshot");
        buffer.push_str(&String::from_utf8_lossy(&chunk));

        while let Some(end) = buffer.find("\n\n") {
            let frame: String = buffer.drain(..end + 2).collect();
            if !frame.lines().any(|line| line == "event: snapshot") {
                continue;
            }
            let data: Vec<&str> = frame
                .lines()
                .filter_map(|line| line.strip_prefix("data:"))
                .map(str::trim_start)
                .collect();
            return serde_json::from_str(&data.join("\n")).expect("Snapshot is not JSON");
        }
    }
}

#[tokio::test]
async fn live_views_filter_for_students_and_owners() {
    let app = spawn_app().await;
    let (teacher, student, batch_id) = classroom(&app).await;
    let published = create_task(&app, &teacher, &batch_id, "cba", "published").await;
    create_task(&app, &teacher, &batch_id, "cba", "draft").await;

    // Arrange: a second teacher and a student outside the batch.
    roles::add_teacher(&app.store, "other@example.org", None, Utc::now())
        .await
        .unwrap();
    let other_teacher = app.token("t2", "other@example.org");
    let outsider = app.token("s9", "s9@example.org");

    // Students only see visible tasks.
    let tasks_path = format!("/api/live/batches/{}/tasks", batch_id);
    let response = app.client.get(app.url(&tasks_path)).bearer_auth(&student).send().await.unwrap();
    let snapshot = first_snapshot(response).await;
    let visible = snapshot.as_array().unwrap();
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0]["id"], published.as_str());

    let response = app.client.get(app.url(&tasks_path)).bearer_auth(&teacher).send().await.unwrap();
    assert_eq!(first_snapshot(response).await.as_array().unwrap().len(), 2);

    let response = app.client.get(app.url(&tasks_path)).bearer_auth(&outsider).send().await.unwrap();
    assert_eq!(response.status().as_u16(), 403);

    // Teacher views belong to the owning teacher.
    let enrollments_path = format!("/api/live/teacher/batches/{}/enrollments", batch_id);
    let response = app
        .client
        .get(app.url(&enrollments_path))
        .bearer_auth(&other_teacher)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 403);

    let response = app
        .client
        .get(app.url(&enrollments_path))
        .bearer_auth(&teacher)
        .send()
        .await
        .unwrap();
    let enrollments = first_snapshot(response).await;
    assert_eq!(enrollments.as_array().unwrap().len(), 1);
    assert_eq!(enrollments[0]["status"], "active");

    let submissions_path = format!("/api/live/teacher/tasks/{}/submissions", published);
    let response = app
        .client
        .get(app.url(&submissions_path))
        .bearer_auth(&other_teacher)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 403);
    let response = app
        .client
        .get(app.url(&submissions_path))
        .bearer_auth(&teacher)
        .send()
        .await
        .unwrap();
    assert!(first_snapshot(response).await.as_array().unwrap().is_empty());

    // Students cannot open teacher views at all.
    let response = app
        .client
        .get(app.url("/api/live/teacher/batches"))
        .bearer_auth(&student)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 403);

    let response = app
        .client
        .get(app.url("/api/live/teacher/batches"))
        .bearer_auth(&teacher)
        .send()
        .await
        .unwrap();
    assert_eq!(first_snapshot(response).await[0]["id"], batch_id.as_str());

    let response = app
        .client
        .get(app.url("/api/live/me/enrollments"))
        .bearer_auth(&student)
        .send()
        .await
        .unwrap();
    assert_eq!(first_snapshot(response).await[0]["batchId"], batch_id.as_str());
}

#[tokio::test]
async fn daily_listening_upload_report_and_cleanup() {
    let app = spawn_app().await;
    let (teacher, student, batch_id) = classroom(&app).await;
    let listening = create_task(&app, &teacher, &batch_id, "dailyListening", "published").await;
    let draft = create_task(&app, &teacher, &batch_id, "dailyListening", "draft").await;

    // Upload a recording into the student's own folder.
    let form = reqwest::multipart::Form::new().part(
        "file",
        reqwest::multipart::Part::bytes(b"audio".to_vec()).file_name("Day 1.mp3"),
    );
    let response = app
        .client
        .post(app.url("/api/student/uploads"))
        .bearer_auth(&student)
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 201);
    let uploaded: Value = response.json().await.unwrap();
    let recording = uploaded["url"].as_str().unwrap().to_string();
    let stored = recording.split("/files/").nth(1).unwrap().to_string();
    assert!(stored.starts_with("submissions/s1/"));

    let response = app.client.get(app.url(&format!("/files/{}", stored))).send().await.unwrap();
    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(response.bytes().await.unwrap().as_ref(), b"audio");

    // Files outside the student's folder are refused.
    let response = app
        .client
        .post(app.url(&format!("/api/student/tasks/{}/submissions", listening)))
        .bearer_auth(&student)
        .json(&json!({ "recordingUrl": "http://localhost:3000/files/documents/prospectus.pdf" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);

    let response = app
        .client
        .post(app.url(&format!("/api/student/tasks/{}/submissions", listening)))
        .bearer_auth(&student)
        .json(&json!({ "recordingUrl": recording }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 201);

    // Bookmarks: visible tasks only.
    let bookmark: Value = app
        .client
        .post(app.url(&format!("/api/student/tasks/{}/bookmark", listening)))
        .bearer_auth(&student)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(bookmark["bookmarked"], true);
    let response = app
        .client
        .post(app.url(&format!("/api/student/tasks/{}/bookmark", draft)))
        .bearer_auth(&student)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);
    let bookmarks: Value = app
        .client
        .get(app.url("/api/student/bookmarks"))
        .bearer_auth(&student)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(bookmarks.as_array().unwrap().len(), 1);

    // The draft does not count against the student.
    let report: Value = app
        .client
        .get(app.url(&format!("/api/teacher/batches/{}/analytics/daily-listening", batch_id)))
        .bearer_auth(&teacher)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(report[0]["studentId"], "s1");
    assert_eq!(report[0]["submitted"], 1);
    assert_eq!(report[0]["total"], 1);
    assert_eq!(report[0]["percentage"], 100);

    // A task with submissions cannot be deleted.
    let response = app
        .client
        .delete(app.url(&format!("/api/teacher/tasks/{}", listening)))
        .bearer_auth(&teacher)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 409);

    // Bulk cleanup removes the recording.
    let cleanup: Value = app
        .client
        .delete(app.url(&format!("/api/teacher/batches/{}/daily-listening/files", batch_id)))
        .bearer_auth(&teacher)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(cleanup["deleted"], 1);

    let response = app.client.get(app.url(&format!("/files/{}", stored))).send().await.unwrap();
    assert_eq!(response.status().as_u16(), 404);
}
