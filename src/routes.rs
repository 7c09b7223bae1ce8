// src/routes.rs

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{delete, get, post, put},
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::{
    config::MAX_UPLOAD_BYTES,
    handlers::{
        admin, analytics, auth, bookmarks, catalog, content, documents, enrollments, live, submissions,
        tasks,
    },
    state::AppState,
    utils::jwt::{auth_middleware, teacher_middleware},
};

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}

/// Assembles the main application router.
///
/// * Public: site content, PDF documents and stored files.
/// * Signed in: session, profile, joining batches, student task and submission views.
/// * Teacher: catalog, enrollment workflow, tasks, grading, analytics, content writes.
/// * Live: SSE streams under `/api/live`.
pub fn create_router(state: AppState) -> Router {
    let auth = middleware::from_fn_with_state(state.clone(), auth_middleware);
    let teacher = middleware::from_fn_with_state(state.clone(), teacher_middleware);

    let content_routes = Router::new()
        .route("/quotes", get(content::list_quotes))
        .route("/quotes/showcase", get(content::quote_showcase))
        .route("/testimonials", get(content::list_testimonials))
        .route("/courses", get(content::list_courses))
        .route("/courses/{id}", get(content::get_course))
        .route("/about", get(content::list_about_pages))
        .route("/about/{slug}", get(content::get_about_page));

    let account_routes = Router::new()
        .route("/api/auth/session", post(auth::session))
        .route("/api/me", get(auth::get_me).put(auth::update_me))
        .route("/api/enrollments/validate", post(enrollments::validate_code))
        .route("/api/enrollments/join", post(enrollments::join))
        .route("/api/enrollments/mine", get(enrollments::list_mine))
        .layer(auth.clone());

    let student_routes = Router::new()
        .route("/batches/{id}/tasks", get(tasks::list_for_student))
        .route("/tasks/{id}", get(tasks::get_task))
        .route("/tasks/{id}/submissions", post(submissions::submit))
        .route("/tasks/{id}/bookmark", post(bookmarks::toggle))
        .route("/submissions", get(submissions::list_mine))
        .route(
            "/submissions/{id}",
            put(submissions::edit_own).delete(submissions::delete_own),
        )
        .route("/bookmarks", get(bookmarks::list_mine))
        .route(
            "/uploads",
            post(submissions::upload).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .layer(auth.clone());

    let teacher_routes = Router::new()
        .route(
            "/course-groups",
            get(catalog::list_course_groups).post(catalog::create_course_group),
        )
        .route(
            "/course-groups/{id}",
            put(catalog::update_course_group).delete(catalog::delete_course_group),
        )
        .route("/course-groups/{id}/batches", get(catalog::list_group_batches))
        .route("/batches", get(catalog::list_batches).post(catalog::create_batch))
        .route(
            "/batches/{id}",
            get(catalog::get_batch)
                .put(catalog::update_batch)
                .delete(catalog::delete_batch),
        )
        .route("/batches/{id}/enrollments", get(enrollments::list_for_batch))
        .route("/batches/{id}/recount", post(enrollments::recount))
        .route("/batches/{id}/tasks", get(tasks::list_for_teacher))
        .route(
            "/batches/{id}/analytics/daily-listening",
            get(analytics::daily_listening),
        )
        .route(
            "/batches/{id}/daily-listening/files",
            delete(submissions::delete_daily_listening_files),
        )
        .route("/enrollments/{id}/approve", post(enrollments::approve))
        .route("/enrollments/{id}/decline", post(enrollments::decline))
        .route("/enrollments/{id}/remove", post(enrollments::remove))
        .route("/enrollments/{id}/complete", post(enrollments::complete))
        .route("/tasks", post(tasks::create_task))
        .route(
            "/tasks/{id}",
            get(tasks::get_task)
                .put(tasks::update_task)
                .delete(tasks::delete_task),
        )
        .route("/tasks/{id}/status", put(tasks::set_status))
        .route("/tasks/{id}/submissions", get(submissions::list_for_task))
        .route("/submissions/{id}/grade", put(submissions::grade))
        .route("/submissions/{id}/files", delete(submissions::delete_file))
        // Double middleware protection: Auth first, then Teacher check
        .layer(teacher.clone())
        .layer(auth.clone());

    let admin_routes = Router::new()
        .route("/users", get(admin::list_users))
        .route("/teachers", get(admin::list_teachers).post(admin::add_teacher))
        .route("/teachers/{email}", delete(admin::remove_teacher))
        .route("/content/quotes", post(content::create_quote))
        .route(
            "/content/quotes/{id}",
            put(content::update_quote).delete(content::delete_quote),
        )
        .route("/content/testimonials", post(content::create_testimonial))
        .route(
            "/content/testimonials/{id}",
            put(content::update_testimonial).delete(content::delete_testimonial),
        )
        .route("/content/courses", post(content::create_course))
        .route(
            "/content/courses/{id}",
            put(content::update_course).delete(content::delete_course),
        )
        .route(
            "/content/about/{slug}",
            put(content::put_about_page).delete(content::delete_about_page),
        )
        .layer(teacher.clone())
        .layer(auth.clone());

    let live_routes = Router::new()
        .route("/batches/{id}/tasks", get(live::batch_tasks))
        .route("/me/enrollments", get(live::my_enrollments))
        .merge(
            Router::new()
                .route("/teacher/batches", get(live::teacher_batches))
                .route("/teacher/batches/{id}/enrollments", get(live::batch_enrollments))
                .route("/teacher/tasks/{id}/submissions", get(live::task_submissions))
                .layer(teacher),
        )
        .layer(auth);

    let files = ServeDir::new(&state.config.blob_root);

    Router::new()
        .nest("/api/content", content_routes)
        .merge(account_routes)
        .nest("/api/student", student_routes)
        .nest("/api/teacher", teacher_routes)
        .nest("/api/admin", admin_routes)
        .nest("/api/live", live_routes)
        .route("/documents/{slug}", get(documents::get_document))
        .nest_service("/files", files)
        // Global Middleware (applied from outside in)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(&state.config.cors_origins)),
        )
        .with_state(state)
}
