// tests/content_tests.rs

use chrono::Utc;
use portal::{
    blob::{BlobStore, LocalBlobStore},
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

const SECRET: &str = "content_test_secret";

struct TestApp {
    address: String,
    store: Store,
    blobs: Arc<LocalBlobStore>,
    client: reqwest::Client,
}

impl TestApp {
    fn token(&self, uid: &str, email: &str) -> String {
        let session = Session {
            uid: uid.to_string(),
            email: email.to_string(),
            display_name: None,
            photo_url: None,
        };
        sign_jwt(&session, SECRET, 600).expect("token")
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    async fn admin_token(&self) -> String {
        roles::add_teacher(&self.store, "office@example.org", None, Utc::now())
            .await
            .unwrap();
        self.token("admin", "office@example.org")
    }
}

async fn spawn_app() -> TestApp {
    let blob_root = std::env::temp_dir().join(format!("portal-ct-{}", uuid::Uuid::new_v4()));

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
        cors_origins: vec!["http://localhost:5173".to_string()],
    };

    let store = Store::in_memory();
    let blobs = Arc::new(LocalBlobStore::new(&blob_root, &config.public_base_url));
    let state = AppState {
        store: store.clone(),
        blobs: blobs.clone(),
        config,
    };

    let app = routes::create_router(state);
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
        blobs,
        client: reqwest::Client::new(),
    }
}

#[tokio::test]
async fn quote_showcase_layout_follows_the_count() {
    let app = spawn_app().await;

    let showcase: Value = app
        .client
        .get(app.url("/api/content/quotes/showcase"))
        .send()
        .await
        .expect("Failed to execute request")
        .json()
        .await
        .unwrap();
    assert_eq!(showcase["layout"]["kind"], "empty");

    let token = app.admin_token().await;
    for i in 0..3 {
        let response = app
            .client
            .post(app.url("/api/admin/content/quotes"))
            .bearer_auth(&token)
            .json(&json!({ "text": format!("Quote {}", i), "author": "Srila Prabhupada" }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 201);
    }

    let showcase: Value = app
        .client
        .get(app.url("/api/content/quotes/showcase"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(showcase["layout"]["kind"], "carousel");
    assert_eq!(showcase["layout"]["autoplay"], true);
    assert_eq!(showcase["quotes"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn content_writes_require_a_teacher() {
    let app = spawn_app().await;
    let token = app.token("visitor", "visitor@example.org");

    let response = app
        .client
        .post(app.url("/api/admin/content/quotes"))
        .bearer_auth(&token)
        .json(&json!({ "text": "Hello", "author": "Someone" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 403);

    let response = app
        .client
        .post(app.url("/api/admin/content/quotes"))
        .json(&json!({ "text": "Hello", "author": "Someone" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn about_page_body_is_sanitized() {
    let app = spawn_app().await;
    let token = app.admin_token().await;

    let response = app
        .client
        .put(app.url("/api/admin/content/about/our-mission"))
        .bearer_auth(&token)
        .json(&json!({
            "title": "Our Mission",
            "body": "<p>Study <b>daily</b></p><script>alert(1)</script>"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    let page: Value = app
        .client
        .get(app.url("/api/content/about/our-mission"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let body = page["body"].as_str().unwrap();
    assert!(body.contains("<b>daily</b>"));
    assert!(!body.contains("script"));

    let response = app
        .client
        .put(app.url("/api/admin/content/about/Bad%20Slug"))
        .bearer_auth(&token)
        .json(&json!({ "title": "x", "body": "y" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn documents_are_served_as_pdf() {
    let app = spawn_app().await;

    let response = app
        .client
        .get(app.url("/documents/not-a-document"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);

    // Known slug, but nothing uploaded yet.
    let response = app
        .client
        .get(app.url("/documents/prospectus"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 500);

    app.blobs
        .put("documents/prospectus.pdf", b"%PDF-1.4 test".to_vec())
        .await
        .unwrap();

    let response = app
        .client
        .get(app.url("/documents/prospectus"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(response.headers()["content-type"], "application/pdf");
    assert_eq!(response.headers()["cache-control"], "public, max-age=3600");
    assert_eq!(response.bytes().await.unwrap().as_ref(), b"%PDF-1.4 test");
}

#[tokio::test]
async fn teacher_access_can_be_granted_and_revoked() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;

    let response = app
        .client
        .post(app.url("/api/admin/teachers"))
        .bearer_auth(&admin)
        .json(&json!({ "email": "New.Teacher@Example.org" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 201);
    let record: Value = response.json().await.unwrap();
    assert_eq!(record["email"], "new.teacher@example.org");
    assert_eq!(record["addedBy"], "office@example.org");

    let newcomer = app.token("t2", "new.teacher@example.org");
    let session: Value = app
        .client
        .post(app.url("/api/auth/session"))
        .bearer_auth(&newcomer)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(session["role"], "teacher");

    // Nobody can revoke their own access.
    let response = app
        .client
        .delete(app.url("/api/admin/teachers/office@example.org"))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);

    let response = app
        .client
        .delete(app.url("/api/admin/teachers/new.teacher@example.org"))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 204);

    let active: Value = app
        .client
        .get(app.url("/api/admin/teachers?activeOnly=true"))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(active.as_array().unwrap().len(), 1);

    let response = app
        .client
        .get(app.url("/api/teacher/batches"))
        .bearer_auth(&newcomer)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 403);
}
