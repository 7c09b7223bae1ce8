// src/main.rs

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dotenvy::dotenv;
use portal::blob::LocalBlobStore;
use portal::config::Config;
use portal::routes;
use portal::services::roles;
use portal::state::AppState;
use portal::store::{Store, postgres::PgBackend};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file (if present)
    dotenv().ok();

    // Load configuration from environment
    let config = Config::from_env();

    let file_appender = tracing_appender::rolling::daily("logs", "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = EnvFilter::new(&config.rust_log);
    let stdout_layer = fmt::layer().with_writer(std::io::stdout).with_target(false);
    let file_layer = fmt::layer().with_writer(non_blocking).with_ansi(false);

    // Initialize Tracing (Logging)
    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    let store = match &config.database_url {
        Some(url) => {
            let pool = connect_with_retry(url).await?;
            tracing::info!("Database connected...");

            // Run Migrations Automatically
            tracing::info!("Running migrations...");
            sqlx::migrate!("./migrations").run(&pool).await?;
            tracing::info!("Migrations applied successfully.");

            Store::new(Arc::new(PgBackend::new(pool)))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using the in-memory store. Data will not persist.");
            Store::in_memory()
        }
    };

    // Seed the first teacher
    if let Some(email) = &config.admin_email {
        match roles::add_teacher(&store, email, None, Utc::now()).await {
            Ok(record) => tracing::info!("Seeded teacher {}", record.email),
            Err(e) => tracing::error!("Failed to seed teacher {}: {}", email, e),
        }
    }

    tokio::fs::create_dir_all(&config.blob_root).await?;
    let blobs = Arc::new(LocalBlobStore::new(&config.blob_root, &config.public_base_url));

    let state = AppState {
        store,
        blobs,
        config: config.clone(),
    };

    // Create the Axum application router
    let app = routes::create_router(state);

    tracing::info!("Listening on {}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;

    // Start the server
    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize Database Pool with Retry
async fn connect_with_retry(url: &str) -> Result<PgPool, sqlx::Error> {
    let mut retry_count = 0;
    loop {
        match PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect(url)
            .await
        {
            Ok(pool) => return Ok(pool),
            Err(e) => {
                retry_count += 1;
                if retry_count > 5 {
                    tracing::error!("Failed to connect to database after 5 retries: {}", e);
                    return Err(e);
                }
                tracing::warn!("Database not ready, retrying in 2s... (Attempt {})", retry_count);
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
        }
    }
}
