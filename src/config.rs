// src/config.rs

use std::env;
use std::net::SocketAddr;

use chrono::{FixedOffset, Offset, Utc};
use dotenvy::dotenv;

/// A student may edit or withdraw a submission for this long after submitting.
pub const SUBMISSION_EDIT_GRACE_MINUTES: i64 = 15;

/// Submissions are still accepted this long after a task's due date.
pub const DUE_DATE_GRACE_HOURS: i64 = 3;

/// Largest file a student may upload.
pub const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Capacity of the store's change feed before slow subscribers start lagging.
pub const CHANGE_FEED_CAPACITY: usize = 1024;

#[derive(Debug, Clone)]
pub struct Config {
    /// Postgres connection string. When absent the in-memory store is used.
    pub database_url: Option<String>,
    pub jwt_secret: String,
    /// Lifetime of tokens minted by `sign_jwt`, in seconds.
    pub jwt_expiration: u64,
    pub rust_log: String,
    pub bind_addr: SocketAddr,
    /// Root directory of the local blob store.
    pub blob_root: String,
    /// Base URL used to build blob download URLs.
    pub public_base_url: String,
    /// The institute's local time zone, as a fixed offset from UTC.
    pub utc_offset_minutes: i32,
    /// Seeded as an active teacher at startup.
    pub admin_email: Option<String>,
    pub cors_origins: Vec<String>,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL").ok().filter(|v| !v.trim().is_empty());

        let jwt_secret = env::var("JWT_SECRET")
            .expect("JWT_SECRET must be set");

        let jwt_expiration = env::var("JWT_EXPIRATION")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(3600);

        let rust_log = env::var("RUST_LOG")
            .unwrap_or_else(|_| "info".to_string());

        let bind_addr = env::var("BIND_ADDR")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

        let blob_root = env::var("BLOB_ROOT").unwrap_or_else(|_| "./storage".to_string());

        let public_base_url = env::var("PUBLIC_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:3000".to_string());

        let utc_offset_minutes = env::var("INSTITUTE_UTC_OFFSET_MINUTES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(330);

        let admin_email = env::var("ADMIN_EMAIL").ok().filter(|v| !v.trim().is_empty());

        let cors_origins = env::var("CORS_ORIGINS")
            .map(|v| {
                v.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_else(|_| {
                vec![
                    "http://localhost:3000".to_string(),
                    "http://127.0.0.1:3000".to_string(),
                ]
            });

        Self {
            database_url,
            jwt_secret,
            jwt_expiration,
            rust_log,
            bind_addr,
            blob_root,
            public_base_url,
            utc_offset_minutes,
            admin_email,
            cors_origins,
        }
    }

    /// The institute's local offset. Out-of-range values fall back to UTC.
    pub fn local_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_minutes * 60)
            .unwrap_or_else(|| Utc.fix())
    }
}
