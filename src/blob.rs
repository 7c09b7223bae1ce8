// src/blob.rs

//! File storage behind submission and content URLs.
//!
//! Objects live at `{purpose}/{timestamp}_{sanitizedFilename}` and are addressed by
//! download URLs of the form `{public_base_url}/files/{path}`. Deletion works from the
//! URL alone by parsing the path back out.
//!
//! Student uploads use the purpose `submissions/{uid}`, so every stored submission file
//! can be traced back to the student who uploaded it.

use std::{
    path::{Component, Path, PathBuf},
    sync::LazyLock,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::Regex;
use thiserror::Error;
use url::Url;

/// Route prefix the local store is served under.
pub const FILES_PREFIX: &str = "/files/";

/// Top-level folder of everything students upload.
pub const SUBMISSIONS_FOLDER: &str = "submissions";

static UNSAFE_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9._-]+").expect("valid filename pattern"));

#[derive(Debug, Error)]
pub enum BlobError {
    #[error("not a stored file url: {0}")]
    InvalidUrl(String),
    #[error("invalid blob path: {0}")]
    InvalidPath(String),
    #[error("blob not found: {0}")]
    NotFound(String),
    #[error("blob io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Replaces anything outside `[A-Za-z0-9._-]` with `_`.
pub fn sanitize_filename(name: &str) -> String {
    let cleaned = UNSAFE_CHARS.replace_all(name.trim(), "_");
    let cleaned = cleaned.trim_matches('.');
    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned.to_string()
    }
}

/// Storage path for a new object. Each `/`-separated segment of `purpose` is
/// sanitized on its own.
pub fn blob_path(purpose: &str, filename: &str, now: DateTime<Utc>) -> String {
    let folder: Vec<String> = purpose
        .split('/')
        .filter(|segment| !segment.is_empty())
        .map(sanitize_filename)
        .collect();
    format!(
        "{}/{}_{}",
        folder.join("/"),
        now.timestamp_millis(),
        sanitize_filename(filename)
    )
}

/// Upload folder of one student.
pub fn student_folder(uid: &str) -> String {
    format!("{}/{}", SUBMISSIONS_FOLDER, sanitize_filename(uid))
}

/// True when `path` lies inside the student's upload folder.
pub fn is_student_path(path: &str, uid: &str) -> bool {
    path.strip_prefix(&student_folder(uid))
        .and_then(|rest| rest.strip_prefix('/'))
        .is_some_and(|name| !name.is_empty())
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Stores bytes at `path` and returns the download URL.
    async fn put(&self, path: &str, bytes: Vec<u8>) -> Result<String, BlobError>;

    async fn get(&self, path: &str) -> Result<Vec<u8>, BlobError>;

    async fn delete(&self, path: &str) -> Result<(), BlobError>;

    fn url_for(&self, path: &str) -> String;

    /// Inverse of `url_for`.
    fn path_from_url(&self, url: &str) -> Result<String, BlobError>;
}

/// Blob store on the local filesystem, served by the router under `/files`.
pub struct LocalBlobStore {
    root: PathBuf,
    base_url: String,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>, base_url: &str) -> Self {
        Self {
            root: root.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves a relative blob path, refusing anything that escapes the root.
    fn resolve(&self, path: &str) -> Result<PathBuf, BlobError> {
        let relative = Path::new(path);
        let safe = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if path.is_empty() || !safe {
            return Err(BlobError::InvalidPath(path.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put(&self, path: &str, bytes: Vec<u8>) -> Result<String, BlobError> {
        let target = self.resolve(path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&target, bytes).await?;
        tracing::debug!("Stored blob {}", path);
        Ok(self.url_for(path))
    }

    async fn get(&self, path: &str) -> Result<Vec<u8>, BlobError> {
        let target = self.resolve(path)?;
        match tokio::fs::read(&target).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(BlobError::NotFound(path.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, path: &str) -> Result<(), BlobError> {
        let target = self.resolve(path)?;
        match tokio::fs::remove_file(&target).await {
            Ok(()) => {
                tracing::info!("Deleted blob {}", path);
                Ok(())
            }
            // Already gone counts as deleted.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn url_for(&self, path: &str) -> String {
        format!("{}{}{}", self.base_url, FILES_PREFIX, path)
    }

    fn path_from_url(&self, url: &str) -> Result<String, BlobError> {
        let parsed = Url::parse(url).map_err(|_| BlobError::InvalidUrl(url.to_string()))?;
        let path = parsed
            .path()
            .strip_prefix(FILES_PREFIX)
            .filter(|p| !p.is_empty())
            .ok_or_else(|| BlobError::InvalidUrl(url.to_string()))?;
        Ok(path.to_string())
    }
}
