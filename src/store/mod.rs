//! Local byte store
//!
//! Keeps uploaded image bytes in a relational `uploaded_files` table when
//! the CDN is unavailable, and serves them back for migration.

pub mod mock;
pub mod sqlite;

pub use mock::MockLocalStore;
pub use sqlite::SqliteStore;

use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone)]
pub struct NewLocalFile {
    pub original_name: String,
    pub data: Vec<u8>,
    pub mime_type: String,
    pub category: String,
    pub owner_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct LocalFile {
    pub id: i64,
    pub original_name: String,
    pub data: Vec<u8>,
    pub size: i64,
    pub mime_type: String,
    pub category: String,
    pub owner_id: Option<String>,
    /// Set once the bytes have been copied to the CDN.
    pub remote_url: Option<String>,
    pub remote_public_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LocalFile {
    pub fn is_migrated(&self) -> bool {
        self.remote_public_id.is_some()
    }
}

#[async_trait]
pub trait LocalStore: Send + Sync {
    /// Store a new file and return its row id.
    async fn insert(&self, file: NewLocalFile) -> Result<i64>;
    async fn fetch(&self, id: i64) -> Result<Option<LocalFile>>;
    /// Returns the number of rows removed.
    async fn delete(&self, id: i64) -> Result<u64>;
    /// Drop the stored bytes but keep the row and its migration pointer.
    /// Returns the number of rows updated.
    async fn clear_data(&self, id: i64) -> Result<u64>;
    /// Point a local record at its CDN copy. The stored bytes are kept.
    async fn record_migration(&self, id: i64, remote_url: &str, public_id: &str) -> Result<()>;
}

/// Application-relative delivery URL for a local file.
pub fn local_url(prefix: &str, id: i64) -> String {
    format!("{}/{}", prefix.trim_end_matches('/'), id)
}

/// Parse the row id out of a local delivery URL.
///
/// Only relative paths of the form `{prefix}/{id}` are accepted. Absolute
/// URLs and paths outside the prefix belong to someone else.
pub fn local_id_from_url(prefix: &str, url: &str) -> Option<i64> {
    if url.contains("://") || url.starts_with("//") {
        return None;
    }
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let segment = path
        .strip_prefix(prefix.trim_end_matches('/'))?
        .strip_prefix('/')?
        .trim_end_matches('/');
    if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    segment.parse().ok()
}
