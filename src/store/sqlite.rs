use super::{LocalFile, LocalStore, NewLocalFile};
use crate::{Error, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

/// SQLite-backed implementation of [`LocalStore`].
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Connect, creating the database file if needed, and run migrations.
    ///
    /// In-memory databases (`sqlite::memory:`) are private to each connection,
    /// so use a pool size of 1 for them.
    pub async fn connect(database_url: &str, pool_size: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(pool_size)
            .connect_with(options)
            .await?;
        Self::from_pool(pool).await
    }

    pub async fn from_pool(pool: SqlitePool) -> Result<Self> {
        run_migrations(&pool).await?;
        Ok(Self { pool })
    }
}

/// Create the `uploaded_files` table if it does not exist.
pub async fn run_migrations(pool: &SqlitePool) -> std::result::Result<(), sqlx::Error> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS uploaded_files (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            original_name TEXT NOT NULL,
            data BLOB NOT NULL,
            size INTEGER NOT NULL,
            mime_type TEXT NOT NULL,
            category TEXT NOT NULL,
            owner_id TEXT,
            remote_url TEXT,
            remote_public_id TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
    )
    .execute(pool)
    .await?;
    Ok(())
}

#[async_trait]
impl LocalStore for SqliteStore {
    async fn insert(&self, file: NewLocalFile) -> Result<i64> {
        let now = Utc::now();
        let size = i64::try_from(file.data.len())
            .map_err(|_| Error::Invariant("file size exceeds i64".to_string()))?;

        let result = sqlx::query(
            "INSERT INTO uploaded_files \
             (original_name, data, size, mime_type, category, owner_id, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&file.original_name)
        .bind(&file.data)
        .bind(size)
        .bind(&file.mime_type)
        .bind(&file.category)
        .bind(&file.owner_id)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    async fn fetch(&self, id: i64) -> Result<Option<LocalFile>> {
        let row = sqlx::query_as::<_, LocalFile>(
            "SELECT id, original_name, data, size, mime_type, category, owner_id, \
             remote_url, remote_public_id, created_at, updated_at \
             FROM uploaded_files WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn delete(&self, id: i64) -> Result<u64> {
        let result = sqlx::query("DELETE FROM uploaded_files WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn clear_data(&self, id: i64) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE uploaded_files SET data = X'', size = 0, updated_at = ? WHERE id = ?",
        )
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn record_migration(&self, id: i64, remote_url: &str, public_id: &str) -> Result<()> {
        let result = sqlx::query(
            "UPDATE uploaded_files SET remote_url = ?, remote_public_id = ?, updated_at = ? \
             WHERE id = ?",
        )
        .bind(remote_url)
        .bind(public_id)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("local file {}", id)));
        }
        Ok(())
    }
}
