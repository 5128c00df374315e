use crate::config::ConfigService;
use crate::domain::{Application, ApplicationFolder, DEFAULT_STATUS, format_timestamp, parse_timestamp};
use crate::error::{TrackError, TrackResult};
use crate::store::{RecordStore, path_key};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous,
};
use sqlx::{Row, SqlitePool};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info};

pub const DATABASE_FILE: &str = "applications.db";

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite-backed store living at `<active root>/applications.db`.
///
/// The pool is opened by [`SqliteStore::initialize`] and reopened whenever the
/// host re-initializes after a root change. A single connection is used so
/// SQLite sees writes one at a time.
pub struct SqliteStore {
    config: Arc<ConfigService>,
    pool: RwLock<Option<SqlitePool>>,
}

impl SqliteStore {
    pub fn new(config: Arc<ConfigService>) -> Self {
        SqliteStore {
            config,
            pool: RwLock::new(None),
        }
    }

    /// Opens the database for the current root, creating the schema if needed.
    ///
    /// Any previously opened pool is closed. Returns
    /// [`TrackError::StoreUnavailable`] when no root is configured.
    pub async fn initialize(&self) -> TrackResult<PathBuf> {
        let root = self.config.active_root().ok_or(TrackError::StoreUnavailable)?;
        let db_path = root.join(DATABASE_FILE);
        let pool = Self::open(&db_path).await?;

        let previous = self.pool.write().await.replace(pool);
        if let Some(previous) = previous {
            previous.close().await;
        }

        info!(path = %db_path.display(), "database initialized with WAL mode");
        Ok(db_path)
    }

    async fn open(db_path: &Path) -> TrackResult<SqlitePool> {
        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(BUSY_TIMEOUT);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS applications (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                company_name TEXT NOT NULL,
                role_name TEXT NOT NULL,
                folder_path TEXT NOT NULL,
                status TEXT DEFAULT 'Applied',
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )",
        )
        .execute(&pool)
        .await?;

        for index in [
            "CREATE INDEX IF NOT EXISTS idx_apps_company ON applications(company_name)",
            "CREATE INDEX IF NOT EXISTS idx_apps_role ON applications(role_name)",
            "CREATE INDEX IF NOT EXISTS idx_apps_created ON applications(created_at)",
        ] {
            sqlx::query(index).execute(&pool).await?;
        }

        Ok(pool)
    }

    /// Current pool handle. Cheap to clone.
    pub async fn pool(&self) -> TrackResult<SqlitePool> {
        self.pool
            .read()
            .await
            .clone()
            .ok_or(TrackError::StoreUnavailable)
    }

    pub async fn close(&self) {
        if let Some(pool) = self.pool.write().await.take() {
            pool.close().await;
        }
    }

    pub async fn get_by_path(&self, path: &Path) -> TrackResult<Option<Application>> {
        let pool = self.pool().await?;
        let row = sqlx::query(
            "SELECT id, company_name, role_name, folder_path, status, created_at
             FROM applications WHERE folder_path = ?",
        )
        .bind(path_key(path))
        .fetch_optional(&pool)
        .await?;

        Ok(row.as_ref().map(to_application))
    }

    /// All applications, newest first.
    pub async fn list_applications(&self) -> TrackResult<Vec<Application>> {
        let pool = self.pool().await?;
        let rows = sqlx::query(
            "SELECT id, company_name, role_name, folder_path, status, created_at
             FROM applications ORDER BY created_at DESC",
        )
        .fetch_all(&pool)
        .await?;

        Ok(rows.iter().map(to_application).collect())
    }

    /// Sets the workflow status of an application. The sync engine never calls
    /// this; it exists for editors of the store.
    pub async fn update_status(&self, id: i64, status: &str) -> TrackResult<bool> {
        let pool = self.pool().await?;
        let res = sqlx::query("UPDATE applications SET status = ? WHERE id = ?")
            .bind(status)
            .bind(id)
            .execute(&pool)
            .await?;

        Ok(res.rows_affected() > 0)
    }
}

#[async_trait]
impl RecordStore for SqliteStore {
    async fn upsert_application(
        &self,
        folder: &ApplicationFolder,
        created_at: DateTime<Utc>,
    ) -> TrackResult<()> {
        let pool = self.pool().await?;
        let path = path_key(&folder.path);
        let created_at = format_timestamp(&created_at);

        let mut tx = pool.begin().await?;

        // A path match wins over a (company, role) match.
        let existing: Option<i64> = sqlx::query_scalar(
            "SELECT id FROM applications
             WHERE folder_path = ? OR (company_name = ? AND role_name = ?)
             ORDER BY (folder_path = ?) DESC, id ASC
             LIMIT 1",
        )
        .bind(&path)
        .bind(&folder.company)
        .bind(&folder.role)
        .bind(&path)
        .fetch_optional(&mut *tx)
        .await?;

        match existing {
            None => {
                sqlx::query(
                    "INSERT INTO applications (company_name, role_name, folder_path, created_at, status)
                     VALUES (?, ?, ?, ?, ?)",
                )
                .bind(&folder.company)
                .bind(&folder.role)
                .bind(&path)
                .bind(&created_at)
                .bind(DEFAULT_STATUS)
                .execute(&mut *tx)
                .await?;
            }
            Some(id) => {
                sqlx::query(
                    "UPDATE applications SET
                        company_name = ?,
                        role_name = ?,
                        folder_path = ?,
                        created_at = ?
                     WHERE id = ?",
                )
                .bind(&folder.company)
                .bind(&folder.role)
                .bind(&path)
                .bind(&created_at)
                .bind(id)
                .execute(&mut *tx)
                .await?;

                // At most one row per folder path.
                sqlx::query("DELETE FROM applications WHERE folder_path = ? AND id != ?")
                    .bind(&path)
                    .bind(id)
                    .execute(&mut *tx)
                    .await?;
            }
        }

        tx.commit().await?;
        info!(company = %folder.company, role = %folder.role, "synced application");
        Ok(())
    }

    async fn delete_application_by_path(&self, path: &Path) -> TrackResult<bool> {
        let pool = self.pool().await?;
        let res = sqlx::query("DELETE FROM applications WHERE folder_path = ?")
            .bind(path_key(path))
            .execute(&pool)
            .await?;

        let removed = res.rows_affected() > 0;
        if removed {
            info!(path = %path.display(), "deleted application record");
        } else {
            debug!(path = %path.display(), "no application record to delete");
        }
        Ok(removed)
    }
}

fn to_application(row: &SqliteRow) -> Application {
    let folder_path: String = row.get("folder_path");
    let status: Option<String> = row.get("status");
    let created_at: Option<String> = row.get("created_at");

    Application {
        id: row.get("id"),
        company: row.get("company_name"),
        role: row.get("role_name"),
        folder_path: PathBuf::from(folder_path),
        status: status.unwrap_or_else(|| DEFAULT_STATUS.to_string()),
        created_at: created_at.as_deref().and_then(parse_timestamp),
    }
}
