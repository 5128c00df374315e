//! The application record store.
//!
//! The sync engine only needs two operations, captured by [`RecordStore`]:
//! upsert an application for a folder, and delete whatever record points at a
//! path. [`sqlite::SqliteStore`] is the production implementation.

pub mod sqlite;

use crate::domain::ApplicationFolder;
use crate::error::TrackResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::Path;

pub use sqlite::SqliteStore;

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Inserts or updates the application identified by the folder's
    /// (company, role) pair or its path. Never touches `status` on update.
    async fn upsert_application(
        &self,
        folder: &ApplicationFolder,
        created_at: DateTime<Utc>,
    ) -> TrackResult<()>;

    /// Removes the record for `path`. Returns `false` when there was none.
    async fn delete_application_by_path(&self, path: &Path) -> TrackResult<bool>;
}

/// String form of a path as stored in `folder_path`.
pub fn path_key(path: &Path) -> String {
    path.display().to_string()
}
