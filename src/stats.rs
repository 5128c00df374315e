//! Summary statistics over the application store.
//!
//! [`Analytics::refresh`] recomputes the counts and writes two files into the
//! active root: `analytics.json` for dashboards and `applications_export.csv`
//! for spreadsheets.

use crate::config::ConfigService;
use crate::domain::{TIMESTAMP_FORMAT, write_atomic};
use crate::error::TrackResult;
use crate::store::SqliteStore;
use async_trait::async_trait;
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

pub const ANALYTICS_FILE: &str = "analytics.json";
pub const EXPORT_FILE: &str = "applications_export.csv";

/// Applications still `Applied` after this many days count as ghosted.
pub const GHOSTED_AFTER_DAYS: u32 = 30;

#[async_trait]
pub trait StatsAggregator: Send + Sync {
    async fn refresh(&self) -> TrackResult<()>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Metrics {
    pub total_applications: i64,
    pub interviewing: i64,
    pub ghosted: i64,
    pub offers: i64,
    pub last_updated: String,
}

pub struct Analytics {
    store: Arc<SqliteStore>,
    config: Arc<ConfigService>,
}

impl Analytics {
    pub fn new(store: Arc<SqliteStore>, config: Arc<ConfigService>) -> Self {
        Analytics { store, config }
    }

    pub async fn calculate(&self) -> TrackResult<Metrics> {
        info!("calculating analytics metrics");
        let pool = self.store.pool().await?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM applications")
            .fetch_one(&pool)
            .await?;
        let interviewing: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM applications WHERE status = 'Interviewing'")
                .fetch_one(&pool)
                .await?;
        let ghosted: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM applications
             WHERE status = 'Applied'
             AND datetime(created_at) < datetime('now', ?)",
        )
        .bind(format!("-{GHOSTED_AFTER_DAYS} days"))
        .fetch_one(&pool)
        .await?;
        let offers: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM applications WHERE status = 'Offer'")
                .fetch_one(&pool)
                .await?;

        Ok(Metrics {
            total_applications: total,
            interviewing,
            ghosted,
            offers,
            last_updated: Local::now().format(TIMESTAMP_FORMAT).to_string(),
        })
    }

    async fn export_csv(&self, root: &Path) -> TrackResult<()> {
        let path = root.join(EXPORT_FILE);
        info!(path = %path.display(), "exporting applications to CSV");

        let applications = self.store.list_applications().await?;
        let mut out = String::from("Company,Role,Status,Date Applied,Path\n");
        for app in &applications {
            let date = app
                .created_at
                .map(|d| d.format(TIMESTAMP_FORMAT).to_string())
                .unwrap_or_default();
            let folder = app.folder_path.display().to_string();
            out.push_str(&format!(
                "{},{},{},{},{}\n",
                escape_csv(&app.company),
                escape_csv(&app.role),
                escape_csv(&app.status),
                escape_csv(&date),
                escape_csv(&folder),
            ));
        }

        write_atomic(&path, out.as_bytes())?;
        Ok(())
    }
}

#[async_trait]
impl StatsAggregator for Analytics {
    async fn refresh(&self) -> TrackResult<()> {
        let metrics = self.calculate().await?;

        let Some(root) = self.config.active_root() else {
            return Ok(());
        };

        let path = root.join(ANALYTICS_FILE);
        let json = serde_json::to_vec_pretty(&metrics)?;
        write_atomic(&path, &json)?;
        info!(path = %path.display(), "analytics saved");

        self.export_csv(&root).await
    }
}

/// Quotes a CSV field when it contains a delimiter, quote, or line break.
pub fn escape_csv(value: &str) -> Cow<'_, str> {
    if value.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", value.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(value)
    }
}
