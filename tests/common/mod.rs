#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jobtrack_core::TrackError;
use jobtrack_core::config::{ConfigService, Settings};
use jobtrack_core::documents::DocumentGenerator;
use jobtrack_core::domain::{ApplicationFolder, DEFAULT_STATUS};
use jobtrack_core::error::TrackResult;
use jobtrack_core::stats::StatsAggregator;
use jobtrack_core::store::RecordStore;
use jobtrack_core::watcher::service::SyncEngine;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

/// Short quiet interval so tests do not wait the full 500 ms.
pub const TEST_QUIET: Duration = Duration::from_millis(100);

/// Shared, ordered record of collaborator calls.
pub type CallLog = Arc<Mutex<Vec<String>>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub company: String,
    pub role: String,
    pub path: PathBuf,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

/// In-memory store with the same identity rules as the SQLite one.
#[derive(Default)]
pub struct MemoryStore {
    pub rows: Mutex<Vec<Row>>,
    pub upserts: AtomicUsize,
    pub deletes: Mutex<Vec<PathBuf>>,
    pub calls: Option<CallLog>,
    pub fail: AtomicBool,
}

impl MemoryStore {
    pub fn logged(calls: CallLog) -> Self {
        MemoryStore {
            calls: Some(calls),
            ..Default::default()
        }
    }

    pub fn rows(&self) -> Vec<Row> {
        self.rows.lock().unwrap().clone()
    }

    pub fn row_for(&self, path: &Path) -> Option<Row> {
        self.rows().into_iter().find(|r| r.path == path)
    }

    pub fn upsert_count(&self) -> usize {
        self.upserts.load(Ordering::SeqCst)
    }

    pub fn deletes_for(&self, path: &Path) -> usize {
        self.deletes.lock().unwrap().iter().filter(|p| *p == path).count()
    }

    fn record(&self, call: String) {
        if let Some(calls) = &self.calls {
            calls.lock().unwrap().push(call);
        }
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn upsert_application(
        &self,
        folder: &ApplicationFolder,
        created_at: DateTime<Utc>,
    ) -> TrackResult<()> {
        self.upserts.fetch_add(1, Ordering::SeqCst);
        self.record(format!("upsert {}/{}", folder.company, folder.role));
        if self.fail.load(Ordering::SeqCst) {
            return Err(TrackError::Other("store offline".into()));
        }

        let mut rows = self.rows.lock().unwrap();
        let existing = rows
            .iter()
            .position(|r| r.path == folder.path)
            .or_else(|| {
                rows.iter()
                    .position(|r| r.company == folder.company && r.role == folder.role)
            });

        match existing {
            Some(i) => {
                let row = &mut rows[i];
                row.company = folder.company.clone();
                row.role = folder.role.clone();
                row.path = folder.path.clone();
                row.created_at = created_at;
            }
            None => rows.push(Row {
                company: folder.company.clone(),
                role: folder.role.clone(),
                path: folder.path.clone(),
                status: DEFAULT_STATUS.to_string(),
                created_at,
            }),
        }
        Ok(())
    }

    async fn delete_application_by_path(&self, path: &Path) -> TrackResult<bool> {
        self.deletes.lock().unwrap().push(path.to_path_buf());
        self.record(format!("delete {}", path.display()));

        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|r| r.path != path);
        Ok(rows.len() < before)
    }
}

#[derive(Default)]
pub struct RecordingDocuments {
    pub generated: Mutex<Vec<(String, String, PathBuf)>>,
    pub calls: Option<CallLog>,
    pub fail: AtomicBool,
}

impl RecordingDocuments {
    pub fn logged(calls: CallLog) -> Self {
        RecordingDocuments {
            calls: Some(calls),
            ..Default::default()
        }
    }

    pub fn generated(&self) -> Vec<(String, String, PathBuf)> {
        self.generated.lock().unwrap().clone()
    }
}

#[async_trait]
impl DocumentGenerator for RecordingDocuments {
    async fn generate_documents(
        &self,
        company: &str,
        role: &str,
        target: &Path,
    ) -> TrackResult<()> {
        if let Some(calls) = &self.calls {
            calls.lock().unwrap().push(format!("documents {company}/{role}"));
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(TrackError::Other("template locked".into()));
        }
        self.generated
            .lock()
            .unwrap()
            .push((company.to_string(), role.to_string(), target.to_path_buf()));
        Ok(())
    }
}

#[derive(Default)]
pub struct CountingStats {
    pub refreshes: AtomicUsize,
    pub calls: Option<CallLog>,
}

impl CountingStats {
    pub fn logged(calls: CallLog) -> Self {
        CountingStats {
            calls: Some(calls),
            ..Default::default()
        }
    }

    pub fn count(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StatsAggregator for CountingStats {
    async fn refresh(&self) -> TrackResult<()> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        if let Some(calls) = &self.calls {
            calls.lock().unwrap().push("stats".to_string());
        }
        Ok(())
    }
}

/// An engine wired to in-memory doubles.
pub struct Harness {
    pub config: Arc<ConfigService>,
    pub store: Arc<MemoryStore>,
    pub documents: Arc<RecordingDocuments>,
    pub stats: Arc<CountingStats>,
    pub engine: Arc<SyncEngine>,
    pub calls: CallLog,
}

impl Harness {
    pub fn new(root: Option<&Path>) -> Harness {
        Self::with_quiet(root, TEST_QUIET)
    }

    pub fn with_quiet(root: Option<&Path>, quiet: Duration) -> Harness {
        let settings = match root {
            Some(root) => Settings::with_root(root),
            None => Settings::default(),
        };
        let config = Arc::new(ConfigService::in_memory(settings));
        let calls: CallLog = Arc::new(Mutex::new(Vec::new()));
        let store = Arc::new(MemoryStore::logged(calls.clone()));
        let documents = Arc::new(RecordingDocuments::logged(calls.clone()));
        let stats = Arc::new(CountingStats::logged(calls.clone()));

        let engine = SyncEngine::with_quiet_interval(
            config.clone(),
            store.clone(),
            documents.clone(),
            stats.clone(),
            quiet,
        )
        .expect("tests run inside a tokio runtime");

        Harness {
            config,
            store,
            documents,
            stats,
            engine: Arc::new(engine),
            calls,
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

/// Canonical temp root, so paths match what the watcher reports.
pub fn canonical_root(dir: &tempfile::TempDir) -> PathBuf {
    dunce::canonicalize(dir.path()).unwrap()
}

/// Polls `check` until it holds or `timeout` elapses.
pub async fn eventually<F, Fut>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = Instant::now() + timeout;
    loop {
        if check().await {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
}

/// Gives the OS watch time to register newly created directories.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(250)).await;
}
