use chrono::{Duration as ChronoDuration, Utc};
use jobtrack_core::config::{ConfigService, Settings};
use jobtrack_core::domain::ApplicationFolder;
use jobtrack_core::stats::{ANALYTICS_FILE, Analytics, EXPORT_FILE, Metrics, StatsAggregator};
use jobtrack_core::store::{RecordStore, SqliteStore};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

mod common;
use common::canonical_root;

struct Fixture {
    config: Arc<ConfigService>,
    store: Arc<SqliteStore>,
    analytics: Analytics,
}

async fn fixture(root: &Path) -> Fixture {
    let config = Arc::new(ConfigService::in_memory(Settings::with_root(root)));
    let store = Arc::new(SqliteStore::new(config.clone()));
    store.initialize().await.unwrap();
    let analytics = Analytics::new(store.clone(), config.clone());
    Fixture {
        config,
        store,
        analytics,
    }
}

async fn add(store: &SqliteStore, root: &Path, company: &str, role: &str, age_days: i64) -> i64 {
    let folder = ApplicationFolder {
        company: company.to_string(),
        role: role.to_string(),
        path: root.join(company).join(role),
    };
    store
        .upsert_application(&folder, Utc::now() - ChronoDuration::days(age_days))
        .await
        .unwrap();
    store.get_by_path(&folder.path).await.unwrap().unwrap().id
}

#[tokio::test]
async fn empty_store_has_zero_metrics() {
    let tmpdir = TempDir::new().unwrap();
    let root = canonical_root(&tmpdir);
    let f = fixture(&root).await;

    let metrics = f.analytics.calculate().await.unwrap();
    assert_eq!(metrics.total_applications, 0);
    assert_eq!(metrics.interviewing, 0);
    assert_eq!(metrics.ghosted, 0);
    assert_eq!(metrics.offers, 0);
}

#[tokio::test]
async fn metrics_count_statuses_and_ghosted_applications() {
    let tmpdir = TempDir::new().unwrap();
    let root = canonical_root(&tmpdir);
    let f = fixture(&root).await;

    add(&f.store, &root, "Fresh", "Engineer", 1).await;
    add(&f.store, &root, "Silent", "Engineer", 45).await;
    let interviewing = add(&f.store, &root, "Busy", "Engineer", 60).await;
    let offer = add(&f.store, &root, "Happy", "Engineer", 2).await;
    f.store.update_status(interviewing, "Interviewing").await.unwrap();
    f.store.update_status(offer, "Offer").await.unwrap();

    let metrics = f.analytics.calculate().await.unwrap();
    assert_eq!(metrics.total_applications, 4);
    assert_eq!(metrics.interviewing, 1);
    assert_eq!(metrics.offers, 1);
    assert_eq!(metrics.ghosted, 1, "only old applications still marked Applied");
}

#[tokio::test]
async fn refresh_writes_summary_and_export() {
    let tmpdir = TempDir::new().unwrap();
    let root = canonical_root(&tmpdir);
    let f = fixture(&root).await;
    add(&f.store, &root, "Acme, Inc.", "Engineer", 1).await;
    add(&f.store, &root, "Globex", "Analyst", 3).await;

    f.analytics.refresh().await.unwrap();

    let raw = fs::read_to_string(root.join(ANALYTICS_FILE)).unwrap();
    let metrics: Metrics = serde_json::from_str(&raw).unwrap();
    assert_eq!(metrics.total_applications, 2);
    assert!(raw.contains("\"TotalApplications\""));
    assert!(!metrics.last_updated.is_empty());

    let csv = fs::read_to_string(root.join(EXPORT_FILE)).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines[0], "Company,Role,Status,Date Applied,Path");
    assert_eq!(lines.len(), 3);
    assert!(lines[1].starts_with("\"Acme, Inc.\",Engineer,Applied,"), "newest first: {}", lines[1]);
    assert!(lines[2].starts_with("Globex,Analyst,Applied,"));
}

#[tokio::test]
async fn refresh_overwrites_previous_output() {
    let tmpdir = TempDir::new().unwrap();
    let root = canonical_root(&tmpdir);
    let f = fixture(&root).await;

    add(&f.store, &root, "Acme", "Engineer", 1).await;
    f.analytics.refresh().await.unwrap();
    add(&f.store, &root, "Globex", "Analyst", 1).await;
    f.analytics.refresh().await.unwrap();

    let metrics: Metrics =
        serde_json::from_str(&fs::read_to_string(root.join(ANALYTICS_FILE)).unwrap()).unwrap();
    assert_eq!(metrics.total_applications, 2);
}

#[tokio::test]
async fn refresh_without_root_writes_nothing() {
    let tmpdir = TempDir::new().unwrap();
    let root = canonical_root(&tmpdir);
    let f = fixture(&root).await;

    f.config.replace(Settings::default());
    f.analytics.refresh().await.unwrap();

    assert!(!root.join(ANALYTICS_FILE).exists());
    assert!(!root.join(EXPORT_FILE).exists());
}
