//! # jobtrack_core
//!
//! Keeps a SQLite record of job applications in sync with a folder tree laid
//! out as `root/Company/Role`, generating templated documents and summary
//! statistics whenever the tree changes.
//!
//! ## Features
//!
//! - **Live folder sync**: a `notify` watch on the active root turns folder
//!   creations, renames, and deletions into store updates
//! - **Debounced processing**: bursts of events for the same folder collapse
//!   into a single upsert once the folder has been quiet for 500 ms
//! - **Document generation**: CV and cover-letter templates are copied into new
//!   role folders, never overwriting existing files
//! - **Statistics**: totals, interviews, offers, and ghosted applications are
//!   written to `analytics.json` and a CSV export
//! - **Hot reload**: changing the active root restarts the watch against the
//!   new tree
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use jobtrack_core::config::{ConfigService, Settings};
//! use jobtrack_core::documents::{DocumentGenerator, TemplateDocuments};
//! use jobtrack_core::stats::{Analytics, StatsAggregator};
//! use jobtrack_core::store::{RecordStore, SqliteStore};
//! use jobtrack_core::watcher::service::SyncEngine;
//! use std::sync::Arc;
//!
//! # async fn demo() -> jobtrack_core::TrackResult<()> {
//! let config = Arc::new(ConfigService::in_memory(Settings::with_root("/jobs")));
//! let store = Arc::new(SqliteStore::new(config.clone()));
//! store.initialize().await?;
//!
//! let stats: Arc<dyn StatsAggregator> = Arc::new(Analytics::new(store.clone(), config.clone()));
//! let documents: Arc<dyn DocumentGenerator> = Arc::new(TemplateDocuments::new(config.clone()));
//! let records: Arc<dyn RecordStore> = store.clone();
//!
//! let engine = SyncEngine::create(config, records, documents, stats)?;
//! engine.start();
//! // mkdir /jobs/Acme/Engineer and a row appears half a second later.
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - **[`config`]**: settings discovery, hot reload, and change notifications
//! - **[`domain`]**: application folders and the `Company/Role` classifier
//! - **[`store`]**: the record store trait and its SQLite implementation
//! - **[`documents`]**: template copying and placeholder substitution
//! - **[`stats`]**: metrics, JSON summary, and CSV export
//! - **[`watcher`]**: event translation, debouncing, routing, and the engine
//! - **[`host`]**: startup, periodic refresh, and config-change handling
//!
//! ## Error Handling
//!
//! Fallible operations return [`TrackResult<T>`], wrapping [`TrackError`].
//! Inside the engine, errors are logged per event and never stop the watch.

pub mod config;
pub mod documents;
pub mod domain;
pub mod error;
pub mod host;
pub mod logging;
pub mod stats;
pub mod store;
pub mod watcher;

/// Re-exports the most commonly used types for convenience.
pub use error::{TrackError, TrackResult};
