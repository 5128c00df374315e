//! Filesystem synchronization engine.
//!
//! Raw `notify` events flow through four stages:
//!
//! 1. [`subscription`] translates them into [`FolderEvent`]s on the
//!    notification thread and forwards them over a channel;
//! 2. a dispatcher task owned by [`service::SyncEngine`] receives them;
//! 3. [`handler::FolderSyncHandler`] applies deletes immediately and hands
//!    upserts to the [`debounce::Debouncer`];
//! 4. once a path has been quiet for the debounce interval, the upsert
//!    re-classifies it and drives the store, documents, and statistics.

pub mod debounce;
pub mod handler;
pub mod service;
pub mod subscription;

use std::path::PathBuf;

/// A directory-level change, already stripped of platform detail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FolderEvent {
    Created(PathBuf),
    Renamed { from: PathBuf, to: PathBuf },
    Deleted(PathBuf),
}
