use crate::config::ConfigService;
use crate::documents::DocumentGenerator;
use crate::domain::{ApplicationFolder, depth_below};
use crate::error::TrackResult;
use crate::stats::StatsAggregator;
use crate::store::RecordStore;
use crate::watcher::FolderEvent;
use crate::watcher::debounce::Debouncer;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Applies folder events to the store and its downstream collaborators.
///
/// Cloning is cheap; every clone shares the same collaborators and the same
/// pending-action table.
#[derive(Clone)]
pub struct FolderSyncHandler {
    config: Arc<ConfigService>,
    store: Arc<dyn RecordStore>,
    documents: Arc<dyn DocumentGenerator>,
    stats: Arc<dyn StatsAggregator>,
    debouncer: Debouncer,
}

impl FolderSyncHandler {
    pub fn new(
        config: Arc<ConfigService>,
        store: Arc<dyn RecordStore>,
        documents: Arc<dyn DocumentGenerator>,
        stats: Arc<dyn StatsAggregator>,
        debouncer: Debouncer,
    ) -> Self {
        Self {
            config,
            store,
            documents,
            stats,
            debouncer,
        }
    }

    pub fn debouncer(&self) -> &Debouncer {
        &self.debouncer
    }

    /// Routes one event. Errors are logged here and never escape, so a
    /// failure on one path cannot stall the dispatcher.
    pub async fn dispatch(&self, event: FolderEvent) {
        match event {
            FolderEvent::Created(path) => self.handle_create(path),
            FolderEvent::Renamed { from, to } => self.handle_rename(&from, to).await,
            FolderEvent::Deleted(path) => {
                if let Err(e) = self.handle_remove(&path).await {
                    error!(path = %path.display(), error = %e, "failed to process folder removal");
                }
            }
        }
    }

    /// Debounces an upsert for `path` if it is currently a directory.
    pub fn handle_create(&self, path: PathBuf) {
        if !path.is_dir() {
            return;
        }
        self.schedule_upsert(path);
    }

    /// Drops the record for the old path right away, then treats the new
    /// path like a creation.
    pub async fn handle_rename(&self, from: &Path, to: PathBuf) {
        if self.at_role_depth(from) {
            if let Err(e) = self.store.delete_application_by_path(from).await {
                error!(path = %from.display(), error = %e, "failed to remove renamed application");
            }
        }
        self.handle_create(to);
    }

    /// Deletes the record for `path` and refreshes statistics, without debouncing.
    ///
    /// Paths that are not at `Company/Role` depth are ignored. The removed
    /// path no longer exists, so only its position below the root is checked.
    pub async fn handle_remove(&self, path: &Path) -> TrackResult<()> {
        if !self.at_role_depth(path) {
            return Ok(());
        }
        self.store.delete_application_by_path(path).await?;
        self.stats.refresh().await
    }

    /// The debounced payload: classify, upsert, generate documents, refresh stats.
    ///
    /// Returns the folder that was synced, or `None` when the path is not a
    /// trackable application folder (any more).
    pub async fn process_upsert(&self, path: &Path) -> TrackResult<Option<ApplicationFolder>> {
        let Some(root) = self.config.active_root() else {
            debug!(path = %path.display(), "no active root, ignoring folder");
            return Ok(None);
        };

        let Some(folder) = ApplicationFolder::classify(&root, path) else {
            debug!(
                path = %path.display(),
                depth = ?depth_below(&root, path),
                "ignoring folder outside Company/Role depth"
            );
            return Ok(None);
        };

        let created_at = match folder.created_at() {
            Ok(created_at) => created_at,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "folder vanished before sync");
                return Ok(None);
            }
        };

        info!(company = %folder.company, role = %folder.role, "processing folder");
        self.store.upsert_application(&folder, created_at).await?;
        self.documents
            .generate_documents(&folder.company, &folder.role, &folder.path)
            .await?;
        self.stats.refresh().await?;

        Ok(Some(folder))
    }

    /// Whether `path` sits exactly two levels below the active root.
    ///
    /// Temp files renamed into place at the root, and saves inside role
    /// folders, fail this check.
    fn at_role_depth(&self, path: &Path) -> bool {
        let Some(root) = self.config.active_root() else {
            return false;
        };
        let root = dunce::canonicalize(&root).unwrap_or(root);
        let depth = depth_below(&root, path);
        if depth != Some(2) {
            debug!(path = %path.display(), depth = ?depth, "ignoring removal outside Company/Role depth");
            return false;
        }
        true
    }

    fn schedule_upsert(&self, path: PathBuf) {
        let handler = self.clone();
        let target = path.clone();
        self.debouncer.schedule(path, async move {
            if let Err(e) = handler.process_upsert(&target).await {
                error!(path = %target.display(), error = %e, "error processing folder upsert");
            }
        });
    }
}
