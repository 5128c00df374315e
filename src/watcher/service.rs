use crate::config::ConfigService;
use crate::documents::DocumentGenerator;
use crate::error::{TrackError, TrackResult};
use crate::stats::StatsAggregator;
use crate::store::RecordStore;
use crate::watcher::FolderEvent;
use crate::watcher::debounce::{Debouncer, QUIET_INTERVAL};
use crate::watcher::handler::FolderSyncHandler;
use crate::watcher::subscription::setup_folder_watcher;
use notify::RecommendedWatcher;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// A live watch on one root: the OS watch handle plus the task draining it.
struct Subscription {
    root: PathBuf,
    _watcher: RecommendedWatcher,
    dispatcher: JoinHandle<()>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        // Anything still queued belongs to a torn-down watch.
        self.dispatcher.abort();
    }
}

/// Keeps the application store in sync with `root/Company/Role` folders.
///
/// `start` and `stop` are synchronous and idempotent. At most one
/// subscription is live at a time; `start` always tears the old one down
/// first, along with any debounced work still pending for it.
pub struct SyncEngine {
    config: Arc<ConfigService>,
    handler: FolderSyncHandler,
    runtime: Handle,
    subscription: Mutex<Option<Subscription>>,
}

impl SyncEngine {
    /// Builds an engine on the current tokio runtime with the standard
    /// 500 ms quiet interval.
    pub fn create(
        config: Arc<ConfigService>,
        store: Arc<dyn RecordStore>,
        documents: Arc<dyn DocumentGenerator>,
        stats: Arc<dyn StatsAggregator>,
    ) -> TrackResult<Self> {
        Self::with_quiet_interval(config, store, documents, stats, QUIET_INTERVAL)
    }

    pub fn with_quiet_interval(
        config: Arc<ConfigService>,
        store: Arc<dyn RecordStore>,
        documents: Arc<dyn DocumentGenerator>,
        stats: Arc<dyn StatsAggregator>,
        quiet: Duration,
    ) -> TrackResult<Self> {
        let runtime = Handle::try_current()?;
        let debouncer = Debouncer::new(quiet, runtime.clone());
        let handler = FolderSyncHandler::new(Arc::clone(&config), store, documents, stats, debouncer);

        Ok(SyncEngine {
            config,
            handler,
            runtime,
            subscription: Mutex::new(None),
        })
    }

    pub fn handler(&self) -> &FolderSyncHandler {
        &self.handler
    }

    /// Begins watching the configured root, replacing any existing watch.
    ///
    /// Returns `false` and stays stopped when no root is configured or the
    /// watch cannot be established.
    pub fn start(&self) -> bool {
        let mut slot = self.lock_subscription();
        self.teardown(&mut slot);

        let Some(root) = self.config.active_root() else {
            warn!("cannot start sync engine: no active root configured");
            return false;
        };

        match self.subscribe(&root) {
            Ok(subscription) => {
                info!(root = %subscription.root.display(), "starting sync engine");
                *slot = Some(subscription);
                true
            }
            Err(e) => {
                warn!(root = %root.display(), error = %e, "cannot start sync engine");
                false
            }
        }
    }

    /// Stops event delivery and releases the watch. Safe to call when stopped.
    pub fn stop(&self) {
        let mut slot = self.lock_subscription();
        self.teardown(&mut slot);
    }

    pub fn restart(&self) -> bool {
        info!("configuration changed, restarting sync engine");
        self.start()
    }

    pub fn is_running(&self) -> bool {
        self.lock_subscription().is_some()
    }

    pub fn watched_root(&self) -> Option<PathBuf> {
        self.lock_subscription().as_ref().map(|s| s.root.clone())
    }

    /// Restarts the engine whenever the configured root changes.
    ///
    /// The task holds only a weak reference, so it ends on its own once the
    /// engine is dropped or the config service goes away.
    pub fn follow_config(self: &Arc<Self>) -> JoinHandle<()> {
        let mut changes = self.config.subscribe();
        let engine = Arc::downgrade(self);

        self.runtime.spawn(async move {
            loop {
                let restart = match changes.recv().await {
                    Ok(change) => change.root_changed(),
                    // Missed notifications; assume the root moved.
                    Err(broadcast::error::RecvError::Lagged(_)) => true,
                    Err(broadcast::error::RecvError::Closed) => break,
                };

                let Some(engine) = engine.upgrade() else {
                    break;
                };
                if restart {
                    engine.restart();
                }
            }
            debug!("stopped following configuration");
        })
    }

    fn subscribe(&self, root: &Path) -> TrackResult<Subscription> {
        let root = dunce::canonicalize(root)?;
        if !root.is_dir() {
            return Err(TrackError::Io(io::Error::new(
                io::ErrorKind::NotADirectory,
                format!("active root is not a directory: {}", root.display()),
            )));
        }

        let (tx, mut rx) = mpsc::unbounded_channel::<FolderEvent>();
        let watcher = setup_folder_watcher(&root, tx)?;

        let handler = self.handler.clone();
        let dispatcher = self.runtime.spawn(async move {
            while let Some(event) = rx.recv().await {
                handler.dispatch(event).await;
            }
        });

        Ok(Subscription {
            root,
            _watcher: watcher,
            dispatcher,
        })
    }

    fn teardown(&self, slot: &mut Option<Subscription>) {
        if let Some(previous) = slot.take() {
            info!(root = %previous.root.display(), "sync engine stopped");
        }
        self.handler.debouncer().cancel_all();
    }

    fn lock_subscription(&self) -> MutexGuard<'_, Option<Subscription>> {
        self.subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for SyncEngine {
    fn drop(&mut self) {
        self.stop();
    }
}
