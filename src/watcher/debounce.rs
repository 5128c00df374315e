use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::AbortHandle;
use tracing::{debug, error};

/// Quiet period a path must observe before its pending action runs.
pub const QUIET_INTERVAL: Duration = Duration::from_millis(500);

struct Pending {
    ticket: u64,
    timer: AbortHandle,
}

type PendingTable = Arc<Mutex<HashMap<PathBuf, Pending>>>;

/// Per-path trailing-edge debouncer.
///
/// Each path has at most one pending action. Scheduling again for the same
/// path aborts the previous timer and starts a fresh quiet interval, so only
/// the most recent action survives a burst. Different paths never interfere.
///
/// Every schedule gets a ticket. A timer only runs its action if its ticket
/// is still the current entry for the path when it wakes, and it removes the
/// entry under the same lock. A stale timer that lost the race to an abort
/// therefore finds someone else's ticket and exits without running.
#[derive(Clone)]
pub struct Debouncer {
    pending: PendingTable,
    next_ticket: Arc<AtomicU64>,
    quiet: Duration,
    runtime: Handle,
}

impl Debouncer {
    pub fn new(quiet: Duration, runtime: Handle) -> Self {
        Debouncer {
            pending: Arc::new(Mutex::new(HashMap::new())),
            next_ticket: Arc::new(AtomicU64::new(0)),
            quiet,
            runtime,
        }
    }

    pub fn quiet_interval(&self) -> Duration {
        self.quiet
    }

    /// Runs `action` once `path` has been quiet for the debounce interval,
    /// replacing anything already pending for it.
    ///
    /// The action runs in its own task, so a panic inside it is logged and
    /// contained.
    pub fn schedule<F>(&self, path: PathBuf, action: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        let pending = Arc::clone(&self.pending);
        let quiet = self.quiet;
        let key = path.clone();

        let mut table = lock(&self.pending);
        if let Some(previous) = table.remove(&path) {
            previous.timer.abort();
            debug!(path = %path.display(), "superseded pending action");
        }

        // The timer cannot claim its entry before the insert below: it needs
        // the table lock we are holding.
        let timer = self.runtime.spawn(async move {
            tokio::time::sleep(quiet).await;

            {
                let mut table = lock(&pending);
                match table.get(&key) {
                    Some(entry) if entry.ticket == ticket => {
                        table.remove(&key);
                    }
                    _ => return,
                }
            }

            if let Err(e) = tokio::spawn(action).await {
                if e.is_panic() {
                    error!(path = %key.display(), "debounced action panicked");
                }
            }
        });

        table.insert(
            path,
            Pending {
                ticket,
                timer: timer.abort_handle(),
            },
        );
    }

    pub fn is_pending(&self, path: &Path) -> bool {
        lock(&self.pending).contains_key(path)
    }

    pub fn pending_len(&self) -> usize {
        lock(&self.pending).len()
    }

    /// Drops every pending action without running it.
    pub fn cancel_all(&self) {
        let drained: Vec<Pending> = lock(&self.pending).drain().map(|(_, p)| p).collect();
        if !drained.is_empty() {
            debug!(count = drained.len(), "cancelled pending actions");
        }
        for pending in drained {
            pending.timer.abort();
        }
    }
}

fn lock(table: &Mutex<HashMap<PathBuf, Pending>>) -> MutexGuard<'_, HashMap<PathBuf, Pending>> {
    table.lock().unwrap_or_else(PoisonError::into_inner)
}
