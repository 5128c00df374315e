//! Lifecycle host: wires the services together and keeps them running.

use crate::config::{ConfigChanged, ConfigService};
use crate::error::TrackResult;
use crate::stats::StatsAggregator;
use crate::store::SqliteStore;
use crate::watcher::service::SyncEngine;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{error, info, warn};

/// How often statistics are recomputed even when nothing changed.
pub const STATS_REFRESH_INTERVAL: Duration = Duration::from_secs(30 * 60);

pub struct Host {
    config: Arc<ConfigService>,
    store: Arc<SqliteStore>,
    stats: Arc<dyn StatsAggregator>,
    engine: Arc<SyncEngine>,
    refresh_every: Duration,
}

impl Host {
    pub fn new(
        config: Arc<ConfigService>,
        store: Arc<SqliteStore>,
        stats: Arc<dyn StatsAggregator>,
        engine: Arc<SyncEngine>,
    ) -> Self {
        Host {
            config,
            store,
            stats,
            engine,
            refresh_every: STATS_REFRESH_INTERVAL,
        }
    }

    pub fn with_refresh_interval(mut self, refresh_every: Duration) -> Self {
        self.refresh_every = refresh_every;
        self
    }

    pub fn engine(&self) -> &Arc<SyncEngine> {
        &self.engine
    }

    /// Opens the store, starts the engine, and computes initial statistics.
    ///
    /// Failures are logged; the host keeps running so a later config change
    /// can recover.
    pub async fn initialize(&self) {
        if let Err(e) = self.store.initialize().await {
            error!(error = %e, "failed to initialize database");
        }
        self.engine.start();
        self.refresh_stats().await;
    }

    /// Runs until `shutdown` resolves, then stops the engine and closes the store.
    pub async fn run<F>(self, shutdown: F) -> TrackResult<()>
    where
        F: Future<Output = ()>,
    {
        info!("jobtrack host starting");
        let mut changes = self.config.subscribe();
        self.initialize().await;
        let follower = self.engine.follow_config();

        let mut ticker =
            tokio::time::interval_at(Instant::now() + self.refresh_every, self.refresh_every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = ticker.tick() => self.refresh_stats().await,
                change = changes.recv() => match change {
                    Ok(change) => self.on_config_changed(&change).await,
                    Err(RecvError::Lagged(missed)) => {
                        warn!(missed, "missed configuration notifications, re-initializing");
                        self.reinitialize().await;
                    }
                    Err(RecvError::Closed) => break,
                },
            }
        }

        info!("jobtrack host shutting down");
        follower.abort();
        self.engine.stop();
        self.store.close().await;
        Ok(())
    }

    async fn on_config_changed(&self, change: &ConfigChanged) {
        info!(active_root = ?change.active_root, "configuration changed");
        if change.root_changed() {
            self.reinitialize().await;
        } else {
            self.refresh_stats().await;
        }
    }

    async fn reinitialize(&self) {
        info!("re-initializing services");
        self.initialize().await;
    }

    async fn refresh_stats(&self) {
        if let Err(e) = self.stats.refresh().await {
            error!(error = %e, "error refreshing analytics");
        }
    }
}
