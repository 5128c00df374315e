use jobtrack_core::config::ConfigService;
use jobtrack_core::documents::{DocumentGenerator, TemplateDocuments};
use jobtrack_core::host::Host;
use jobtrack_core::logging;
use jobtrack_core::stats::{Analytics, StatsAggregator};
use jobtrack_core::store::{RecordStore, SqliteStore};
use jobtrack_core::watcher::service::SyncEngine;
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{error, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    logging::init()?;

    let config = Arc::new(ConfigService::discover());
    let _config_watch = match config.watch(Handle::current()) {
        Ok(watch) => Some(watch),
        Err(e) => {
            warn!(error = %e, "configuration hot-reload disabled");
            None
        }
    };

    let store = Arc::new(SqliteStore::new(Arc::clone(&config)));
    let stats: Arc<dyn StatsAggregator> =
        Arc::new(Analytics::new(Arc::clone(&store), Arc::clone(&config)));
    let documents: Arc<dyn DocumentGenerator> =
        Arc::new(TemplateDocuments::new(Arc::clone(&config)));
    let records: Arc<dyn RecordStore> = store.clone();

    let engine = Arc::new(SyncEngine::create(
        Arc::clone(&config),
        records,
        documents,
        Arc::clone(&stats),
    )?);

    let host = Host::new(config, store, stats, engine);
    host.run(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
    })
    .await?;

    Ok(())
}
