use crate::watcher::FolderEvent;
use notify::event::{CreateKind, ModifyKind, RemoveKind, RenameMode};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::Path;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, warn};

/// Starts a recursive watch on `root`, forwarding translated events to `tx`.
///
/// The callback runs on notify's own thread and only translates and sends.
/// Dropping the returned watcher ends delivery.
pub fn setup_folder_watcher(
    root: &Path,
    tx: UnboundedSender<FolderEvent>,
) -> Result<RecommendedWatcher, notify::Error> {
    let event_handler = move |res: Result<Event, notify::Error>| match res {
        Ok(event) => {
            for folder_event in translate(&event) {
                debug!(event = ?folder_event, "watcher event");
                // Receiver gone means the subscription is being torn down.
                if tx.send(folder_event).is_err() {
                    return;
                }
            }
        }
        Err(e) => warn!(error = %e, "filesystem watcher error"),
    };

    let mut watcher = RecommendedWatcher::new(event_handler, Config::default())?;
    watcher.watch(root, RecursiveMode::Recursive)?;

    Ok(watcher)
}

/// Maps a raw notify event onto folder events.
///
/// File-only events are dropped. Backends that cannot pair rename halves
/// (`RenameMode::Any`) are resolved by checking whether the path still
/// exists as a directory.
pub fn translate(event: &Event) -> Vec<FolderEvent> {
    let paths = event.paths.iter().cloned();

    match event.kind {
        EventKind::Create(CreateKind::File) => Vec::new(),
        EventKind::Create(_) => paths.map(FolderEvent::Created).collect(),

        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => match event.paths.as_slice() {
            [from, to] => vec![FolderEvent::Renamed {
                from: from.clone(),
                to: to.clone(),
            }],
            _ => Vec::new(),
        },
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
            paths.map(FolderEvent::Deleted).collect()
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
            paths.map(FolderEvent::Created).collect()
        }
        EventKind::Modify(ModifyKind::Name(_)) => paths
            .map(|p| {
                if p.is_dir() {
                    FolderEvent::Created(p)
                } else {
                    FolderEvent::Deleted(p)
                }
            })
            .collect(),

        EventKind::Remove(RemoveKind::File) => Vec::new(),
        EventKind::Remove(_) => paths.map(FolderEvent::Deleted).collect(),

        _ => Vec::new(),
    }
}
