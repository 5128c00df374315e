//! Configuration provider.
//!
//! Settings come from two JSON files:
//!
//! - a global `config.json` naming the active root directory, discovered by
//!   walking up from `$JOBTRACK_CONFIG_DIR` (or the current directory);
//! - a per-workspace `workspace.json` inside the active root, holding the
//!   user name and the document template paths.
//!
//! [`ConfigService`] keeps the current [`Settings`] snapshot and publishes a
//! [`ConfigChanged`] notification on a broadcast channel whenever they change.
//! [`ConfigService::watch`] hot-reloads the global file from disk.

use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock, Weak};
use std::time::Duration;
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

pub const CONFIG_FILE: &str = "config.json";
pub const WORKSPACE_FILE: &str = "workspace.json";
pub const CONFIG_DIR_ENV: &str = "JOBTRACK_CONFIG_DIR";

/// Editors often write a file in several steps; wait this long before reloading.
const RELOAD_SETTLE: Duration = Duration::from_millis(200);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("config file has no parent directory: {0}")]
    NoParent(PathBuf),

    #[error("no config file to watch: settings are held in memory")]
    NoConfigFile,

    #[error("failed to watch config: {0}")]
    Watch(#[from] notify::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalConfig {
    #[serde(default)]
    pub active_root: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub cv_template_path: Option<PathBuf>,
    #[serde(default)]
    pub cover_letter_template_path: Option<PathBuf>,
}

/// A snapshot of everything the services need from configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    pub active_root: Option<PathBuf>,
    pub workspace: WorkspaceConfig,
}

impl Settings {
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Settings {
            active_root: Some(root.into()),
            workspace: WorkspaceConfig::default(),
        }
    }
}

/// Published whenever the active settings are replaced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigChanged {
    pub previous_root: Option<PathBuf>,
    pub active_root: Option<PathBuf>,
}

impl ConfigChanged {
    pub fn root_changed(&self) -> bool {
        self.previous_root != self.active_root
    }
}

pub struct ConfigService {
    config_path: Option<PathBuf>,
    settings: RwLock<Settings>,
    changes: broadcast::Sender<ConfigChanged>,
}

impl ConfigService {
    /// Builds a provider that never touches disk. `replace` still publishes changes.
    pub fn in_memory(settings: Settings) -> Self {
        let (changes, _) = broadcast::channel(16);
        ConfigService {
            config_path: None,
            settings: RwLock::new(settings),
            changes,
        }
    }

    /// Loads settings from an explicit global config file.
    pub fn from_path(config_path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let config_path = config_path.into();
        let settings = load_settings(&config_path)?;
        let (changes, _) = broadcast::channel(16);

        Ok(ConfigService {
            config_path: Some(config_path),
            settings: RwLock::new(settings),
            changes,
        })
    }

    /// Locates `config.json` and loads it.
    ///
    /// A malformed file is logged and treated as empty, so the host can still
    /// start and pick up a corrected file through [`ConfigService::watch`].
    pub fn discover() -> Self {
        let start = std::env::var_os(CONFIG_DIR_ENV)
            .map(PathBuf::from)
            .or_else(|| std::env::current_dir().ok());
        info!(start = ?start, "searching for {CONFIG_FILE}");

        let config_path = start
            .as_deref()
            .and_then(find_config_upwards)
            .or_else(|| dirs::config_dir().map(|dir| dir.join("jobtrack").join(CONFIG_FILE)))
            .unwrap_or_else(|| PathBuf::from(CONFIG_FILE));

        let settings = load_settings(&config_path).unwrap_or_else(|e| {
            error!(error = %e, "failed to load configuration, starting without a root");
            Settings::default()
        });
        let (changes, _) = broadcast::channel(16);

        ConfigService {
            config_path: Some(config_path),
            settings: RwLock::new(settings),
            changes,
        }
    }

    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    pub fn settings(&self) -> Settings {
        self.settings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn active_root(&self) -> Option<PathBuf> {
        self.settings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .active_root
            .clone()
    }

    pub fn workspace(&self) -> WorkspaceConfig {
        self.settings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .workspace
            .clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ConfigChanged> {
        self.changes.subscribe()
    }

    /// Swaps in new settings and notifies subscribers.
    pub fn replace(&self, settings: Settings) -> ConfigChanged {
        let change = {
            let mut current = self.settings.write().unwrap_or_else(PoisonError::into_inner);
            let change = ConfigChanged {
                previous_root: current.active_root.clone(),
                active_root: settings.active_root.clone(),
            };
            *current = settings;
            change
        };

        // No receivers is fine: nobody is listening yet.
        let _ = self.changes.send(change.clone());
        change
    }

    /// Re-reads the config file and publishes a change if the settings differ.
    ///
    /// Returns `Ok(None)` when nothing changed or there is no file to read.
    /// On error the previous settings stay in effect.
    pub fn reload(&self) -> Result<Option<ConfigChanged>, ConfigError> {
        let Some(path) = self.config_path.as_deref() else {
            return Ok(None);
        };

        let fresh = load_settings(path)?;
        if fresh == self.settings() {
            debug!(path = %path.display(), "configuration unchanged");
            return Ok(None);
        }

        info!(active_root = ?fresh.active_root, "configuration reloaded");
        Ok(Some(self.replace(fresh)))
    }

    /// Starts hot-reloading the global config file.
    ///
    /// The parent directory is watched rather than the file itself so that
    /// editors which save by rename are still picked up. Dropping the returned
    /// [`ConfigWatch`] stops watching.
    pub fn watch(self: &Arc<Self>, runtime: Handle) -> Result<ConfigWatch, ConfigError> {
        let Some(path) = self.config_path.clone() else {
            return Err(ConfigError::NoConfigFile);
        };
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .ok_or_else(|| ConfigError::NoParent(path.clone()))?;
        let file_name = path.file_name().map(|n| n.to_os_string());

        let (tx, mut rx) = mpsc::unbounded_channel::<()>();
        let mut watcher = notify::recommended_watcher(
            move |res: Result<notify::Event, notify::Error>| match res {
                Ok(event) => {
                    let relevant = matches!(
                        event.kind,
                        EventKind::Create(_) | EventKind::Modify(_)
                    ) && event
                        .paths
                        .iter()
                        .any(|p| p.file_name().map(|n| n.to_os_string()) == file_name);
                    if relevant {
                        let _ = tx.send(());
                    }
                }
                Err(e) => warn!(error = %e, "config watcher error"),
            },
        )?;
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        let service: Weak<ConfigService> = Arc::downgrade(self);
        let task = runtime.spawn(async move {
            while rx.recv().await.is_some() {
                tokio::time::sleep(RELOAD_SETTLE).await;
                while rx.try_recv().is_ok() {}

                let Some(service) = service.upgrade() else {
                    break;
                };
                info!("config file change detected");
                if let Err(e) = service.reload() {
                    error!(error = %e, "failed to reload configuration, keeping previous settings");
                }
            }
        });

        info!(path = %path.display(), "watching configuration file");
        Ok(ConfigWatch {
            _watcher: watcher,
            task,
        })
    }
}

/// Keeps the config file watch alive.
pub struct ConfigWatch {
    _watcher: RecommendedWatcher,
    task: JoinHandle<()>,
}

impl Drop for ConfigWatch {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Walks from `start` towards the filesystem root looking for `config.json`.
pub fn find_config_upwards(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .map(|dir| dir.join(CONFIG_FILE))
        .find(|candidate| candidate.is_file())
}

/// Reads the global config and, when it names a root, that root's workspace config.
///
/// A missing global file yields default settings. An empty `active_root` string
/// counts as no root.
pub fn load_settings(config_path: &Path) -> Result<Settings, ConfigError> {
    let global: GlobalConfig = match read_json(config_path)? {
        Some(global) => global,
        None => {
            warn!(path = %config_path.display(), "config file not found");
            return Ok(Settings::default());
        }
    };

    let active_root = global
        .active_root
        .filter(|root| !root.as_os_str().is_empty());
    info!(active_root = ?active_root, "global configuration loaded");

    let workspace = match active_root.as_deref() {
        Some(root) => load_workspace(root),
        None => WorkspaceConfig::default(),
    };

    Ok(Settings {
        active_root,
        workspace,
    })
}

fn load_workspace(root: &Path) -> WorkspaceConfig {
    let path = root.join(WORKSPACE_FILE);
    match read_json::<WorkspaceConfig>(&path) {
        Ok(Some(workspace)) => {
            info!(user = ?workspace.user_name, "workspace configuration loaded");
            workspace
        }
        Ok(None) => {
            warn!(root = %root.display(), "workspace config ({WORKSPACE_FILE}) not found");
            WorkspaceConfig::default()
        }
        Err(e) => {
            error!(error = %e, "error loading workspace configuration");
            WorkspaceConfig::default()
        }
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>, ConfigError> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
}
