//! Directory-backed collaborators.
//!
//! Every `*.yaml`/`*.yml` file below the config directory holds one resource.
//! Files and directories whose name starts with `.` are ignored.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use notify::{RecommendedWatcher, RecursiveMode};
use notify_debouncer_mini::{new_debouncer, DebouncedEvent, Debouncer};
use tokio::sync::watch;
use walkdir::WalkDir;

use super::error::{StatusWriteError, WatchError};
use super::resource::{DynamicObject, ServiceBrokerConfig, API_VERSION, KIND};
use super::watch::{EventSink, ResourceWatch, StatusWriter, WatchEvent};

const DEBOUNCE: Duration = Duration::from_millis(500);
const STOP_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Last parsed object per file.
type FileCache = Arc<Mutex<HashMap<PathBuf, DynamicObject>>>;

fn lock(cache: &FileCache) -> MutexGuard<'_, HashMap<PathBuf, DynamicObject>> {
    cache.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Watches a directory of resource files.
pub struct DirectoryWatch {
    config_dir: PathBuf,
    namespace: String,
    cache: FileCache,
    synced: Arc<AtomicBool>,
}

impl DirectoryWatch {
    /// Watches `config_dir` for resources in `namespace`.
    pub fn new(config_dir: impl Into<PathBuf>, namespace: impl Into<String>) -> Self {
        Self {
            config_dir: config_dir.into(),
            namespace: namespace.into(),
            cache: FileCache::default(),
            synced: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// A status writer that updates the files this watch has seen.
    pub fn status_writer(&self) -> DirectoryStatusWriter {
        DirectoryStatusWriter {
            namespace: self.namespace.clone(),
            cache: Arc::clone(&self.cache),
        }
    }
}

#[async_trait::async_trait]
impl ResourceWatch for DirectoryWatch {
    async fn run(&self, sink: EventSink, stop: watch::Receiver<bool>) -> Result<(), WatchError> {
        if !self.config_dir.is_dir() {
            return Err(WatchError::ConfigDirNotFound(self.config_dir.clone()));
        }

        // Canonical, so walkdir and notify agree on paths.
        let root = self
            .config_dir
            .canonicalize()
            .map_err(|e| WatchError::ReadFile {
                path: self.config_dir.clone(),
                source: e,
            })?;

        let watcher = DirectoryWatcher {
            root,
            namespace: self.namespace.clone(),
            cache: Arc::clone(&self.cache),
            synced: Arc::clone(&self.synced),
            sink,
            stop,
        };

        tokio::task::spawn_blocking(move || watcher.watch())
            .await
            .map_err(|e| WatchError::Notify(e.to_string()))?
    }

    fn has_synced(&self) -> bool {
        self.synced.load(Ordering::Acquire)
    }
}

/// State owned by the blocking watch thread.
struct DirectoryWatcher {
    root: PathBuf,
    namespace: String,
    cache: FileCache,
    synced: Arc<AtomicBool>,
    sink: EventSink,
    stop: watch::Receiver<bool>,
}

impl DirectoryWatcher {
    /// Lists the directory, then follows changes until stopped.
    ///
    /// This function blocks until the stop signal is raised.
    fn watch(self) -> Result<(), WatchError> {
        let (tx, rx) = std::sync::mpsc::channel();

        // Watch before listing so nothing written in between is missed.
        let mut debouncer: Debouncer<RecommendedWatcher> =
            new_debouncer(DEBOUNCE, tx).map_err(|e| WatchError::Notify(e.to_string()))?;
        debouncer
            .watcher()
            .watch(&self.root, RecursiveMode::Recursive)
            .map_err(|e| WatchError::Notify(e.to_string()))?;

        self.initial_listing()?;
        self.synced.store(true, Ordering::Release);

        log::info!(
            "Started watching resource directory: {}",
            self.root.display()
        );

        loop {
            if *self.stop.borrow() || self.sink.is_closed() {
                break;
            }

            match rx.recv_timeout(STOP_POLL_INTERVAL) {
                Ok(Ok(events)) => {
                    for event in events {
                        self.process_event(event)?;
                    }
                }
                Ok(Err(e)) => {
                    log::error!("Watch error: {}", e);
                }
                Err(std::sync::mpsc::RecvTimeoutError::Timeout) => {}
                Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => {
                    break;
                }
            }
        }

        log::info!("Stopped watching resource directory");
        Ok(())
    }

    fn initial_listing(&self) -> Result<(), WatchError> {
        for entry in WalkDir::new(&self.root)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if !path.is_file() || !is_resource_file(&self.root, path) {
                continue;
            }

            match load_object(path, &self.namespace) {
                Ok(Some(object)) => {
                    lock(&self.cache).insert(path.to_path_buf(), object.clone());
                    self.sink.blocking_send(WatchEvent::Created(object))?;
                }
                Ok(None) => {}
                Err(e) => log::warn!("Skipping {}: {}", path.display(), e),
            }
        }
        Ok(())
    }

    fn process_event(&self, event: DebouncedEvent) -> Result<(), WatchError> {
        let path = event.path;

        if !path.exists() {
            // A removed directory takes every file below it along.
            let removed: Vec<DynamicObject> = {
                let mut cache = lock(&self.cache);
                let gone: Vec<PathBuf> = cache
                    .keys()
                    .filter(|p| p.starts_with(&path) && !p.exists())
                    .cloned()
                    .collect();
                gone.iter().filter_map(|p| cache.remove(p)).collect()
            };
            for object in removed {
                self.sink.blocking_send(WatchEvent::Deleted(object))?;
            }
            return Ok(());
        }

        if !path.is_file() || !is_resource_file(&self.root, &path) {
            return Ok(());
        }

        let events = match load_object(&path, &self.namespace) {
            Ok(Some(object)) => {
                let previous = lock(&self.cache).insert(path.clone(), object.clone());
                change_events(previous, object)
            }
            // Emptied, or moved to another namespace.
            Ok(None) => lock(&self.cache)
                .remove(&path)
                .map(WatchEvent::Deleted)
                .into_iter()
                .collect(),
            Err(e) => {
                log::warn!("Ignoring change to {}: {}", path.display(), e);
                Vec::new()
            }
        };

        for event in events {
            log::debug!("{} {}", event.action(), path.display());
            self.sink.blocking_send(event)?;
        }
        Ok(())
    }
}

/// Events for a file that now holds `current` and previously held `previous`.
///
/// An update never crosses identities: a file whose object changed kind or
/// name deletes the old object and creates the new one.
fn change_events(previous: Option<DynamicObject>, current: DynamicObject) -> Vec<WatchEvent> {
    match previous {
        None => vec![WatchEvent::Created(current)],
        Some(old) if old == current => Vec::new(),
        Some(old) if same_identity(&old, &current) => vec![WatchEvent::Updated { old, new: current }],
        Some(old) => vec![WatchEvent::Deleted(old), WatchEvent::Created(current)],
    }
}

fn same_identity(a: &DynamicObject, b: &DynamicObject) -> bool {
    a.api_version == b.api_version
        && a.kind == b.kind
        && a.name() == b.name()
        && a.namespace() == b.namespace()
}

/// True for YAML files with no hidden path component below `root`.
fn is_resource_file(root: &Path, path: &Path) -> bool {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    if ext != "yaml" && ext != "yml" {
        return false;
    }

    match path.strip_prefix(root) {
        Ok(relative) => !relative.components().any(|c| {
            c.as_os_str()
                .to_str()
                .map(|s| s.starts_with('.'))
                .unwrap_or(false)
        }),
        Err(_) => false,
    }
}

/// Loads the resource in `path` if it belongs to `namespace`.
///
/// A resource without a namespace belongs to the watched one.
pub(crate) fn load_object(path: &Path, namespace: &str) -> Result<Option<DynamicObject>, WatchError> {
    let content = std::fs::read_to_string(path).map_err(|e| WatchError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;
    parse_object(&content, path, namespace)
}

fn parse_object(
    content: &str,
    path: &Path,
    namespace: &str,
) -> Result<Option<DynamicObject>, WatchError> {
    if content.trim().is_empty() {
        return Ok(None);
    }

    let mut object: DynamicObject =
        serde_yaml::from_str(content).map_err(|e| WatchError::ParseYaml {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

    match object.namespace() {
        None => object.metadata.namespace = Some(namespace.to_string()),
        Some(ns) if ns != namespace => return Ok(None),
        Some(_) => {}
    }

    Ok(Some(object))
}

/// Writes status back into the resource file.
///
/// Only the `status` key is replaced. The file is re-serialized, so comments
/// and formatting are not preserved.
#[derive(Clone)]
pub struct DirectoryStatusWriter {
    namespace: String,
    cache: FileCache,
}

impl DirectoryStatusWriter {
    fn path_of(&self, config: &ServiceBrokerConfig) -> Option<PathBuf> {
        let namespace = config
            .metadata
            .namespace
            .as_deref()
            .unwrap_or(&self.namespace);

        lock(&self.cache)
            .iter()
            .find(|(_, o)| {
                o.is_kind(API_VERSION, KIND)
                    && o.name() == config.name()
                    && o.namespace() == Some(namespace)
            })
            .map(|(path, _)| path.clone())
    }
}

#[async_trait::async_trait]
impl StatusWriter for DirectoryStatusWriter {
    async fn update_status(&self, config: &ServiceBrokerConfig) -> Result<(), StatusWriteError> {
        let path = self
            .path_of(config)
            .ok_or_else(|| StatusWriteError::NotFound {
                namespace: config
                    .metadata
                    .namespace
                    .clone()
                    .unwrap_or_else(|| self.namespace.clone()),
                name: config.name().to_string(),
            })?;

        let content =
            tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| StatusWriteError::ReadFile {
                    path: path.clone(),
                    source: e,
                })?;

        let updated = replace_status(&content, config)?;

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let temp = path.with_file_name(format!(".{}.tmp", file_name));

        tokio::fs::write(&temp, updated)
            .await
            .map_err(|e| StatusWriteError::WriteFile {
                path: temp.clone(),
                source: e,
            })?;
        tokio::fs::rename(&temp, &path)
            .await
            .map_err(|e| StatusWriteError::WriteFile {
                path: path.clone(),
                source: e,
            })?;

        log::debug!("Wrote status of '{}' to {}", config.name(), path.display());
        Ok(())
    }
}

/// Returns `content` with its `status` key set to `config.status`.
fn replace_status(content: &str, config: &ServiceBrokerConfig) -> Result<String, StatusWriteError> {
    let mut document: serde_yaml::Value =
        serde_yaml::from_str(content).map_err(|e| StatusWriteError::Serialize(e.to_string()))?;

    let mapping = document.as_mapping_mut().ok_or_else(|| {
        StatusWriteError::Serialize("resource file is not a YAML mapping".to_string())
    })?;

    let key = serde_yaml::Value::String("status".to_string());
    if config.status.is_empty() {
        mapping.remove(&key);
    } else {
        let status = serde_yaml::to_value(&config.status)
            .map_err(|e| StatusWriteError::Serialize(e.to_string()))?;
        mapping.insert(key, status);
    }

    serde_yaml::to_string(&document).map_err(|e| StatusWriteError::Serialize(e.to_string()))
}
