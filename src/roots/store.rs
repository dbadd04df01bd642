use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use super::{BLOCKS_TO_STORE, RootStoreError, TrustedRootWindow};

/// Read access to the current trusted-root window
pub trait RootStore: Send + Sync {
    /// A consistent snapshot; later updates never alter a returned window.
    fn current(&self) -> Result<Arc<TrustedRootWindow>, RootStoreError>;

    /// Drop any cached snapshot so the next read reloads.
    fn invalidate(&self) {}
}

/// A fixed window, for tests and embedders that manage roots themselves
#[derive(Debug, Clone, Default)]
pub struct StaticRootStore {
    window: Arc<TrustedRootWindow>,
}

impl StaticRootStore {
    pub fn new(window: TrustedRootWindow) -> Self {
        Self {
            window: Arc::new(window),
        }
    }
}

impl RootStore for StaticRootStore {
    fn current(&self) -> Result<Arc<TrustedRootWindow>, RootStoreError> {
        Ok(self.window.clone())
    }
}

/// Window persisted as JSON, cached until invalidated
pub struct FileRootStore {
    path: PathBuf,
    capacity: usize,
    cache: RwLock<Option<Arc<TrustedRootWindow>>>,
    watcher: Mutex<Option<RecommendedWatcher>>,
}

impl std::fmt::Debug for FileRootStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileRootStore")
            .field("path", &self.path)
            .field("capacity", &self.capacity)
            .field("cached", &self.cache.read().is_some())
            .finish()
    }
}

fn io_error(path: &Path, e: std::io::Error) -> RootStoreError {
    RootStoreError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    }
}

impl FileRootStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_capacity(path, BLOCKS_TO_STORE)
    }

    pub fn with_capacity(path: impl Into<PathBuf>, capacity: usize) -> Self {
        Self {
            path: path.into(),
            capacity,
            cache: RwLock::new(None),
            watcher: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the file, bypassing the cache. A missing file is an empty window.
    pub fn load(&self) -> Result<TrustedRootWindow, RootStoreError> {
        match std::fs::read_to_string(&self.path) {
            Ok(json) => TrustedRootWindow::from_json(&json, self.capacity),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!("Roots file {} not found, using empty window", self.path.display());
                Ok(TrustedRootWindow::new(self.capacity))
            }
            Err(e) => Err(io_error(&self.path, e)),
        }
    }

    /// Write through a temp file and rename so readers never see a partial file.
    pub fn save(&self, window: &TrustedRootWindow) -> Result<(), RootStoreError> {
        let json = window.to_json()?;
        let temp_path = self.path.with_extension("json.tmp");
        std::fs::write(&temp_path, json).map_err(|e| io_error(&temp_path, e))?;
        std::fs::rename(&temp_path, &self.path).map_err(|e| io_error(&self.path, e))?;

        *self.cache.write() = Some(Arc::new(window.clone()));
        info!(
            "Saved {} tree roots to {}",
            window.len(),
            self.path.display()
        );
        Ok(())
    }

    /// Invalidate the cache whenever the roots file changes on disk.
    pub fn watch(self: &Arc<Self>) -> Result<(), RootStoreError> {
        let store: Weak<Self> = Arc::downgrade(self);
        let file_name = self.path.file_name().map(|n| n.to_os_string());

        let mut watcher: RecommendedWatcher = Watcher::new(
            move |result: Result<Event, notify::Error>| match result {
                Ok(event) => {
                    if !matches!(
                        event.kind,
                        EventKind::Modify(_) | EventKind::Create(_) | EventKind::Remove(_)
                    ) {
                        return;
                    }
                    let ours = event
                        .paths
                        .iter()
                        .any(|p| p.file_name().map(|n| n.to_os_string()) == file_name);
                    if let (true, Some(store)) = (ours, store.upgrade()) {
                        debug!("Roots file changed: {:?}", event.paths);
                        store.invalidate();
                    }
                }
                Err(e) => error!("Roots file watch error: {}", e),
            },
            notify::Config::default(),
        )
        .map_err(|e| RootStoreError::Watch(e.to_string()))?;

        // Watch the directory; editors and our own save() replace the file
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        watcher
            .watch(dir, RecursiveMode::NonRecursive)
            .map_err(|e| RootStoreError::Watch(e.to_string()))?;

        info!("Watching roots file {}", self.path.display());
        *self.watcher.lock() = Some(watcher);
        Ok(())
    }
}

impl RootStore for FileRootStore {
    fn current(&self) -> Result<Arc<TrustedRootWindow>, RootStoreError> {
        if let Some(window) = self.cache.read().as_ref() {
            return Ok(window.clone());
        }

        let window = Arc::new(self.load()?);
        debug!("Loaded {} tree roots from {}", window.len(), self.path.display());
        *self.cache.write() = Some(window.clone());
        Ok(window)
    }

    fn invalidate(&self) {
        *self.cache.write() = None;
    }
}
