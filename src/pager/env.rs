//! Process-wide storage state: one shared page cache and one reader/writer
//! lock per database file.
//!
//! A `StorageEnv` is created once (`StorageEnv::global` initialises the
//! default instance lazily) and lives as long as any transaction holds it.
//! Each file's pager is created on first open and destroyed when the last
//! transaction using it closes.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{Arc, OnceLock},
};

use parking_lot::{Condvar, Mutex};

use crate::{
    config::StorageConfig,
    pager::cache::{Pager, WriteBack},
    types::error::Result,
};

#[derive(Debug, Default)]
struct LockState {
    readers: usize,
    writer: bool,
}

/// Whole-file lock: one exclusive holder or any number of shared holders.
/// Acquisition blocks until the lock is available.
#[derive(Debug, Default)]
pub struct FileLock {
    state: Mutex<LockState>,
    released: Condvar,
}

impl FileLock {
    pub fn acquire_shared(&self) {
        let mut state = self.state.lock();
        while state.writer {
            self.released.wait(&mut state);
        }
        state.readers += 1;
    }

    pub fn release_shared(&self) {
        let mut state = self.state.lock();
        state.readers = state.readers.saturating_sub(1);
        if state.readers == 0 {
            self.released.notify_all();
        }
    }

    pub fn acquire_exclusive(&self) {
        let mut state = self.state.lock();
        while state.writer || state.readers > 0 {
            self.released.wait(&mut state);
        }
        state.writer = true;
    }

    pub fn release_exclusive(&self) {
        let mut state = self.state.lock();
        state.writer = false;
        self.released.notify_all();
    }

    /// Non-blocking probe, used by tests and diagnostics.
    pub fn holders(&self) -> (usize, bool) {
        let state = self.state.lock();
        (state.readers, state.writer)
    }
}

struct PagerSlot {
    pager: Arc<Mutex<Pager>>,
    refs: usize,
}

pub struct StorageEnv {
    config: StorageConfig,
    pagers: Mutex<HashMap<PathBuf, PagerSlot>>,
    locks: Mutex<HashMap<PathBuf, Arc<FileLock>>>,
}

static GLOBAL_ENV: OnceLock<Arc<StorageEnv>> = OnceLock::new();

impl StorageEnv {
    pub fn new(config: StorageConfig) -> Result<Arc<Self>> {
        config.validate()?;
        Ok(Arc::new(Self::with_config(config)))
    }

    /// The default environment, created with `StorageConfig::default()` on
    /// first use.
    pub fn global() -> Arc<Self> {
        GLOBAL_ENV
            .get_or_init(|| Arc::new(Self::with_config(StorageConfig::default())))
            .clone()
    }

    fn with_config(config: StorageConfig) -> Self {
        Self {
            config,
            pagers: Mutex::new(HashMap::new()),
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Returns the shared pager for `path`, creating it if this is the first
    /// open. A supplied write-back hook replaces the current one.
    pub fn open_pager(
        &self,
        path: &Path,
        write_back: Option<Arc<dyn WriteBack>>,
    ) -> Arc<Mutex<Pager>> {
        let mut pagers = self.pagers.lock();
        let slot = pagers.entry(registry_key(path)).or_insert_with(|| {
            tracing::debug!(path = %path.display(), "creating pager");
            PagerSlot {
                pager: Arc::new(Mutex::new(Pager::new(path, self.config.page_cache_capacity))),
                refs: 0,
            }
        });
        slot.refs += 1;
        if write_back.is_some() {
            slot.pager.lock().set_write_back(write_back);
        }
        slot.pager.clone()
    }

    /// Releases one reference; the last release drops the cache.
    pub fn close_pager(&self, path: &Path) {
        let key = registry_key(path);
        let mut pagers = self.pagers.lock();
        let Some(slot) = pagers.get_mut(&key) else {
            panic!("closing pager for {} which is not open", path.display());
        };
        slot.refs -= 1;
        if slot.refs == 0 {
            tracing::debug!(path = %path.display(), "destroying pager");
            pagers.remove(&key);
        }
    }

    pub fn open_pager_count(&self) -> usize {
        self.pagers.lock().len()
    }

    pub fn pager_refs(&self, path: &Path) -> usize {
        self.pagers
            .lock()
            .get(&registry_key(path))
            .map_or(0, |slot| slot.refs)
    }

    pub fn file_lock(&self, path: &Path) -> Arc<FileLock> {
        self.locks
            .lock()
            .entry(registry_key(path))
            .or_default()
            .clone()
    }
}

/// Key under which a file's pager and lock are registered: the canonical
/// parent directory joined with the file name, so spellings of one path
/// share state whether or not the file exists yet. Falls back to the path
/// as given when the directory cannot be resolved.
fn registry_key(path: &Path) -> PathBuf {
    let (Some(parent), Some(file_name)) = (path.parent(), path.file_name()) else {
        return path.to_path_buf();
    };
    let parent = if parent.as_os_str().is_empty() {
        Path::new(".")
    } else {
        parent
    };
    match parent.canonicalize() {
        Ok(dir) => dir.join(file_name),
        Err(_) => path.to_path_buf(),
    }
}
