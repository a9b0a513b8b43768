//! Cache handle and its options.
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use crate::diagnostics::{Diagnostics, TracingDiagnostics};
use crate::entry::CacheEntry;
use crate::errors::Result;
use crate::key::{self, Platform, DEFAULT_CACHE_ROOT};
use crate::rm;

/// Options for opening a [`Cache`].
///
/// ## Example
/// ```no_run
/// use odscache::{CacheOpts, Platform};
///
/// fn main() -> odscache::Result<()> {
///     let cache = CacheOpts::new().root("./my-cache").shared_locks(true).open();
///     let entry = cache.entry("abc", "csv", &Platform::Id("public".into()))?;
///     entry.fill_from_str("utf-8", "a;b\n")?;
///     Ok(())
/// }
/// ```
#[derive(Clone, Default)]
pub struct CacheOpts {
    pub(crate) root: Option<PathBuf>,
    pub(crate) diagnostics: Option<Arc<dyn Diagnostics>>,
    pub(crate) shared_locks: bool,
}

impl CacheOpts {
    /// Creates a blank set of cache options.
    pub fn new() -> CacheOpts {
        Default::default()
    }

    /// Directory under which every platform directory lives. Defaults to
    /// `.odsclient` relative to the working directory.
    pub fn root<P: AsRef<Path>>(mut self, root: P) -> Self {
        self.root = Some(root.as_ref().to_path_buf());
        self
    }

    /// Sink receiving every warning of entries from this cache. Defaults to
    /// [`TracingDiagnostics`].
    pub fn diagnostics(mut self, diagnostics: Arc<dyn Diagnostics>) -> Self {
        self.diagnostics = Some(diagnostics);
        self
    }

    /// When set, entries handed out for the same path share one lock, so
    /// independently obtained entries exclude each other. Off by default:
    /// each entry then has its own lock.
    pub fn shared_locks(mut self, shared: bool) -> Self {
        self.shared_locks = shared;
        self
    }

    /// Builds the cache handle. Nothing is created on disk.
    pub fn open(self) -> Cache {
        Cache {
            root: self.root.unwrap_or_else(|| PathBuf::from(DEFAULT_CACHE_ROOT)),
            diagnostics: self.diagnostics.unwrap_or_else(|| Arc::new(TracingDiagnostics)),
            locks: if self.shared_locks {
                Some(Arc::new(LockRegistry::default()))
            } else {
                None
            },
        }
    }
}

/// Hands out [`CacheEntry`] values rooted in one directory and clears them
/// in bulk.
#[derive(Clone)]
pub struct Cache {
    root: PathBuf,
    diagnostics: Arc<dyn Diagnostics>,
    locks: Option<Arc<LockRegistry>>,
}

impl Default for Cache {
    fn default() -> Self {
        CacheOpts::new().open()
    }
}

impl Cache {
    /// Cache rooted at `root` with default options.
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        CacheOpts::new().root(root).open()
    }

    /// Root directory of the cache.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Entry for `dataset_id` in `format` from `platform`. Fails only when
    /// the platform's base URL cannot be parsed.
    pub fn entry(&self, dataset_id: &str, format: &str, platform: &Platform) -> Result<CacheEntry> {
        let pseudo_id = platform.pseudo_id()?;
        let entry = CacheEntry::new(dataset_id, format, pseudo_id, &self.root)
            .with_diagnostics(self.diagnostics.clone());
        Ok(match &self.locks {
            Some(locks) => {
                let lock = locks.get(entry.file_path());
                entry.with_lock(lock)
            }
            None => entry,
        })
    }

    /// Removes every cached format of `dataset_id` from `platform`.
    pub fn clean_dataset(&self, dataset_id: &str, platform: &Platform) -> Result<usize> {
        rm::dataset(&self.root, &platform.pseudo_id()?, dataset_id)
    }

    /// Removes everything cached for `platform`.
    pub fn clean_platform(&self, platform: &Platform) -> Result<()> {
        rm::platform(&self.root, &platform.pseudo_id()?)
    }

    /// Removes the whole cache root.
    pub fn clean_all(&self) -> Result<()> {
        rm::all(&self.root)
    }

    /// Location an entry would have, without building it.
    pub fn entry_path(&self, dataset_id: &str, format: &str, platform: &Platform) -> Result<PathBuf> {
        Ok(key::entry_path(&self.root, &platform.pseudo_id()?, dataset_id, format))
    }
}

/// Path-keyed locks. Holds weak references only, so a lock lives exactly as
/// long as some entry uses it.
#[derive(Default)]
pub(crate) struct LockRegistry {
    locks: Mutex<HashMap<PathBuf, Weak<Mutex<()>>>>,
}

impl LockRegistry {
    pub(crate) fn get(&self, path: &Path) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(lock) = locks.get(path).and_then(Weak::upgrade) {
            return lock;
        }
        locks.retain(|_, lock| lock.strong_count() > 0);
        let lock = Arc::new(Mutex::new(()));
        locks.insert(path.to_path_buf(), Arc::downgrade(&lock));
        lock
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks.lock().unwrap().len()
    }
}
