use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

/// In-process registry of per-folder locks.
///
/// [`acquire`](Self::acquire) hands out a [`FolderLock`] that refers to the one mutex
/// registered for the folder; the registry map itself is only locked for lookup, insertion
/// and holder bookkeeping. Entries are removed when their last holder is dropped, so the map
/// only ever contains folders with live holders.
#[derive(Debug, Default)]
pub struct PathLockRegistry {
    locks: Mutex<HashMap<String, RegistryEntry>>,
}

#[derive(Debug)]
struct RegistryEntry {
    lock: Arc<Mutex<()>>,
    holders: usize,
}

impl PathLockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide registry, for callers that build caches independently but must still
    /// contend on the same folders.
    pub fn global() -> Arc<PathLockRegistry> {
        static GLOBAL: OnceLock<Arc<PathLockRegistry>> = OnceLock::new();
        GLOBAL.get_or_init(|| Arc::new(PathLockRegistry::new())).clone()
    }

    /// Register a holder for `folder` and return its handle.
    ///
    /// Does not block on the folder itself; call [`FolderLock::lock`] to enter the critical
    /// section. Dropping the handle releases the registration.
    pub fn acquire(&self, folder: &str) -> FolderLock<'_> {
        let mut locks = self
            .locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let entry = locks
            .entry(folder.to_owned())
            .or_insert_with(|| RegistryEntry {
                lock: Arc::new(Mutex::new(())),
                holders: 0,
            });
        entry.holders += 1;

        tracing::trace!(
            target: "unzip.cache",
            folder,
            holders = entry.holders,
            "registered folder lock holder"
        );

        FolderLock {
            registry: self,
            folder: folder.to_owned(),
            lock: Arc::clone(&entry.lock),
        }
    }

    /// Number of folders that currently have at least one registered holder.
    pub fn len(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn release(&self, folder: &str) {
        let mut locks = self
            .locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let Some(entry) = locks.get_mut(folder) else {
            return;
        };
        entry.holders = entry.holders.saturating_sub(1);
        if entry.holders == 0 {
            locks.remove(folder);
        }
    }
}

/// Registered handle on one folder's lock.
///
/// Every live handle for the same folder shares the same underlying mutex. Declare the guard
/// returned by [`lock`](Self::lock) after the handle so it is dropped first:
///
/// ```
/// # use unzip_cache::PathLockRegistry;
/// let registry = PathLockRegistry::new();
/// let folder_lock = registry.acquire("/org/example/1.0/");
/// let _guard = folder_lock.lock();
/// // critical section
/// ```
#[derive(Debug)]
pub struct FolderLock<'a> {
    registry: &'a PathLockRegistry,
    folder: String,
    lock: Arc<Mutex<()>>,
}

impl FolderLock<'_> {
    pub fn folder(&self) -> &str {
        &self.folder
    }

    /// Block until this thread holds the folder exclusively.
    pub fn lock(&self) -> MutexGuard<'_, ()> {
        // A panic inside another critical section leaves nothing half-updated in `()`.
        self.lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Whether both handles refer to the same underlying lock.
    pub fn same_lock(&self, other: &FolderLock<'_>) -> bool {
        Arc::ptr_eq(&self.lock, &other.lock)
    }
}

impl Drop for FolderLock<'_> {
    fn drop(&mut self) {
        self.registry.release(&self.folder);
    }
}
