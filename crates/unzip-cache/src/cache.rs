use std::sync::Arc;

use unzip_archive::{Archive, ZippedEntry};

use crate::error::{CacheError, Result};
use crate::lock::PathLockRegistry;
use crate::path::ArchivePath;
use crate::policy::release_redeploy_enabled;
use crate::snapshots::SnapshotReconciler;
use crate::store::{LocalFile, LocalStorage, MasterRepository};

/// Local cache of archives fronting a master repository.
///
/// Every operation runs under the lock of the archive's parent folder, so at most one caller
/// populates or refreshes a given folder at a time.
#[derive(Clone)]
pub struct ArchiveCache {
    local: Arc<dyn LocalStorage>,
    master: Arc<dyn MasterRepository>,
    locks: Arc<PathLockRegistry>,
}

impl std::fmt::Debug for ArchiveCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveCache")
            .field("locks", &self.locks)
            .finish_non_exhaustive()
    }
}

impl ArchiveCache {
    /// A cache contending on the process-wide [`PathLockRegistry::global`] registry.
    pub fn new(local: Arc<dyn LocalStorage>, master: Arc<dyn MasterRepository>) -> Self {
        Self::with_locks(local, master, PathLockRegistry::global())
    }

    pub fn with_locks(
        local: Arc<dyn LocalStorage>,
        master: Arc<dyn MasterRepository>,
        locks: Arc<PathLockRegistry>,
    ) -> Self {
        Self {
            local,
            master,
            locks,
        }
    }

    pub fn locks(&self) -> &Arc<PathLockRegistry> {
        &self.locks
    }

    /// A reconciler pruning this cache's local store under the same folder locks.
    pub fn reconciler(&self) -> SnapshotReconciler {
        SnapshotReconciler::new(Arc::clone(&self.local), Arc::clone(&self.locks))
    }

    /// Returns the locally cached copy of the archive at `path`, populating it from the master
    /// repository when absent.
    ///
    /// When the master is a release repository that allows redeploys, a cached copy is checked
    /// against the master's modification time on every call and replaced if the master's copy
    /// is strictly newer. Otherwise a cached copy is returned without contacting the master.
    ///
    /// Fails with [`CacheError::NotFound`] when neither the cache nor the master has the
    /// archive, and with [`CacheError::Storage`] for any other fault.
    pub fn get_archive(&self, path: &str) -> Result<LocalFile> {
        let path = ArchivePath::new(path);
        let folder = path.parent_folder();

        let folder_lock = self.locks.acquire(&folder);
        let _guard = folder_lock.lock();

        let key = path.as_str();
        let cached = self
            .local
            .contains_item(key)
            .map_err(|err| CacheError::from_local(key, err))?;

        if !cached {
            tracing::debug!(target: "unzip.cache", path = %path, "cache miss; retrieving archive");
            self.populate(key)?;
        } else if release_redeploy_enabled(self.master.as_ref()) {
            self.refresh_if_redeployed(key)?;
        } else {
            tracing::trace!(target: "unzip.cache", path = %path, "cache hit");
        }

        self.local
            .local_file(key)
            .map_err(|err| CacheError::from_local(key, err))
    }

    /// Index the members of the archive at `path`, populating the cache as
    /// [`get_archive`](Self::get_archive) does.
    pub fn members(&self, path: &str) -> Result<Vec<ZippedEntry>> {
        let file = self.get_archive(path)?;
        Ok(Archive::new(file.path).entries()?)
    }

    /// Look up one member of the archive at `path`; `Ok(None)` when the archive has no such
    /// member.
    pub fn member(&self, path: &str, name: &str) -> Result<Option<ZippedEntry>> {
        let file = self.get_archive(path)?;
        Ok(Archive::new(file.path).entry(name)?)
    }

    // Callers must hold the folder lock for `path`.
    fn populate(&self, path: &str) -> Result<()> {
        let item = self
            .master
            .retrieve_item(path)
            .map_err(|err| CacheError::from_master(path, err))?;
        let modified_millis = item.modified_millis();
        self.local
            .store_item(item)
            .map_err(|err| CacheError::from_local(path, err))?;

        tracing::debug!(
            target: "unzip.cache",
            path,
            modified_millis,
            "cached archive"
        );
        Ok(())
    }

    // Callers must hold the folder lock for `path`.
    fn refresh_if_redeployed(&self, path: &str) -> Result<()> {
        let upstream = self
            .master
            .retrieve_modified(path)
            .map_err(|err| CacheError::from_master(path, err))?;
        let cached = self
            .local
            .local_file(path)
            .map_err(|err| CacheError::from_local(path, err))?
            .modified_millis;

        if upstream <= cached {
            tracing::trace!(
                target: "unzip.cache",
                path,
                upstream,
                cached,
                "cached archive is current"
            );
            return Ok(());
        }

        tracing::debug!(
            target: "unzip.cache",
            path,
            upstream,
            cached,
            "archive was redeployed; refreshing cached copy"
        );
        self.populate(path)
    }
}
