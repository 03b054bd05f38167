use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use unzip_cache::{
    normalize_item_path, MasterRepository, RepositoryPolicy, StorageError, StorageItem,
    StorageResult, WritePolicy,
};

use crate::lock;

/// Scripted [`MasterRepository`] counting every call that reaches it.
///
/// Policy reads are not counted; [`retrieve_calls`](Self::retrieve_calls) and
/// [`probe_calls`](Self::probe_calls) count content retrievals and modification-time probes.
#[derive(Debug)]
pub struct MasterRepositoryMock {
    items: Mutex<HashMap<String, (u64, Vec<u8>)>>,
    denied: Mutex<HashSet<String>>,
    repository_policy: Mutex<Option<RepositoryPolicy>>,
    write_policy: Mutex<WritePolicy>,
    delay: Mutex<Duration>,
    retrieves: AtomicUsize,
    probes: AtomicUsize,
}

impl Default for MasterRepositoryMock {
    fn default() -> Self {
        Self::new(None, WritePolicy::ReadOnly)
    }
}

impl MasterRepositoryMock {
    pub fn new(repository_policy: Option<RepositoryPolicy>, write_policy: WritePolicy) -> Self {
        Self {
            items: Mutex::new(HashMap::new()),
            denied: Mutex::new(HashSet::new()),
            repository_policy: Mutex::new(repository_policy),
            write_policy: Mutex::new(write_policy),
            delay: Mutex::new(Duration::ZERO),
            retrieves: AtomicUsize::new(0),
            probes: AtomicUsize::new(0),
        }
    }

    /// A release repository that allows redeploying published archives.
    pub fn redeployable_release() -> Self {
        Self::new(Some(RepositoryPolicy::Release), WritePolicy::AllowWrite)
    }

    pub fn put(&self, path: &str, modified_millis: u64, bytes: impl Into<Vec<u8>>) {
        lock(&self.items).insert(normalize_item_path(path), (modified_millis, bytes.into()));
    }

    /// Makes every call for `path` fail with [`StorageError::AccessDenied`].
    pub fn deny(&self, path: &str) {
        lock(&self.denied).insert(normalize_item_path(path));
    }

    pub fn set_policies(&self, repository_policy: Option<RepositoryPolicy>, write_policy: WritePolicy) {
        *lock(&self.repository_policy) = repository_policy;
        *lock(&self.write_policy) = write_policy;
    }

    /// Delays every retrieval and probe, widening race windows.
    pub fn set_delay(&self, delay: Duration) {
        *lock(&self.delay) = delay;
    }

    pub fn retrieve_calls(&self) -> usize {
        self.retrieves.load(Ordering::SeqCst)
    }

    pub fn probe_calls(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }

    /// Retrievals plus probes.
    pub fn upstream_calls(&self) -> usize {
        self.retrieve_calls() + self.probe_calls()
    }

    fn lookup(&self, path: &str) -> StorageResult<(u64, Vec<u8>)> {
        let delay = *lock(&self.delay);
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        if lock(&self.denied).contains(path) {
            return Err(StorageError::AccessDenied {
                path: path.to_owned(),
            });
        }
        lock(&self.items)
            .get(path)
            .cloned()
            .ok_or_else(|| StorageError::not_found(path))
    }
}

impl MasterRepository for MasterRepositoryMock {
    fn retrieve_item(&self, path: &str) -> StorageResult<StorageItem> {
        self.retrieves.fetch_add(1, Ordering::SeqCst);
        let (modified_millis, bytes) = self.lookup(path)?;
        Ok(StorageItem::from_bytes(path, modified_millis, bytes))
    }

    fn retrieve_modified(&self, path: &str) -> StorageResult<u64> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        Ok(self.lookup(path)?.0)
    }

    fn repository_policy(&self) -> Option<RepositoryPolicy> {
        *lock(&self.repository_policy)
    }

    fn write_policy(&self) -> WritePolicy {
        *lock(&self.write_policy)
    }
}
