use std::collections::{BTreeMap, HashMap};
use std::io::Read;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use unzip_cache::{
    normalize_item_path, LocalFile, LocalStorage, StorageError, StorageItem, StorageResult,
    StoredItem,
};

use crate::lock;

/// Fault injected into [`MemoryStorage`] operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Fault {
    NotFound,
    Unsupported,
    Storage,
}

impl Fault {
    fn to_error(self, operation: &'static str, path: &str) -> StorageError {
        match self {
            Fault::NotFound => StorageError::not_found(path),
            Fault::Unsupported => StorageError::UnsupportedOperation {
                operation,
                path: path.to_owned(),
            },
            Fault::Storage => StorageError::other(format!("injected {operation} fault for {path}")),
        }
    }
}

#[derive(Clone, Debug)]
struct MemoryItem {
    modified_millis: u64,
    bytes: Vec<u8>,
}

/// In-memory [`LocalStorage`] with fault injection.
///
/// [`LocalStorage::local_file`] reports a synthetic path equal to the item path; nothing is
/// written to disk.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: Mutex<BTreeMap<String, MemoryItem>>,
    delete_faults: Mutex<HashMap<String, Fault>>,
    list_fault: Mutex<Option<Fault>>,
    stores: AtomicUsize,
    deletes: AtomicUsize,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds an item without counting it as a store.
    pub fn insert(&self, path: &str, modified_millis: u64, bytes: impl Into<Vec<u8>>) {
        lock(&self.items).insert(
            normalize_item_path(path),
            MemoryItem {
                modified_millis,
                bytes: bytes.into(),
            },
        );
    }

    pub fn content(&self, path: &str) -> Option<Vec<u8>> {
        lock(&self.items)
            .get(&normalize_item_path(path))
            .map(|item| item.bytes.clone())
    }

    pub fn modified_millis(&self, path: &str) -> Option<u64> {
        lock(&self.items)
            .get(&normalize_item_path(path))
            .map(|item| item.modified_millis)
    }

    /// Every stored path, sorted.
    pub fn paths(&self) -> Vec<String> {
        lock(&self.items).keys().cloned().collect()
    }

    /// Makes every deletion of `path` fail with `fault`.
    pub fn fail_delete(&self, path: &str, fault: Fault) {
        lock(&self.delete_faults).insert(normalize_item_path(path), fault);
    }

    /// Makes every listing fail with `fault`.
    pub fn fail_list(&self, fault: Fault) {
        *lock(&self.list_fault) = Some(fault);
    }

    /// Number of successful [`LocalStorage::store_item`] calls.
    pub fn store_count(&self) -> usize {
        self.stores.load(Ordering::SeqCst)
    }

    /// Number of successful [`LocalStorage::delete_item`] calls.
    pub fn delete_count(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }
}

impl LocalStorage for MemoryStorage {
    fn contains_item(&self, path: &str) -> StorageResult<bool> {
        Ok(lock(&self.items).contains_key(path))
    }

    fn store_item(&self, item: StorageItem) -> StorageResult<()> {
        let path = normalize_item_path(item.path());
        let modified_millis = item.modified_millis();
        let mut bytes = Vec::new();
        item.into_content().read_to_end(&mut bytes)?;

        lock(&self.items).insert(
            path,
            MemoryItem {
                modified_millis,
                bytes,
            },
        );
        self.stores.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn list_items(&self, folder: &str) -> StorageResult<Vec<StoredItem>> {
        if let Some(fault) = *lock(&self.list_fault) {
            return Err(fault.to_error("list", folder));
        }

        let items = lock(&self.items);
        let listed: Vec<StoredItem> = items
            .iter()
            .filter(|(path, _)| path.starts_with(folder))
            .map(|(path, item)| StoredItem {
                path: path.clone(),
                modified_millis: item.modified_millis,
            })
            .collect();
        if listed.is_empty() && folder != "/" {
            return Err(StorageError::not_found(folder));
        }
        Ok(listed)
    }

    fn delete_item(&self, path: &str) -> StorageResult<()> {
        if let Some(fault) = lock(&self.delete_faults).get(path).copied() {
            return Err(fault.to_error("delete", path));
        }

        let mut items = lock(&self.items);
        let removed = if path.ends_with('/') {
            let before = items.len();
            items.retain(|item_path, _| !item_path.starts_with(path));
            before != items.len()
        } else {
            items.remove(path).is_some()
        };
        if !removed {
            return Err(StorageError::not_found(path));
        }
        self.deletes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn local_file(&self, path: &str) -> StorageResult<LocalFile> {
        let items = lock(&self.items);
        let item = items
            .get(path)
            .ok_or_else(|| StorageError::not_found(path))?;
        Ok(LocalFile {
            path: PathBuf::from(path),
            modified_millis: item.modified_millis,
        })
    }
}
