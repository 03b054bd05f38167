//! Collaborator interfaces consumed by the cache.
//!
//! All paths passed to these traits are normalized repository paths (see
//! [`normalize_item_path`](crate::normalize_item_path)).

use std::fmt;
use std::io::{Cursor, Read};
use std::path::PathBuf;

use crate::error::StorageResult;
use crate::policy::{RepositoryPolicy, WritePolicy};

/// An item retrieved from a repository: its path, modification time and content.
pub struct StorageItem {
    path: String,
    modified_millis: u64,
    content: Box<dyn Read + Send>,
}

impl StorageItem {
    pub fn new(
        path: impl Into<String>,
        modified_millis: u64,
        content: impl Read + Send + 'static,
    ) -> Self {
        Self {
            path: path.into(),
            modified_millis,
            content: Box::new(content),
        }
    }

    pub fn from_bytes(path: impl Into<String>, modified_millis: u64, bytes: Vec<u8>) -> Self {
        Self::new(path, modified_millis, Cursor::new(bytes))
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Modification time in milliseconds since the unix epoch.
    pub fn modified_millis(&self) -> u64 {
        self.modified_millis
    }

    pub fn into_content(self) -> Box<dyn Read + Send> {
        self.content
    }
}

impl fmt::Debug for StorageItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageItem")
            .field("path", &self.path)
            .field("modified_millis", &self.modified_millis)
            .finish_non_exhaustive()
    }
}

/// An item reported by [`LocalStorage::list_items`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredItem {
    pub path: String,
    pub modified_millis: u64,
}

/// A cached archive as a file on local disk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocalFile {
    pub path: PathBuf,
    pub modified_millis: u64,
}

/// The local store backing the cache.
pub trait LocalStorage: Send + Sync {
    fn contains_item(&self, path: &str) -> StorageResult<bool>;

    /// Persist `item` at its path, replacing any previous copy. Readers must never observe a
    /// partially written item.
    fn store_item(&self, item: StorageItem) -> StorageResult<()>;

    /// Every cached item beneath `folder`.
    ///
    /// Fails with [`StorageError::NotFound`](crate::StorageError::NotFound) when the folder
    /// does not exist.
    fn list_items(&self, folder: &str) -> StorageResult<Vec<StoredItem>>;

    fn delete_item(&self, path: &str) -> StorageResult<()>;

    fn local_file(&self, path: &str) -> StorageResult<LocalFile>;
}

/// The authoritative repository the cache falls back to.
pub trait MasterRepository: Send + Sync {
    /// Fails with `NotFound`, `AccessDenied` or any other storage fault.
    fn retrieve_item(&self, path: &str) -> StorageResult<StorageItem>;

    /// Modification time of the item at `path`.
    ///
    /// Repositories that can answer from metadata alone should override this; the default
    /// retrieves the whole item.
    fn retrieve_modified(&self, path: &str) -> StorageResult<u64> {
        Ok(self.retrieve_item(path)?.modified_millis())
    }

    /// `None` when the repository is not versioned at all.
    fn repository_policy(&self) -> Option<RepositoryPolicy>;

    fn write_policy(&self) -> WritePolicy;
}
