//! Local cache of zip archives fronting a master repository.
//!
//! Building blocks:
//! - [`PathLockRegistry`]: per-folder locks serializing every cache operation in a folder
//! - [`ArchiveCache`]: fetch-on-miss, refresh-on-redeploy archive cache
//! - [`SnapshotReconciler`]: removal of cached snapshot builds superseded by a newer build
//! - [`FsRepository`]: directory-backed [`LocalStorage`] / [`MasterRepository`]
//!
//! ## On-disk layout
//!
//! With [`FsRepository`] as the local store, archives are cached at their repository path under
//! `<cache_root>/repositories/<repository>/`, where `<cache_root>` is `~/.unzip/cache` unless
//! overridden (see [`CacheConfig`]). Each cached file's modification time is the master's
//! modification time of the archive it was retrieved from.
//!
//! ## Locking
//!
//! Locks are in-process only. Two processes sharing one cache directory still never observe a
//! partially written archive (stores are atomic renames), but may both populate it.

mod cache;
mod cache_dir;
mod error;
mod fs_store;
mod lock;
mod path;
mod policy;
mod snapshots;
mod store;
mod util;

pub use cache::ArchiveCache;
pub use cache_dir::{cache_root, repository_cache_dir, CacheConfig, CACHE_DIR_ENV};
pub use error::{CacheError, Result, StorageError, StorageResult};
pub use fs_store::FsRepository;
pub use lock::{FolderLock, PathLockRegistry};
pub use path::{normalize_item_path, parent_folder, ArchivePath, PATH_SEPARATOR};
pub use policy::{redeploy_allowed, release_redeploy_enabled, RepositoryPolicy, WritePolicy};
pub use snapshots::{
    select_obsolete, CleanupReport, ConversionResult, DeletionAttempt, DeletionOutcome,
    ListingOutcome, SnapshotReconciler,
};
pub use store::{LocalFile, LocalStorage, MasterRepository, StorageItem, StoredItem};

pub use unzip_archive::{Archive, ArchiveError, EntryReader, ZippedEntry};
