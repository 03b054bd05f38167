use std::sync::Arc;

use serde::Serialize;

use crate::error::StorageError;
use crate::lock::PathLockRegistry;
use crate::path::{normalize_item_path, parent_folder};
use crate::store::{LocalStorage, StoredItem};

/// Outcome of resolving a requested snapshot version.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ConversionResult {
    /// The requested path was rewritten to a concrete snapshot build.
    pub path_converted: bool,
    /// Whether the repository has any snapshot build for the requested version.
    pub snapshot_available: bool,
    /// Requested path up to where the build's version starts, e.g. `/org/x/1.0-SNAPSHOT/x-`.
    /// Its folder holds every build of the artifact and is the folder locked during cleanup.
    pub path_up_to_version: String,
    /// Identifier of the latest snapshot build, e.g. `1.0-20140301.123000-7`.
    pub latest_version: String,
}

impl ConversionResult {
    /// The path was rewritten to the build `latest_version`.
    ///
    /// ```
    /// use unzip_cache::ConversionResult;
    ///
    /// let conversion = ConversionResult::converted("/org/x/1.0-SNAPSHOT/x-", "1.0-20140302.1-2");
    /// assert!(conversion.needs_cleanup());
    /// ```
    pub fn converted(path_up_to_version: impl Into<String>, latest_version: impl Into<String>) -> Self {
        Self {
            path_converted: true,
            snapshot_available: true,
            path_up_to_version: path_up_to_version.into(),
            latest_version: latest_version.into(),
        }
    }

    /// No snapshot build exists for the requested version.
    pub fn no_snapshot(path_up_to_version: impl Into<String>) -> Self {
        Self {
            path_converted: false,
            snapshot_available: false,
            path_up_to_version: path_up_to_version.into(),
            latest_version: String::new(),
        }
    }

    /// A snapshot is available but the request already named it.
    pub fn unchanged(path_up_to_version: impl Into<String>, latest_version: impl Into<String>) -> Self {
        Self {
            path_converted: false,
            snapshot_available: true,
            path_up_to_version: path_up_to_version.into(),
            latest_version: latest_version.into(),
        }
    }

    pub fn needs_cleanup(&self) -> bool {
        self.path_converted || !self.snapshot_available
    }
}

/// What happened to one cached path selected for deletion.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DeletionOutcome {
    Deleted,
    /// Already removed, typically by someone cleaning the cache directory by hand.
    AlreadyGone,
    /// The local store does not support deleting this path.
    Unsupported { error: String },
    Failed { error: String },
}

impl DeletionOutcome {
    fn from_error(err: &StorageError) -> Self {
        match err {
            StorageError::UnsupportedOperation { .. } => Self::Unsupported {
                error: err.to_string(),
            },
            err if err.is_not_found() => Self::AlreadyGone,
            err => Self::Failed {
                error: err.to_string(),
            },
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Unsupported { .. } | Self::Failed { .. })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DeletionAttempt {
    pub path: String,
    #[serde(flatten)]
    pub outcome: DeletionOutcome,
}

/// How the folder listing went.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ListingOutcome {
    /// The conversion did not call for a cleanup; nothing was locked or listed.
    Skipped,
    Listed { items: usize },
    /// The folder no longer exists.
    FolderMissing,
    Failed { error: String },
}

/// Result summary from a [`SnapshotReconciler::clean_snapshots`] run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    /// Folder that was locked and listed.
    pub folder: Option<String>,
    pub listing: ListingOutcome,
    pub attempts: Vec<DeletionAttempt>,
}

impl CleanupReport {
    fn skipped() -> Self {
        Self {
            folder: None,
            listing: ListingOutcome::Skipped,
            attempts: Vec::new(),
        }
    }

    /// Paths that were actually removed by this run.
    pub fn deleted(&self) -> impl Iterator<Item = &str> {
        self.attempts
            .iter()
            .filter(|attempt| attempt.outcome == DeletionOutcome::Deleted)
            .map(|attempt| attempt.path.as_str())
    }

    pub fn failures(&self) -> impl Iterator<Item = &DeletionAttempt> {
        self.attempts
            .iter()
            .filter(|attempt| attempt.outcome.is_failure())
    }
}

/// Removes cached artifacts that no longer match the resolved snapshot version.
#[derive(Clone)]
pub struct SnapshotReconciler {
    local: Arc<dyn LocalStorage>,
    locks: Arc<PathLockRegistry>,
}

impl std::fmt::Debug for SnapshotReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotReconciler")
            .field("locks", &self.locks)
            .finish_non_exhaustive()
    }
}

impl SnapshotReconciler {
    pub fn new(local: Arc<dyn LocalStorage>, locks: Arc<PathLockRegistry>) -> Self {
        Self { local, locks }
    }

    /// Deletes cached artifacts made obsolete by `conversion`.
    ///
    /// Does nothing unless [`ConversionResult::needs_cleanup`]. Otherwise, under the lock of
    /// the folder enclosing `path_up_to_version`, deletes every cached item beneath it when no
    /// snapshot is available, or only the items under `path_up_to_version` that do not belong
    /// to `latest_version`. Faults are logged and recorded in the report; they never abort the
    /// remaining deletions.
    pub fn clean_snapshots(&self, conversion: &ConversionResult) -> CleanupReport {
        if !conversion.needs_cleanup() {
            return CleanupReport::skipped();
        }

        let folder = parent_folder(&conversion.path_up_to_version);
        let folder_lock = self.locks.acquire(&folder);
        let _guard = folder_lock.lock();

        tracing::debug!(
            target: "unzip.cache",
            folder = %folder,
            "looking for outdated cached snapshot artifacts"
        );

        let items = match self.local.list_items(&folder) {
            Ok(items) => items,
            Err(err) if err.is_not_found() => {
                tracing::debug!(
                    target: "unzip.cache",
                    folder = %folder,
                    "cache folder is gone; nothing to clean"
                );
                return CleanupReport {
                    folder: Some(folder),
                    listing: ListingOutcome::FolderMissing,
                    attempts: Vec::new(),
                };
            }
            Err(err) => {
                tracing::warn!(
                    target: "unzip.cache",
                    folder = %folder,
                    error = %err,
                    "failed to list cached items"
                );
                return CleanupReport {
                    folder: Some(folder),
                    listing: ListingOutcome::Failed {
                        error: err.to_string(),
                    },
                    attempts: Vec::new(),
                };
            }
        };

        let listed = items.len();
        let obsolete = select_obsolete(items, conversion);
        if obsolete.is_empty() {
            tracing::debug!(
                target: "unzip.cache",
                folder = %folder,
                "no outdated cached snapshot artifacts found"
            );
        }

        let attempts = obsolete
            .into_iter()
            .map(|path| {
                let outcome = match self.local.delete_item(&path) {
                    Ok(()) => {
                        tracing::debug!(
                            target: "unzip.cache",
                            path = %path,
                            "deleted outdated cached snapshot artifact"
                        );
                        DeletionOutcome::Deleted
                    }
                    Err(err) => {
                        let outcome = DeletionOutcome::from_error(&err);
                        if outcome.is_failure() {
                            tracing::warn!(
                                target: "unzip.cache",
                                path = %path,
                                error = %err,
                                "unable to delete cached item"
                            );
                        }
                        outcome
                    }
                };
                DeletionAttempt { path, outcome }
            })
            .collect();

        CleanupReport {
            folder: Some(folder),
            listing: ListingOutcome::Listed { items: listed },
            attempts,
        }
    }
}

/// Paths of the listed items made obsolete by `conversion`.
///
/// Returns owned path strings so no listing state is held while deleting.
pub fn select_obsolete(items: Vec<StoredItem>, conversion: &ConversionResult) -> Vec<String> {
    if !conversion.snapshot_available {
        return items.into_iter().map(|item| item.path).collect();
    }

    let prefix = normalize_item_path(&conversion.path_up_to_version);
    items
        .into_iter()
        .map(|item| item.path)
        .filter(|path| {
            normalize_item_path(path).starts_with(&prefix)
                && !path.contains(conversion.latest_version.as_str())
        })
        .collect()
}
