use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::{Component, Path, PathBuf};

use filetime::FileTime;
use walkdir::WalkDir;

use crate::error::{StorageError, StorageResult};
use crate::path::{normalize_item_path, PATH_SEPARATOR};
use crate::policy::{RepositoryPolicy, WritePolicy};
use crate::store::{LocalFile, LocalStorage, MasterRepository, StorageItem, StoredItem};
use crate::util::{atomic_write_with, is_temp_file_name, millis_system_time, system_time_millis};

/// Directory-backed repository addressing items by path under `root`.
///
/// Serves both as the cache's [`LocalStorage`] and as a [`MasterRepository`] (for instance a
/// mounted release share). Stored files carry the item's modification time rather than the
/// time they were written.
#[derive(Clone, Debug)]
pub struct FsRepository {
    root: PathBuf,
    repository_policy: Option<RepositoryPolicy>,
    write_policy: WritePolicy,
}

impl FsRepository {
    /// A non-versioned, read-only repository rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            repository_policy: None,
            write_policy: WritePolicy::ReadOnly,
        }
    }

    pub fn with_policies(
        root: impl Into<PathBuf>,
        repository_policy: Option<RepositoryPolicy>,
        write_policy: WritePolicy,
    ) -> Self {
        Self {
            root: root.into(),
            repository_policy,
            write_policy,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Maps a repository path onto the filesystem. Paths may not escape the root.
    fn resolve(&self, path: &str) -> StorageResult<PathBuf> {
        let normalized = normalize_item_path(path);
        let mut resolved = self.root.clone();
        for segment in normalized.split(PATH_SEPARATOR).filter(|s| !s.is_empty()) {
            match Path::new(segment).components().next() {
                Some(Component::Normal(_)) if segment != "." => resolved.push(segment),
                _ => {
                    return Err(StorageError::AccessDenied { path: normalized });
                }
            }
        }
        Ok(resolved)
    }

    fn item_path(&self, file: &Path) -> Option<String> {
        let relative = file.strip_prefix(&self.root).ok()?;
        let mut out = String::new();
        for component in relative.components() {
            let Component::Normal(segment) = component else {
                return None;
            };
            out.push(PATH_SEPARATOR);
            out.push_str(segment.to_str()?);
        }
        Some(out)
    }
}

fn io_error(path: &str, err: io::Error) -> StorageError {
    match err.kind() {
        io::ErrorKind::NotFound => StorageError::not_found(path),
        io::ErrorKind::PermissionDenied => StorageError::AccessDenied {
            path: path.to_owned(),
        },
        _ => StorageError::Io(err),
    }
}

fn file_metadata(path: &str, file: &Path) -> StorageResult<fs::Metadata> {
    let meta = fs::metadata(file).map_err(|err| io_error(path, err))?;
    if !meta.is_file() {
        return Err(StorageError::not_found(path));
    }
    Ok(meta)
}

fn modified_millis(meta: &fs::Metadata) -> StorageResult<u64> {
    Ok(system_time_millis(meta.modified()?))
}

impl LocalStorage for FsRepository {
    fn contains_item(&self, path: &str) -> StorageResult<bool> {
        let file = self.resolve(path)?;
        match fs::metadata(&file) {
            Ok(meta) => Ok(meta.is_file()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(io_error(path, err)),
        }
    }

    fn store_item(&self, item: StorageItem) -> StorageResult<()> {
        let dest = self.resolve(item.path())?;
        let modified = FileTime::from_system_time(millis_system_time(item.modified_millis()));
        let path = item.path().to_owned();
        let mut content = item.into_content();

        atomic_write_with(&dest, |out| {
            io::copy(&mut content, out)?;
            filetime::set_file_handle_times(out, None, Some(modified))?;
            Ok(())
        })?;

        tracing::trace!(target: "unzip.cache", path = %path, file = %dest.display(), "stored item");
        Ok(())
    }

    fn list_items(&self, folder: &str) -> StorageResult<Vec<StoredItem>> {
        let dir = self.resolve(folder)?;
        match fs::metadata(&dir) {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => return Err(StorageError::not_found(folder)),
            Err(err) => return Err(io_error(folder, err)),
        }

        let mut items = Vec::new();
        for entry in WalkDir::new(&dir).follow_links(false) {
            let entry = match entry {
                Ok(entry) => entry,
                // Deleted concurrently with the walk.
                Err(err) if err.io_error().map(io::Error::kind) == Some(io::ErrorKind::NotFound) => {
                    continue
                }
                Err(err) => return Err(StorageError::Io(io::Error::from(err))),
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy();
            if is_temp_file_name(&name) {
                continue;
            }
            let Some(path) = self.item_path(entry.path()) else {
                tracing::debug!(
                    target: "unzip.cache",
                    file = %entry.path().display(),
                    "skipping file without a representable repository path"
                );
                continue;
            };
            let meta = match entry.metadata() {
                Ok(meta) => meta,
                Err(err) if err.io_error().map(io::Error::kind) == Some(io::ErrorKind::NotFound) => {
                    continue
                }
                Err(err) => return Err(StorageError::Io(io::Error::from(err))),
            };
            items.push(StoredItem {
                path,
                modified_millis: modified_millis(&meta)?,
            });
        }

        items.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(items)
    }

    fn delete_item(&self, path: &str) -> StorageResult<()> {
        let target = self.resolve(path)?;
        if target == self.root {
            return Err(StorageError::UnsupportedOperation {
                operation: "delete",
                path: normalize_item_path(path),
            });
        }

        let meta = fs::symlink_metadata(&target).map_err(|err| io_error(path, err))?;
        let result = if meta.is_dir() {
            fs::remove_dir_all(&target)
        } else {
            fs::remove_file(&target)
        };
        result.map_err(|err| io_error(path, err))
    }

    fn local_file(&self, path: &str) -> StorageResult<LocalFile> {
        let file = self.resolve(path)?;
        let meta = file_metadata(path, &file)?;
        Ok(LocalFile {
            path: file,
            modified_millis: modified_millis(&meta)?,
        })
    }
}

impl MasterRepository for FsRepository {
    fn retrieve_item(&self, path: &str) -> StorageResult<StorageItem> {
        let source = self.resolve(path)?;
        let meta = file_metadata(path, &source)?;
        let file = File::open(&source).map_err(|err| io_error(path, err))?;
        Ok(StorageItem::new(
            normalize_item_path(path),
            modified_millis(&meta)?,
            BufReader::new(file),
        ))
    }

    fn retrieve_modified(&self, path: &str) -> StorageResult<u64> {
        let source = self.resolve(path)?;
        modified_millis(&file_metadata(path, &source)?)
    }

    fn repository_policy(&self) -> Option<RepositoryPolicy> {
        self.repository_policy
    }

    fn write_policy(&self) -> WritePolicy {
        self.write_policy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn read_all(item: StorageItem) -> Vec<u8> {
        let mut buf = Vec::new();
        item.into_content().read_to_end(&mut buf).unwrap();
        buf
    }

    #[test]
    fn store_then_retrieve_keeps_content_and_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        let repo = FsRepository::new(dir.path());

        repo.store_item(StorageItem::from_bytes(
            "/org/x/1.0/x-1.0.zip",
            1_393_677_000_000,
            b"zip bytes".to_vec(),
        ))
        .unwrap();

        assert!(repo.contains_item("org/x/1.0/x-1.0.zip").unwrap());
        let local = repo.local_file("/org/x/1.0/x-1.0.zip").unwrap();
        assert_eq!(local.path, dir.path().join("org/x/1.0/x-1.0.zip"));
        assert_eq!(local.modified_millis, 1_393_677_000_000);

        let item = repo.retrieve_item("/org/x/1.0/x-1.0.zip").unwrap();
        assert_eq!(item.path(), "/org/x/1.0/x-1.0.zip");
        assert_eq!(item.modified_millis(), 1_393_677_000_000);
        assert_eq!(read_all(item), b"zip bytes");
        assert_eq!(
            repo.retrieve_modified("/org/x/1.0/x-1.0.zip").unwrap(),
            1_393_677_000_000
        );
    }

    #[test]
    fn paths_cannot_escape_the_root() {
        let dir = tempfile::tempdir().unwrap();
        let repo = FsRepository::new(dir.path().join("repo"));

        let err = repo.contains_item("/../secret.zip").unwrap_err();
        assert!(matches!(err, StorageError::AccessDenied { .. }), "{err:?}");
        let err = repo.retrieve_item("a/./b.zip").unwrap_err();
        assert!(matches!(err, StorageError::AccessDenied { .. }), "{err:?}");
    }

    #[test]
    fn missing_items_are_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let repo = FsRepository::new(dir.path());
        fs::create_dir_all(dir.path().join("folder")).unwrap();

        assert!(!repo.contains_item("/a.zip").unwrap());
        assert!(!repo.contains_item("/folder").unwrap());
        assert!(repo.retrieve_item("/a.zip").unwrap_err().is_not_found());
        assert!(repo.retrieve_modified("/folder").unwrap_err().is_not_found());
        assert!(repo.local_file("/a.zip").unwrap_err().is_not_found());
        assert!(repo.delete_item("/a.zip").unwrap_err().is_not_found());
        assert!(repo.list_items("/missing/").unwrap_err().is_not_found());
    }

    #[test]
    fn list_items_is_recursive_and_skips_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let repo = FsRepository::new(dir.path());
        for path in ["/a/1.0-SNAPSHOT/x", "/a/1.0-SNAPSHOT/y", "/a/2.0/z", "/b/w"] {
            repo.store_item(StorageItem::from_bytes(path, 1_000, Vec::new()))
                .unwrap();
        }
        fs::write(dir.path().join("a/2.0/z.tmp.12.3"), b"partial").unwrap();

        let listed: Vec<String> = repo
            .list_items("/a/")
            .unwrap()
            .into_iter()
            .map(|item| item.path)
            .collect();
        assert_eq!(listed, ["/a/1.0-SNAPSHOT/x", "/a/1.0-SNAPSHOT/y", "/a/2.0/z"]);

        assert_eq!(repo.list_items("/").unwrap().len(), 4);
    }

    #[test]
    fn delete_removes_files_and_directories_but_not_the_root() {
        let dir = tempfile::tempdir().unwrap();
        let repo = FsRepository::new(dir.path());
        for path in ["/a/1.0/x", "/a/1.0/y", "/a/2.0/z"] {
            repo.store_item(StorageItem::from_bytes(path, 1_000, Vec::new()))
                .unwrap();
        }

        repo.delete_item("/a/2.0/z").unwrap();
        assert!(!repo.contains_item("/a/2.0/z").unwrap());

        repo.delete_item("/a/1.0/").unwrap();
        assert!(!dir.path().join("a/1.0").exists());

        let err = repo.delete_item("/").unwrap_err();
        assert!(matches!(err, StorageError::UnsupportedOperation { .. }), "{err:?}");
    }

    #[test]
    fn policies_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let plain = FsRepository::new(dir.path());
        assert_eq!(plain.repository_policy(), None);
        assert_eq!(plain.write_policy(), WritePolicy::ReadOnly);

        let release = FsRepository::with_policies(
            dir.path(),
            Some(RepositoryPolicy::Release),
            WritePolicy::AllowWrite,
        );
        assert!(crate::policy::release_redeploy_enabled(&release));
    }
}
