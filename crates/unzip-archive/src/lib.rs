//! Read access to zip archives held in the local cache.
//!
//! An [`Archive`] reads the central directory once to describe its members as
//! [`ZippedEntry`] values. Entries keep only metadata; their content is streamed from the
//! archive file on demand, so serving one member never requires unpacking the whole archive.

mod entry;
mod error;
mod mime;

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use zip::result::ZipError;
use zip::ZipArchive;

pub use entry::{EntryReader, ZippedEntry};
pub use error::{ArchiveError, Result};
pub use mime::{mime_type_for, DEFAULT_MIME_TYPE};

#[derive(Clone, Debug)]
pub struct Archive {
    path: PathBuf,
}

impl Archive {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Describe every file member of the archive (directories are skipped).
    pub fn entries(&self) -> Result<Vec<ZippedEntry>> {
        let mut zip = self.open()?;
        let mut out = Vec::with_capacity(zip.len());
        for index in 0..zip.len() {
            let member = zip
                .by_index_raw(index)
                .map_err(|err| ArchiveError::zip(&self.path, err))?;
            if !member.is_file() {
                continue;
            }
            out.push(ZippedEntry::new(
                self.path.clone(),
                member.name(),
                member.size(),
                member.last_modified().map(entry::zip_time_millis).unwrap_or(0),
            ));
        }

        tracing::debug!(
            target: "unzip.archive",
            archive = %self.path.display(),
            members = out.len(),
            "indexed archive members"
        );
        Ok(out)
    }

    /// Describe a single member.
    ///
    /// Returns `Ok(None)` when the member isn't present or names a directory.
    pub fn entry(&self, name: &str) -> Result<Option<ZippedEntry>> {
        let name = normalize_member_name(name);
        let mut zip = self.open()?;
        let Some(index) = zip.index_for_name(name) else {
            return Ok(None);
        };
        let member = zip
            .by_index_raw(index)
            .map_err(|err| ArchiveError::zip(&self.path, err))?;
        if !member.is_file() {
            return Ok(None);
        }
        Ok(Some(ZippedEntry::new(
            self.path.clone(),
            member.name(),
            member.size(),
            member.last_modified().map(entry::zip_time_millis).unwrap_or(0),
        )))
    }

    /// Read a file from the archive.
    ///
    /// Returns `Ok(None)` when the file isn't present.
    pub fn read(&self, name: &str) -> Result<Option<Vec<u8>>> {
        let name = normalize_member_name(name);
        let mut zip = self.open()?;
        let result = match zip.by_name(name) {
            Ok(mut member) => {
                let mut buf = Vec::new();
                member
                    .read_to_end(&mut buf)
                    .map_err(|err| ArchiveError::io(&self.path, err))?;
                Ok(Some(buf))
            }
            Err(ZipError::FileNotFound) => Ok(None),
            Err(err) => Err(ArchiveError::zip(&self.path, err)),
        };
        result
    }

    fn open(&self) -> Result<ZipArchive<File>> {
        let file = File::open(&self.path).map_err(|err| ArchiveError::io(&self.path, err))?;
        ZipArchive::new(file).map_err(|err| ArchiveError::zip(&self.path, err))
    }
}

fn normalize_member_name(name: &str) -> &str {
    name.trim_start_matches('/')
}
