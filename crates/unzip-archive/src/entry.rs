use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom, Take};
use std::path::{Path, PathBuf};

use flate2::read::DeflateDecoder;
use flate2::Crc;
use zip::result::ZipError;
use zip::{CompressionMethod, ZipArchive};

use crate::error::{ArchiveError, Result};
use crate::mime::mime_type_for;

/// A single file inside a cached zip archive, exposed as a standalone item.
///
/// Size and modification time are copied from the archive's central directory when the entry
/// is discovered and never recomputed. Content is not held: every call to
/// [`ZippedEntry::open_content`] re-opens the archive and returns a fresh stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ZippedEntry {
    archive: PathBuf,
    name: String,
    length: u64,
    modified_millis: u64,
}

impl ZippedEntry {
    pub fn new(
        archive: impl Into<PathBuf>,
        name: impl Into<String>,
        length: u64,
        modified_millis: u64,
    ) -> Self {
        Self {
            archive: archive.into(),
            name: name.into(),
            length,
            modified_millis,
        }
    }

    /// Local path of the archive holding this member.
    pub fn archive(&self) -> &Path {
        &self.archive
    }

    /// Member path inside the archive (`/`-separated, no leading slash).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Uncompressed size in bytes.
    pub fn length(&self) -> u64 {
        self.length
    }

    /// Modification time in milliseconds since the unix epoch (`0` when the archive has none).
    pub fn modified_millis(&self) -> u64 {
        self.modified_millis
    }

    pub fn mime_type(&self) -> &'static str {
        mime_type_for(&self.name)
    }

    /// Open a new stream over the member's bytes.
    ///
    /// The archive is re-opened and the member located again on every call, so a refreshed
    /// archive is picked up and no handle is shared between readers. Offsets are read from and
    /// applied to the same open file. The stream fails with [`io::ErrorKind::InvalidData`] at
    /// end of data when the content does not match the member's CRC-32. The returned reader is
    /// single-use.
    pub fn open_content(&self) -> Result<EntryReader> {
        let (mut file, member) = self.locate()?;

        file.seek(SeekFrom::Start(member.data_start))
            .map_err(|err| ArchiveError::io(&self.archive, err))?;
        let raw = BufReader::new(file).take(member.compressed_size);

        let inner = match member.compression {
            CompressionMethod::Stored => ReaderInner::Stored(raw),
            CompressionMethod::Deflated => ReaderInner::Deflated(DeflateDecoder::new(raw)),
            other => {
                return Err(ArchiveError::UnsupportedCompression {
                    archive: self.archive.clone(),
                    member: self.name.clone(),
                    method: format!("{other:?}"),
                })
            }
        };

        tracing::trace!(
            target: "unzip.archive",
            archive = %self.archive.display(),
            member = %self.name,
            "opened archive member stream"
        );
        Ok(EntryReader {
            inner,
            crc: Crc::new(),
            expected_crc: member.crc32,
        })
    }

    fn locate(&self) -> Result<(File, RawMember)> {
        let file =
            File::open(&self.archive).map_err(|err| ArchiveError::io(&self.archive, err))?;
        let mut zip = ZipArchive::new(file).map_err(|err| ArchiveError::zip(&self.archive, err))?;

        let Some(index) = zip.index_for_name(&self.name) else {
            return Err(self.not_found());
        };
        let located = match zip.by_index_raw(index) {
            Ok(member) => Ok(RawMember {
                data_start: member.data_start(),
                compressed_size: member.compressed_size(),
                compression: member.compression(),
                crc32: member.crc32(),
                encrypted: member.encrypted(),
            }),
            Err(ZipError::FileNotFound) => Err(self.not_found()),
            Err(err) => Err(ArchiveError::zip(&self.archive, err)),
        };
        let member = located?;
        if member.encrypted {
            return Err(ArchiveError::Encrypted {
                archive: self.archive.clone(),
                member: self.name.clone(),
            });
        }

        Ok((zip.into_inner(), member))
    }

    fn not_found(&self) -> ArchiveError {
        ArchiveError::EntryNotFound {
            archive: self.archive.clone(),
            member: self.name.clone(),
        }
    }
}

struct RawMember {
    data_start: u64,
    compressed_size: u64,
    compression: CompressionMethod,
    crc32: u32,
    encrypted: bool,
}

/// Owned stream over one archive member, returned by [`ZippedEntry::open_content`].
pub struct EntryReader {
    inner: ReaderInner,
    crc: Crc,
    expected_crc: u32,
}

enum ReaderInner {
    Stored(Take<BufReader<File>>),
    Deflated(DeflateDecoder<Take<BufReader<File>>>),
}

impl Read for EntryReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = match &mut self.inner {
            ReaderInner::Stored(reader) => reader.read(buf)?,
            ReaderInner::Deflated(reader) => reader.read(buf)?,
        };
        if n > 0 {
            self.crc.update(&buf[..n]);
        } else if !buf.is_empty() && self.crc.sum() != self.expected_crc {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "archive member does not match its checksum",
            ));
        }
        Ok(n)
    }
}

impl std::fmt::Debug for EntryReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self.inner {
            ReaderInner::Stored(_) => "stored",
            ReaderInner::Deflated(_) => "deflated",
        };
        f.debug_struct("EntryReader").field("kind", &kind).finish()
    }
}

/// Converts a zip (MS-DOS) timestamp into unix milliseconds, treating it as UTC.
pub(crate) fn zip_time_millis(time: zip::DateTime) -> u64 {
    let millis = chrono::NaiveDate::from_ymd_opt(
        i32::from(time.year()),
        u32::from(time.month()),
        u32::from(time.day()),
    )
    .and_then(|date| {
        date.and_hms_opt(
            u32::from(time.hour()),
            u32::from(time.minute()),
            u32::from(time.second()),
        )
    })
    .map(|datetime| datetime.and_utc().timestamp_millis());

    millis.and_then(|millis| u64::try_from(millis).ok()).unwrap_or(0)
}
