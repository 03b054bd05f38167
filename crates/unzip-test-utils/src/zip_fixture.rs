use std::fs::File;
use std::io::{Cursor, Seek, Write};
use std::path::Path;

use zip::result::ZipResult;
use zip::write::FileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

/// Modification time stamped on every fixture member: 2014-03-01 12:30:00.
pub const FIXTURE_MEMBER_MILLIS: u64 = 1_393_677_000_000;

/// Writes a deflated zip archive containing `members` to `path`.
pub fn write_zip(path: &Path, members: &[(&str, &[u8])]) -> ZipResult<()> {
    write_members(File::create(path)?, members)?;
    Ok(())
}

/// A deflated zip archive containing `members`, in memory.
pub fn zip_bytes(members: &[(&str, &[u8])]) -> ZipResult<Vec<u8>> {
    Ok(write_members(Cursor::new(Vec::new()), members)?.into_inner())
}

fn write_members<W: Write + Seek>(out: W, members: &[(&str, &[u8])]) -> ZipResult<W> {
    let mut zip = ZipWriter::new(out);
    let modified = DateTime::from_date_and_time(2014, 3, 1, 12, 30, 0)
        .map_err(|_| zip::result::ZipError::InvalidArchive("fixture timestamp out of range".into()))?;
    for (name, contents) in members {
        let options = FileOptions::<()>::default()
            .compression_method(CompressionMethod::Deflated)
            .last_modified_time(modified);
        zip.start_file(*name, options)?;
        zip.write_all(contents)?;
    }
    zip.finish()
}
