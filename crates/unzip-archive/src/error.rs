use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, ArchiveError>;

/// Errors produced while indexing or streaming cached zip archives.
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("failed to open archive {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read zip {path}: {source}")]
    Zip {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("archive {archive} has no member {member}")]
    EntryNotFound { archive: PathBuf, member: String },

    #[error("member {member} of {archive} is encrypted")]
    Encrypted { archive: PathBuf, member: String },

    #[error("member {member} of {archive} uses unsupported compression {method}")]
    UnsupportedCompression {
        archive: PathBuf,
        member: String,
        method: String,
    },
}

impl ArchiveError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn zip(path: impl Into<PathBuf>, source: zip::result::ZipError) -> Self {
        Self::Zip {
            path: path.into(),
            source,
        }
    }

    /// Whether the archive (or the requested member) is missing, as opposed to unreadable.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::EntryNotFound { .. } => true,
            Self::Io { source, .. } => source.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }
}
