pub type Result<T> = std::result::Result<T, CacheError>;

pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Faults reported by a storage collaborator (the local cache store or the master repository).
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("item not found: {path}")]
    NotFound { path: String },

    #[error("access denied: {path}")]
    AccessDenied { path: String },

    #[error("storage does not support {operation} for {path}")]
    UnsupportedOperation {
        operation: &'static str,
        path: String,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage error: {message}")]
    Other { message: String },
}

impl StorageError {
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound { path: path.into() }
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound { .. } => true,
            Self::Io(err) => err.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

/// Errors produced by the archive cache.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// The archive is neither cached nor available from the master repository.
    #[error("archive not found: {path}")]
    NotFound { path: String },

    /// The local store failed, or the master repository failed for a reason other than a
    /// missing item.
    #[error("storage fault for {path}: {source}")]
    Storage {
        path: String,
        #[source]
        source: StorageError,
    },

    #[error("archive error: {0}")]
    Archive(#[from] unzip_archive::ArchiveError),

    #[error("failed to determine home directory for default cache path")]
    MissingHomeDir,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl CacheError {
    /// Master repository faults: a missing item passes through, anything else is a storage fault.
    pub(crate) fn from_master(path: &str, err: StorageError) -> Self {
        match err {
            StorageError::NotFound { path } => Self::NotFound { path },
            other => Self::Storage {
                path: path.to_owned(),
                source: other,
            },
        }
    }

    pub(crate) fn from_local(path: &str, err: StorageError) -> Self {
        Self::Storage {
            path: path.to_owned(),
            source: err,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
