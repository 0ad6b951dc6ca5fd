//! Engine error type.
//!
//! Every failure carries a POSIX short name via [`FsError::code`]; the wire
//! adapters send that string verbatim so FUSE clients can map it straight to
//! an errno.

use thiserror::Error;

/// Filesystem engine error.
#[derive(Debug, Error)]
pub enum FsError {
    /// Path or parent not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Path already exists.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Directory has children.
    #[error("directory not empty: {0}")]
    NotEmpty(String),

    /// Data operation on a directory.
    #[error("is a directory: {0}")]
    IsDirectory(String),

    /// Path component used as a directory is not one.
    #[error("not a directory: {0}")]
    NotADirectory(String),

    /// Operation not meaningful for the object kind (data I/O on a symlink).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Protected object (the root directory).
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Write would exceed the device size.
    #[error("no space on device: need {needed} more bytes, {available} available")]
    NoSpace {
        /// Additional bytes the operation required.
        needed: u64,
        /// Bytes still available before the ceiling.
        available: u64,
    },

    /// Store was created with a different chunk granularity.
    #[error("chunk size mismatch: store has {stored}, configured {configured}")]
    ChunkSizeMismatch {
        /// Granularity recorded in the store's meta table.
        stored: u64,
        /// Granularity this instance was configured with.
        configured: u64,
    },

    /// Underlying SQL store failure.
    #[error("storage error: {0}")]
    Storage(String),

    /// Caller-provided byte stream failed mid-pull.
    #[error("stream error: {0}")]
    Stream(String),
}

impl FsError {
    /// Create a NotFound error.
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound(path.into())
    }

    /// Create an AlreadyExists error.
    pub fn already_exists(path: impl Into<String>) -> Self {
        Self::AlreadyExists(path.into())
    }

    /// Create a NotEmpty error.
    pub fn not_empty(path: impl Into<String>) -> Self {
        Self::NotEmpty(path.into())
    }

    /// Create an IsDirectory error.
    pub fn is_directory(path: impl Into<String>) -> Self {
        Self::IsDirectory(path.into())
    }

    /// Create a NotADirectory error.
    pub fn not_a_directory(path: impl Into<String>) -> Self {
        Self::NotADirectory(path.into())
    }

    /// Create an InvalidArgument error.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Create a Storage error.
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Wrap a caller-side stream failure.
    pub fn stream(msg: impl Into<String>) -> Self {
        Self::Stream(msg.into())
    }

    /// POSIX short name for this failure, as sent on the wire.
    pub fn code(&self) -> &'static str {
        match self {
            FsError::NotFound(_) => "ENOENT",
            FsError::AlreadyExists(_) => "EEXIST",
            FsError::NotEmpty(_) => "ENOTEMPTY",
            FsError::IsDirectory(_) => "EISDIR",
            FsError::NotADirectory(_) => "ENOTDIR",
            FsError::InvalidArgument(_) => "EINVAL",
            FsError::PermissionDenied(_) => "EACCES",
            FsError::NoSpace { .. } => "ENOSPC",
            FsError::ChunkSizeMismatch { .. } | FsError::Storage(_) | FsError::Stream(_) => "EIO",
        }
    }
}

/// Engine result type.
pub type FsResult<T> = Result<T, FsError>;
