//! File metadata types.
//!
//! These are wire-friendly (path-based, serializable) and double as the
//! engine's persisted attribute vocabulary: the engine stores a superset of
//! [`FileStat`] per inode and projects it here unchanged.

use serde::{Deserialize, Serialize};

/// File type discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileKind {
    /// Regular file.
    File,
    /// Directory.
    Directory,
    /// Symbolic link.
    Symlink,
}

impl FileKind {
    /// Returns true if this is a regular file.
    pub fn is_file(&self) -> bool {
        matches!(self, FileKind::File)
    }

    /// Returns true if this is a directory.
    pub fn is_dir(&self) -> bool {
        matches!(self, FileKind::Directory)
    }

    /// Returns true if this is a symbolic link.
    pub fn is_symlink(&self) -> bool {
        matches!(self, FileKind::Symlink)
    }
}

/// Full attribute record for one filesystem object.
///
/// Timestamps are Unix milliseconds. `perm` is the 12-bit POSIX mode
/// (no kind bits; those live in `kind`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileStat {
    /// Inode number (root is always 1).
    pub ino: u64,
    /// Size in bytes.
    pub size: u64,
    /// 512-byte blocks occupied.
    pub blocks: u64,
    /// Last access time.
    pub atime: u64,
    /// Last data modification time.
    pub mtime: u64,
    /// Last attribute change time.
    pub ctime: u64,
    /// Creation time.
    pub crtime: u64,
    /// Object kind.
    pub kind: FileKind,
    /// POSIX permission bits (0o7777 mask).
    pub perm: u16,
    /// Hard link count (always 1 for files, 2 for directories).
    pub nlink: u32,
    /// Owner user id.
    pub uid: u32,
    /// Owner group id.
    pub gid: u32,
    /// Device number (unused, kept for stat compatibility).
    pub rdev: u32,
    /// Inode flags (unused, kept for stat compatibility).
    pub flags: u32,
    /// Preferred I/O block size.
    pub blksize: u32,
}

impl FileStat {
    /// Returns true if this is a regular file.
    pub fn is_file(&self) -> bool {
        self.kind.is_file()
    }

    /// Returns true if this is a directory.
    pub fn is_dir(&self) -> bool {
        self.kind.is_dir()
    }

    /// Returns true if this is a symbolic link.
    pub fn is_symlink(&self) -> bool {
        self.kind.is_symlink()
    }
}

/// One directory listing entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirEntry {
    /// Entry name relative to the listed directory.
    pub name: String,
    /// Entry kind.
    pub kind: FileKind,
}

impl DirEntry {
    /// Create a new entry.
    pub fn new(name: impl Into<String>, kind: FileKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// df-style capacity report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceStats {
    /// Configured capacity ceiling in bytes.
    pub device_size: u64,
    /// Bytes currently held by chunk payloads.
    pub space_used: u64,
    /// `device_size - space_used`.
    pub space_available: u64,
}
