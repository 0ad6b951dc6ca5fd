//! Path resolution against the directory table.
//!
//! Paths are absolute POSIX strings; empty segments are discarded, so
//! `"/a//b/"` and `"/a/b"` walk identically. `.` and `..` are not
//! interpreted; callers provide canonical paths. Symlinks are never
//! followed during resolution; they resolve to their own inode.

use crate::engine::FsEngine;
use crate::error::{FsError, FsResult};
use crate::schema::ROOT_INO;
use crate::store::SqlStore;

/// Non-empty components of an absolute path.
pub(crate) fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

impl<S: SqlStore> FsEngine<S> {
    /// Look up one directory entry: `(parent, name) -> (ino, is_dir)`.
    pub(crate) fn entry_at(&self, parent: u64, name: &str) -> FsResult<Option<(u64, bool)>> {
        match self.store().query_opt(
            "SELECT ino, is_dir FROM files WHERE parent = ?1 AND name = ?2",
            &[parent.into(), name.into()],
        )? {
            Some(row) => Ok(Some((row.u64(0)?, row.u64(1)? != 0))),
            None => Ok(None),
        }
    }

    /// Walk `path` from the root to an inode.
    ///
    /// `""` and `"/"` resolve to the root. A missing entry is `ENOENT`;
    /// traversal through a non-directory is `ENOTDIR`.
    pub(crate) fn resolve(&self, path: &str) -> FsResult<u64> {
        let mut current = ROOT_INO;
        let mut segs = segments(path).peekable();
        while let Some(seg) = segs.next() {
            let (ino, is_dir) = self
                .entry_at(current, seg)?
                .ok_or_else(|| FsError::not_found(path))?;
            if segs.peek().is_some() && !is_dir {
                return Err(FsError::not_a_directory(path));
            }
            current = ino;
        }
        Ok(current)
    }

    /// Walk all but the last segment, returning `(parent_ino, leaf_name)`.
    ///
    /// Returns `Ok(None)` for an empty path (the root has no leaf); callers
    /// map that to `EEXIST` (create/mkdir/symlink) or `ENOENT` (rename).
    pub(crate) fn split_leaf(&self, path: &str) -> FsResult<Option<(u64, String)>> {
        let segs: Vec<&str> = segments(path).collect();
        let Some((leaf, prefix)) = segs.split_last() else {
            return Ok(None);
        };
        let mut current = ROOT_INO;
        for seg in prefix {
            match self.entry_at(current, seg)? {
                Some((ino, true)) => current = ino,
                Some((_, false)) => return Err(FsError::not_a_directory(path)),
                None => return Err(FsError::not_found(path)),
            }
        }
        Ok(Some((current, (*leaf).to_string())))
    }
}
