//! Per-inode attribute records.
//!
//! Attributes are persisted in `files.attr` as a bincode blob so the row
//! layout never changes when the record grows a field. [`InodeAttr`] is a
//! superset of the wire [`FileStat`] and projects onto it losslessly.

use serde::{Deserialize, Serialize};
use tansu_types::{now_millis, FileKind, FileStat};

use crate::engine::FsEngine;
use crate::error::{FsError, FsResult};
use crate::store::{SqlStore, SqlValue};

/// Attribute record for one inode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InodeAttr {
    pub ino: u64,
    pub size: u64,
    pub blocks: u64,
    pub atime: u64,
    pub mtime: u64,
    pub ctime: u64,
    pub crtime: u64,
    pub kind: FileKind,
    pub perm: u16,
    pub nlink: u32,
    pub uid: u32,
    pub gid: u32,
    pub rdev: u32,
    pub flags: u32,
    pub blksize: u32,
}

/// Preferred I/O block size reported in stat.
const BLKSIZE: u32 = 512;

impl InodeAttr {
    fn base(ino: u64, kind: FileKind, perm: u16, nlink: u32, size: u64) -> Self {
        let now = now_millis();
        Self {
            ino,
            size,
            blocks: size.div_ceil(u64::from(BLKSIZE)),
            atime: now,
            mtime: now,
            ctime: now,
            crtime: now,
            kind,
            perm,
            nlink,
            uid: 0,
            gid: 0,
            rdev: 0,
            flags: 0,
            blksize: BLKSIZE,
        }
    }

    /// New regular file. `perm = (mode ?? 0o644) & !umask & 0o7777`.
    pub fn file(ino: u64, mode: Option<u32>, umask: u32) -> Self {
        let perm = (mode.unwrap_or(0o644) & !umask & 0o7777) as u16;
        Self::base(ino, FileKind::File, perm, 1, 0)
    }

    /// New directory. `perm = (mode ?? 0o755) & !umask & 0o7777`.
    pub fn directory(ino: u64, mode: Option<u32>, umask: u32) -> Self {
        let perm = (mode.unwrap_or(0o755) & !umask & 0o7777) as u16;
        Self::base(ino, FileKind::Directory, perm, 2, 0)
    }

    /// New symlink; `size` is the byte length of the target.
    pub fn symlink(ino: u64, target_len: u64) -> Self {
        Self::base(ino, FileKind::Symlink, 0o777, 1, target_len)
    }

    /// Record a new size, keeping the block count in step.
    pub fn set_size(&mut self, size: u64) {
        self.size = size;
        self.blocks = size.div_ceil(u64::from(self.blksize.max(1)));
    }

    /// Refresh mtime and ctime after a data mutation.
    pub fn touch_data(&mut self) {
        let now = now_millis();
        self.mtime = now;
        self.ctime = now;
    }

    /// Refresh ctime after a metadata mutation.
    pub fn touch_meta(&mut self) {
        self.ctime = now_millis();
    }

    /// Serialize for the `files.attr` column.
    pub fn encode(&self) -> FsResult<Vec<u8>> {
        bincode::serialize(self).map_err(|e| FsError::storage(format!("attr encode: {e}")))
    }

    /// Deserialize from the `files.attr` column.
    pub fn decode(bytes: &[u8]) -> FsResult<Self> {
        bincode::deserialize(bytes).map_err(|e| FsError::storage(format!("attr decode: {e}")))
    }

    /// Project onto the wire stat record.
    pub fn to_stat(&self) -> FileStat {
        FileStat {
            ino: self.ino,
            size: self.size,
            blocks: self.blocks,
            atime: self.atime,
            mtime: self.mtime,
            ctime: self.ctime,
            crtime: self.crtime,
            kind: self.kind,
            perm: self.perm,
            nlink: self.nlink,
            uid: self.uid,
            gid: self.gid,
            rdev: self.rdev,
            flags: self.flags,
            blksize: self.blksize,
        }
    }
}

// ============================================================================
// Inode/attr layer
// ============================================================================

impl<S: SqlStore> FsEngine<S> {
    /// Allocate the next inode number: `max(ino) + 1`.
    ///
    /// Inodes are never reused within an instance lifetime; the single-writer
    /// model makes the read-then-insert safe.
    pub(crate) fn alloc_ino(&self) -> FsResult<u64> {
        let row = self
            .store()
            .query_opt("SELECT MAX(ino) FROM files", &[])?
            .ok_or_else(|| FsError::storage("MAX(ino) returned no row"))?;
        Ok(row.opt_u64(0)?.map_or(crate::schema::ROOT_INO + 1, |m| m + 1))
    }

    /// Load the attribute record for an inode.
    pub(crate) fn load_attr(&self, ino: u64) -> FsResult<InodeAttr> {
        let row = self
            .store()
            .query_opt(
                "SELECT attr FROM files WHERE ino = ?1",
                &[SqlValue::from(ino)],
            )?
            .ok_or_else(|| FsError::not_found(format!("inode {ino}")))?;
        InodeAttr::decode(row.blob(0)?)
    }

    /// Persist an attribute record.
    pub(crate) fn store_attr(&self, attr: &InodeAttr) -> FsResult<()> {
        self.store().execute(
            "UPDATE files SET attr = ?1 WHERE ino = ?2",
            &[attr.encode()?.into(), attr.ino.into()],
        )?;
        Ok(())
    }

    /// Insert a new directory entry row for a freshly allocated inode.
    pub(crate) fn insert_entry(
        &self,
        attr: &InodeAttr,
        name: &str,
        parent: u64,
        data: Option<&[u8]>,
    ) -> FsResult<()> {
        self.store().execute(
            "INSERT INTO files (ino, name, parent, is_dir, attr, data)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            &[
                attr.ino.into(),
                name.into(),
                parent.into(),
                u64::from(attr.kind.is_dir()).into(),
                attr.encode()?.into(),
                data.into(),
            ],
        )?;
        Ok(())
    }
}
