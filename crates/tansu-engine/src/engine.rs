//! The filesystem engine.
//!
//! One [`FsEngine`] per actor: the host constructs it once over its embedded
//! store handle and serializes every call. All methods are straight-line;
//! the only suspension point in the whole engine is the pull loop inside
//! [`FsEngine::write_file_from`].

use std::path::Path;

use tracing::{debug, warn};

use tansu_types::{DeviceStats, DirEntry, FileKind, FileStat};

use crate::attr::InodeAttr;
use crate::error::{FsError, FsResult};
use crate::resolve::segments;
use crate::schema::{self, DEFAULT_CHUNK_SIZE, META_DEVICE_SIZE, META_SPACE_USED, ROOT_INO};
use crate::store::{SqlStore, SqlValue, SqliteStore};
use crate::stream::{ByteStream, FileReader};

/// Engine construction parameters.
#[derive(Debug, Clone, Copy)]
pub struct FsConfig {
    /// Chunk granularity in bytes. Immutable once the instance holds data.
    pub chunk_size: u64,
}

impl Default for FsConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

/// Options for [`FsEngine::read`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadOptions {
    /// Starting byte; defaults to 0.
    pub offset: Option<u64>,
    /// Byte count; defaults to everything through end-of-data.
    pub length: Option<u64>,
}

/// Options for [`FsEngine::write`].
#[derive(Debug, Clone, Copy, Default)]
pub struct WriteOptions {
    /// Starting byte; defaults to 0.
    pub offset: Option<u64>,
}

/// Options for [`FsEngine::create`].
#[derive(Debug, Clone, Copy, Default)]
pub struct CreateOptions {
    /// Mode bits; defaults to 0o644.
    pub mode: Option<u32>,
    /// Bits masked out of the mode.
    pub umask: u32,
}

/// Options for [`FsEngine::mkdir`].
#[derive(Debug, Clone, Copy, Default)]
pub struct MkdirOptions {
    /// Create missing intermediate directories with the same permissions.
    pub recursive: bool,
    /// Mode bits; defaults to 0o755.
    pub mode: Option<u32>,
    /// Bits masked out of the mode.
    pub umask: u32,
}

/// Options for [`FsEngine::rmdir`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RmdirOptions {
    /// Remove the whole subtree instead of requiring an empty directory.
    pub recursive: bool,
}

/// Options for [`FsEngine::list_dir`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ListDirOptions {
    /// Pre-order walk of all descendants, paths relative to the listed dir.
    pub recursive: bool,
}

/// Attribute updates for [`FsEngine::set_attr`]; only provided fields change.
#[derive(Debug, Clone, Copy, Default)]
pub struct AttrChanges {
    /// New permission bits (0o7777 mask applied).
    pub mode: Option<u32>,
    /// New owner user id.
    pub uid: Option<u32>,
    /// New owner group id.
    pub gid: Option<u32>,
}

/// POSIX-shaped filesystem over an embedded SQL store.
#[derive(Debug)]
pub struct FsEngine<S: SqlStore = SqliteStore> {
    store: S,
    chunk_size: u64,
}

impl FsEngine<SqliteStore> {
    /// Open (or create) an engine backed by a database file.
    pub fn open<P: AsRef<Path>>(path: P, config: FsConfig) -> FsResult<Self> {
        Self::with_store(SqliteStore::open(path)?, config)
    }

    /// In-memory engine with default configuration.
    pub fn in_memory() -> FsResult<Self> {
        Self::in_memory_with(FsConfig::default())
    }

    /// In-memory engine with explicit configuration.
    pub fn in_memory_with(config: FsConfig) -> FsResult<Self> {
        Self::with_store(SqliteStore::in_memory()?, config)
    }
}

impl<S: SqlStore> FsEngine<S> {
    /// Build an engine over a host-injected store handle.
    ///
    /// Runs the idempotent bootstrap (tables, meta seeding, root directory)
    /// before returning; fails if the store was created with a different
    /// chunk granularity.
    pub fn with_store(store: S, config: FsConfig) -> FsResult<Self> {
        if config.chunk_size == 0 {
            return Err(FsError::invalid_argument("chunk_size must be non-zero"));
        }
        schema::bootstrap(&store, config.chunk_size)?;
        Ok(Self {
            store,
            chunk_size: config.chunk_size,
        })
    }

    /// The underlying store handle, for host-side maintenance queries.
    ///
    /// The engine's bookkeeping assumes nothing else mutates its relations;
    /// treat this as read-only.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Chunk granularity this instance stores data at.
    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    // ========================================================================
    // Device accounting
    // ========================================================================

    pub(crate) fn device_size(&self) -> FsResult<u64> {
        schema::meta_get(&self.store, META_DEVICE_SIZE)?
            .ok_or_else(|| FsError::storage("meta.device_size missing"))
    }

    pub(crate) fn space_used(&self) -> FsResult<u64> {
        schema::meta_get(&self.store, META_SPACE_USED)?
            .ok_or_else(|| FsError::storage("meta.space_used missing"))
    }

    /// df-style capacity report.
    pub fn device_stats(&self) -> FsResult<DeviceStats> {
        let device_size = self.device_size()?;
        let space_used = self.space_used()?;
        Ok(DeviceStats {
            device_size,
            space_used,
            space_available: device_size.saturating_sub(space_used),
        })
    }

    /// Resize the device ceiling. Shrinking below the bytes already stored
    /// fails with `ENOSPC` and changes nothing.
    #[tracing::instrument(skip(self), name = "fs.set_device_size")]
    pub fn set_device_size(&self, new_size: u64) -> FsResult<()> {
        let used = self.space_used()?;
        if new_size < used {
            return Err(FsError::NoSpace {
                needed: used - new_size,
                available: 0,
            });
        }
        schema::meta_set(&self.store, META_DEVICE_SIZE, new_size)
    }

    /// Fail with `ENOSPC` unless `additional` more bytes fit the device.
    fn preflight(&self, additional: u64) -> FsResult<()> {
        if additional == 0 {
            return Ok(());
        }
        let used = self.space_used()?;
        let device = self.device_size()?;
        if used.saturating_add(additional) > device {
            let available = device.saturating_sub(used);
            warn!(additional, available, "write rejected: device full");
            return Err(FsError::NoSpace {
                needed: additional,
                available,
            });
        }
        Ok(())
    }

    // ========================================================================
    // Metadata
    // ========================================================================

    /// Full attribute record for a path.
    pub fn stat(&self, path: &str) -> FsResult<FileStat> {
        let ino = self.resolve(path)?;
        Ok(self.load_attr(ino)?.to_stat())
    }

    /// Update permission bits and/or ownership; unset fields are untouched.
    pub fn set_attr(&self, path: &str, changes: AttrChanges) -> FsResult<()> {
        let ino = self.resolve(path)?;
        let mut attr = self.load_attr(ino)?;
        if let Some(mode) = changes.mode {
            attr.perm = (mode & 0o7777) as u16;
        }
        if let Some(uid) = changes.uid {
            attr.uid = uid;
        }
        if let Some(gid) = changes.gid {
            attr.gid = gid;
        }
        attr.touch_meta();
        self.store_attr(&attr)
    }

    // ========================================================================
    // Create / mkdir / symlink
    // ========================================================================

    /// Create an empty regular file.
    pub fn create(&self, path: &str, opts: CreateOptions) -> FsResult<()> {
        let (parent, leaf) = self
            .split_leaf(path)?
            .ok_or_else(|| FsError::already_exists(path))?;
        if self.entry_at(parent, &leaf)?.is_some() {
            return Err(FsError::already_exists(path));
        }
        let attr = InodeAttr::file(self.alloc_ino()?, opts.mode, opts.umask);
        self.insert_entry(&attr, &leaf, parent, None)
    }

    /// Create a directory.
    #[tracing::instrument(skip(self), name = "fs.mkdir")]
    pub fn mkdir(&self, path: &str, opts: MkdirOptions) -> FsResult<()> {
        if opts.recursive {
            return self.mkdir_all(path, &opts);
        }
        let (parent, leaf) = self
            .split_leaf(path)?
            .ok_or_else(|| FsError::already_exists(path))?;
        if self.entry_at(parent, &leaf)?.is_some() {
            return Err(FsError::already_exists(path));
        }
        let attr = InodeAttr::directory(self.alloc_ino()?, opts.mode, opts.umask);
        self.insert_entry(&attr, &leaf, parent, None)
    }

    fn mkdir_all(&self, path: &str, opts: &MkdirOptions) -> FsResult<()> {
        let segs: Vec<&str> = segments(path).collect();
        if segs.is_empty() {
            return Err(FsError::already_exists(path));
        }
        let mut current = ROOT_INO;
        for (i, seg) in segs.iter().enumerate() {
            let last = i == segs.len() - 1;
            match self.entry_at(current, seg)? {
                Some((ino, true)) => {
                    if last {
                        return Err(FsError::already_exists(path));
                    }
                    current = ino;
                }
                Some((_, false)) => {
                    return Err(if last {
                        FsError::already_exists(path)
                    } else {
                        FsError::not_a_directory(path)
                    });
                }
                None => {
                    let attr = InodeAttr::directory(self.alloc_ino()?, opts.mode, opts.umask);
                    self.insert_entry(&attr, seg, current, None)?;
                    current = attr.ino;
                }
            }
        }
        Ok(())
    }

    /// Create a symlink at `path` pointing at `target`.
    ///
    /// The target is stored verbatim; resolution never follows it.
    pub fn symlink(&self, target: &str, path: &str) -> FsResult<()> {
        let (parent, leaf) = self
            .split_leaf(path)?
            .ok_or_else(|| FsError::already_exists(path))?;
        if self.entry_at(parent, &leaf)?.is_some() {
            return Err(FsError::already_exists(path));
        }
        let attr = InodeAttr::symlink(self.alloc_ino()?, target.len() as u64);
        self.insert_entry(&attr, &leaf, parent, Some(target.as_bytes()))
    }

    /// Read a symlink's target. Anything but a symlink is `ENOENT`.
    pub fn read_link(&self, path: &str) -> FsResult<String> {
        let ino = self.resolve(path)?;
        let attr = self.load_attr(ino)?;
        if !attr.kind.is_symlink() {
            return Err(FsError::not_found(path));
        }
        let row = self
            .store
            .query_opt(
                "SELECT data FROM files WHERE ino = ?1",
                &[SqlValue::from(ino)],
            )?
            .ok_or_else(|| FsError::not_found(path))?;
        let bytes = row
            .opt_blob(0)?
            .ok_or_else(|| FsError::storage(format!("symlink {path} has no target")))?;
        String::from_utf8(bytes.to_vec())
            .map_err(|_| FsError::storage(format!("symlink {path} target is not UTF-8")))
    }

    // ========================================================================
    // Directory operations
    // ========================================================================

    fn child_count(&self, ino: u64) -> FsResult<u64> {
        let row = self
            .store
            .query_opt(
                "SELECT COUNT(*) FROM files WHERE parent = ?1",
                &[SqlValue::from(ino)],
            )?
            .ok_or_else(|| FsError::storage("COUNT(*) returned no row"))?;
        row.u64(0)
    }

    /// Remove a directory. Without `recursive`, the directory must be empty.
    #[tracing::instrument(skip(self), name = "fs.rmdir")]
    pub fn rmdir(&self, path: &str, opts: RmdirOptions) -> FsResult<()> {
        let ino = self.resolve(path)?;
        let attr = self.load_attr(ino)?;
        if !attr.kind.is_dir() {
            return Err(FsError::not_a_directory(path));
        }
        if ino == ROOT_INO {
            return Err(FsError::PermissionDenied(
                "cannot remove the root directory".into(),
            ));
        }
        if opts.recursive {
            self.remove_tree(ino)?;
        } else if self.child_count(ino)? > 0 {
            return Err(FsError::not_empty(path));
        }
        self.store.execute(
            "DELETE FROM files WHERE ino = ?1",
            &[SqlValue::from(ino)],
        )?;
        if opts.recursive {
            self.refresh_space_used()?;
        }
        Ok(())
    }

    /// Delete all descendants of `ino`, depth-first. Keeps `ino`'s own row.
    fn remove_tree(&self, ino: u64) -> FsResult<()> {
        let children = self.store.query(
            "SELECT ino, is_dir FROM files WHERE parent = ?1",
            &[SqlValue::from(ino)],
        )?;
        for row in children {
            let child = row.u64(0)?;
            if row.u64(1)? != 0 {
                self.remove_tree(child)?;
            } else {
                self.delete_chunks(child)?;
            }
            self.store.execute(
                "DELETE FROM files WHERE ino = ?1",
                &[SqlValue::from(child)],
            )?;
        }
        Ok(())
    }

    /// List a directory's entries.
    ///
    /// `.` and `..` always come first; the remaining names appear in the
    /// store's iteration order (insertion order for this schema); no other
    /// ordering is guaranteed. With `recursive`, descendants follow in
    /// pre-order with paths relative to `path`.
    pub fn list_dir(&self, path: &str, opts: ListDirOptions) -> FsResult<Vec<String>> {
        let ino = self.resolve(path)?;
        let attr = self.load_attr(ino)?;
        if !attr.kind.is_dir() {
            return Err(FsError::not_a_directory(path));
        }
        let mut names = vec![".".to_string(), "..".to_string()];
        if opts.recursive {
            self.walk_tree(ino, "", &mut names)?;
        } else {
            let rows = self.store.query(
                "SELECT name FROM files WHERE parent = ?1 ORDER BY ino",
                &[SqlValue::from(ino)],
            )?;
            for row in rows {
                names.push(row.text(0)?.to_string());
            }
        }
        Ok(names)
    }

    /// Typed directory listing for the wire `readdir` frame: `.` and `..`
    /// first, then each child with its kind.
    pub fn list_entries(&self, path: &str) -> FsResult<Vec<DirEntry>> {
        let ino = self.resolve(path)?;
        let attr = self.load_attr(ino)?;
        if !attr.kind.is_dir() {
            return Err(FsError::not_a_directory(path));
        }
        let mut entries = vec![
            DirEntry::new(".", FileKind::Directory),
            DirEntry::new("..", FileKind::Directory),
        ];
        let rows = self.store.query(
            "SELECT name, attr FROM files WHERE parent = ?1 ORDER BY ino",
            &[SqlValue::from(ino)],
        )?;
        for row in rows {
            let kind = InodeAttr::decode(row.blob(1)?)?.kind;
            entries.push(DirEntry::new(row.text(0)?, kind));
        }
        Ok(entries)
    }

    fn walk_tree(&self, ino: u64, prefix: &str, out: &mut Vec<String>) -> FsResult<()> {
        let rows = self.store.query(
            "SELECT ino, name, is_dir FROM files WHERE parent = ?1 ORDER BY ino",
            &[SqlValue::from(ino)],
        )?;
        for row in rows {
            let child = row.u64(0)?;
            let name = row.text(1)?;
            let rel = if prefix.is_empty() {
                name.to_string()
            } else {
                format!("{prefix}/{name}")
            };
            let is_dir = row.u64(2)? != 0;
            out.push(rel.clone());
            if is_dir {
                self.walk_tree(child, &rel, out)?;
            }
        }
        Ok(())
    }

    /// Remove a file or symlink. Directories fail `EISDIR` (use `rmdir`).
    #[tracing::instrument(skip(self), name = "fs.unlink")]
    pub fn unlink(&self, path: &str) -> FsResult<()> {
        let ino = self.resolve(path)?;
        let attr = self.load_attr(ino)?;
        if attr.kind.is_dir() {
            return Err(FsError::is_directory(path));
        }
        self.store.execute(
            "DELETE FROM files WHERE ino = ?1",
            &[SqlValue::from(ino)],
        )?;
        self.delete_chunks(ino)?;
        self.refresh_space_used()?;
        Ok(())
    }

    /// Move `old` to `new`, atomically replacing the destination.
    ///
    /// An existing destination is deleted first, reclaiming its chunks,
    /// unless it is a non-empty directory (`ENOTEMPTY`). This is the contract
    /// the tempfile-then-rename upload idiom relies on.
    #[tracing::instrument(skip(self), name = "fs.rename")]
    pub fn rename(&self, old: &str, new: &str) -> FsResult<()> {
        let (old_parent, old_leaf) = self
            .split_leaf(old)?
            .ok_or_else(|| FsError::not_found(old))?;
        let (src_ino, _) = self
            .entry_at(old_parent, &old_leaf)?
            .ok_or_else(|| FsError::not_found(old))?;
        let (new_parent, new_leaf) = self
            .split_leaf(new)?
            .ok_or_else(|| FsError::not_found(new))?;

        if let Some((dest_ino, dest_is_dir)) = self.entry_at(new_parent, &new_leaf)? {
            if dest_ino == src_ino {
                return Ok(());
            }
            if dest_is_dir && self.child_count(dest_ino)? > 0 {
                return Err(FsError::not_empty(new));
            }
            self.store.execute(
                "DELETE FROM files WHERE ino = ?1",
                &[SqlValue::from(dest_ino)],
            )?;
            self.delete_chunks(dest_ino)?;
            self.refresh_space_used()?;
            debug!(replaced = dest_ino, "rename replaced destination");
        }

        self.store.execute(
            "UPDATE files SET parent = ?1, name = ?2 WHERE ino = ?3",
            &[new_parent.into(), new_leaf.into(), src_ino.into()],
        )?;
        let mut attr = self.load_attr(src_ino)?;
        attr.touch_meta();
        self.store_attr(&attr)
    }

    // ========================================================================
    // Data plane
    // ========================================================================

    /// Resolve a path for data I/O: directories are `EISDIR`, symlinks
    /// `EINVAL` (their only data path is `read_link`).
    fn data_attr(&self, path: &str) -> FsResult<InodeAttr> {
        let ino = self.resolve(path)?;
        let attr = self.load_attr(ino)?;
        if attr.kind.is_dir() {
            return Err(FsError::is_directory(path));
        }
        if attr.kind.is_symlink() {
            return Err(FsError::invalid_argument(format!(
                "data I/O on symlink: {path}"
            )));
        }
        Ok(attr)
    }

    /// Read a byte range, zero-filled where no chunk covers it.
    pub fn read(&self, path: &str, opts: ReadOptions) -> FsResult<Vec<u8>> {
        let attr = self.data_attr(path)?;
        self.read_range(attr.ino, opts.offset.unwrap_or(0), opts.length)
    }

    /// Read a whole file.
    pub fn read_file(&self, path: &str) -> FsResult<Vec<u8>> {
        self.read(path, ReadOptions::default())
    }

    /// Lazy whole-file reader yielding one chunk-sized buffer per pull.
    pub fn read_file_stream(&self, path: &str) -> FsResult<FileReader<'_, S>> {
        let attr = self.data_attr(path)?;
        let end = self.file_end(attr.ino)?;
        Ok(FileReader::new(self, attr.ino, end))
    }

    /// Write bytes at an offset, creating the file if the path is missing.
    ///
    /// The capacity preflight runs before any mutation, so a rejected write
    /// leaves the store unchanged (no chunks written, nothing created).
    #[tracing::instrument(skip(self, data), name = "fs.write")]
    pub fn write(&self, path: &str, data: &[u8], opts: WriteOptions) -> FsResult<()> {
        let offset = opts.offset.unwrap_or(0);
        let existing = match self.data_attr(path) {
            Ok(attr) => Some(attr),
            Err(FsError::NotFound(_)) => None,
            Err(e) => return Err(e),
        };
        if data.is_empty() {
            if existing.is_none() {
                self.create(path, CreateOptions::default())?;
            }
            return Ok(());
        }

        let end = offset
            .checked_add(data.len() as u64)
            .ok_or_else(|| FsError::invalid_argument("write range overflows"))?;
        let size = existing.as_ref().map_or(0, |attr| attr.size);
        self.preflight(end.saturating_sub(size))?;

        let ino = match existing {
            Some(attr) => attr.ino,
            None => {
                debug!(path, "write target missing, creating");
                self.create(path, CreateOptions::default())?;
                self.data_attr(path)?.ino
            }
        };
        self.write_at(ino, offset, data)?;
        self.refresh_sizes(ino)?;
        Ok(())
    }

    /// Set a file's size exactly.
    ///
    /// Shrinking deletes and trims chunks. Growing relies on sparse
    /// zero-fill: reads past the materialized bytes return zeros. Extension
    /// that lands inside the existing tail chunk zero-pads that chunk.
    #[tracing::instrument(skip(self), name = "fs.truncate")]
    pub fn truncate(&self, path: &str, size: u64) -> FsResult<()> {
        let mut attr = self.data_attr(path)?;
        self.truncate_chunks(attr.ino, size)?;
        attr.set_size(size);
        attr.touch_data();
        self.store_attr(&attr)?;
        self.refresh_space_used()?;
        Ok(())
    }

    /// Replace a file's contents with one finite buffer.
    ///
    /// Capacity is checked before the old entry is unlinked (crediting the
    /// bytes it would free), so a rejected call leaves the prior file intact
    /// and never creates the new one.
    #[tracing::instrument(skip(self, data), name = "fs.write_file")]
    pub fn write_file(&self, path: &str, data: &[u8]) -> FsResult<()> {
        let reclaim = match self.resolve(path) {
            Ok(ino) => {
                if self.load_attr(ino)?.kind.is_dir() {
                    return Err(FsError::is_directory(path));
                }
                self.chunk_sum(ino)?
            }
            Err(FsError::NotFound(_)) => 0,
            Err(e) => return Err(e),
        };
        let effective = self.space_used()?.saturating_sub(reclaim);
        let device = self.device_size()?;
        if effective.saturating_add(data.len() as u64) > device {
            return Err(FsError::NoSpace {
                needed: data.len() as u64,
                available: device.saturating_sub(effective),
            });
        }

        match self.unlink(path) {
            Ok(()) | Err(FsError::NotFound(_)) => {}
            Err(e) => return Err(e),
        }
        self.create(path, CreateOptions::default())?;
        self.write(path, data, WriteOptions::default())
    }

    /// Replace a file's contents from a pull-based byte stream.
    ///
    /// Follows the upload protocol: unlink any existing entry (reclaiming its
    /// bytes), create a fresh file, then append each pulled buffer after a
    /// capacity preflight. A stream error or mid-stream `ENOSPC` leaves the
    /// partial file in place; callers needing atomic visibility write to a
    /// temporary name and `rename` over the destination.
    #[tracing::instrument(skip(self, stream), name = "fs.write_file_from")]
    pub async fn write_file_from<B: ByteStream + ?Sized>(
        &self,
        path: &str,
        stream: &mut B,
    ) -> FsResult<()> {
        match self.unlink(path) {
            Ok(()) | Err(FsError::NotFound(_)) => {}
            Err(e) => return Err(e),
        }
        self.create(path, CreateOptions::default())?;

        let mut offset = 0u64;
        while let Some(buf) = stream.next_chunk().await? {
            if buf.is_empty() {
                continue;
            }
            self.write(
                path,
                &buf,
                WriteOptions {
                    offset: Some(offset),
                },
            )?;
            offset += buf.len() as u64;
        }
        debug!(path, bytes = offset, "streamed upload complete");
        Ok(())
    }
}
