//! Schema management: idempotent DDL, meta seeding, root bootstrap.
//!
//! Everything here runs inside the actor's construction window, before any
//! other engine operation can interleave.

use crate::attr::InodeAttr;
use crate::error::{FsError, FsResult};
use crate::store::{SqlStore, SqlValue};

/// The root directory's inode. Present from bootstrap on, never removed.
pub const ROOT_INO: u64 = 1;

/// Default device capacity: 1 GiB.
pub const DEFAULT_DEVICE_SIZE: u64 = 1 << 30;

/// Default chunk granularity for per-actor instances.
pub const DEFAULT_CHUNK_SIZE: u64 = 4096;

pub(crate) const META_DEVICE_SIZE: &str = "device_size";
pub(crate) const META_SPACE_USED: &str = "space_used";
pub(crate) const META_CHUNK_SIZE: &str = "chunk_size";

const SCHEMA: &str = r#"
-- Engine settings and derived caches
CREATE TABLE IF NOT EXISTS meta (
    key TEXT PRIMARY KEY,
    value INTEGER NOT NULL
);

-- One row per directory entry = per inode (no hard links)
CREATE TABLE IF NOT EXISTS files (
    ino INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    parent INTEGER,
    is_dir INTEGER NOT NULL,
    attr BLOB NOT NULL,
    data BLOB
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_files_parent_name ON files(parent, name);
CREATE INDEX IF NOT EXISTS idx_files_parent ON files(parent);

-- Payload blocks for regular files, keyed by chunk-aligned offset
CREATE TABLE IF NOT EXISTS chunks (
    ino INTEGER NOT NULL,
    offset INTEGER NOT NULL,
    data BLOB NOT NULL,
    length INTEGER NOT NULL,
    PRIMARY KEY (ino, offset)
);
"#;

/// Read a meta value.
pub(crate) fn meta_get<S: SqlStore>(store: &S, key: &str) -> FsResult<Option<u64>> {
    match store.query_opt(
        "SELECT value FROM meta WHERE key = ?1",
        &[SqlValue::from(key)],
    )? {
        Some(row) => Ok(Some(row.u64(0)?)),
        None => Ok(None),
    }
}

/// Write a meta value, inserting or replacing.
pub(crate) fn meta_set<S: SqlStore>(store: &S, key: &str, value: u64) -> FsResult<()> {
    store.execute(
        "INSERT INTO meta (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        &[key.into(), value.into()],
    )?;
    Ok(())
}

fn meta_seed<S: SqlStore>(store: &S, key: &str, value: u64) -> FsResult<()> {
    store.execute(
        "INSERT OR IGNORE INTO meta (key, value) VALUES (?1, ?2)",
        &[key.into(), value.into()],
    )?;
    Ok(())
}

/// Create tables and indices, seed meta defaults, and ensure the root
/// directory exists. Idempotent; safe to run on every open.
///
/// Fails with [`FsError::ChunkSizeMismatch`] when the store was bootstrapped
/// with a different chunk granularity; the granularity is immutable for the
/// lifetime of an instance.
pub(crate) fn bootstrap<S: SqlStore>(store: &S, chunk_size: u64) -> FsResult<()> {
    store.execute_batch(SCHEMA)?;

    match meta_get(store, META_CHUNK_SIZE)? {
        Some(stored) if stored != chunk_size => {
            return Err(FsError::ChunkSizeMismatch {
                stored,
                configured: chunk_size,
            });
        }
        Some(_) => {}
        None => meta_set(store, META_CHUNK_SIZE, chunk_size)?,
    }

    meta_seed(store, META_DEVICE_SIZE, DEFAULT_DEVICE_SIZE)?;
    meta_seed(store, META_SPACE_USED, 0)?;

    let root = store.query_opt(
        "SELECT ino FROM files WHERE ino = ?1",
        &[SqlValue::from(ROOT_INO)],
    )?;
    if root.is_none() {
        let attr = InodeAttr::directory(ROOT_INO, Some(0o755), 0);
        store.execute(
            "INSERT INTO files (ino, name, parent, is_dir, attr, data)
             VALUES (?1, ?2, NULL, 1, ?3, NULL)",
            &[ROOT_INO.into(), "/".into(), attr.encode()?.into()],
        )?;
    }

    Ok(())
}
