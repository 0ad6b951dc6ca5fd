//! Chunk I/O core.
//!
//! Regular-file bytes live in fixed-size chunks keyed by `(ino, offset)`
//! where `offset` is always chunk-aligned. Chunks are sparse: a missing row
//! reads as zeros. The tail chunk may be short; every other stored chunk is
//! full length. After any mutation the authoritative sizes are recomputed
//! from the chunk rows, which keeps `attr.size` and `meta.space_used`
//! consistent even after a crash between statements.

use crate::engine::FsEngine;
use crate::error::{FsError, FsResult};
use crate::schema::{self, META_SPACE_USED};
use crate::store::{SqlStore, SqlValue};

impl<S: SqlStore> FsEngine<S> {
    /// Highest byte covered by any chunk of `ino` (`max(offset + length)`).
    pub(crate) fn file_end(&self, ino: u64) -> FsResult<u64> {
        let row = self
            .store()
            .query_opt(
                "SELECT MAX(offset + length) FROM chunks WHERE ino = ?1",
                &[SqlValue::from(ino)],
            )?
            .ok_or_else(|| FsError::storage("MAX(offset + length) returned no row"))?;
        Ok(row.opt_u64(0)?.unwrap_or(0))
    }

    /// Sum of stored chunk lengths for one inode.
    pub(crate) fn chunk_sum(&self, ino: u64) -> FsResult<u64> {
        let row = self
            .store()
            .query_opt(
                "SELECT COALESCE(SUM(length), 0) FROM chunks WHERE ino = ?1",
                &[SqlValue::from(ino)],
            )?
            .ok_or_else(|| FsError::storage("SUM(length) returned no row"))?;
        row.u64(0)
    }

    /// Read `[offset, offset + length)` (or to end-of-data when `length` is
    /// `None`), zero-filling every byte no chunk covers.
    pub(crate) fn read_range(
        &self,
        ino: u64,
        offset: u64,
        length: Option<u64>,
    ) -> FsResult<Vec<u8>> {
        let end = match length {
            Some(len) => offset.saturating_add(len),
            None => self.file_end(ino)?,
        };
        if end <= offset {
            return Ok(Vec::new());
        }

        let mut buf = vec![0u8; (end - offset) as usize];
        let first_chunk = offset / self.chunk_size() * self.chunk_size();
        let rows = self.store().query(
            "SELECT offset, data, length FROM chunks
             WHERE ino = ?1 AND offset >= ?2 AND offset < ?3
             ORDER BY offset",
            &[ino.into(), first_chunk.into(), end.into()],
        )?;

        for row in rows {
            let chunk_offset = row.u64(0)?;
            let data = row.blob(1)?;
            let stored_len = row.u64(2)? as usize;
            let chunk_end = chunk_offset + stored_len as u64;

            let copy_start = offset.max(chunk_offset);
            let copy_end = end.min(chunk_end);
            if copy_start < copy_end {
                let dst = (copy_start - offset) as usize;
                let src = (copy_start - chunk_offset) as usize;
                let len = (copy_end - copy_start) as usize;
                buf[dst..dst + len].copy_from_slice(&data[src..src + len]);
            }
        }
        Ok(buf)
    }

    /// Overlay `data` at `offset`, chunk by chunk.
    ///
    /// The final chunk of the write keeps the longer of its existing stored
    /// length and the bytes now covered, so overlapping writes never shorten
    /// a chunk. Callers preflight capacity and recompute sizes afterwards.
    pub(crate) fn write_at(&self, ino: u64, offset: u64, data: &[u8]) -> FsResult<()> {
        let cs = self.chunk_size() as usize;
        let mut written = 0usize;
        while written < data.len() {
            let abs = offset + written as u64;
            let chunk_offset = abs / self.chunk_size() * self.chunk_size();
            let off_in_chunk = (abs - chunk_offset) as usize;
            let write_len = (cs - off_in_chunk).min(data.len() - written);
            let is_last = written + write_len == data.len();

            let (mut chunk_data, existing_len) = match self.store().query_opt(
                "SELECT data, length FROM chunks WHERE ino = ?1 AND offset = ?2",
                &[ino.into(), chunk_offset.into()],
            )? {
                Some(row) => (row.blob(0)?.to_vec(), row.u64(1)? as usize),
                None => (Vec::new(), 0),
            };
            chunk_data.resize(cs, 0);
            chunk_data[off_in_chunk..off_in_chunk + write_len]
                .copy_from_slice(&data[written..written + write_len]);

            let new_len = if is_last {
                existing_len.max(off_in_chunk + write_len).min(cs)
            } else {
                cs
            };
            self.store().execute(
                "INSERT INTO chunks (ino, offset, data, length) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(ino, offset) DO UPDATE SET
                     data = excluded.data, length = excluded.length",
                &[
                    ino.into(),
                    chunk_offset.into(),
                    SqlValue::from(&chunk_data[..new_len]),
                    (new_len as u64).into(),
                ],
            )?;
            written += write_len;
        }
        Ok(())
    }

    /// Drop or trim chunks so no stored byte lies at or beyond `size`.
    ///
    /// The straddling chunk is read before the range delete, then re-inserted
    /// trimmed (zero-padded when `size` lands past its stored length).
    pub(crate) fn truncate_chunks(&self, ino: u64, size: u64) -> FsResult<()> {
        let boundary = size / self.chunk_size() * self.chunk_size();
        let keep = (size - boundary) as usize;

        let straddler = if keep != 0 {
            self.store()
                .query_opt(
                    "SELECT data FROM chunks WHERE ino = ?1 AND offset = ?2",
                    &[ino.into(), boundary.into()],
                )?
                .map(|row| row.blob(0).map(<[u8]>::to_vec))
                .transpose()?
        } else {
            None
        };

        self.store().execute(
            "DELETE FROM chunks WHERE ino = ?1 AND offset >= ?2",
            &[ino.into(), boundary.into()],
        )?;

        if let Some(mut data) = straddler {
            data.resize(keep, 0);
            self.store().execute(
                "INSERT INTO chunks (ino, offset, data, length) VALUES (?1, ?2, ?3, ?4)",
                &[ino.into(), boundary.into(), data.into(), (keep as u64).into()],
            )?;
        }
        Ok(())
    }

    /// Delete every chunk of an inode (unlink, destination replacement).
    pub(crate) fn delete_chunks(&self, ino: u64) -> FsResult<()> {
        self.store().execute(
            "DELETE FROM chunks WHERE ino = ?1",
            &[SqlValue::from(ino)],
        )?;
        Ok(())
    }

    /// Recompute `attr.size` from the chunk rows after a write, refresh the
    /// data timestamps, and bring `meta.space_used` back in step.
    pub(crate) fn refresh_sizes(&self, ino: u64) -> FsResult<u64> {
        let size = self.chunk_sum(ino)?;
        let mut attr = self.load_attr(ino)?;
        attr.set_size(size);
        attr.touch_data();
        self.store_attr(&attr)?;
        self.refresh_space_used()?;
        Ok(size)
    }

    /// Recompute the global `space_used` cache from the chunks relation.
    /// Idempotent and authoritative; also the crash-recovery path.
    pub(crate) fn refresh_space_used(&self) -> FsResult<u64> {
        let row = self
            .store()
            .query_opt("SELECT COALESCE(SUM(length), 0) FROM chunks", &[])?
            .ok_or_else(|| FsError::storage("SUM(length) returned no row"))?;
        let total = row.u64(0)?;
        schema::meta_set(self.store(), META_SPACE_USED, total)?;
        Ok(total)
    }
}
