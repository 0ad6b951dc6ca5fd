//! End-to-end engine scenarios over a small (8-byte) chunk size, where the
//! chunk layout is easy to reason about byte by byte.

use tansu_engine::{
    collect, BufferStream, ByteStream, FsConfig, FsEngine, FsError, FsResult, ListDirOptions,
    MkdirOptions, ReadOptions, RmdirOptions, SqlStore, WriteOptions,
};
use tansu_types::WireResponse;

fn fs8() -> FsEngine {
    FsEngine::in_memory_with(FsConfig { chunk_size: 8 }).unwrap()
}

/// All chunk rows, ordered, as `(offset, data, length)` for one path.
fn chunks_of(fs: &FsEngine, path: &str) -> Vec<(u64, Vec<u8>, u64)> {
    let ino = fs.stat(path).unwrap().ino;
    fs.store()
        .query(
            "SELECT offset, data, length FROM chunks WHERE ino = ?1 ORDER BY offset",
            &[ino.into()],
        )
        .unwrap()
        .into_iter()
        .map(|row| {
            (
                row.u64(0).unwrap(),
                row.blob(1).unwrap().to_vec(),
                row.u64(2).unwrap(),
            )
        })
        .collect()
}

#[test]
fn notes_file_write_append_read() {
    let fs = fs8();
    fs.mkdir("/a", MkdirOptions::default()).unwrap();
    fs.write_file("/a/t", b"Buy milk").unwrap();

    assert_eq!(fs.read_file("/a/t").unwrap(), b"Buy milk");
    assert_eq!(fs.stat("/a/t").unwrap().size, 8);
    assert_eq!(chunks_of(&fs, "/a/t"), vec![(0, b"Buy milk".to_vec(), 8)]);

    fs.write("/a/t", b"\nCall Alice", WriteOptions { offset: Some(8) })
        .unwrap();
    assert_eq!(fs.read_file("/a/t").unwrap(), b"Buy milk\nCall Alice");
    assert_eq!(fs.stat("/a/t").unwrap().size, 19);
    assert_eq!(
        chunks_of(&fs, "/a/t"),
        vec![
            (0, b"Buy milk".to_vec(), 8),
            (8, b"\nCall Al".to_vec(), 8),
            (16, b"ice".to_vec(), 3),
        ]
    );

    let milk = fs
        .read(
            "/a/t",
            ReadOptions {
                offset: Some(4),
                length: Some(4),
            },
        )
        .unwrap();
    assert_eq!(milk, b"milk");

    assert_eq!(fs.device_stats().unwrap().space_used, 19);
}

#[test]
fn quota_rejection_leaves_no_trace() {
    let fs = fs8();
    fs.set_device_size(10).unwrap();

    let err = fs.write_file("/big", &[0x42; 11]).unwrap_err();
    assert_eq!(err.code(), "ENOSPC");
    assert_eq!(fs.stat("/big").unwrap_err().code(), "ENOENT");
    assert_eq!(fs.device_stats().unwrap().space_used, 0);
}

#[tokio::test]
async fn streamed_upload_then_rename_over() {
    let fs = fs8();
    fs.mkdir("/a", MkdirOptions::default()).unwrap();
    fs.write_file("/a/t", b"Buy milk\nCall Alice").unwrap();
    assert_eq!(fs.device_stats().unwrap().space_used, 19);

    let mut upload = BufferStream::new([
        b"01234567".to_vec(),
        b"89abcdef".to_vec(),
        b"ghijklmn".to_vec(),
    ]);
    fs.write_file_from("/a/t.uploading", &mut upload)
        .await
        .unwrap();
    fs.rename("/a/t.uploading", "/a/t").unwrap();

    assert_eq!(fs.read_file("/a/t").unwrap(), b"0123456789abcdefghijklmn");
    assert_eq!(fs.stat("/a/t").unwrap().size, 24);
    // the prior 19-byte file's chunks are reclaimed
    assert_eq!(fs.device_stats().unwrap().space_used, 24);
    assert_eq!(fs.stat("/a/t.uploading").unwrap_err().code(), "ENOENT");
}

#[test]
fn rmdir_requires_empty_then_succeeds() {
    let fs = fs8();
    fs.mkdir("/d", MkdirOptions::default()).unwrap();
    fs.write_file("/d/f", b"x").unwrap();

    assert_eq!(
        fs.rmdir("/d", RmdirOptions::default()).unwrap_err().code(),
        "ENOTEMPTY"
    );
    fs.unlink("/d/f").unwrap();
    fs.rmdir("/d", RmdirOptions::default()).unwrap();

    let root = fs.list_dir("/", ListDirOptions::default()).unwrap();
    assert!(!root.contains(&"d".to_string()));
}

// ============================================================================
// Laws
// ============================================================================

#[test]
fn law_write_read_roundtrip() {
    let fs = fs8();
    for len in [0usize, 1, 7, 8, 9, 16, 17, 100] {
        let data: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
        let path = format!("/f{len}");
        fs.write_file(&path, &data).unwrap();
        assert_eq!(fs.read_file(&path).unwrap(), data, "len {len}");
        assert_eq!(fs.stat(&path).unwrap().size, len as u64);
    }
}

#[test]
fn law_mkdir_rmdir_restores_listing() {
    let fs = fs8();
    fs.mkdir("/keep", MkdirOptions::default()).unwrap();
    let before = fs.list_dir("/", ListDirOptions::default()).unwrap();

    fs.mkdir("/tmp", MkdirOptions::default()).unwrap();
    fs.rmdir("/tmp", RmdirOptions::default()).unwrap();

    let after = fs.list_dir("/", ListDirOptions::default()).unwrap();
    assert_eq!(before, after);
}

#[test]
fn law_rename_moves_identity() {
    let fs = fs8();
    fs.write_file("/src", b"the same bytes").unwrap();
    let before = fs.stat("/src").unwrap();

    fs.rename("/src", "/dst").unwrap();

    assert_eq!(fs.stat("/src").unwrap_err().code(), "ENOENT");
    let after = fs.stat("/dst").unwrap();
    assert_eq!(after.ino, before.ino);
    assert_eq!(after.size, before.size);
    assert_eq!(after.kind, before.kind);
    assert_eq!(after.perm, before.perm);
    assert_eq!(fs.read_file("/dst").unwrap(), b"the same bytes");
}

#[test]
fn law_space_used_matches_reachable_files() {
    let fs = fs8();
    fs.mkdir("/docs", MkdirOptions::default()).unwrap();
    fs.mkdir("/docs/old", MkdirOptions::default()).unwrap();
    fs.write_file("/docs/a", b"0123456789").unwrap();
    fs.write_file("/docs/old/b", b"0123").unwrap();
    fs.write_file("/top", b"012345678901234567890").unwrap();
    fs.unlink("/docs/old/b").unwrap();
    fs.write_file("/docs/a", b"012").unwrap();

    let mut total = 0;
    for rel in fs
        .list_dir("/", ListDirOptions { recursive: true })
        .unwrap()
    {
        if rel == "." || rel == ".." {
            continue;
        }
        let stat = fs.stat(&format!("/{rel}")).unwrap();
        if stat.is_file() {
            total += stat.size;
        }
    }
    assert_eq!(fs.device_stats().unwrap().space_used, total);
}

// ============================================================================
// Write boundaries
// ============================================================================

#[test]
fn write_at_exact_chunk_boundary() {
    let fs = fs8();
    fs.write_file("/f", b"01234567").unwrap();
    fs.write("/f", b"89abcdef", WriteOptions { offset: Some(8) })
        .unwrap();
    assert_eq!(fs.read_file("/f").unwrap(), b"0123456789abcdef");
    assert_eq!(chunks_of(&fs, "/f").len(), 2);
}

#[test]
fn write_straddling_a_boundary() {
    let fs = fs8();
    fs.write_file("/f", b"0123456789abcdef").unwrap();
    fs.write("/f", b"XXXXXXXX", WriteOptions { offset: Some(4) })
        .unwrap();
    assert_eq!(fs.read_file("/f").unwrap(), b"0123XXXXXXXXcdef");
    assert_eq!(fs.stat("/f").unwrap().size, 16);
}

#[test]
fn overlapping_rewrite_keeps_tail_bytes() {
    let fs = fs8();
    fs.write_file("/f", b"01234567").unwrap();
    // shorter write into the same chunk must not shorten it
    fs.write("/f", b"AB", WriteOptions { offset: Some(2) })
        .unwrap();
    assert_eq!(fs.read_file("/f").unwrap(), b"01AB4567");
    assert_eq!(fs.stat("/f").unwrap().size, 8);
}

#[test]
fn write_past_end_of_file_is_sparse() {
    let fs = fs8();
    fs.write_file("/f", b"01234567").unwrap();
    fs.write("/f", b"ZZ", WriteOptions { offset: Some(20) })
        .unwrap();

    // the gap reads as zeros
    let gap = fs
        .read(
            "/f",
            ReadOptions {
                offset: Some(8),
                length: Some(8),
            },
        )
        .unwrap();
    assert_eq!(gap, vec![0u8; 8]);
    let tail = fs
        .read(
            "/f",
            ReadOptions {
                offset: Some(20),
                length: Some(2),
            },
        )
        .unwrap();
    assert_eq!(tail, b"ZZ");
    // size is the chunk-length sum: 8 + (4 zeros + 2 written) = 14
    assert_eq!(fs.stat("/f").unwrap().size, 14);
    assert_eq!(
        chunks_of(&fs, "/f")
            .iter()
            .map(|(_, _, len)| len)
            .sum::<u64>(),
        14
    );
}

#[test]
fn read_past_end_returns_zeros_and_empty() {
    let fs = fs8();
    fs.write_file("/f", b"0123").unwrap();

    let beyond = fs
        .read(
            "/f",
            ReadOptions {
                offset: Some(2),
                length: Some(6),
            },
        )
        .unwrap();
    assert_eq!(beyond, b"23\0\0\0\0");

    let past = fs
        .read(
            "/f",
            ReadOptions {
                offset: Some(100),
                length: None,
            },
        )
        .unwrap();
    assert!(past.is_empty());
}

// ============================================================================
// Truncate boundaries
// ============================================================================

#[test]
fn truncate_to_zero() {
    let fs = fs8();
    fs.write_file("/f", b"Buy milk\nCall Alice").unwrap();
    fs.truncate("/f", 0).unwrap();

    assert_eq!(fs.stat("/f").unwrap().size, 0);
    assert!(chunks_of(&fs, "/f").is_empty());
    assert_eq!(fs.device_stats().unwrap().space_used, 0);
    assert_eq!(fs.read_file("/f").unwrap(), b"");
}

#[test]
fn truncate_to_chunk_boundary() {
    let fs = fs8();
    fs.write_file("/f", b"Buy milk\nCall Alice").unwrap();
    fs.truncate("/f", 16).unwrap();

    assert_eq!(fs.stat("/f").unwrap().size, 16);
    assert_eq!(fs.read_file("/f").unwrap(), b"Buy milk\nCall Al");
    assert_eq!(chunks_of(&fs, "/f").len(), 2);
    assert_eq!(fs.device_stats().unwrap().space_used, 16);
}

#[test]
fn truncate_into_last_chunk() {
    let fs = fs8();
    fs.write_file("/f", b"Buy milk\nCall Alice").unwrap();
    fs.truncate("/f", 9).unwrap();

    assert_eq!(fs.stat("/f").unwrap().size, 9);
    assert_eq!(fs.read_file("/f").unwrap(), b"Buy milk\n");
    assert_eq!(
        chunks_of(&fs, "/f"),
        vec![(0, b"Buy milk".to_vec(), 8), (8, b"\n".to_vec(), 1)]
    );
    assert_eq!(fs.device_stats().unwrap().space_used, 9);
}

#[test]
fn truncate_beyond_current_size() {
    let fs = fs8();
    fs.write_file("/f", b"0123").unwrap();
    fs.truncate("/f", 6).unwrap();

    // extension inside the tail chunk materializes zeros
    assert_eq!(fs.stat("/f").unwrap().size, 6);
    assert_eq!(fs.read_file("/f").unwrap(), b"0123\0\0");

    fs.truncate("/f", 25).unwrap();
    assert_eq!(fs.stat("/f").unwrap().size, 25);
    let all = fs
        .read(
            "/f",
            ReadOptions {
                offset: Some(0),
                length: Some(25),
            },
        )
        .unwrap();
    assert_eq!(&all[..6], b"0123\0\0");
    assert!(all[6..].iter().all(|&b| b == 0));
}

// ============================================================================
// Streams
// ============================================================================

struct FaultyStream {
    good: Vec<Vec<u8>>,
}

#[async_trait::async_trait(?Send)]
impl ByteStream for FaultyStream {
    async fn next_chunk(&mut self) -> FsResult<Option<Vec<u8>>> {
        if self.good.is_empty() {
            Err(FsError::stream("connection reset"))
        } else {
            Ok(Some(self.good.remove(0)))
        }
    }
}

#[tokio::test]
async fn stream_error_leaves_partial_file() {
    let fs = fs8();
    let mut broken = FaultyStream {
        good: vec![b"01234567".to_vec(), b"89abcdef".to_vec()],
    };

    let err = fs.write_file_from("/up", &mut broken).await.unwrap_err();
    assert_eq!(err.code(), "EIO");

    // the bytes that made it through are still there
    assert_eq!(fs.read_file("/up").unwrap(), b"0123456789abcdef");
    assert_eq!(fs.device_stats().unwrap().space_used, 16);
}

#[tokio::test]
async fn stream_enospc_mid_upload() {
    let fs = fs8();
    fs.set_device_size(20).unwrap();
    let mut upload = BufferStream::new([
        b"01234567".to_vec(),
        b"89abcdef".to_vec(),
        b"ghijklmn".to_vec(),
    ]);

    let err = fs.write_file_from("/up", &mut upload).await.unwrap_err();
    assert_eq!(err.code(), "ENOSPC");
    assert_eq!(fs.read_file("/up").unwrap(), b"0123456789abcdef");
    assert_eq!(fs.device_stats().unwrap().space_used, 16);
}

#[tokio::test]
async fn streaming_replace_reclaims_previous_bytes() {
    let fs = fs8();
    fs.write_file("/f", b"older and longer contents").unwrap();

    let mut upload = BufferStream::single(b"short".to_vec());
    fs.write_file_from("/f", &mut upload).await.unwrap();

    assert_eq!(fs.read_file("/f").unwrap(), b"short");
    assert_eq!(fs.device_stats().unwrap().space_used, 5);
}

#[tokio::test]
async fn lazy_reader_streams_whole_file() {
    let fs = fs8();
    let data: Vec<u8> = (0..45u8).collect();
    fs.write_file("/f", &data).unwrap();

    let mut reader = fs.read_file_stream("/f").unwrap();
    assert_eq!(reader.remaining(), 45);
    let first = reader.next_chunk().await.unwrap().unwrap();
    assert_eq!(first.len(), 8);

    let mut rest = first;
    rest.extend(collect(&mut reader).await.unwrap());
    assert_eq!(rest, data);
}

// ============================================================================
// Persistence and wire projection
// ============================================================================

#[test]
fn reopen_preserves_state_and_guards_chunk_size() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("tenant.db");

    {
        let fs = FsEngine::open(&db, FsConfig { chunk_size: 8 }).unwrap();
        fs.mkdir("/a", MkdirOptions::default()).unwrap();
        fs.write_file("/a/t", b"Buy milk\nCall Alice").unwrap();
        fs.set_device_size(4096).unwrap();
    }

    let fs = FsEngine::open(&db, FsConfig { chunk_size: 8 }).unwrap();
    assert_eq!(fs.read_file("/a/t").unwrap(), b"Buy milk\nCall Alice");
    let stats = fs.device_stats().unwrap();
    assert_eq!(stats.device_size, 4096);
    assert_eq!(stats.space_used, 19);
    drop(fs);

    let err = FsEngine::open(&db, FsConfig { chunk_size: 16 }).unwrap_err();
    assert!(matches!(err, FsError::ChunkSizeMismatch { stored: 8, .. }));
}

#[test]
fn errors_project_onto_wire_frames() {
    let fs = fs8();

    let err = fs.read_file("/missing").unwrap_err();
    let frame = WireResponse::err(7, err.code());
    assert!(!frame.success);
    assert_eq!(frame.error.as_deref(), Some("ENOENT"));

    fs.write_file("/f", b"Buy milk").unwrap();
    let stat = fs.stat("/f").unwrap();
    let frame = WireResponse::ok(8, serde_json::to_value(&stat).unwrap());
    let json = serde_json::to_string(&frame).unwrap();
    assert!(json.contains("\"success\":true"));
    assert!(json.contains("\"size\":8"));
}
