//! # tansu-engine
//!
//! A POSIX-shaped filesystem stored in an embedded SQL database, designed to
//! live inside a single-writer actor: one [`FsEngine`] per tenant, every
//! call serialized by the host.
//!
//! The engine owns three relations (`meta`, `files`, `chunks`, plus the
//! indices over them) and keeps three invariants after every mutation:
//! per-file size equals the sum of its chunk lengths, the global
//! `space_used` cache equals the sum of all chunk lengths, and `(parent,
//! name)` stays unique. File bytes are chunked at a fixed granularity;
//! missing chunks read as zeros.
//!
//! ```no_run
//! use tansu_engine::{FsEngine, FsConfig, MkdirOptions};
//!
//! # fn main() -> tansu_engine::FsResult<()> {
//! let fs = FsEngine::open("tenant.db", FsConfig::default())?;
//! fs.mkdir("/notes", MkdirOptions::default())?;
//! fs.write_file("/notes/today", b"Buy milk")?;
//! assert_eq!(fs.read_file("/notes/today")?, b"Buy milk");
//! # Ok(())
//! # }
//! ```
//!
//! Everything is synchronous except [`FsEngine::write_file_from`], which
//! pulls from a caller-provided [`ByteStream`] and suspends only between
//! pulls. The host's single-writer guarantee is the engine's only
//! concurrency control; no locks are taken internally.

pub mod attr;
pub mod chunk;
pub mod engine;
pub mod error;
pub mod resolve;
pub mod schema;
pub mod store;
pub mod stream;

pub use engine::{
    AttrChanges, CreateOptions, FsConfig, FsEngine, ListDirOptions, MkdirOptions, ReadOptions,
    RmdirOptions, WriteOptions,
};
pub use error::{FsError, FsResult};
pub use schema::{DEFAULT_CHUNK_SIZE, DEFAULT_DEVICE_SIZE, ROOT_INO};
pub use store::{SqlRow, SqlStore, SqlValue, SqliteStore};
pub use stream::{collect, BufferStream, ByteStream, FileReader};

// Re-export the wire vocabulary so engine users need only one import.
pub use tansu_types::{DeviceStats, DirEntry, FileKind, FileStat};
