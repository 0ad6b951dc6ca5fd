//! Shared vocabulary for the tansu filesystem engine.
//!
//! This crate is the relational foundation: file metadata DTOs and the JSON
//! frames the remote adapters speak. It has **no internal tansu
//! dependencies**: a pure leaf crate that the engine and any adapter
//! (HTTP, WebSocket, FUSE bridge) build on.
//!
//! # Key Types
//!
//! |-----------------|------------------------------------------------|
//! | Type            | Purpose                                        |
//! |-----------------|------------------------------------------------|
//! | [`FileKind`]    | Directory / File / Symlink discriminator       |
//! | [`FileStat`]    | Full attribute record returned by `stat`       |
//! | [`DirEntry`]    | One directory listing entry (name + kind)      |
//! | [`DeviceStats`] | df-style capacity report                       |
//! | [`WireRequest`] | JSON request frame for the WebSocket adapter   |
//! | [`WireResponse`]| JSON response frame (`success`, `data`/`error`)|
//! |-----------------|------------------------------------------------|

pub mod fs;
pub mod wire;

pub use fs::{DeviceStats, DirEntry, FileKind, FileStat};
pub use wire::{WireOp, WireRequest, WireResponse};

/// Current time as Unix milliseconds.
///
/// All tansu timestamps (atime/mtime/ctime/crtime) use this representation.
pub fn now_millis() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
