//! JSON frame types for the remote adapters.
//!
//! The WebSocket adapter carries one [`WireRequest`] per operation and
//! answers with a [`WireResponse`] keyed by the same `id`. Error strings
//! are POSIX short names (`ENOENT`, `ENOSPC`, ...) so FUSE bridges can map
//! them back to errno values without a table of their own.
//!
//! The adapters themselves live outside this repository; these types are
//! the contract the engine promises to keep serializable.

use serde::{Deserialize, Serialize};

/// Operation selector for a request frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WireOp {
    Readdir,
    Getattr,
    Read,
    Write,
    Create,
    Mkdir,
    Rmdir,
    Unlink,
    Rename,
    Symlink,
    Readlink,
    Truncate,
    Statfs,
}

/// One request frame: `{id, operation, path, ...}`.
///
/// Optional fields are present only when the operation uses them; unknown
/// fields sent by older clients are ignored on deserialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireRequest {
    /// Correlation id, echoed in the response.
    pub id: u64,
    /// Which engine operation to run.
    pub operation: WireOp,
    /// Absolute POSIX path the operation applies to.
    pub path: String,
    /// Second path (rename destination, symlink target).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    /// Byte offset for read/write.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<u64>,
    /// Byte count for read.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<u64>,
    /// New size for truncate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// Mode bits for create/mkdir.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<u32>,
    /// Payload for write.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<u8>>,
}

/// One response frame: `{id, success, data | error}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireResponse {
    /// Correlation id from the request.
    pub id: u64,
    /// Whether the operation succeeded.
    pub success: bool,
    /// Operation result on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    /// POSIX short name on failure (`ENOENT`, `EEXIST`, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WireResponse {
    /// Build a success frame.
    pub fn ok(id: u64, data: impl Into<Option<serde_json::Value>>) -> Self {
        Self {
            id,
            success: true,
            data: data.into(),
            error: None,
        }
    }

    /// Build a failure frame from a POSIX short name.
    pub fn err(id: u64, code: impl Into<String>) -> Self {
        Self {
            id,
            success: false,
            data: None,
            error: Some(code.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_roundtrip() {
        let req = WireRequest {
            id: 42,
            operation: WireOp::Write,
            path: "/a/t".into(),
            target: None,
            offset: Some(8),
            length: None,
            size: None,
            mode: None,
            data: Some(b"\nCall Alice".to_vec()),
        };
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("\"operation\":\"write\""));
        let parsed: WireRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(req, parsed);
    }

    #[test]
    fn test_response_frames() {
        let ok = WireResponse::ok(1, serde_json::json!({ "size": 19 }));
        assert!(ok.success);
        assert!(ok.error.is_none());

        let err = WireResponse::err(2, "ENOENT");
        assert!(!err.success);
        assert_eq!(err.error.as_deref(), Some("ENOENT"));

        let json = serde_json::to_string(&err).unwrap();
        // data is omitted entirely on failure frames
        assert!(!json.contains("\"data\""));
    }

    #[test]
    fn test_unknown_fields_ignored() {
        let json = r#"{"id":3,"operation":"getattr","path":"/","ttl":9}"#;
        let parsed: WireRequest = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.operation, WireOp::Getattr);
    }
}
