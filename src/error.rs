use std::path::PathBuf;

use thiserror::Error;

/// Failures of the persistent key/value collaborator.
///
/// The engine never aborts an in-memory operation because of one of these;
/// they are reported to the log and the in-memory state stays authoritative.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to {op} {path:?}: {source}")]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode store document {path:?}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode value for key {key:?}: {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("value under key {key:?} has an unexpected shape: {source}")]
    Shape {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}
