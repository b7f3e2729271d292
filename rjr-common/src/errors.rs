//! Error types for the runner engine.
//!
//! Workflow-level code wraps these in `anyhow` with context; the engine
//! itself stays on typed errors so callers can distinguish the fatal
//! cases (metadata, channel fault, deadline) from per-unit ones.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("metadata fetch failed: {0}")]
    MetadataFetch(String),

    #[error("required metadata key missing: {0}")]
    MissingMetadata(String),

    #[error("malformed metadata value for {key}: {value}")]
    MalformedMetadata { key: String, value: String },

    #[error("unsupported job kind: {0}")]
    UnsupportedJobKind(String),

    #[error("log channel faulted: {0}")]
    ChannelFaulted(String),

    #[error("process failed: `{command}` exited with code {code}")]
    ProcessFailed { command: String, code: i32 },

    #[error("job deadline exceeded")]
    DeadlineExceeded,

    #[error("literal parse error: {0}")]
    LiteralParse(String),

    #[error("persisted record error: {0}")]
    Persist(String),

    #[error("upload task failed: {0}")]
    Upload(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
