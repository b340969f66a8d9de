// ABOUTME: Error type shared by the gate, the escalation store, and configuration.
// ABOUTME: Approval failures carry stable machine names (NotFound, Expired) for the calling agent.

use std::path::PathBuf;

use thiserror::Error;

/// Single error enum for all gate operations.
///
/// Block and escalate verdicts are decisions, not errors, and never appear here.
#[derive(Debug, Error)]
pub enum GateError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("escalation store I/O error at {path}: {source}")]
    StoreIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("escalation store encoding error: {0}")]
    StoreFormat(#[from] serde_json::Error),

    #[error("NotFound: no pending escalation for nonce {nonce}")]
    NotFound { nonce: String },

    #[error("Expired: escalation {nonce} expired before it was approved")]
    Expired { nonce: String },

    #[error("pattern error: {0}")]
    Pattern(String),
}

impl GateError {
    pub(crate) fn store_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        GateError::StoreIo {
            path: path.into(),
            source,
        }
    }
}

pub type GateResult<T> = Result<T, GateError>;
