//! Framework-facing hook contract and the errors it reports.

use std::io;

use thiserror::Error;

use crate::{formatter::FormatError, level::Level, log_record::LogRecord};

/// Failures of the send-with-retry protocol that are not absorbed by
/// reconnecting.
#[derive(Debug, Error)]
pub enum SendError {
    /// The write timed out twice on the same connection.
    #[error("write timed out after retry: {0}")]
    Timeout(#[source] io::Error),
    /// The transport refused this frame; the connection itself is healthy.
    #[error("frame rejected by transport: {0}")]
    Rejected(#[source] io::Error),
    /// The hook was closed while the connection was down.
    #[error("connection closed while reconnecting")]
    Closed,
}

/// Errors surfaced to callers of the hook.
#[derive(Debug, Error)]
pub enum HookError {
    /// Invalid user supplied configuration.
    #[error("invalid hook configuration: {0}")]
    InvalidConfig(String),
    /// The initial dial failed.
    #[error("failed to connect to {address}: {source}")]
    Connect {
        address: String,
        #[source]
        source: io::Error,
    },
    /// Underlying I/O error whilst creating the hook.
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error(transparent)]
    Send(#[from] SendError),
}

/// Trait implemented by sinks the logging framework fires records into.
///
/// Hooks are `Send + Sync` so a single instance can be fired from every
/// producer thread.
pub trait Hook: Send + Sync {
    /// Levels this hook wants to receive.
    fn levels(&self) -> &[Level] {
        &Level::ALL
    }

    /// Deliver one record.
    fn fire(&self, record: LogRecord) -> Result<(), HookError>;

    /// Wait for previously fired records to be written.
    fn flush(&self) -> bool {
        true
    }
}
