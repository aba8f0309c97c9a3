//! Error types for binlog-to-SQL reconstruction.
//!
//! Only [`ConfigError`] and [`StreamError`] ever reach the operator.
//! [`EventRecoverableError`] describes per-event conditions that are absorbed
//! where they occur so that one malformed row never stops the session.

use thiserror::Error;

/// Invalid operator input, detected before any stream I/O.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Mode string is neither `flashback` nor `dump`.
    #[error("Unknown mode '{0}'. Expected 'flashback' or 'dump'")]
    UnknownMode(String),

    /// Window bound does not parse as `YYYY-MM-DD HH:MM:SS`.
    #[error("Invalid {field} '{value}'. Expected format YYYY-MM-DD HH:MM:SS")]
    InvalidTime { field: &'static str, value: String },

    /// Invalid IANA timezone string.
    #[error("Invalid timezone: {0}. Use IANA timezone names like 'UTC', 'Asia/Shanghai'")]
    InvalidTimezone(String),
}

/// Fatal failure of the replication stream collaborator.
#[derive(Debug, Error)]
pub enum StreamError {
    /// The stream could not be opened (connection refused, auth, bad position).
    #[error("Failed to open replication stream: {0:#}")]
    Connect(anyhow::Error),

    /// The stream failed after it was opened.
    #[error("Replication stream failed: {0:#}")]
    Replication(anyhow::Error),
}

/// Per-event conditions that degrade output for one row but never abort.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventRecoverableError {
    /// Header epoch seconds could not be converted to a wall-clock time.
    #[error("Unrepresentable event timestamp {raw}")]
    UnrepresentableTimestamp { raw: i64 },

    /// The stream delivered a row kind that is not insert, update or delete.
    #[error("Unsupported row event kind '{kind}'")]
    UnsupportedRowKind { kind: String },

    /// Row image shape does not match the row kind (e.g. a write with before/after images).
    #[error("Row image does not match row event kind '{kind}'")]
    MismatchedRowImage { kind: String },

    /// Every SET candidate was NULL, so no UPDATE can be rendered.
    #[error("UPDATE has no assignable columns")]
    EmptyAssignment,
}

/// Errors surfaced by [`crate::session::BinlogSession::run`].
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Stream(#[from] StreamError),

    /// Replay buffer scratch storage failed.
    #[error("Replay buffer I/O error: {0}")]
    Spool(#[source] std::io::Error),

    /// Writing statements to the output sink failed.
    #[error("Output I/O error: {0}")]
    Output(#[source] std::io::Error),
}

/// Result type for session operations.
pub type Result<T> = std::result::Result<T, SessionError>;
