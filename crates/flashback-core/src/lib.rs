//! Core of binlog-flashback: turns MySQL row-based binlog events into SQL.
//!
//! Rows events pulled from a [`source::ReplicationStreamProvider`] are
//! classified into [`event::ChangeEvent`]s, filtered by a wall-clock
//! [`window::TimeWindow`] and rendered by [`statement::StatementReverser`]
//! either as an undo script (flashback mode, emitted newest first through a
//! [`replay::ReplayBuffer`]) or as a forward replica (dump mode).
//!
//! This crate does no database I/O itself; the MySQL replication client lives
//! in a separate crate.

pub mod classify;
pub mod config;
pub mod error;
pub mod event;
pub mod predicate;
pub mod replay;
pub mod session;
pub mod source;
pub mod statement;
pub mod value;
pub mod window;

pub use classify::EventClassifier;
pub use config::{ConnectionParams, SessionConfig, SessionConfigBuilder, DEFAULT_SERVER_ID};
pub use error::{ConfigError, EventRecoverableError, SessionError, StreamError};
pub use event::{
    Action, BinlogPosition, ChangeEvent, RawColumns, RawRow, RawRowsEvent, RowChange, RowKind,
};
pub use replay::{ReplayBuffer, ReverseStatements, SpoolKind};
pub use session::{BinlogSession, EndReason, SessionState, SessionSummary};
pub use source::{ReplicationStreamProvider, RowEventSource, StreamRequest};
pub use statement::{Mode, StatementReverser, DEFAULT_MAX_PREDICATE_LEN};
pub use value::{normalize, RawValue, RowImage, Value, DATETIME_FORMAT};
pub use window::{in_window, parse_window_time, TimeWindow, Zone};
