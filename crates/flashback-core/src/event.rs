//! Row-change event data structures.
//!
//! `RawRowsEvent`/`RawRow` are what the replication stream collaborator
//! delivers; `ChangeEvent` is the normalized, immutable form produced by
//! [`crate::classify::EventClassifier`].

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::value::{RawValue, RowImage};

/// Kind of row mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Insert,
    Update,
    Delete,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Insert => write!(f, "Insert"),
            Action::Update => write!(f, "Update"),
            Action::Delete => write!(f, "Delete"),
        }
    }
}

/// Row images carried by a change. The variant fixes which images exist.
#[derive(Debug, Clone, PartialEq)]
pub enum RowChange {
    Insert { data: RowImage },
    Update { before: RowImage, after: RowImage },
    Delete { data: RowImage },
}

/// One row-level mutation extracted from the binlog.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    pub schema: String,
    pub table: String,
    /// Wall-clock time of the binlog event.
    pub timestamp: NaiveDateTime,
    pub change: RowChange,
}

impl ChangeEvent {
    pub fn action(&self) -> Action {
        match self.change {
            RowChange::Insert { .. } => Action::Insert,
            RowChange::Update { .. } => Action::Update,
            RowChange::Delete { .. } => Action::Delete,
        }
    }
}

/// Row event kind as reported by the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowKind {
    Write,
    Update,
    Delete,
    /// Any other rows event (e.g. partial JSON updates).
    Other(String),
}

impl fmt::Display for RowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowKind::Write => write!(f, "write_rows"),
            RowKind::Update => write!(f, "update_rows"),
            RowKind::Delete => write!(f, "delete_rows"),
            RowKind::Other(kind) => write!(f, "{kind}"),
        }
    }
}

/// Named raw column values in table column order.
pub type RawColumns = Vec<(String, RawValue)>;

/// One raw row entry of a rows event.
#[derive(Debug, Clone, PartialEq)]
pub enum RawRow {
    /// `values` of a write or delete.
    Values(RawColumns),
    /// `before_values`/`after_values` of an update.
    Change { before: RawColumns, after: RawColumns },
}

/// A rows event as delivered by the replication stream.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRowsEvent {
    pub schema: String,
    pub table: String,
    /// Event header timestamp, epoch seconds.
    pub timestamp: i64,
    pub kind: RowKind,
    pub rows: Vec<RawRow>,
}

/// Binlog coordinates: file name and byte offset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinlogPosition {
    pub log_file: String,
    pub log_pos: u64,
}

impl BinlogPosition {
    pub fn new(log_file: impl Into<String>, log_pos: u64) -> Self {
        Self {
            log_file: log_file.into(),
            log_pos,
        }
    }
}

impl fmt::Display for BinlogPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.log_file, self.log_pos)
    }
}

impl FromStr for BinlogPosition {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (file, pos) = s
            .rsplit_once(':')
            .ok_or_else(|| anyhow::anyhow!("Invalid binlog position '{s}': expected FILE:POS"))?;
        if file.is_empty() {
            anyhow::bail!("Invalid binlog position '{s}': empty file name");
        }
        let log_pos = pos
            .parse::<u64>()
            .map_err(|e| anyhow::anyhow!("Invalid binlog position '{s}': {e}"))?;
        Ok(Self::new(file, log_pos))
    }
}
