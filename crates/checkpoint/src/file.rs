//! Self-describing checkpoint file.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Checkpoint, SessionPhase};

/// A checkpoint together with the metadata needed to load it safely.
///
/// # File Format
///
/// ```json
/// {
///     "database_type": "mysql-binlog",
///     "checkpoint": {
///         "log_file": "mysql-bin.000003",
///         "log_pos": 1547
///     },
///     "phase": "SessionEnd",
///     "created_at": "2024-01-01T00:00:00Z"
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointFile {
    /// Source type identifier, checked again on load
    pub database_type: String,
    /// Serialized checkpoint data
    pub checkpoint: serde_json::Value,
    pub phase: SessionPhase,
    pub created_at: DateTime<Utc>,
}

impl CheckpointFile {
    pub fn new<C: Checkpoint>(checkpoint: &C, phase: SessionPhase) -> anyhow::Result<Self> {
        Ok(Self {
            database_type: C::DATABASE_TYPE.to_string(),
            checkpoint: serde_json::to_value(checkpoint)?,
            phase,
            created_at: Utc::now(),
        })
    }

    /// Parse the checkpoint into its concrete type.
    ///
    /// Fails if the stored `database_type` is not `C::DATABASE_TYPE` or the
    /// data does not deserialize into `C`.
    pub fn parse<C: Checkpoint>(&self) -> anyhow::Result<C> {
        if self.database_type != C::DATABASE_TYPE {
            anyhow::bail!(
                "Checkpoint type mismatch: expected '{}', found '{}'",
                C::DATABASE_TYPE,
                self.database_type
            );
        }
        Ok(serde_json::from_value(self.checkpoint.clone())?)
    }

    pub fn database_type(&self) -> &str {
        &self.database_type
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}
