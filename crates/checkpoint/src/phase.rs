//! Session phase enumeration for checkpoint tracking.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Points in a session at which a checkpoint is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionPhase {
    /// Position the session starts streaming from.
    SessionStart,

    /// Position after the last event the session consumed.
    ///
    /// A later session resumes from here.
    SessionEnd,
}

impl SessionPhase {
    /// Used in checkpoint file names, e.g. `checkpoint_session_end_20240101T000000.000000Z.json`.
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionPhase::SessionStart => "session_start",
            SessionPhase::SessionEnd => "session_end",
        }
    }
}

impl std::fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionPhase {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "session_start" => Ok(SessionPhase::SessionStart),
            "session_end" => Ok(SessionPhase::SessionEnd),
            other => Err(anyhow::anyhow!("Unknown session phase: {other}")),
        }
    }
}
