//! Checkpoint emission settings.

/// Default directory for checkpoint files.
pub const DEFAULT_CHECKPOINT_DIR: &str = ".binlog-flashback-checkpoints";

/// Controls whether and where checkpoint files are written.
#[derive(Debug, Clone)]
pub struct CheckpointConfig {
    /// Write checkpoints at session start and end.
    pub emit_checkpoints: bool,

    /// Directory holding `checkpoint_{phase}_{timestamp}.json` files.
    ///
    /// If `None`, nothing is written even if `emit_checkpoints` is `true`.
    pub checkpoint_dir: Option<String>,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            emit_checkpoints: false,
            checkpoint_dir: Some(DEFAULT_CHECKPOINT_DIR.to_string()),
        }
    }
}

impl CheckpointConfig {
    /// Emit checkpoints into `checkpoint_dir`.
    pub fn emitting_to(checkpoint_dir: impl Into<String>) -> Self {
        Self {
            emit_checkpoints: true,
            checkpoint_dir: Some(checkpoint_dir.into()),
        }
    }

    /// Check if checkpoint emission is enabled and configured.
    pub fn should_emit_checkpoints(&self) -> bool {
        self.emit_checkpoints && self.checkpoint_dir.is_some()
    }
}
