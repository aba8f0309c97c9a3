//! Checkpoint files for binlog-flashback sessions
//!
//! A session records where it started and where it stopped reading so a
//! later session can pick up from the same binlog position.
//!
//! - [`Checkpoint`] is implemented by each source's position type
//! - [`CheckpointFile`] wraps it with type and phase metadata as JSON
//! - [`CheckpointManager`] writes and reads those files in a directory

mod config;
mod file;
mod manager;
mod phase;


pub use config::{CheckpointConfig, DEFAULT_CHECKPOINT_DIR};
pub use file::CheckpointFile;
pub use manager::CheckpointManager;
pub use phase::SessionPhase;

/// Trait that source-specific checkpoints implement.
///
/// # Example
///
/// ```rust
/// use checkpoint::Checkpoint;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, Clone, Serialize, Deserialize)]
/// pub struct OffsetCheckpoint {
///     pub offset: u64,
/// }
///
/// impl Checkpoint for OffsetCheckpoint {
///     const DATABASE_TYPE: &'static str = "offset";
///
///     fn to_cli_string(&self) -> String {
///         self.offset.to_string()
///     }
///
///     fn from_cli_string(s: &str) -> anyhow::Result<Self> {
///         Ok(Self { offset: s.parse()? })
///     }
/// }
/// ```
pub trait Checkpoint: serde::Serialize + for<'de> serde::Deserialize<'de> + Clone {
    /// Source type identifier stored in every checkpoint file and checked on load.
    const DATABASE_TYPE: &'static str;

    /// Human-readable form, accepted back by `from_cli_string()`.
    fn to_cli_string(&self) -> String;

    fn from_cli_string(s: &str) -> anyhow::Result<Self>
    where
        Self: Sized;
}
