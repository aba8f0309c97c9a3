//! Writing and reading checkpoint files on disk.

use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::{Checkpoint, CheckpointConfig, CheckpointFile, SessionPhase};

/// Emits and loads checkpoint files in the configured directory.
///
/// ```rust,ignore
/// let manager = CheckpointManager::new(CheckpointConfig::emitting_to("/tmp/checkpoints"));
/// manager.emit_checkpoint(&position, SessionPhase::SessionEnd).await?;
/// let resumed: BinlogCheckpoint = manager.read_checkpoint(SessionPhase::SessionEnd).await?;
/// ```
pub struct CheckpointManager {
    config: CheckpointConfig,
}

impl CheckpointManager {
    pub fn new(config: CheckpointConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CheckpointConfig {
        &self.config
    }

    /// Write `checkpoint` for `phase`. A no-op unless emission is enabled.
    pub async fn emit_checkpoint<C: Checkpoint>(
        &self,
        checkpoint: &C,
        phase: SessionPhase,
    ) -> anyhow::Result<()> {
        if !self.config.emit_checkpoints {
            return Ok(());
        }
        let dir = self.dir()?;
        std::fs::create_dir_all(dir)?;

        let file = CheckpointFile::new(checkpoint, phase)?;
        // Sortable UTC timestamp; the newest file per phase sorts last.
        let timestamp = Utc::now().format("%Y%m%dT%H%M%S%.6fZ");
        let filename = dir.join(format!("checkpoint_{}_{}.json", phase.as_str(), timestamp));

        std::fs::write(&filename, serde_json::to_string_pretty(&file)?)?;

        tracing::info!(
            "Emitted {} checkpoint to {}: {}",
            phase,
            filename.display(),
            checkpoint.to_cli_string()
        );

        Ok(())
    }

    /// Latest checkpoint file for `phase`, if any was written.
    pub async fn read_latest_checkpoint(
        &self,
        phase: SessionPhase,
    ) -> anyhow::Result<Option<CheckpointFile>> {
        let dir = self.dir()?;
        if !dir.exists() {
            return Ok(None);
        }
        let Some(path) = latest_for_phase(dir, phase)? else {
            return Ok(None);
        };

        let content = std::fs::read_to_string(&path)?;
        let file: CheckpointFile = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Invalid checkpoint file {}: {e}", path.display()))?;
        Ok(Some(file))
    }

    /// Read and parse the latest checkpoint for `phase`.
    pub async fn read_checkpoint<C: Checkpoint>(&self, phase: SessionPhase) -> anyhow::Result<C> {
        self.read_latest_checkpoint(phase)
            .await?
            .ok_or_else(|| anyhow::anyhow!("No checkpoint found for phase: {phase}"))?
            .parse::<C>()
    }

    fn dir(&self) -> anyhow::Result<&Path> {
        self.config
            .checkpoint_dir
            .as_deref()
            .map(Path::new)
            .ok_or_else(|| anyhow::anyhow!("No checkpoint directory configured"))
    }
}

fn latest_for_phase(dir: &Path, phase: SessionPhase) -> anyhow::Result<Option<PathBuf>> {
    let prefix = format!("checkpoint_{}_", phase.as_str());
    let mut latest: Option<(String, PathBuf)> = None;

    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_string();
        if !name.starts_with(&prefix) || !name.ends_with(".json") {
            continue;
        }
        if latest.as_ref().map_or(true, |(best, _)| name > *best) {
            latest = Some((name, entry.path()));
        }
    }

    Ok(latest.map(|(_, path)| path))
}
