//! Binlog position checkpoints
//!
//! A session records its start and end positions so a later session can
//! resume where the previous one stopped reading.

use anyhow::Result;
use chrono::{DateTime, Utc};
use flashback_core::BinlogPosition;
use serde::{Deserialize, Serialize};

/// Binlog coordinates plus the time the checkpoint was taken.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BinlogCheckpoint {
    pub log_file: String,
    pub log_pos: u64,
    pub timestamp: DateTime<Utc>,
}

impl BinlogCheckpoint {
    pub fn position(&self) -> BinlogPosition {
        BinlogPosition::new(self.log_file.clone(), self.log_pos)
    }
}

impl From<BinlogPosition> for BinlogCheckpoint {
    fn from(position: BinlogPosition) -> Self {
        Self {
            log_file: position.log_file,
            log_pos: position.log_pos,
            timestamp: Utc::now(),
        }
    }
}

impl checkpoint::Checkpoint for BinlogCheckpoint {
    const DATABASE_TYPE: &'static str = "mysql-binlog";

    fn to_cli_string(&self) -> String {
        // FILE:POS; the timestamp is metadata only
        format!("{}:{}", self.log_file, self.log_pos)
    }

    fn from_cli_string(s: &str) -> Result<Self> {
        let position: BinlogPosition = s.parse()?;
        Ok(position.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use checkpoint::{
        Checkpoint, CheckpointConfig, CheckpointFile, CheckpointManager, SessionPhase,
    };
    use tempfile::TempDir;

    #[test]
    fn test_binlog_checkpoint_cli_string_roundtrip() {
        let original = BinlogCheckpoint::from(BinlogPosition::new("mysql-bin.000004", 1547));

        let cli_string = original.to_cli_string();
        assert_eq!(cli_string, "mysql-bin.000004:1547");

        let decoded = BinlogCheckpoint::from_cli_string(&cli_string).unwrap();
        assert_eq!(decoded.position(), original.position());
    }

    #[test]
    fn test_binlog_checkpoint_invalid_cli_string() {
        assert!(BinlogCheckpoint::from_cli_string("mysql-bin.000004").is_err());
        assert!(BinlogCheckpoint::from_cli_string("mysql-bin.000004:abc").is_err());
    }

    #[test]
    fn test_binlog_checkpoint_file_roundtrip() {
        let original = BinlogCheckpoint::from(BinlogPosition::new("mysql-bin.000001", 4));

        let file = CheckpointFile::new(&original, SessionPhase::SessionStart).unwrap();
        assert_eq!(file.database_type(), BinlogCheckpoint::DATABASE_TYPE);

        let decoded: BinlogCheckpoint = file.parse().unwrap();
        assert_eq!(decoded.position(), original.position());
        assert_eq!(
            original.timestamp.timestamp(),
            decoded.timestamp.timestamp()
        );
    }

    #[tokio::test]
    async fn test_binlog_checkpoint_save_load_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let manager = CheckpointManager::new(CheckpointConfig::emitting_to(
            tmp.path().to_string_lossy().to_string(),
        ));
        let original = BinlogCheckpoint::from(BinlogPosition::new("mysql-bin.000002", 880));

        manager
            .emit_checkpoint(&original, SessionPhase::SessionEnd)
            .await
            .unwrap();

        let loaded: BinlogCheckpoint = manager
            .read_checkpoint(SessionPhase::SessionEnd)
            .await
            .unwrap();
        assert_eq!(loaded.position(), original.position());
    }
}
