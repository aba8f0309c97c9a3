//! CLI option handling: session configuration, resume positions and
//! checkpoint emission around a session.

use std::collections::HashSet;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use binlog_flashback::{prepare, resume_position, run_session, Cli};
use checkpoint::{CheckpointConfig, CheckpointManager, SessionPhase};
use clap::Parser;
use flashback_core::{
    BinlogPosition, ConnectionParams, Mode, RawRow, RawRowsEvent, RawValue,
    ReplicationStreamProvider, RowEventSource, RowKind, SpoolKind, StreamError, StreamRequest,
};
use flashback_mysql_binlog_source::BinlogCheckpoint;
use tempfile::TempDir;

fn cli(args: &[&str]) -> Cli {
    let mut argv = vec!["binlog-flashback"];
    argv.extend_from_slice(args);
    Cli::try_parse_from(argv).unwrap()
}

fn set(items: &[&str]) -> Option<HashSet<String>> {
    Some(items.iter().map(|s| s.to_string()).collect())
}

#[test]
fn test_defaults() -> Result<()> {
    let config = cli(&[]).session_config(None)?;

    assert_eq!(config.mode, Mode::Flashback);
    assert_eq!(config.server_id, 8023);
    assert_eq!(config.max_predicate_len, 20);
    assert_eq!(config.spool, SpoolKind::Disk);
    assert!(config.schemas.is_none());
    assert!(config.tables.is_none());
    assert!(config.idle_timeout.is_none());
    assert!(!config.non_blocking);
    Ok(())
}

#[test]
fn test_all_options() -> Result<()> {
    let config = cli(&[
        "--mode",
        "dump",
        "--databases",
        "shop,crm",
        "--tables",
        "orders",
        "--server-id",
        "99",
        "--max-predicate-len",
        "64",
        "--timezone",
        "UTC",
        "--start-time",
        "2024-03-07 09:00:00",
        "--stop-time",
        "2024-03-07 10:00:00",
        "--non-blocking",
        "--stop-past-window",
        "--idle-timeout",
        "5m",
        "--spool",
        "memory",
    ])
    .session_config(None)?;

    assert_eq!(config.mode, Mode::Dump);
    assert_eq!(config.schemas, set(&["shop", "crm"]));
    assert_eq!(config.tables, set(&["orders"]));
    assert_eq!(config.server_id, 99);
    assert_eq!(config.max_predicate_len, 64);
    assert_eq!(config.zone.to_string(), "UTC");
    assert_eq!(
        config.window.start.to_string(),
        "2024-03-07 09:00:00".to_string()
    );
    assert!(config.non_blocking);
    assert!(config.stop_past_window);
    assert_eq!(config.idle_timeout, Some(Duration::from_secs(300)));
    assert_eq!(config.spool, SpoolKind::Memory);
    Ok(())
}

#[test]
fn test_invalid_options_fail_fast() {
    let err = cli(&["--mode", "rewind"]).session_config(None).unwrap_err();
    assert!(err.to_string().contains("Unknown mode 'rewind'"));

    let err = cli(&["--start-time", "yesterday"])
        .session_config(None)
        .unwrap_err();
    assert!(err.to_string().contains("yesterday"));

    assert!(cli(&["--timezone", "Mars/Olympus"])
        .session_config(None)
        .is_err());
    assert!(cli(&["--idle-timeout", "soon"]).session_config(None).is_err());
    assert!(Cli::try_parse_from(["binlog-flashback", "--spool", "tape"]).is_err());
}

#[test]
fn test_explicit_start_needs_both_coordinates() {
    let both = cli(&["--start-file", "mysql-bin.000042", "--start-pos", "154"]);
    assert_eq!(
        both.explicit_start(),
        Some(BinlogPosition::new("mysql-bin.000042", 154))
    );

    assert_eq!(cli(&["--start-file", "mysql-bin.000042"]).explicit_start(), None);
    assert_eq!(cli(&["--start-pos", "154"]).explicit_start(), None);
}

async fn write_end_checkpoint(dir: &TempDir, position: BinlogPosition) -> Result<()> {
    CheckpointManager::new(CheckpointConfig::emitting_to(
        dir.path().to_string_lossy().to_string(),
    ))
    .emit_checkpoint(&BinlogCheckpoint::from(position), SessionPhase::SessionEnd)
    .await
}

#[tokio::test]
async fn test_resume_reads_latest_session_end() -> Result<()> {
    let tmp = TempDir::new()?;
    write_end_checkpoint(&tmp, BinlogPosition::new("mysql-bin.000007", 880)).await?;
    let dir = tmp.path().to_string_lossy().to_string();

    let config = prepare(&cli(&["--resume", "--checkpoint-dir", &dir])).await?;
    assert_eq!(
        config.resume,
        Some(BinlogPosition::new("mysql-bin.000007", 880))
    );

    // Explicit coordinates win over the checkpoint.
    let explicit = cli(&[
        "--resume",
        "--checkpoint-dir",
        &dir,
        "--start-file",
        "mysql-bin.000001",
        "--start-pos",
        "4",
    ]);
    let manager = CheckpointManager::new(explicit.checkpoint_config());
    assert_eq!(
        resume_position(&explicit, &manager).await?,
        Some(BinlogPosition::new("mysql-bin.000001", 4))
    );
    Ok(())
}

#[tokio::test]
async fn test_resume_without_checkpoint_fails() -> Result<()> {
    let tmp = TempDir::new()?;
    let dir = tmp.path().to_string_lossy().to_string();

    let err = prepare(&cli(&["--resume", "--checkpoint-dir", &dir]))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("no session_end checkpoint"));

    // Without --resume the directory is never consulted.
    assert!(prepare(&cli(&["--checkpoint-dir", &dir])).await?.resume.is_none());
    Ok(())
}

/// Yields one insert, then ends, reporting a fixed position.
struct OneInsert;

struct OneInsertSource {
    sent: bool,
}

#[async_trait]
impl ReplicationStreamProvider for OneInsert {
    async fn open(
        &self,
        _connection: &ConnectionParams,
        _request: &StreamRequest,
    ) -> Result<Box<dyn RowEventSource>, StreamError> {
        Ok(Box::new(OneInsertSource { sent: false }))
    }
}

#[async_trait]
impl RowEventSource for OneInsertSource {
    async fn next_event(&mut self) -> Option<Result<RawRowsEvent, StreamError>> {
        if self.sent {
            return None;
        }
        self.sent = true;
        Some(Ok(RawRowsEvent {
            schema: "shop".to_string(),
            table: "orders".to_string(),
            timestamp: 1_700_000_000,
            kind: RowKind::Write,
            rows: vec![RawRow::Values(vec![
                ("id".to_string(), RawValue::Int(5)),
                ("name".to_string(), RawValue::Text("Bob".to_string())),
            ])],
        }))
    }

    fn position(&self) -> Option<BinlogPosition> {
        Some(BinlogPosition::new("mysql-bin.000001", 420))
    }

    async fn close(&mut self) -> Result<(), StreamError> {
        Ok(())
    }
}

#[tokio::test]
async fn test_session_emits_start_and_end_checkpoints() -> Result<()> {
    let tmp = TempDir::new()?;
    let dir = tmp.path().to_string_lossy().to_string();
    let cli = cli(&[
        "--mode",
        "dump",
        "--timezone",
        "UTC",
        "--start-file",
        "mysql-bin.000001",
        "--start-pos",
        "4",
        "--emit-checkpoints",
        "--checkpoint-dir",
        &dir,
    ]);

    let config = prepare(&cli).await?;
    let mut out = Vec::new();
    let summary = run_session(&cli, config, OneInsert, &mut out, None).await?;

    assert_eq!(summary.statements, 1);
    assert_eq!(
        String::from_utf8(out)?.trim_end(),
        "INSERT INTO `shop`.`orders`(id,name) VALUE (5,'Bob');"
    );

    let manager = CheckpointManager::new(cli.checkpoint_config());
    let start: BinlogCheckpoint = manager.read_checkpoint(SessionPhase::SessionStart).await?;
    let end: BinlogCheckpoint = manager.read_checkpoint(SessionPhase::SessionEnd).await?;
    assert_eq!(start.position(), BinlogPosition::new("mysql-bin.000001", 4));
    assert_eq!(end.position(), BinlogPosition::new("mysql-bin.000001", 420));
    Ok(())
}

#[tokio::test]
async fn test_session_without_emit_writes_no_checkpoints() -> Result<()> {
    let tmp = TempDir::new()?;
    let dir = tmp.path().to_string_lossy().to_string();
    let cli = cli(&["--timezone", "UTC", "--checkpoint-dir", &dir]);

    let config = prepare(&cli).await?;
    let mut out = Vec::new();
    run_session(&cli, config, OneInsert, &mut out, None).await?;

    assert_eq!(
        String::from_utf8(out)?.trim_end(),
        "DELETE FROM `shop`.`orders` WHERE `id`=5 and `name`='Bob';"
    );
    assert_eq!(std::fs::read_dir(tmp.path())?.count(), 0);
    Ok(())
}
