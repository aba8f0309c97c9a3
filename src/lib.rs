//! binlog-flashback
//!
//! Reads MySQL row-based binlog events and writes SQL: an undo script that
//! reverts the changes (flashback) or a forward replica of them (dump).
//!
//! # CLI Usage
//!
//! ```bash
//! # Undo everything done to shop.orders in a ten-minute window
//! binlog-flashback --user repl --password secret \
//!   --databases shop --tables orders \
//!   --start-time "2024-03-07 09:00:00" --stop-time "2024-03-07 09:10:00" \
//!   --non-blocking --output undo.sql
//!
//! # Replay changes from a known position and record where we stopped
//! binlog-flashback --mode dump --start-file mysql-bin.000042 --start-pos 4 \
//!   --non-blocking --emit-checkpoints
//!
//! # Continue from the last recorded position
//! binlog-flashback --mode dump --resume --non-blocking --emit-checkpoints
//! ```

pub mod config;

use std::fs::File;
use std::io::{BufWriter, Write};

use anyhow::Context;
use checkpoint::{CheckpointManager, SessionPhase};
use flashback_core::{
    BinlogPosition, BinlogSession, ReplicationStreamProvider, SessionConfig, SessionSummary,
};
use flashback_mysql_binlog_source::BinlogCheckpoint;
use tokio::sync::broadcast;
use tracing::{debug, info};

pub use config::{parse_duration, Cli, ConnectionOpts, SpoolArg};

/// Validate the options and work out where the session starts.
///
/// Option errors surface before any checkpoint is read.
pub async fn prepare(cli: &Cli) -> anyhow::Result<SessionConfig> {
    let mut config = cli.session_config(None)?;
    let manager = CheckpointManager::new(cli.checkpoint_config());
    config.resume = resume_position(cli, &manager).await?;
    Ok(config)
}

/// `--start-file/--start-pos` win; otherwise `--resume` reads the latest
/// `session_end` checkpoint.
pub async fn resume_position(
    cli: &Cli,
    manager: &CheckpointManager,
) -> anyhow::Result<Option<BinlogPosition>> {
    if cli.start_file.is_some() || cli.start_pos.is_some() {
        return Ok(cli.explicit_start());
    }
    if !cli.resume {
        return Ok(None);
    }

    let file = manager
        .read_latest_checkpoint(SessionPhase::SessionEnd)
        .await?
        .with_context(|| {
            format!(
                "--resume given but no {} checkpoint found in {}",
                SessionPhase::SessionEnd,
                cli.checkpoint_dir
            )
        })?;
    let checkpoint: BinlogCheckpoint = file.parse()?;
    info!(
        "Resuming from checkpoint taken at {}: {}",
        checkpoint.timestamp,
        checkpoint.position()
    );
    Ok(Some(checkpoint.position()))
}

/// Output sink: the `--output` file, or stdout.
pub fn open_output(cli: &Cli) -> anyhow::Result<Box<dyn Write>> {
    match &cli.output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create output file {}", path.display()))?;
            Ok(Box::new(BufWriter::new(file)))
        }
        None => Ok(Box::new(std::io::stdout().lock())),
    }
}

/// Run one session and record its start and end positions.
pub async fn run_session<P, W>(
    cli: &Cli,
    config: SessionConfig,
    provider: P,
    sink: &mut W,
    shutdown: Option<broadcast::Receiver<()>>,
) -> anyhow::Result<SessionSummary>
where
    P: ReplicationStreamProvider,
    W: Write,
{
    let manager = CheckpointManager::new(cli.checkpoint_config());

    if let Some(start) = &config.resume {
        manager
            .emit_checkpoint(&BinlogCheckpoint::from(start.clone()), SessionPhase::SessionStart)
            .await?;
    }

    let mut session = BinlogSession::new(config, provider);
    let summary = session.run(sink, shutdown).await?;

    match &summary.position {
        Some(end) => {
            manager
                .emit_checkpoint(&BinlogCheckpoint::from(end.clone()), SessionPhase::SessionEnd)
                .await?
        }
        None => debug!("No binlog position was reached; nothing to checkpoint"),
    }
    Ok(summary)
}
