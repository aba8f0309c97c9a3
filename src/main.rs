//! Command-line interface for binlog-flashback
//!
//! # Usage Examples
//!
//! ```bash
//! # Undo script for everything after 09:00, newest change first
//! binlog-flashback --host db1 --user repl --password secret \
//!   --start-time "2024-03-07 09:00:00" --non-blocking > undo.sql
//!
//! # Forward SQL for two tables, stopping once events pass the window
//! binlog-flashback --mode dump --databases shop --tables orders,payments \
//!   --start-file mysql-bin.000042 --start-pos 4 \
//!   --stop-time "2024-03-07 10:00:00" --stop-past-window
//!
//! # Follow the binlog until it goes quiet for five minutes
//! binlog-flashback --mode dump --idle-timeout 5m --timezone UTC
//! ```
//!
//! SQL goes to stdout (or `--output`); logs go to stderr and are controlled
//! with `RUST_LOG`.

use binlog_flashback::{open_output, prepare, run_session, Cli};
use clap::Parser;
use flashback_mysql_binlog_source::MySqlBinlogProvider;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = run().await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> anyhow::Result<()> {
    // Initialize tracing; stdout is reserved for SQL
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = prepare(&cli).await?;
    let mut sink = open_output(&cli)?;

    let summary = run_session(
        &cli,
        config,
        MySqlBinlogProvider::new(),
        &mut sink,
        Some(setup_shutdown_handler()),
    )
    .await?;

    if let Some(position) = &summary.position {
        info!(
            "Stopped at {position}; continue with --start-file {} --start-pos {}",
            position.log_file, position.log_pos
        );
    }
    Ok(())
}

fn setup_shutdown_handler() -> tokio::sync::broadcast::Receiver<()> {
    let (shutdown_tx, shutdown_rx) = tokio::sync::broadcast::channel(1);

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to install CTRL+C signal handler: {e}");
            return;
        }

        info!("Received interrupt signal (Ctrl+C), finishing up");
        let _ = shutdown_tx.send(());
    });

    shutdown_rx
}
