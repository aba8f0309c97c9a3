//! Command-line options and their translation into a [`SessionConfig`].

mod duration;

use std::path::PathBuf;

use checkpoint::{CheckpointConfig, DEFAULT_CHECKPOINT_DIR};
use clap::{Parser, ValueEnum};
use flashback_core::{
    BinlogPosition, ConnectionParams, SessionConfig, SpoolKind, DEFAULT_MAX_PREDICATE_LEN,
    DEFAULT_SERVER_ID,
};
use tracing::warn;

pub use duration::parse_duration;

/// MySQL connection options
#[derive(Parser, Clone)]
pub struct ConnectionOpts {
    /// MySQL host
    #[arg(long, default_value = "127.0.0.1", env = "MYSQL_HOST")]
    pub host: String,

    /// MySQL port
    #[arg(long, default_value = "3306", env = "MYSQL_PORT")]
    pub port: u16,

    /// MySQL user; needs REPLICATION SLAVE, REPLICATION CLIENT and SELECT
    #[arg(long, default_value = "root", env = "MYSQL_USER")]
    pub user: String,

    /// MySQL password
    #[arg(long, env = "MYSQL_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
}

impl From<&ConnectionOpts> for ConnectionParams {
    fn from(opts: &ConnectionOpts) -> Self {
        Self {
            host: opts.host.clone(),
            port: opts.port,
            user: opts.user.clone(),
            password: opts.password.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SpoolArg {
    /// Anonymous temporary file
    Disk,
    /// Process memory
    Memory,
}

impl From<SpoolArg> for SpoolKind {
    fn from(arg: SpoolArg) -> Self {
        match arg {
            SpoolArg::Disk => SpoolKind::Disk,
            SpoolArg::Memory => SpoolKind::Memory,
        }
    }
}

#[derive(Parser, Clone)]
#[command(name = "binlog-flashback")]
#[command(about = "Reconstruct SQL from MySQL row-based binlog events")]
#[command(long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub connection: ConnectionOpts,

    /// `flashback` writes an undo script, newest change first; `dump` replays changes in order
    #[arg(long, default_value = "flashback")]
    pub mode: String,

    /// Binlog file to start from (needs --start-pos)
    #[arg(long)]
    pub start_file: Option<String>,

    /// Position in --start-file to start from
    #[arg(long)]
    pub start_pos: Option<u64>,

    /// Earliest event time to include, `YYYY-MM-DD HH:MM:SS`
    #[arg(long)]
    pub start_time: Option<String>,

    /// Latest event time to include, `YYYY-MM-DD HH:MM:SS`
    #[arg(long)]
    pub stop_time: Option<String>,

    /// Only these databases (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub databases: Vec<String>,

    /// Only these tables (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub tables: Vec<String>,

    /// Replica server id used for the binlog dump
    #[arg(long, default_value_t = DEFAULT_SERVER_ID)]
    pub server_id: u32,

    /// Longest value, in characters, used in a WHERE predicate
    #[arg(long, default_value_t = DEFAULT_MAX_PREDICATE_LEN)]
    pub max_predicate_len: usize,

    /// IANA timezone for event times (e.g. 'UTC', 'Asia/Shanghai'); default is local time
    #[arg(long)]
    pub timezone: Option<String>,

    /// Stop at the current end of the binlog instead of waiting for new events
    #[arg(long)]
    pub non_blocking: bool,

    /// Stop at the first event after --stop-time
    #[arg(long)]
    pub stop_past_window: bool,

    /// Stop when no event arrives for this long (e.g. '30s', '5m', '1h')
    #[arg(long)]
    pub idle_timeout: Option<String>,

    /// Where flashback statements are held until the stream ends
    #[arg(long, value_enum, default_value = "disk")]
    pub spool: SpoolArg,

    /// Write SQL here instead of stdout
    #[arg(long, short = 'o', value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Emit checkpoint files at session start and end
    #[arg(long)]
    pub emit_checkpoints: bool,

    /// Directory to write checkpoint files
    #[arg(long, default_value = DEFAULT_CHECKPOINT_DIR)]
    pub checkpoint_dir: String,

    /// Start where the last session with --emit-checkpoints stopped
    #[arg(long)]
    pub resume: bool,
}

impl Cli {
    /// `--start-file`/`--start-pos`, when both are given.
    pub fn explicit_start(&self) -> Option<BinlogPosition> {
        match (&self.start_file, self.start_pos) {
            (Some(file), Some(pos)) => Some(BinlogPosition::new(file.clone(), pos)),
            (None, None) => None,
            (Some(file), None) => {
                warn!("--start-file {file} given without --start-pos; reading from the first binlog");
                None
            }
            (None, Some(pos)) => {
                warn!("--start-pos {pos} given without --start-file; reading from the first binlog");
                None
            }
        }
    }

    pub fn checkpoint_config(&self) -> CheckpointConfig {
        CheckpointConfig {
            emit_checkpoints: self.emit_checkpoints,
            checkpoint_dir: Some(self.checkpoint_dir.clone()),
        }
    }

    /// Build the session configuration, starting at `resume` if given.
    pub fn session_config(&self, resume: Option<BinlogPosition>) -> anyhow::Result<SessionConfig> {
        let idle_timeout = self
            .idle_timeout
            .as_deref()
            .map(parse_duration)
            .transpose()?;

        let config = SessionConfig::builder()
            .connection((&self.connection).into())
            .mode(self.mode.as_str())
            .start_time(self.start_time.as_deref())
            .stop_time(self.stop_time.as_deref())
            .timezone(self.timezone.as_deref())
            .schemas(self.databases.iter().map(|s| s.trim()))
            .tables(self.tables.iter().map(|s| s.trim()))
            .max_predicate_len(self.max_predicate_len)
            .server_id(self.server_id)
            .resume(resume)
            .non_blocking(self.non_blocking)
            .stop_past_window(self.stop_past_window)
            .idle_timeout(idle_timeout)
            .spool(self.spool.into())
            .build()?;
        Ok(config)
    }
}
