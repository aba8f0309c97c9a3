//! Session configuration.
//!
//! [`SessionConfig`] is assembled once through [`SessionConfigBuilder`], which
//! validates operator strings (mode, window bounds, timezone) before any
//! network I/O takes place, and is then immutable for the session.

use std::collections::HashSet;
use std::fmt;
use std::time::Duration;

use crate::error::ConfigError;
use crate::event::BinlogPosition;
use crate::replay::SpoolKind;
use crate::statement::{Mode, DEFAULT_MAX_PREDICATE_LEN};
use crate::window::{TimeWindow, Zone};

/// Replica server id used for the binlog dump when none is given.
pub const DEFAULT_SERVER_ID: u32 = 8023;

/// Connection settings handed to the replication stream provider.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionParams {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: Option<String>,
}

impl Default for ConnectionParams {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3306,
            user: "root".to_string(),
            password: None,
        }
    }
}

impl fmt::Debug for ConnectionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionParams")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

/// Operator settings for one session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub connection: ConnectionParams,
    pub mode: Mode,
    pub window: TimeWindow,
    /// Zone used for header timestamps and TIMESTAMP columns.
    pub zone: Zone,
    /// Values whose text is longer than this stay out of WHERE predicates.
    pub max_predicate_len: usize,
    /// Only these schemas, when set.
    pub schemas: Option<HashSet<String>>,
    /// Only these tables, when set.
    pub tables: Option<HashSet<String>>,
    /// Start the dump here instead of at the server's first binlog.
    pub resume: Option<BinlogPosition>,
    pub server_id: u32,
    /// End at the server's current binlog end instead of tailing.
    pub non_blocking: bool,
    /// End at the first event after the window's stop bound.
    pub stop_past_window: bool,
    /// End when no event arrives for this long.
    pub idle_timeout: Option<Duration>,
    pub spool: SpoolKind,
}

impl SessionConfig {
    pub fn builder() -> SessionConfigBuilder {
        SessionConfigBuilder::default()
    }
}

/// Collects raw operator input; [`SessionConfigBuilder::build`] validates it.
#[derive(Debug, Clone, Default)]
pub struct SessionConfigBuilder {
    connection: ConnectionParams,
    mode: Option<String>,
    start_time: Option<String>,
    stop_time: Option<String>,
    timezone: Option<String>,
    max_predicate_len: Option<usize>,
    schemas: Option<HashSet<String>>,
    tables: Option<HashSet<String>>,
    resume: Option<BinlogPosition>,
    server_id: Option<u32>,
    non_blocking: bool,
    stop_past_window: bool,
    idle_timeout: Option<Duration>,
    spool: SpoolKind,
}

impl SessionConfigBuilder {
    pub fn connection(mut self, connection: ConnectionParams) -> Self {
        self.connection = connection;
        self
    }

    /// `flashback` or `dump`. Defaults to `flashback`.
    pub fn mode(mut self, mode: impl Into<String>) -> Self {
        self.mode = Some(mode.into());
        self
    }

    pub fn start_time(mut self, start_time: Option<impl Into<String>>) -> Self {
        self.start_time = start_time.map(Into::into);
        self
    }

    pub fn stop_time(mut self, stop_time: Option<impl Into<String>>) -> Self {
        self.stop_time = stop_time.map(Into::into);
        self
    }

    /// IANA timezone name, or `local`. Defaults to the host zone.
    pub fn timezone(mut self, timezone: Option<impl Into<String>>) -> Self {
        self.timezone = timezone.map(Into::into);
        self
    }

    pub fn max_predicate_len(mut self, max_len: usize) -> Self {
        self.max_predicate_len = Some(max_len);
        self
    }

    pub fn schemas<I, S>(mut self, schemas: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.schemas = non_empty_set(schemas);
        self
    }

    pub fn tables<I, S>(mut self, tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tables = non_empty_set(tables);
        self
    }

    pub fn resume(mut self, position: Option<BinlogPosition>) -> Self {
        self.resume = position;
        self
    }

    pub fn server_id(mut self, server_id: u32) -> Self {
        self.server_id = Some(server_id);
        self
    }

    pub fn non_blocking(mut self, non_blocking: bool) -> Self {
        self.non_blocking = non_blocking;
        self
    }

    pub fn stop_past_window(mut self, stop_past_window: bool) -> Self {
        self.stop_past_window = stop_past_window;
        self
    }

    pub fn idle_timeout(mut self, idle_timeout: Option<Duration>) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    pub fn spool(mut self, spool: SpoolKind) -> Self {
        self.spool = spool;
        self
    }

    pub fn build(self) -> Result<SessionConfig, ConfigError> {
        let mode = match self.mode.as_deref() {
            Some(mode) => mode.parse()?,
            None => Mode::Flashback,
        };
        let window = TimeWindow::parse(self.start_time.as_deref(), self.stop_time.as_deref())?;
        let zone = match self.timezone.as_deref().map(str::trim) {
            None | Some("") => Zone::Local,
            Some(tz) => tz.parse()?,
        };

        Ok(SessionConfig {
            connection: self.connection,
            mode,
            window,
            zone,
            max_predicate_len: self.max_predicate_len.unwrap_or(DEFAULT_MAX_PREDICATE_LEN),
            schemas: self.schemas,
            tables: self.tables,
            resume: self.resume,
            server_id: self.server_id.unwrap_or(DEFAULT_SERVER_ID),
            non_blocking: self.non_blocking,
            stop_past_window: self.stop_past_window,
            idle_timeout: self.idle_timeout,
            spool: self.spool,
        })
    }
}

fn non_empty_set<I, S>(items: I) -> Option<HashSet<String>>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let set: HashSet<String> = items
        .into_iter()
        .map(Into::into)
        .filter(|s| !s.is_empty())
        .collect();
    (!set.is_empty()).then_some(set)
}
