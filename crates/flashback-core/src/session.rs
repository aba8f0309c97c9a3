//! One binlog scan, from opening the stream to the last emitted statement.
//!
//! ```text
//! Idle -> Streaming -> Draining (flashback only) -> Closed
//! ```
//!
//! Events are pulled one at a time, in binlog order. Each row is classified,
//! filtered by the time window and rendered. Dump statements go straight to
//! the sink; flashback statements are spooled and written newest first once
//! streaming ends. A stream failure skips draining entirely, because a partial
//! undo script is worse than none.

use std::fmt;
use std::io::Write;
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::classify::EventClassifier;
use crate::config::SessionConfig;
use crate::error::{Result, SessionError};
use crate::event::{BinlogPosition, RawRowsEvent};
use crate::replay::ReplayBuffer;
use crate::source::{ReplicationStreamProvider, RowEventSource, StreamRequest};
use crate::statement::{Mode, StatementReverser};
use crate::window::sentinel_timestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Streaming,
    Draining,
    Closed,
}

/// Why streaming stopped without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    /// The provider reported the end of the stream.
    Exhausted,
    /// A shutdown signal arrived.
    Shutdown,
    /// No event arrived within the idle timeout.
    IdleTimeout,
    /// An event was newer than the window's stop bound.
    PastWindow,
}

impl fmt::Display for EndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndReason::Exhausted => write!(f, "stream exhausted"),
            EndReason::Shutdown => write!(f, "shutdown requested"),
            EndReason::IdleTimeout => write!(f, "idle timeout"),
            EndReason::PastWindow => write!(f, "past stop time"),
        }
    }
}

/// Counters reported at the end of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub rows_seen: u64,
    pub rows_in_window: u64,
    pub statements: u64,
    /// Rows or events that degraded instead of failing.
    pub recovered: u64,
    pub end_reason: EndReason,
    /// Position after the last consumed event.
    pub position: Option<BinlogPosition>,
}

#[derive(Debug, Default)]
struct Counters {
    rows_seen: u64,
    rows_in_window: u64,
    statements: u64,
    recovered: u64,
}

enum Pulled {
    Event(RawRowsEvent),
    End(EndReason),
}

pub struct BinlogSession<P> {
    config: SessionConfig,
    provider: P,
    classifier: EventClassifier,
    reverser: StatementReverser,
    state: SessionState,
}

impl<P: ReplicationStreamProvider> BinlogSession<P> {
    pub fn new(config: SessionConfig, provider: P) -> Self {
        let classifier = EventClassifier::new(config.zone);
        let reverser = StatementReverser::new(config.max_predicate_len);
        Self {
            config,
            provider,
            classifier,
            reverser,
            state: SessionState::Idle,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Run the scan, writing one statement per line to `sink`.
    ///
    /// `shutdown` ends streaming at the next event boundary; flashback output
    /// is still drained in that case. The stream is closed on every path.
    pub async fn run<W: Write>(
        &mut self,
        sink: &mut W,
        shutdown: Option<broadcast::Receiver<()>>,
    ) -> Result<SessionSummary> {
        self.state = SessionState::Idle;
        let result = self.run_inner(sink, shutdown).await;
        self.state = SessionState::Closed;
        match &result {
            Ok(summary) => info!(
                rows_seen = summary.rows_seen,
                rows_in_window = summary.rows_in_window,
                statements = summary.statements,
                recovered = summary.recovered,
                position = %summary
                    .position
                    .as_ref()
                    .map(ToString::to_string)
                    .unwrap_or_else(|| "unknown".to_string()),
                "Session finished: {}",
                summary.end_reason
            ),
            Err(e) => warn!("Session aborted: {e}"),
        }
        result
    }

    async fn run_inner<W: Write>(
        &mut self,
        sink: &mut W,
        mut shutdown: Option<broadcast::Receiver<()>>,
    ) -> Result<SessionSummary> {
        let mode = self.config.mode;
        // Created before connecting so a scratch-file failure costs no I/O.
        let mut buffer = match mode {
            Mode::Flashback => Some(ReplayBuffer::new(self.config.spool).map_err(SessionError::Spool)?),
            Mode::Dump => None,
        };

        let request = StreamRequest::from_config(&self.config);
        info!(
            %mode,
            start = %self.config.window.start,
            stop = %self.config.window.stop,
            zone = %self.config.zone,
            resume = ?request.resume,
            "Opening replication stream on {}:{}",
            self.config.connection.host,
            self.config.connection.port
        );
        let mut source = self.provider.open(&self.config.connection, &request).await?;
        self.state = SessionState::Streaming;

        let mut counters = Counters::default();
        let streamed = self
            .stream(source.as_mut(), sink, buffer.as_mut(), &mut counters, &mut shutdown)
            .await;

        let position = source.position();
        if let Err(e) = source.close().await {
            warn!("Failed to close replication stream: {e}");
        }
        let end_reason = streamed?;

        if let Some(buffer) = buffer {
            self.state = SessionState::Draining;
            info!(statements = buffer.len(), "Draining flashback statements in reverse order");
            for statement in buffer.flush_reversed().map_err(SessionError::Spool)? {
                let statement = statement.map_err(SessionError::Spool)?;
                writeln!(sink, "{statement}").map_err(SessionError::Output)?;
                counters.statements += 1;
            }
        }
        sink.flush().map_err(SessionError::Output)?;

        Ok(SessionSummary {
            rows_seen: counters.rows_seen,
            rows_in_window: counters.rows_in_window,
            statements: counters.statements,
            recovered: counters.recovered,
            end_reason,
            position,
        })
    }

    async fn stream<W: Write>(
        &self,
        source: &mut dyn RowEventSource,
        sink: &mut W,
        mut buffer: Option<&mut ReplayBuffer>,
        counters: &mut Counters,
        shutdown: &mut Option<broadcast::Receiver<()>>,
    ) -> Result<EndReason> {
        loop {
            let pulled = tokio::select! {
                biased;
                _ = shutdown_signal(shutdown) => {
                    info!("Received shutdown signal");
                    Pulled::End(EndReason::Shutdown)
                }
                pulled = pull(source, self.config.idle_timeout) => pulled?,
            };

            let event = match pulled {
                Pulled::Event(event) => event,
                Pulled::End(reason) => return Ok(reason),
            };

            if let Some(reason) =
                self.process_event(event, sink, buffer.as_deref_mut(), counters)?
            {
                return Ok(reason);
            }
        }
    }

    fn process_event<W: Write>(
        &self,
        mut event: RawRowsEvent,
        sink: &mut W,
        mut buffer: Option<&mut ReplayBuffer>,
        counters: &mut Counters,
    ) -> Result<Option<EndReason>> {
        let window = &self.config.window;
        let event_time = match self.classifier.event_time(event.timestamp) {
            Ok(ts) => ts,
            Err(err) => {
                counters.recovered += 1;
                warn!(
                    schema = %event.schema,
                    table = %event.table,
                    "{err}; using {}",
                    sentinel_timestamp()
                );
                sentinel_timestamp()
            }
        };
        if self.config.stop_past_window && window.is_past(event_time) {
            return Ok(Some(EndReason::PastWindow));
        }

        let rows = std::mem::take(&mut event.rows);
        for row in rows {
            counters.rows_seen += 1;
            let change = match self.classifier.classify(&event, row) {
                Ok(change) => change,
                Err(err) => {
                    counters.recovered += 1;
                    warn!(schema = %event.schema, table = %event.table, "Skipping row: {err}");
                    continue;
                }
            };

            if !window.contains(change.timestamp) {
                debug!(timestamp = %change.timestamp, "Row outside time window");
                continue;
            }
            counters.rows_in_window += 1;

            let statement = match self.reverser.render(&change, self.config.mode) {
                Ok(statement) => statement,
                Err(err) => {
                    counters.recovered += 1;
                    warn!(schema = %change.schema, table = %change.table, "Skipping row: {err}");
                    continue;
                }
            };
            debug!(action = %change.action(), "{statement}");

            match buffer.as_deref_mut() {
                Some(buffer) => buffer.append(&statement).map_err(SessionError::Spool)?,
                None => {
                    writeln!(sink, "{statement}").map_err(SessionError::Output)?;
                    sink.flush().map_err(SessionError::Output)?;
                    counters.statements += 1;
                }
            }
        }
        Ok(None)
    }
}

async fn pull(source: &mut dyn RowEventSource, idle_timeout: Option<Duration>) -> Result<Pulled> {
    let next = match idle_timeout {
        Some(limit) => match tokio::time::timeout(limit, source.next_event()).await {
            Ok(next) => next,
            Err(_) => {
                info!("No binlog event for {limit:?}");
                return Ok(Pulled::End(EndReason::IdleTimeout));
            }
        },
        None => source.next_event().await,
    };
    match next {
        Some(Ok(event)) => Ok(Pulled::Event(event)),
        Some(Err(e)) => Err(e.into()),
        None => Ok(Pulled::End(EndReason::Exhausted)),
    }
}

/// Resolves when a shutdown is requested. Never resolves without a receiver
/// or once every sender is gone.
async fn shutdown_signal(shutdown: &mut Option<broadcast::Receiver<()>>) {
    if let Some(rx) = shutdown {
        match rx.recv().await {
            Ok(()) | Err(broadcast::error::RecvError::Lagged(_)) => return,
            Err(broadcast::error::RecvError::Closed) => {}
        }
    }
    std::future::pending::<()>().await
}
