//! Row events from a MySQL replication connection
//!
//! [`MySqlBinlogProvider`] registers as a replica with `COM_BINLOG_DUMP` and
//! hands the session a [`MySqlBinlogSource`]. Only insert, update and delete
//! rows events for the requested schemas and tables come out of it; rotate
//! events just move the tracked position.

use std::io;

use anyhow::anyhow;
use async_trait::async_trait;
use flashback_core::{
    BinlogPosition, ConnectionParams, RawColumns, RawRow, RawRowsEvent, ReplicationStreamProvider,
    RowEventSource, RowKind, StreamError, StreamRequest, Zone,
};
use futures::StreamExt;
use mysql_async::binlog::events::{Event, EventData, RowsEventData};
use mysql_async::binlog::row::BinlogRow;
use mysql_async::{BinlogStream, BinlogStreamRequest, Pool};
use tracing::{debug, info, warn};

use crate::client::{check_binlog_settings, current_binlog_end, new_mysql_pool};
use crate::convert::binlog_value;
use crate::schema::{ColumnInfo, SchemaCache};

/// Opens binlog streams against a MySQL server.
#[derive(Debug, Default, Clone, Copy)]
pub struct MySqlBinlogProvider;

impl MySqlBinlogProvider {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ReplicationStreamProvider for MySqlBinlogProvider {
    async fn open(
        &self,
        connection: &ConnectionParams,
        request: &StreamRequest,
    ) -> Result<Box<dyn RowEventSource>, StreamError> {
        let source = MySqlBinlogSource::connect(connection, request.clone())
            .await
            .map_err(StreamError::Connect)?;
        Ok(Box::new(source))
    }
}

/// A live binlog stream plus the column metadata needed to name row values.
pub struct MySqlBinlogSource {
    stream: Option<BinlogStream>,
    pool: Pool,
    schema: SchemaCache,
    request: StreamRequest,
    position: BinlogPosition,
    /// Where to stop when not following the binlog.
    end: Option<BinlogPosition>,
    closed: bool,
}

impl MySqlBinlogSource {
    pub async fn connect(
        connection: &ConnectionParams,
        request: StreamRequest,
    ) -> anyhow::Result<Self> {
        let pool = new_mysql_pool(connection)?;
        match Self::start(&pool, request).await {
            Ok((stream, request, end)) => {
                let position = request
                    .resume
                    .clone()
                    .unwrap_or_else(|| BinlogPosition::new("", 4));
                Ok(Self {
                    stream: Some(stream),
                    pool,
                    schema: SchemaCache::new(),
                    request,
                    position,
                    end,
                    closed: false,
                })
            }
            Err(e) => {
                if let Err(disconnect) = pool.disconnect().await {
                    debug!("Pool disconnect after failed open: {disconnect}");
                }
                Err(e)
            }
        }
    }

    async fn start(
        pool: &Pool,
        request: StreamRequest,
    ) -> anyhow::Result<(BinlogStream, StreamRequest, Option<BinlogPosition>)> {
        let mut conn = pool.get_conn().await?;
        check_binlog_settings(&mut conn).await?;

        let end = if request.non_blocking {
            let end = current_binlog_end(&mut conn).await?;
            if end.is_none() {
                return Err(anyhow!("Binary logging is disabled on the server"));
            }
            end
        } else {
            None
        };

        let mut dump = BinlogStreamRequest::new(request.server_id);
        if let Some(resume) = &request.resume {
            dump = dump
                .with_filename(resume.log_file.as_bytes())
                .with_pos(resume.log_pos);
        }
        let stream = conn.get_binlog_stream(dump).await?;

        match (&request.resume, &end) {
            (Some(resume), Some(end)) => info!("Reading binlog from {resume} up to {end}"),
            (Some(resume), None) => info!("Reading binlog from {resume}"),
            (None, Some(end)) => info!("Reading binlog from the first file up to {end}"),
            (None, None) => info!("Reading binlog from the first file"),
        }
        Ok((stream, request, end))
    }

    fn reached_end(&self) -> bool {
        self.end
            .as_ref()
            .is_some_and(|end| reached(&self.position, end))
    }

    async fn resolve(&mut self, decoded: DecodedRows) -> RawRowsEvent {
        let columns = match self
            .schema
            .columns(
                &self.pool,
                &decoded.schema,
                &decoded.table,
                decoded.column_count,
            )
            .await
        {
            Ok(columns) => Some(columns),
            Err(e) => {
                warn!(
                    "No column metadata for {}.{}: {e:#}",
                    decoded.schema, decoded.table
                );
                None
            }
        };
        let columns = columns.as_deref().map(Vec::as_slice);
        let zone = self.request.zone;

        let rows = decoded
            .rows
            .into_iter()
            .filter_map(|(before, after)| match (before, after) {
                (Some(before), Some(after)) => Some(RawRow::Change {
                    before: row_columns(&before, columns, zone),
                    after: row_columns(&after, columns, zone),
                }),
                (Some(image), None) | (None, Some(image)) => {
                    Some(RawRow::Values(row_columns(&image, columns, zone)))
                }
                (None, None) => None,
            })
            .collect();

        RawRowsEvent {
            schema: decoded.schema,
            table: decoded.table,
            timestamp: decoded.timestamp,
            kind: decoded.kind,
            rows,
        }
    }
}

#[async_trait]
impl RowEventSource for MySqlBinlogSource {
    async fn next_event(&mut self) -> Option<Result<RawRowsEvent, StreamError>> {
        loop {
            if self.reached_end() {
                debug!("Reached binlog end {}", self.position);
                return None;
            }
            let stream = self.stream.as_mut()?;
            let event = match stream.next().await? {
                Ok(event) => event,
                Err(e) => return Some(Err(StreamError::Replication(e.into()))),
            };

            let decoded = match self.decode(&event) {
                Ok(decoded) => decoded,
                Err(e) => {
                    return Some(Err(StreamError::Replication(anyhow!(
                        "Failed to decode binlog event at {}: {e}",
                        self.position
                    ))))
                }
            };

            match decoded {
                Decoded::Rotate(to) => {
                    track(&mut self.position, Cursor::Rotate(to));
                    debug!("Rotated to {}", self.position);
                }
                Decoded::Rows(rows) => {
                    track(&mut self.position, Cursor::Header(event.header().log_pos()));
                    return Some(Ok(self.resolve(rows).await));
                }
                Decoded::Skip => {
                    track(&mut self.position, Cursor::Header(event.header().log_pos()))
                }
            }
        }
    }

    fn position(&self) -> Option<BinlogPosition> {
        (!self.position.log_file.is_empty()).then(|| self.position.clone())
    }

    async fn close(&mut self) -> Result<(), StreamError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let stream_result = match self.stream.take() {
            Some(stream) => stream.close().await,
            None => Ok(()),
        };
        let pool_result = self.pool.clone().disconnect().await;
        stream_result
            .and(pool_result)
            .map_err(|e| StreamError::Replication(e.into()))
    }
}

/// A rows event with values still in binlog form.
struct DecodedRows {
    schema: String,
    table: String,
    column_count: usize,
    timestamp: i64,
    kind: RowKind,
    rows: Vec<(Option<BinlogRow>, Option<BinlogRow>)>,
}

/// What one binlog event means to the source.
enum Decoded {
    /// Switch to another file; the header offset belongs to the old one.
    Rotate(BinlogPosition),
    Rows(DecodedRows),
    Skip,
}

/// How an event moves the position.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Cursor {
    Rotate(BinlogPosition),
    /// Header `log_pos`: offset of the next event in the current file.
    Header(u32),
}

fn track(position: &mut BinlogPosition, cursor: Cursor) {
    match cursor {
        Cursor::Rotate(to) => *position = to,
        // Artificial events carry 0.
        Cursor::Header(0) => {}
        Cursor::Header(log_pos) => position.log_pos = u64::from(log_pos),
    }
}

impl MySqlBinlogSource {
    /// Classify `event`; rows events are decoded only for wanted tables.
    fn decode(&self, event: &Event) -> io::Result<Decoded> {
        let Some(data) = event.read_data()? else {
            return Ok(Decoded::Skip);
        };
        let rows = match data {
            EventData::RotateEvent(rotate) => {
                return Ok(Decoded::Rotate(BinlogPosition::new(
                    rotate.name(),
                    rotate.position(),
                )));
            }
            EventData::RowsEvent(rows) => rows,
            _ => return Ok(Decoded::Skip),
        };

        let Some(stream) = self.stream.as_ref() else {
            return Ok(Decoded::Skip);
        };
        let Some(tme) = stream.get_tme(rows.table_id()) else {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("rows event for unknown table id {}", rows.table_id()),
            ));
        };

        let schema = tme.database_name().into_owned();
        let table = tme.table_name().into_owned();
        if !self.request.wants_table(&schema, &table) {
            return Ok(Decoded::Skip);
        }

        let kind = match &rows {
            RowsEventData::WriteRowsEvent(_) | RowsEventData::WriteRowsEventV1(_) => RowKind::Write,
            RowsEventData::UpdateRowsEvent(_) | RowsEventData::UpdateRowsEventV1(_) => {
                RowKind::Update
            }
            RowsEventData::DeleteRowsEvent(_) | RowsEventData::DeleteRowsEventV1(_) => {
                RowKind::Delete
            }
            _ => RowKind::Other("partial_update_rows".to_string()),
        };

        let decoded = rows.rows(tme).collect::<io::Result<Vec<_>>>()?;
        Ok(Decoded::Rows(DecodedRows {
            schema,
            table,
            column_count: usize::try_from(tme.columns_count()).unwrap_or(usize::MAX),
            timestamp: i64::from(event.header().timestamp()),
            kind,
            rows: decoded,
        }))
    }
}

fn row_columns(row: &BinlogRow, columns: Option<&[ColumnInfo]>, zone: Zone) -> RawColumns {
    (0..row.len())
        .map(|idx| {
            let info = columns.and_then(|c| c.get(idx));
            (
                column_name(info, idx),
                binlog_value(row.as_ref(idx), info, zone),
            )
        })
        .collect()
}

/// Column name, or `@N` (1-based) when the table metadata does not cover it.
fn column_name(info: Option<&ColumnInfo>, idx: usize) -> String {
    info.map(|c| c.name.clone())
        .unwrap_or_else(|| format!("@{}", idx + 1))
}

/// Whether `position` is at or past `end`. Binlog file names share a base
/// name with a zero-padded sequence number, so they compare as strings.
fn reached(position: &BinlogPosition, end: &BinlogPosition) -> bool {
    if position.log_file.is_empty() {
        return false;
    }
    (position.log_file.as_str(), position.log_pos) >= (end.log_file.as_str(), end.log_pos)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reached_end() {
        let end = BinlogPosition::new("mysql-bin.000002", 500);

        assert!(!reached(&BinlogPosition::new("mysql-bin.000002", 499), &end));
        assert!(reached(&BinlogPosition::new("mysql-bin.000002", 500), &end));
        assert!(!reached(&BinlogPosition::new("mysql-bin.000001", 9000), &end));
        assert!(reached(&BinlogPosition::new("mysql-bin.000003", 4), &end));
        // Before the first rotate event the file is unknown.
        assert!(!reached(&BinlogPosition::new("", 4), &end));
    }

    #[test]
    fn test_rotate_resets_offset_into_new_file() {
        let end = BinlogPosition::new("mysql-bin.000002", 3000);
        let mut position = BinlogPosition::new("mysql-bin.000001", 4800);

        // The rotate event's own header points past the end of the old file.
        track(
            &mut position,
            Cursor::Rotate(BinlogPosition::new("mysql-bin.000002", 4)),
        );
        assert_eq!(position, BinlogPosition::new("mysql-bin.000002", 4));
        assert!(!reached(&position, &end));

        track(&mut position, Cursor::Header(300));
        assert_eq!(position, BinlogPosition::new("mysql-bin.000002", 300));
        assert!(!reached(&position, &end));

        track(&mut position, Cursor::Header(0));
        assert_eq!(position.log_pos, 300);

        track(&mut position, Cursor::Header(3000));
        assert!(reached(&position, &end));
    }

    #[test]
    fn test_header_offset_is_taken_as_is() {
        // Resuming mid-file: later events in the same file may report any offset.
        let mut position = BinlogPosition::new("mysql-bin.000003", 9000);
        track(&mut position, Cursor::Header(120));
        assert_eq!(position, BinlogPosition::new("mysql-bin.000003", 120));
    }

    #[test]
    fn test_column_names_fall_back_to_ordinals() {
        let id = ColumnInfo::new("id", "int", "int(11)");
        assert_eq!(column_name(Some(&id), 0), "id");
        assert_eq!(column_name(None, 0), "@1");
        assert_eq!(column_name(None, 6), "@7");
    }

    #[tokio::test]
    async fn test_connect_failure_is_a_connect_error() {
        let connection = ConnectionParams {
            host: "127.0.0.1".to_string(),
            // Nothing listens on the discard port.
            port: 9,
            user: "nobody".to_string(),
            password: None,
        };
        let request = StreamRequest {
            server_id: 1,
            resume: None,
            schemas: None,
            tables: None,
            non_blocking: true,
            zone: Zone::default(),
        };

        let result = MySqlBinlogProvider::new().open(&connection, &request).await;
        assert!(matches!(result, Err(StreamError::Connect(_))));
    }
}
