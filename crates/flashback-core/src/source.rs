//! Traits for the replication stream collaborator.
//!
//! The session never talks to a database directly. A
//! [`ReplicationStreamProvider`] opens a [`RowEventSource`] which yields raw
//! rows events in binlog order until it is exhausted or fails.

use std::collections::HashSet;

use async_trait::async_trait;

use crate::config::{ConnectionParams, SessionConfig};
use crate::error::StreamError;
use crate::event::{BinlogPosition, RawRowsEvent};
use crate::window::Zone;

/// What the provider is asked to stream.
///
/// Only insert, update and delete rows events are ever requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRequest {
    pub server_id: u32,
    /// Start position; `None` starts at the server's first binlog.
    pub resume: Option<BinlogPosition>,
    pub schemas: Option<HashSet<String>>,
    pub tables: Option<HashSet<String>>,
    /// Stop at the current end of the binlog instead of waiting for more.
    pub non_blocking: bool,
    /// Zone for converting TIMESTAMP column payloads.
    pub zone: Zone,
}

impl StreamRequest {
    pub fn from_config(config: &SessionConfig) -> Self {
        Self {
            server_id: config.server_id,
            resume: config.resume.clone(),
            schemas: config.schemas.clone(),
            tables: config.tables.clone(),
            non_blocking: config.non_blocking,
            zone: config.zone,
        }
    }

    pub fn wants_table(&self, schema: &str, table: &str) -> bool {
        self.schemas.as_ref().map_or(true, |s| s.contains(schema))
            && self.tables.as_ref().map_or(true, |t| t.contains(table))
    }
}

/// Opens replication streams.
#[async_trait]
pub trait ReplicationStreamProvider: Send + Sync {
    /// Open a stream. Failures here are [`StreamError::Connect`].
    async fn open(
        &self,
        connection: &ConnectionParams,
        request: &StreamRequest,
    ) -> Result<Box<dyn RowEventSource>, StreamError>;
}

/// A live stream of raw rows events.
#[async_trait]
pub trait RowEventSource: Send {
    /// Next rows event, or `None` once the stream is exhausted.
    ///
    /// May wait indefinitely for new binlog data.
    async fn next_event(&mut self) -> Option<Result<RawRowsEvent, StreamError>>;

    /// Position just after the last consumed event.
    fn position(&self) -> Option<BinlogPosition>;

    /// Release the underlying connection.
    async fn close(&mut self) -> Result<(), StreamError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_filters() {
        let config = SessionConfig::builder()
            .schemas(["shop"])
            .tables(["orders"])
            .server_id(42)
            .build()
            .unwrap();
        let request = StreamRequest::from_config(&config);

        assert_eq!(request.server_id, 42);
        assert!(request.wants_table("shop", "orders"));
        assert!(!request.wants_table("shop", "users"));
        assert!(!request.wants_table("crm", "orders"));

        let open = StreamRequest::from_config(&SessionConfig::builder().build().unwrap());
        assert!(open.wants_table("anything", "at_all"));
    }
}
