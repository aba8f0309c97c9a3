//! Raw rows event → [`ChangeEvent`].
//!
//! Pure shape transformation: maps the row kind to an action, copies the
//! table identity, converts the header timestamp and normalizes every column
//! value. No filtering happens here.

use chrono::NaiveDateTime;

use crate::error::EventRecoverableError;
use crate::event::{ChangeEvent, RawColumns, RawRow, RawRowsEvent, RowChange, RowKind};
use crate::value::{normalize, RowImage};
use crate::window::{sentinel_timestamp, Zone};

#[derive(Debug, Clone, Copy, Default)]
pub struct EventClassifier {
    zone: Zone,
}

impl EventClassifier {
    pub fn new(zone: Zone) -> Self {
        Self { zone }
    }

    pub fn zone(&self) -> Zone {
        self.zone
    }

    /// Wall-clock time for a header timestamp.
    pub fn event_time(&self, raw: i64) -> Result<NaiveDateTime, EventRecoverableError> {
        self.zone
            .wall_clock(raw, 0)
            .ok_or(EventRecoverableError::UnrepresentableTimestamp { raw })
    }

    /// Classify one row entry of `event`.
    ///
    /// An unconvertible header timestamp is replaced by the 1980-01-01
    /// sentinel. Errors are only returned for rows that cannot become a
    /// change at all; callers skip those and carry on.
    pub fn classify(
        &self,
        event: &RawRowsEvent,
        row: RawRow,
    ) -> Result<ChangeEvent, EventRecoverableError> {
        let change = match (&event.kind, row) {
            (RowKind::Write, RawRow::Values(values)) => RowChange::Insert {
                data: image(values),
            },
            (RowKind::Delete, RawRow::Values(values)) => RowChange::Delete {
                data: image(values),
            },
            (RowKind::Update, RawRow::Change { before, after }) => RowChange::Update {
                before: image(before),
                after: image(after),
            },
            (RowKind::Other(kind), _) => {
                return Err(EventRecoverableError::UnsupportedRowKind { kind: kind.clone() })
            }
            (kind, _) => {
                return Err(EventRecoverableError::MismatchedRowImage {
                    kind: kind.to_string(),
                })
            }
        };

        let timestamp = self
            .event_time(event.timestamp)
            .unwrap_or_else(|_| sentinel_timestamp());

        Ok(ChangeEvent {
            schema: event.schema.clone(),
            table: event.table.clone(),
            timestamp,
            change,
        })
    }
}

fn image(columns: RawColumns) -> RowImage {
    columns
        .into_iter()
        .map(|(name, raw)| (name, normalize(raw)))
        .collect()
}
