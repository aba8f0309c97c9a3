//! MySQL row-based binlog source for binlog-flashback
//!
//! Connects as a replica, decodes rows events and names their columns from
//! `INFORMATION_SCHEMA`. Requires `binlog_format=ROW`; `binlog_row_image=FULL`
//! is needed for complete predicates.

pub mod checkpoint;
mod client;
mod convert;
mod schema;
mod source;

pub use self::checkpoint::BinlogCheckpoint;
pub use client::{check_binlog_settings, current_binlog_end, new_mysql_pool};
pub use schema::{ColumnInfo, SchemaCache};
pub use source::{MySqlBinlogProvider, MySqlBinlogSource};
