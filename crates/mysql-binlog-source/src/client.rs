//! MySQL client utilities

use anyhow::Result;
use flashback_core::{BinlogPosition, ConnectionParams};
use mysql_async::{prelude::*, OptsBuilder, Pool};
use tracing::{debug, warn};

/// Create a new MySQL connection pool
pub fn new_mysql_pool(params: &ConnectionParams) -> Result<Pool> {
    let opts = OptsBuilder::default()
        .ip_or_hostname(params.host.clone())
        .tcp_port(params.port)
        .user(Some(params.user.clone()))
        .pass(params.password.clone());
    Ok(Pool::new(opts))
}

/// Warn about server settings that make row images incomplete.
pub async fn check_binlog_settings(conn: &mut mysql_async::Conn) -> Result<()> {
    let settings: Option<(String, String)> = conn
        .query_first("SELECT @@GLOBAL.binlog_format, @@GLOBAL.binlog_row_image")
        .await?;

    if let Some((format, row_image)) = settings {
        if !format.eq_ignore_ascii_case("ROW") {
            warn!("binlog_format is {format}; only ROW events can be turned into SQL");
        }
        if !row_image.eq_ignore_ascii_case("FULL") {
            warn!("binlog_row_image is {row_image}; predicates and inserts will miss columns");
        }
    }
    Ok(())
}

/// Current end of the server's binlog.
///
/// MySQL 8.4 removed `SHOW MASTER STATUS` in favour of
/// `SHOW BINARY LOG STATUS`, so both are tried.
pub async fn current_binlog_end(conn: &mut mysql_async::Conn) -> Result<Option<BinlogPosition>> {
    let mut last_error = None;
    for query in ["SHOW BINARY LOG STATUS", "SHOW MASTER STATUS"] {
        match conn.query_first::<mysql_async::Row, _>(query).await {
            Ok(Some(row)) => {
                let file: String = row
                    .get(0)
                    .ok_or_else(|| anyhow::anyhow!("Missing binlog file in '{query}'"))?;
                let pos: u64 = row
                    .get(1)
                    .ok_or_else(|| anyhow::anyhow!("Missing binlog position in '{query}'"))?;
                return Ok(Some(BinlogPosition::new(file, pos)));
            }
            // Binary logging is off.
            Ok(None) => return Ok(None),
            Err(e) => {
                debug!("'{query}' failed: {e}");
                last_error = Some(e);
            }
        }
    }
    match last_error {
        Some(e) => Err(e.into()),
        None => Ok(None),
    }
}
