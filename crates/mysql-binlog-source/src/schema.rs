//! Column metadata for binlog row images
//!
//! Row images only carry values in table column order. Names and declared
//! types come from `INFORMATION_SCHEMA.COLUMNS` and are cached per table.

use std::collections::HashMap;
use std::sync::Arc;

use mysql_async::{prelude::*, Pool};
use tracing::debug;

/// One table column as declared in `INFORMATION_SCHEMA.COLUMNS`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    /// `DATA_TYPE`, lowercase, e.g. `int`, `decimal`, `timestamp`.
    pub data_type: String,
    /// `COLUMN_TYPE` as declared, e.g. `int(10) unsigned`, `enum('a','B')`.
    pub column_type: String,
}

impl ColumnInfo {
    pub fn new(
        name: impl Into<String>,
        data_type: impl Into<String>,
        column_type: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into().to_ascii_lowercase(),
            column_type: column_type.into(),
        }
    }

    pub fn is_unsigned(&self) -> bool {
        self.column_type.to_ascii_lowercase().contains("unsigned")
    }

    /// Members of an `enum(...)` or `set(...)` column, in declaration order.
    pub fn members(&self) -> Vec<String> {
        let body = match (self.column_type.find('('), self.column_type.rfind(')')) {
            (Some(open), Some(close)) if open < close => &self.column_type[open + 1..close],
            _ => return Vec::new(),
        };

        let mut members = Vec::new();
        let mut current = String::new();
        let mut in_quote = false;
        let mut chars = body.chars().peekable();
        while let Some(c) = chars.next() {
            match (c, in_quote) {
                ('\'', false) => in_quote = true,
                ('\'', true) if chars.peek() == Some(&'\'') => {
                    chars.next();
                    current.push('\'');
                }
                ('\'', true) => {
                    in_quote = false;
                    members.push(std::mem::take(&mut current));
                }
                (c, true) => current.push(c),
                _ => {}
            }
        }
        members
    }
}

/// Column lists keyed by `(schema, table)`.
#[derive(Default)]
pub struct SchemaCache {
    tables: HashMap<(String, String), Arc<Vec<ColumnInfo>>>,
}

impl SchemaCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Columns of `schema`.`table`, reloaded when the cached column count
    /// differs from what the binlog reports.
    pub async fn columns(
        &mut self,
        pool: &Pool,
        schema: &str,
        table: &str,
        expected: usize,
    ) -> anyhow::Result<Arc<Vec<ColumnInfo>>> {
        let key = (schema.to_string(), table.to_string());
        if let Some(columns) = self.tables.get(&key) {
            if columns.len() == expected {
                return Ok(columns.clone());
            }
            debug!(
                "Column count of {schema}.{table} changed ({} cached, {expected} in binlog), reloading",
                columns.len()
            );
        }

        let mut conn = pool.get_conn().await?;
        let columns = Arc::new(collect_table_columns(&mut conn, schema, table).await?);
        self.tables.insert(key, columns.clone());
        Ok(columns)
    }

    #[cfg(test)]
    fn insert(&mut self, schema: &str, table: &str, columns: Vec<ColumnInfo>) {
        self.tables
            .insert((schema.to_string(), table.to_string()), Arc::new(columns));
    }
}

/// Collect the columns of one table in ordinal order.
pub async fn collect_table_columns(
    conn: &mut mysql_async::Conn,
    schema: &str,
    table: &str,
) -> anyhow::Result<Vec<ColumnInfo>> {
    let columns_query = "
        SELECT COLUMN_NAME, DATA_TYPE, COLUMN_TYPE
        FROM INFORMATION_SCHEMA.COLUMNS
        WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ?
        ORDER BY ORDINAL_POSITION";

    let rows: Vec<mysql_async::Row> = conn.exec(columns_query, (schema, table)).await?;

    let mut columns = Vec::with_capacity(rows.len());
    for row in rows {
        let name: String = row
            .get(0)
            .ok_or_else(|| anyhow::anyhow!("Missing column name"))?;
        let data_type: String = row
            .get(1)
            .ok_or_else(|| anyhow::anyhow!("Missing data type"))?;
        let column_type: String = row
            .get(2)
            .ok_or_else(|| anyhow::anyhow!("Missing column type"))?;
        columns.push(ColumnInfo::new(name, data_type, column_type));
    }

    debug!("Loaded {} columns for {schema}.{table}", columns.len());
    Ok(columns)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsigned_detection() {
        assert!(ColumnInfo::new("id", "INT", "int(10) unsigned").is_unsigned());
        assert!(!ColumnInfo::new("id", "int", "int(11)").is_unsigned());
    }

    #[test]
    fn test_enum_and_set_members() {
        let status = ColumnInfo::new("status", "ENUM", "enum('New','paid','it''s')");
        assert_eq!(status.data_type, "enum");
        assert_eq!(status.members(), vec!["New", "paid", "it's"]);

        let tags = ColumnInfo::new("tags", "set", "set('a,b','c')");
        assert_eq!(tags.members(), vec!["a,b", "c"]);

        assert!(ColumnInfo::new("n", "int", "int(11)").members().is_empty());
        assert!(ColumnInfo::new("n", "text", "text").members().is_empty());
    }

    #[tokio::test]
    async fn test_cache_hit_does_not_touch_the_server() {
        let mut cache = SchemaCache::new();
        cache.insert(
            "shop",
            "orders",
            vec![
                ColumnInfo::new("id", "int", "int(11)"),
                ColumnInfo::new("name", "varchar", "varchar(32)"),
            ],
        );
        // Never connected to; a cache miss would fail.
        let pool = Pool::from_url("mysql://nobody@127.0.0.1:1/none").unwrap();

        let columns = cache.columns(&pool, "shop", "orders", 2).await.unwrap();
        assert_eq!(columns[1].name, "name");
    }
}
