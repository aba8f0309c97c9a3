//! Render a [`ChangeEvent`] as a single SQL statement.
//!
//! Flashback mode produces the logical inverse of the change, dump mode the
//! forward replica:
//!
//! | action | flashback | dump |
//! |---|---|---|
//! | insert | `DELETE ... WHERE predicate(data)` | `INSERT ... VALUE (data)` |
//! | delete | `INSERT ... VALUE (data)` | `DELETE ... WHERE predicate(data)` |
//! | update | `UPDATE ... SET before WHERE predicate(after)` | `UPDATE ... SET after WHERE predicate(before)` |

use std::fmt;
use std::str::FromStr;

use tracing::warn;

use crate::error::{ConfigError, EventRecoverableError};
use crate::event::{ChangeEvent, RowChange};
use crate::predicate::{build_assignment, build_insert_lists, build_predicate, qualified_table};
use crate::value::RowImage;

/// Default maximum text length of a value used in a WHERE predicate.
pub const DEFAULT_MAX_PREDICATE_LEN: usize = 20;

/// Matches no rows; stands in for a predicate with no usable columns.
const NO_MATCH_PREDICATE: &str = "1=0";

/// Output mode of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Undo script, emitted in reverse arrival order.
    Flashback,
    /// Redo script, emitted in arrival order.
    Dump,
}

impl FromStr for Mode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "flashback" => Ok(Mode::Flashback),
            "dump" => Ok(Mode::Dump),
            other => Err(ConfigError::UnknownMode(other.to_string())),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Flashback => write!(f, "flashback"),
            Mode::Dump => write!(f, "dump"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct StatementReverser {
    max_predicate_len: usize,
}

impl Default for StatementReverser {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PREDICATE_LEN)
    }
}

impl StatementReverser {
    pub fn new(max_predicate_len: usize) -> Self {
        Self { max_predicate_len }
    }

    /// One `;`-terminated statement for `event` under `mode`.
    ///
    /// Fails only with [`EventRecoverableError::EmptyAssignment`] when an
    /// UPDATE would have nothing to SET.
    pub fn render(&self, event: &ChangeEvent, mode: Mode) -> Result<String, EventRecoverableError> {
        let table = qualified_table(&event.schema, &event.table);
        match (&event.change, mode) {
            (RowChange::Insert { data }, Mode::Flashback)
            | (RowChange::Delete { data }, Mode::Dump) => Ok(self.delete(event, &table, data)),
            (RowChange::Insert { data }, Mode::Dump)
            | (RowChange::Delete { data }, Mode::Flashback) => Ok(insert(&table, data)),
            (RowChange::Update { before, after }, Mode::Flashback) => {
                self.update(event, &table, before, after)
            }
            (RowChange::Update { before, after }, Mode::Dump) => {
                self.update(event, &table, after, before)
            }
        }
    }

    fn delete(&self, event: &ChangeEvent, table: &str, data: &RowImage) -> String {
        let predicate = self.predicate(event, data);
        format!("DELETE FROM {table} WHERE {predicate};")
    }

    fn update(
        &self,
        event: &ChangeEvent,
        table: &str,
        set: &RowImage,
        matching: &RowImage,
    ) -> Result<String, EventRecoverableError> {
        let assignment = build_assignment(set);
        if assignment.is_empty() {
            return Err(EventRecoverableError::EmptyAssignment);
        }
        let predicate = self.predicate(event, matching);
        Ok(format!("UPDATE {table} SET {assignment} WHERE {predicate};"))
    }

    fn predicate(&self, event: &ChangeEvent, values: &RowImage) -> String {
        let predicate = build_predicate(values, self.max_predicate_len);
        if predicate.is_empty() {
            warn!(
                schema = %event.schema,
                table = %event.table,
                action = %event.action(),
                "No column qualifies for the WHERE predicate; statement will match no rows"
            );
            return NO_MATCH_PREDICATE.to_string();
        }
        predicate
    }
}

fn insert(table: &str, data: &RowImage) -> String {
    let (columns, values) = build_insert_lists(data);
    format!("INSERT INTO {table}({columns}) VALUE ({values});")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;
    use chrono::NaiveDateTime;

    fn image(pairs: &[(&str, Value)]) -> RowImage {
        pairs.iter().cloned().collect()
    }

    fn event(schema: &str, table: &str, change: RowChange) -> ChangeEvent {
        ChangeEvent {
            schema: schema.to_string(),
            table: table.to_string(),
            timestamp: NaiveDateTime::default(),
            change,
        }
    }

    #[test]
    fn test_insert_round_trip_forms() {
        let e = event(
            "shop",
            "orders",
            RowChange::Insert {
                data: image(&[("id", Value::Int(5)), ("name", Value::from("Bob"))]),
            },
        );
        let r = StatementReverser::default();

        assert_eq!(
            r.render(&e, Mode::Flashback).unwrap(),
            "DELETE FROM `shop`.`orders` WHERE `id`=5 and `name`='Bob';"
        );
        assert_eq!(
            r.render(&e, Mode::Dump).unwrap(),
            "INSERT INTO `shop`.`orders`(id,name) VALUE (5,'Bob');"
        );
    }

    #[test]
    fn test_delete_forms() {
        let e = event(
            "s",
            "t",
            RowChange::Delete {
                data: image(&[("id", Value::Int(7))]),
            },
        );
        let r = StatementReverser::default();

        assert_eq!(
            r.render(&e, Mode::Dump).unwrap(),
            "DELETE FROM `s`.`t` WHERE `id`=7;"
        );
        assert_eq!(
            r.render(&e, Mode::Flashback).unwrap(),
            "INSERT INTO `s`.`t`(id) VALUE (7);"
        );
    }

    #[test]
    fn test_update_inverse_symmetry() {
        let e = event(
            "s",
            "t",
            RowChange::Update {
                before: image(&[("a", Value::Int(1)), ("b", Value::from("x"))]),
                after: image(&[("a", Value::Int(2)), ("b", Value::from("y"))]),
            },
        );
        let r = StatementReverser::default();

        assert_eq!(
            r.render(&e, Mode::Flashback).unwrap(),
            "UPDATE `s`.`t` SET `a`=1,`b`='x' WHERE `a`=2 and `b`='y';"
        );
        assert_eq!(
            r.render(&e, Mode::Dump).unwrap(),
            "UPDATE `s`.`t` SET `a`=2,`b`='y' WHERE `a`=1 and `b`='x';"
        );
    }

    #[test]
    fn test_long_values_leave_predicate_but_stay_in_insert() {
        let long = "L".repeat(25);
        let e = event(
            "s",
            "t",
            RowChange::Insert {
                data: image(&[("id", Value::Int(1)), ("body", Value::from(long.as_str()))]),
            },
        );
        let r = StatementReverser::new(20);

        assert_eq!(
            r.render(&e, Mode::Flashback).unwrap(),
            "DELETE FROM `s`.`t` WHERE `id`=1;"
        );
        assert_eq!(
            r.render(&e, Mode::Dump).unwrap(),
            format!("INSERT INTO `s`.`t`(id,body) VALUE (1,'{long}');")
        );
    }

    #[test]
    fn test_empty_predicate_matches_nothing() {
        let e = event(
            "s",
            "t",
            RowChange::Insert {
                data: image(&[("n", Value::Null), ("z", Value::Int(0))]),
            },
        );
        assert_eq!(
            StatementReverser::default()
                .render(&e, Mode::Flashback)
                .unwrap(),
            "DELETE FROM `s`.`t` WHERE 1=0;"
        );
    }

    #[test]
    fn test_update_without_assignable_columns() {
        let e = event(
            "s",
            "t",
            RowChange::Update {
                before: image(&[("a", Value::Null)]),
                after: image(&[("a", Value::Int(1))]),
            },
        );
        let r = StatementReverser::default();
        assert_eq!(
            r.render(&e, Mode::Flashback),
            Err(EventRecoverableError::EmptyAssignment)
        );
        assert_eq!(
            r.render(&e, Mode::Dump).unwrap(),
            "UPDATE `s`.`t` SET `a`=1 WHERE 1=0;"
        );
    }

    #[test]
    fn test_null_columns_are_not_restored() {
        let e = event(
            "s",
            "t",
            RowChange::Update {
                before: image(&[("id", Value::Int(3)), ("note", Value::Null)]),
                after: image(&[("id", Value::Int(3)), ("note", Value::from("set"))]),
            },
        );
        let r = StatementReverser::default();
        // `note` keeps 'set' after the undo.
        assert_eq!(
            r.render(&e, Mode::Flashback).unwrap(),
            "UPDATE `s`.`t` SET `id`=3 WHERE `id`=3 and `note`='set';"
        );

        let deleted = event(
            "s",
            "t",
            RowChange::Delete {
                data: image(&[("id", Value::Int(3)), ("note", Value::Null)]),
            },
        );
        assert_eq!(
            r.render(&deleted, Mode::Flashback).unwrap(),
            "INSERT INTO `s`.`t`(id) VALUE (3);"
        );
    }

    #[test]
    fn test_mode_parse() {
        assert_eq!("flashback".parse::<Mode>().unwrap(), Mode::Flashback);
        assert_eq!("dump".parse::<Mode>().unwrap(), Mode::Dump);
        assert!(matches!(
            "rollback".parse::<Mode>(),
            Err(ConfigError::UnknownMode(m)) if m == "rollback"
        ));
    }
}
