//! SQL clause fragments built from row images.

use std::borrow::Cow;

use crate::value::RowImage;

/// Escape a string for use inside a single-quoted MySQL literal.
pub fn escape_string(value: &str) -> Cow<'_, str> {
    if !value
        .chars()
        .any(|c| matches!(c, '\\' | '\'' | '"' | '\0' | '\n' | '\r' | '\x1a'))
    {
        return Cow::Borrowed(value);
    }
    let mut out = String::with_capacity(value.len() + 8);
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '"' => out.push_str("\\\""),
            '\0' => out.push_str("\\0"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\x1a' => out.push_str("\\Z"),
            c => out.push(c),
        }
    }
    Cow::Owned(out)
}

/// Backtick-quote an identifier.
pub fn quote_identifier(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// `` `schema`.`table` ``
pub fn qualified_table(schema: &str, table: &str) -> String {
    format!("{}.{}", quote_identifier(schema), quote_identifier(table))
}

/// `SET` clause body: `` `col`=literal `` pairs joined by `,`.
///
/// NULL values are dropped; length is not considered. A column whose value
/// was NULL is therefore left untouched by the UPDATE, so an undo cannot
/// set it back to NULL.
pub fn build_assignment(values: &RowImage) -> String {
    values
        .iter()
        .filter(|(_, v)| !v.is_null())
        .map(|(k, v)| format!("{}={}", quote_identifier(k), v.literal()))
        .collect::<Vec<_>>()
        .join(",")
}

/// `WHERE` clause body: `` `col`=literal `` pairs joined by `" and "`.
///
/// Columns whose value is falsy, or whose text is longer than `max_len`
/// characters, are left out. The result may be empty.
pub fn build_predicate(values: &RowImage, max_len: usize) -> String {
    values
        .iter()
        .filter(|(_, v)| !v.is_falsy() && v.text().chars().count() <= max_len)
        .map(|(k, v)| format!("{}={}", quote_identifier(k), v.literal()))
        .collect::<Vec<_>>()
        .join(" and ")
}

/// Column list and value list for `INSERT ... (cols) VALUE (vals)`.
///
/// Uses the assignment rules: every non-NULL column, no length filter. An
/// omitted NULL column gets the column default on insert, not NULL.
pub fn build_insert_lists(values: &RowImage) -> (String, String) {
    let (columns, literals): (Vec<&str>, Vec<String>) = values
        .iter()
        .filter(|(_, v)| !v.is_null())
        .map(|(k, v)| (k, v.literal()))
        .unzip();
    (columns.join(","), literals.join(","))
}
