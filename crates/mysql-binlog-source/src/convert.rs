//! Binlog column values to [`RawValue`]
//!
//! The binlog decoder only knows storage types, so a few columns arrive in a
//! form that loses meaning without the declared type:
//!
//! - unsigned integers with the top bit set decode as negative numbers
//! - `ENUM` and `SET` decode as index and bitmask
//! - `TIMESTAMP` decodes as epoch seconds
//! - `DECIMAL` decodes as its text
//!
//! The declared type from [`ColumnInfo`] is used to undo that.

use std::str::FromStr;

use chrono::NaiveDate;
use flashback_core::{RawValue, Zone};
use mysql_async::binlog::value::BinlogValue;
use mysql_async::Value;
use rust_decimal::Decimal;

use crate::schema::ColumnInfo;

/// Convert one value of a row image. A column missing from the image is NULL.
pub fn binlog_value(
    value: Option<&BinlogValue<'_>>,
    column: Option<&ColumnInfo>,
    zone: Zone,
) -> RawValue {
    match value {
        None => RawValue::Null,
        Some(BinlogValue::Value(v)) => mysql_value(v.clone(), column, zone),
        // TODO: render JSON columns as JSON text instead of the decoder's debug form.
        Some(other) => RawValue::Opaque(format!("{other:?}")),
    }
}

pub fn mysql_value(value: Value, column: Option<&ColumnInfo>, zone: Zone) -> RawValue {
    let data_type = column.map(|c| c.data_type.as_str()).unwrap_or_default();
    match value {
        Value::NULL => RawValue::Null,
        Value::Int(i) => int_value(i, column, zone),
        Value::UInt(u) => RawValue::UInt(u),
        Value::Float(f) => RawValue::Float(f64::from(f)),
        Value::Double(d) => RawValue::Float(d),
        Value::Date(year, month, day, hour, minute, second, micros) => {
            let date = NaiveDate::from_ymd_opt(i32::from(year), u32::from(month), u32::from(day));
            match date {
                Some(date) if data_type == "date" => RawValue::Date(date),
                Some(date) => date
                    .and_hms_micro_opt(
                        u32::from(hour),
                        u32::from(minute),
                        u32::from(second),
                        micros,
                    )
                    .map(RawValue::DateTime)
                    .unwrap_or_else(|| zero_date(year, month, day, hour, minute, second)),
                // 0000-00-00 and friends
                None => zero_date(year, month, day, hour, minute, second),
            }
        }
        Value::Time(negative, days, hours, minutes, seconds, _micros) => RawValue::Time {
            negative,
            days,
            hours,
            minutes,
            seconds,
        },
        Value::Bytes(bytes) => bytes_value(bytes, data_type, zone),
    }
}

fn int_value(i: i64, column: Option<&ColumnInfo>, zone: Zone) -> RawValue {
    let Some(column) = column else {
        return RawValue::Int(i);
    };
    match column.data_type.as_str() {
        "timestamp" => zone
            .wall_clock(i, 0)
            .map(RawValue::DateTime)
            .unwrap_or(RawValue::Int(i)),
        "enum" => {
            let label = usize::try_from(i)
                .ok()
                .and_then(|idx| idx.checked_sub(1))
                .and_then(|idx| column.members().into_iter().nth(idx));
            RawValue::Text(label.unwrap_or_default())
        }
        "set" => {
            let selected: Vec<String> = column
                .members()
                .into_iter()
                .enumerate()
                .filter(|(bit, _)| *bit < 64 && (i as u64) & (1u64 << bit) != 0)
                .map(|(_, member)| member)
                .collect();
            RawValue::Text(selected.join(","))
        }
        data_type if i < 0 && column.is_unsigned() => match data_type {
            "tinyint" => RawValue::UInt(u64::from(i as u8)),
            "smallint" => RawValue::UInt(u64::from(i as u16)),
            "mediumint" => RawValue::UInt(u64::from(i as u32 & 0x00FF_FFFF)),
            "int" | "integer" => RawValue::UInt(u64::from(i as u32)),
            _ => RawValue::UInt(i as u64),
        },
        _ => RawValue::Int(i),
    }
}

fn bytes_value(bytes: Vec<u8>, data_type: &str, zone: Zone) -> RawValue {
    let converted = match data_type {
        "decimal" => std::str::from_utf8(&bytes)
            .ok()
            .and_then(|s| Decimal::from_str(s.trim()).ok())
            .map(RawValue::Decimal),
        "timestamp" => std::str::from_utf8(&bytes)
            .ok()
            .and_then(|s| epoch_text(s.trim(), zone))
            .map(RawValue::DateTime),
        _ => None,
    };
    converted.unwrap_or(RawValue::Bytes(bytes))
}

/// `secs` or `secs.fraction`, as TIMESTAMP columns are decoded.
fn epoch_text(text: &str, zone: Zone) -> Option<chrono::NaiveDateTime> {
    let (secs, fraction) = text.split_once('.').unwrap_or((text, ""));
    let secs: i64 = secs.parse().ok()?;
    let nanos = if fraction.is_empty() {
        0
    } else {
        let digits: String = fraction.chars().take(9).collect();
        let scale = 10u32.pow(9 - digits.len() as u32);
        digits.parse::<u32>().ok()? * scale
    };
    zone.wall_clock(secs, nanos)
}

fn zero_date(year: u16, month: u8, day: u8, hour: u8, minute: u8, second: u8) -> RawValue {
    RawValue::Opaque(format!(
        "{year:04}-{month:02}-{day:02} {hour:02}:{minute:02}:{second:02}"
    ))
}
