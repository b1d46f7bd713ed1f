//! SQL value enum and literal rendering for INSERT statements.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

/// SQL value enum for type-safe row handling.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    String(String),
    Bytes(Vec<u8>),
    Uuid(uuid::Uuid),
    Decimal(rust_decimal::Decimal),
    DateTime(NaiveDateTime),
    Date(NaiveDate),
    Time(NaiveTime),
}

impl SqlValue {
    /// Render this value as a SQL literal.
    ///
    /// Text and binary payloads have single quotes doubled and are wrapped
    /// in quotes; date/time values are quoted in `YYYY-MM-DD HH:MM:SS`
    /// shape; booleans become `1`/`0`; NULL and numerics render bare.
    pub fn to_sql_literal(&self) -> String {
        match self {
            SqlValue::Null => "NULL".to_string(),
            SqlValue::Bool(b) => if *b { "1" } else { "0" }.to_string(),
            SqlValue::I16(v) => v.to_string(),
            SqlValue::I32(v) => v.to_string(),
            SqlValue::I64(v) => v.to_string(),
            SqlValue::F32(v) => v.to_string(),
            SqlValue::F64(v) => v.to_string(),
            SqlValue::Decimal(v) => v.to_string(),
            SqlValue::String(s) => quote_text(s),
            SqlValue::Bytes(b) => quote_text(&String::from_utf8_lossy(b)),
            SqlValue::Uuid(u) => format!("'{}'", u),
            SqlValue::DateTime(dt) => format!("'{}'", dt.format("%Y-%m-%d %H:%M:%S")),
            SqlValue::Date(d) => format!("'{}'", d.format("%Y-%m-%d")),
            SqlValue::Time(t) => format!("'{}'", t.format("%H:%M:%S")),
        }
    }
}

/// Escape single quotes by doubling and wrap in quotes.
fn quote_text(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}
