//! Cell normalization: every engine value becomes null, boolean, number or
//! string before it crosses the serialization boundary.

use chrono::{DateTime, NaiveDate, NaiveTime};
use duckdb::types::{TimeUnit, ValueRef};
use serde_json::{Number, Value};

pub fn to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Boolean(b) => Value::Bool(b),
        ValueRef::TinyInt(i) => Value::Number(i.into()),
        ValueRef::SmallInt(i) => Value::Number(i.into()),
        ValueRef::Int(i) => Value::Number(i.into()),
        ValueRef::BigInt(i) => Value::Number(i.into()),
        ValueRef::UTinyInt(i) => Value::Number(i.into()),
        ValueRef::USmallInt(i) => Value::Number(i.into()),
        ValueRef::UInt(i) => Value::Number(i.into()),
        ValueRef::UBigInt(i) => Value::Number(i.into()),
        ValueRef::HugeInt(i) => Number::from_i128(i)
            .map(Value::Number)
            .unwrap_or_else(|| Value::String(i.to_string())),
        ValueRef::Float(f) => float_to_json(f64::from(f)),
        ValueRef::Double(f) => float_to_json(f),
        ValueRef::Decimal(d) => Value::String(d.to_string()),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).to_string()),
        ValueRef::Blob(bytes) => Value::String(String::from_utf8_lossy(bytes).to_string()),
        ValueRef::Date32(days) => date_to_json(days),
        ValueRef::Time64(unit, v) => time_to_json(unit, v),
        ValueRef::Timestamp(unit, v) => timestamp_to_json(unit, v),
        ValueRef::Interval {
            months,
            days,
            nanos,
        } => Value::String(format!("{} months {} days {} ns", months, days, nanos)),
        other => Value::String(format!("{:?}", other)),
    }
}

fn float_to_json(f: f64) -> Value {
    // NaN/inf have no JSON number form
    Number::from_f64(f)
        .map(Value::Number)
        .unwrap_or_else(|| Value::String(f.to_string()))
}

fn date_to_json(days: i32) -> Value {
    NaiveDate::from_ymd_opt(1970, 1, 1)
        .and_then(|epoch| epoch.checked_add_signed(chrono::Duration::days(i64::from(days))))
        .map(|d| Value::String(d.format("%Y-%m-%d").to_string()))
        .unwrap_or_else(|| Value::String(days.to_string()))
}

fn time_to_json(unit: TimeUnit, v: i64) -> Value {
    to_micros(unit, v)
        .and_then(|micros| {
            let secs = u32::try_from(micros / 1_000_000).ok()?;
            let nanos = u32::try_from((micros % 1_000_000) * 1_000).ok()?;
            NaiveTime::from_num_seconds_from_midnight_opt(secs, nanos)
        })
        .map(|t| Value::String(t.format("%H:%M:%S%.6f").to_string()))
        .unwrap_or_else(|| Value::String(v.to_string()))
}

fn timestamp_to_json(unit: TimeUnit, v: i64) -> Value {
    to_micros(unit, v)
        .and_then(DateTime::from_timestamp_micros)
        .map(|ts| Value::String(ts.format("%Y-%m-%dT%H:%M:%S%.6f").to_string()))
        .unwrap_or_else(|| Value::String(v.to_string()))
}

fn to_micros(unit: TimeUnit, v: i64) -> Option<i64> {
    match unit {
        TimeUnit::Second => v.checked_mul(1_000_000),
        TimeUnit::Millisecond => v.checked_mul(1_000),
        TimeUnit::Microsecond => Some(v),
        TimeUnit::Nanosecond => Some(v / 1_000),
    }
}
