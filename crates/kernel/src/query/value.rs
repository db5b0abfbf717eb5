//! Typed field values and filter value coercion.

use std::cmp::Ordering;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use uuid::Uuid;

use super::error::QueryError;
use super::types::FilterValue;
use crate::entity::FieldType;

/// A value read from a document or coerced from a filter, typed by the
/// field's declared type.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Date(DateTime<Utc>),
    Uuid(Uuid),
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Read a stored JSON value as the declared type.
    ///
    /// Missing, null, or unreadable values read as `Null`; documents are
    /// validated on write so the latter only happens for legacy rows.
    pub fn read(value: Option<&serde_json::Value>, field_type: FieldType) -> FieldValue {
        let Some(value) = value else {
            return FieldValue::Null;
        };

        let read = match field_type {
            FieldType::String => value.as_str().map(|s| FieldValue::String(s.to_string())),
            FieldType::Integer => value
                .as_i64()
                .or_else(|| value.as_f64().and_then(whole_number))
                .map(FieldValue::Integer),
            FieldType::Float => value.as_f64().map(FieldValue::Float),
            FieldType::Boolean => value.as_bool().map(FieldValue::Boolean),
            FieldType::Date => value.as_str().and_then(parse_date).map(FieldValue::Date),
            FieldType::Uuid => value
                .as_str()
                .and_then(|s| Uuid::parse_str(s).ok())
                .map(FieldValue::Uuid),
        };

        read.unwrap_or(FieldValue::Null)
    }

    /// Canonical JSON form, as stored in documents.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value;

        match self {
            FieldValue::Null => Value::Null,
            FieldValue::Boolean(b) => Value::Bool(*b),
            FieldValue::Integer(i) => Value::from(*i),
            FieldValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            FieldValue::String(s) => Value::String(s.clone()),
            FieldValue::Date(d) => Value::String(format_date(d)),
            FieldValue::Uuid(u) => Value::String(u.to_string()),
        }
    }

    /// Total order used for sorting and ordering comparisons.
    ///
    /// `Null` sorts before every value. Values of one field always share a
    /// variant, so the cross-variant arms only keep the order total.
    pub fn compare(&self, other: &FieldValue) -> Ordering {
        use FieldValue as V;

        match (self, other) {
            (V::Null, V::Null) => Ordering::Equal,
            (V::Null, _) => Ordering::Less,
            (_, V::Null) => Ordering::Greater,
            (V::Boolean(a), V::Boolean(b)) => a.cmp(b),
            (V::Integer(a), V::Integer(b)) => a.cmp(b),
            (V::Float(a), V::Float(b)) => a.total_cmp(b),
            (V::Integer(a), V::Float(b)) => (*a as f64).total_cmp(b),
            (V::Float(a), V::Integer(b)) => a.total_cmp(&(*b as f64)),
            (V::String(a), V::String(b)) => a.cmp(b),
            (V::Date(a), V::Date(b)) => a.cmp(b),
            (V::Uuid(a), V::Uuid(b)) => a.cmp(b),
            (a, b) => a.rank().cmp(&b.rank()),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            FieldValue::Null => 0,
            FieldValue::Boolean(_) => 1,
            FieldValue::Integer(_) | FieldValue::Float(_) => 2,
            FieldValue::String(_) => 3,
            FieldValue::Date(_) => 4,
            FieldValue::Uuid(_) => 5,
        }
    }
}

/// Coerce a scalar filter value to a field's declared type.
///
/// `null` stays `Null`; lists are rejected (callers unpack them first).
pub fn coerce(value: &FilterValue, field_type: FieldType, field: &str) -> Result<FieldValue, QueryError> {
    let invalid = || {
        QueryError::InvalidFilter(format!(
            "{} value for '{field}' cannot be converted to {field_type}",
            value.kind()
        ))
    };

    let coerced = match (field_type, value) {
        (_, FilterValue::Null) => Some(FieldValue::Null),
        (_, FilterValue::List(_)) => None,

        (FieldType::String, FilterValue::String(s)) => Some(FieldValue::String(s.clone())),
        (FieldType::String, FilterValue::Integer(i)) => Some(FieldValue::String(i.to_string())),
        (FieldType::String, FilterValue::Float(f)) => Some(FieldValue::String(f.to_string())),
        (FieldType::String, FilterValue::Boolean(b)) => Some(FieldValue::String(b.to_string())),
        (FieldType::String, FilterValue::Date(d)) => Some(FieldValue::String(format_date(d))),

        (FieldType::Integer, FilterValue::Integer(i)) => Some(FieldValue::Integer(*i)),
        (FieldType::Integer, FilterValue::Float(f)) => whole_number(*f).map(FieldValue::Integer),
        (FieldType::Integer, FilterValue::String(s)) => {
            s.trim().parse().ok().map(FieldValue::Integer)
        }

        (FieldType::Float, FilterValue::Integer(i)) => Some(FieldValue::Float(*i as f64)),
        (FieldType::Float, FilterValue::Float(f)) => Some(FieldValue::Float(*f)),
        (FieldType::Float, FilterValue::String(s)) => s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .map(FieldValue::Float),

        (FieldType::Boolean, FilterValue::Boolean(b)) => Some(FieldValue::Boolean(*b)),
        (FieldType::Boolean, FilterValue::String(s)) => match s.trim() {
            t if t.eq_ignore_ascii_case("true") => Some(FieldValue::Boolean(true)),
            t if t.eq_ignore_ascii_case("false") => Some(FieldValue::Boolean(false)),
            _ => None,
        },

        (FieldType::Date, FilterValue::Date(d)) => Some(FieldValue::Date(*d)),
        (FieldType::Date, FilterValue::String(s)) => parse_date(s).map(FieldValue::Date),

        (FieldType::Uuid, FilterValue::String(s)) => {
            Uuid::parse_str(s.trim()).ok().map(FieldValue::Uuid)
        }

        _ => None,
    };

    coerced.ok_or_else(invalid)
}

/// Parse an RFC 3339 timestamp or a plain `YYYY-MM-DD` date (midnight UTC).
pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

/// Canonical stored form of a timestamp.
pub fn format_date(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn whole_number(f: f64) -> Option<i64> {
    // i64::MAX is not representable as f64; the bound is exclusive.
    if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}
