//! The tagged-union runtime value and its declared column type.
//!
//! Modeled on the teacher's hand-rolled `Value` (de)serialization
//! (`crates/lib-core/src/value.rs`): rather than leaning on a dynamic
//! runtime the way the PesaCoreDB-style reference does, every arithmetic,
//! coercion and ordering rule lives in explicit tables here so the rest of
//! the engine never guesses at runtime types.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// A declared column type. `Float` backs `REAL`/`DOUBLE`/`DECIMAL` aliases;
/// `DateTime` backs `TIMESTAMP`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    #[serde(rename = "INT")]
    Int,
    #[serde(rename = "FLOAT")]
    Float,
    #[serde(rename = "STRING")]
    String,
    #[serde(rename = "BOOL")]
    Bool,
    #[serde(rename = "DATE")]
    Date,
    #[serde(rename = "TIME")]
    Time,
    #[serde(rename = "DATETIME")]
    DateTime,
}

impl DataType {
    pub fn from_keyword(word: &str) -> Option<DataType> {
        Some(match word.to_ascii_uppercase().as_str() {
            "INT" | "INTEGER" => DataType::Int,
            "FLOAT" | "REAL" | "DOUBLE" | "DECIMAL" => DataType::Float,
            "STRING" | "TEXT" | "VARCHAR" => DataType::String,
            "BOOL" | "BOOLEAN" => DataType::Bool,
            "DATE" => DataType::Date,
            "TIME" => DataType::Time,
            "DATETIME" | "TIMESTAMP" => DataType::DateTime,
            _ => return None,
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            DataType::Int => "INT",
            DataType::Float => "FLOAT",
            DataType::String => "STRING",
            DataType::Bool => "BOOL",
            DataType::Date => "DATE",
            DataType::Time => "TIME",
            DataType::DateTime => "DATETIME",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A runtime value. `Null` carries no type of its own; every other
/// variant corresponds to exactly one [`DataType`].
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Integer(i64),
    Float(f64),
    Bool(bool),
    Text(String),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(NaiveDateTime),
}

impl Value {
    pub fn data_type(&self) -> Option<DataType> {
        Some(match self {
            Value::Null => return None,
            Value::Integer(_) => DataType::Int,
            Value::Float(_) => DataType::Float,
            Value::Bool(_) => DataType::Bool,
            Value::Text(_) => DataType::String,
            Value::Date(_) => DataType::Date,
            Value::Time(_) => DataType::Time,
            Value::DateTime(_) => DataType::DateTime,
        })
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// SQL truthiness for `WHERE`/`HAVING`: only `Bool(true)` admits a row.
    pub fn is_truthy(&self) -> bool {
        matches!(self, Value::Bool(true))
    }

    /// Coerce a literal/assigned value into `ty`, per spec.md 4.4's
    /// insert/update coercion rules: INT<->FLOAT widening, BOOL accepting
    /// `TRUE`/`FALSE`/`true`/`false` text, and ISO-8601 parsing for the
    /// temporal types. `Null` always passes through untouched; the caller
    /// is responsible for rejecting Null against a NOT-NULL (PK) column.
    pub fn coerce_to(&self, ty: DataType, column: &str) -> Result<Value, Error> {
        if matches!(self, Value::Null) {
            return Ok(Value::Null);
        }
        let mismatch = || Error::TypeError {
            message: format!(
                "column `{column}` expects {ty} but got {}",
                self.type_label()
            ),
        };
        Ok(match (self, ty) {
            (Value::Integer(i), DataType::Int) => Value::Integer(*i),
            (Value::Integer(i), DataType::Float) => Value::Float(*i as f64),
            (Value::Float(f), DataType::Float) => Value::Float(*f),
            (Value::Float(f), DataType::Int) => {
                if f.fract() == 0.0 {
                    Value::Integer(*f as i64)
                } else {
                    return Err(mismatch());
                }
            }
            (Value::Bool(b), DataType::Bool) => Value::Bool(*b),
            (Value::Text(s), DataType::Bool) => match s.to_ascii_lowercase().as_str() {
                "true" => Value::Bool(true),
                "false" => Value::Bool(false),
                _ => return Err(mismatch()),
            },
            (Value::Text(s), DataType::String) => Value::Text(s.clone()),
            (Value::Text(s), DataType::Int) => {
                s.parse::<i64>().map(Value::Integer).map_err(|_| mismatch())?
            }
            (Value::Text(s), DataType::Float) => {
                s.parse::<f64>().map(Value::Float).map_err(|_| mismatch())?
            }
            (Value::Text(s), DataType::Date) => {
                Value::Date(parse_date(s).ok_or_else(mismatch)?)
            }
            (Value::Text(s), DataType::Time) => {
                Value::Time(parse_time(s).ok_or_else(mismatch)?)
            }
            (Value::Text(s), DataType::DateTime) => {
                Value::DateTime(parse_datetime(s).ok_or_else(mismatch)?)
            }
            (Value::Date(d), DataType::Date) => Value::Date(*d),
            (Value::Time(t), DataType::Time) => Value::Time(*t),
            (Value::DateTime(dt), DataType::DateTime) => Value::DateTime(*dt),
            _ => return Err(mismatch()),
        })
    }

    fn type_label(&self) -> &'static str {
        match self {
            Value::Null => "NULL",
            Value::Integer(_) => "INT",
            Value::Float(_) => "FLOAT",
            Value::Bool(_) => "BOOL",
            Value::Text(_) => "STRING",
            Value::Date(_) => "DATE",
            Value::Time(_) => "TIME",
            Value::DateTime(_) => "DATETIME",
        }
    }

    /// Numeric view used by arithmetic and numeric comparisons; `Bool`
    /// widens per spec.md 4.3 (`TRUE=1, FALSE=0`).
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::Text(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }
}

/// Exact equality used by hash indexes (spec.md 3: "Index ... hash map
/// from Value to set of row positions"). This is NOT the three-valued SQL
/// `=` used in WHERE — see `eval::compare_values` for that.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Date(a), Value::Date(b)) => a == b,
            (Value::Time(a), Value::Time(b)) => a == b,
            (Value::DateTime(a), Value::DateTime(b)) => a == b,
            _ => false,
        }
    }
}
impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Null => {}
            Value::Integer(i) => i.hash(state),
            Value::Float(f) => f.to_bits().hash(state),
            Value::Bool(b) => b.hash(state),
            Value::Text(s) => s.hash(state),
            Value::Date(d) => d.hash(state),
            Value::Time(t) => t.hash(state),
            Value::DateTime(dt) => dt.hash(state),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Text(s) => write!(f, "{s}"),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Value::Time(t) => write!(f, "{}", t.format("%H:%M:%S%.f")),
            Value::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%dT%H:%M:%S%.f")),
        }
    }
}

/// A total order over comparable values, used by ORDER BY / MIN / MAX.
/// Returns `None` when the two values are not well-ordered against each
/// other (different, non-numeric types) -- callers that need three-valued
/// comparison semantics (Null handling) go through `eval::compare_values`
/// instead, which is the only place SQL's Null rules are allowed to live.
pub fn total_cmp(a: &Value, b: &Value) -> Option<Ordering> {
    use Value::*;
    match (a, b) {
        (Null, Null) => Some(Ordering::Equal),
        (Null, _) => None,
        (_, Null) => None,
        (Integer(x), Integer(y)) => x.partial_cmp(y),
        (Text(x), Text(y)) => Some(x.as_str().cmp(y.as_str())),
        (Bool(x), Bool(y)) => x.partial_cmp(y),
        (Date(x), Date(y)) => x.partial_cmp(y),
        (Time(x), Time(y)) => x.partial_cmp(y),
        (DateTime(x), DateTime(y)) => x.partial_cmp(y),
        _ => {
            let (Some(x), Some(y)) = (numeric_view(a), numeric_view(b)) else {
                return None;
            };
            x.partial_cmp(&y)
        }
    }
}

fn numeric_view(v: &Value) -> Option<f64> {
    match v {
        Value::Integer(_) | Value::Float(_) | Value::Bool(_) => v.as_f64(),
        Value::Text(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

pub fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok()
}

pub fn parse_time(s: &str) -> Option<NaiveTime> {
    let s = s.trim();
    NaiveTime::parse_from_str(s, "%H:%M:%S%.f")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
        .ok()
}

/// Accepts both `T` and a space between date and time (spec.md 9); rejects
/// trailing timezone markers by construction (no offset format present).
pub fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    let normalized;
    let s = if let Some((d, t)) = s.split_once(' ') {
        normalized = format!("{d}T{t}");
        normalized.as_str()
    } else {
        s
    };
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S"))
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M"))
        .ok()
}

pub fn date_add(d: NaiveDate, days: i64) -> NaiveDate {
    d + Duration::days(days)
}

pub fn datediff(a: NaiveDate, b: NaiveDate) -> i64 {
    (a - b).num_days()
}

/// 1 = Sunday ... 7 = Saturday, per spec.md 4.3.
pub fn day_of_week(d: NaiveDate) -> i64 {
    match d.weekday() {
        Weekday::Sun => 1,
        Weekday::Mon => 2,
        Weekday::Tue => 3,
        Weekday::Wed => 4,
        Weekday::Thu => 5,
        Weekday::Fri => 6,
        Weekday::Sat => 7,
    }
}

pub fn day_name(d: NaiveDate) -> &'static str {
    match d.weekday() {
        Weekday::Sun => "Sunday",
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
    }
}

/// Catalog wire encoding (spec.md §6): integers/floats as JSON numbers,
/// bools as JSON bools, strings as JSON strings, temporal values as
/// ISO-8601 strings, Null as JSON null.
pub fn value_to_json(v: &Value) -> serde_json::Value {
    match v {
        Value::Null => serde_json::Value::Null,
        Value::Integer(i) => serde_json::Value::from(*i),
        Value::Float(f) => serde_json::Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Text(s) => serde_json::Value::String(s.clone()),
        Value::Date(d) => serde_json::Value::String(d.format("%Y-%m-%d").to_string()),
        Value::Time(t) => serde_json::Value::String(t.format("%H:%M:%S%.f").to_string()),
        Value::DateTime(dt) => {
            serde_json::Value::String(dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string())
        }
    }
}

/// The dual of [`value_to_json`]. The stored `DataType` disambiguates a
/// JSON string into `Text`/`Date`/`Time`/`DateTime`, since the wire format
/// is untagged.
pub fn value_from_json(json: &serde_json::Value, ty: DataType) -> Result<Value, Error> {
    if json.is_null() {
        return Ok(Value::Null);
    }
    let bad = || Error::TypeError {
        message: format!("catalog value {json} does not match column type {ty}"),
    };
    Ok(match (json, ty) {
        (serde_json::Value::Number(n), DataType::Int) => {
            Value::Integer(n.as_i64().ok_or_else(bad)?)
        }
        (serde_json::Value::Number(n), DataType::Float) => {
            Value::Float(n.as_f64().ok_or_else(bad)?)
        }
        (serde_json::Value::Bool(b), DataType::Bool) => Value::Bool(*b),
        (serde_json::Value::String(s), DataType::String) => Value::Text(s.clone()),
        (serde_json::Value::String(s), DataType::Date) => {
            Value::Date(parse_date(s).ok_or_else(bad)?)
        }
        (serde_json::Value::String(s), DataType::Time) => {
            Value::Time(parse_time(s).ok_or_else(bad)?)
        }
        (serde_json::Value::String(s), DataType::DateTime) => {
            Value::DateTime(parse_datetime(s).ok_or_else(bad)?)
        }
        _ => return Err(bad()),
    })
}

pub fn hour_of(t: NaiveTime) -> i64 {
    t.hour() as i64
}
pub fn minute_of(t: NaiveTime) -> i64 {
    t.minute() as i64
}
pub fn second_of(t: NaiveTime) -> i64 {
    t.second() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coerce_int_to_float_widens() {
        let v = Value::Integer(3).coerce_to(DataType::Float, "x").unwrap();
        assert!(matches!(v, Value::Float(f) if f == 3.0));
    }

    #[test]
    fn coerce_bool_text_case_insensitive() {
        let v = Value::Text("TRUE".into()).coerce_to(DataType::Bool, "flag").unwrap();
        assert!(matches!(v, Value::Bool(true)));
    }

    #[test]
    fn coerce_rejects_non_numeric_string() {
        let err = Value::Text("abc".into()).coerce_to(DataType::Int, "n");
        assert!(err.is_err());
    }

    #[test]
    fn datetime_accepts_space_separator() {
        assert!(parse_datetime("2025-01-14 10:30:00").is_some());
        assert!(parse_datetime("2025-01-14T10:30:00").is_some());
    }

    #[test]
    fn total_cmp_is_none_across_incomparable_types() {
        assert_eq!(total_cmp(&Value::Text("x".into()), &Value::Bool(true)), None);
    }

    #[test]
    fn day_of_week_matches_sunday_one() {
        let d = NaiveDate::from_ymd_opt(2025, 1, 12).unwrap(); // Sunday
        assert_eq!(day_of_week(d), 1);
    }
}
