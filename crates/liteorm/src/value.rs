//! Tagged values bound into statements and read back from rows.
//!
//! [`Value`] is the only thing that ever crosses into a placeholder, so every
//! driver adapter converts from and to this enum. [`Record`] is the ordered
//! column → value mapping used for INSERT payloads and UPDATE SET lists; its
//! iteration order is the insertion order, which keeps generated SQL stable.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;
use std::fmt;

/// A literal destined for parameter substitution.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    DateTime(NaiveDateTime),
}

impl Value {
    /// Whether this is SQL NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Short name of the variant, used in decode error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::DateTime(_) => "datetime",
        }
    }

    /// Borrow the string payload, if any.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::String(s) => f.write_str(s),
            Value::DateTime(dt) => write!(f, "{}", dt.format(DATETIME_FORMAT)),
        }
    }
}

/// Text layout used when a datetime travels as a string (MySQL, display).
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

macro_rules! impl_from_int {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Value {
                fn from(v: $t) -> Self {
                    Value::Int(i64::from(v))
                }
            }
        )*
    };
}

impl_from_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(f64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&String> for Value {
    fn from(v: &String) -> Self {
        Value::String(v.clone())
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::DateTime(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::DateTime(v.naive_utc())
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Value::DateTime(v.and_time(chrono::NaiveTime::MIN))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}

/// Conversion from a [`Value`] read out of a row.
///
/// The error is a plain message; callers attach the column name.
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Result<Self, String>;
}

fn mismatch(expected: &str, got: &Value) -> String {
    format!("expected {expected}, got {}", got.type_name())
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Result<Self, String> {
        Ok(value.clone())
    }
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Int(i) => Ok(*i),
            Value::Bool(b) => Ok(i64::from(*b)),
            // MySQL reports DECIMAL aggregates as text.
            Value::String(s) => s
                .trim()
                .parse::<i64>()
                .map_err(|e| format!("cannot parse {s:?} as integer: {e}")),
            Value::Float(x) if x.fract() == 0.0 => Ok(*x as i64),
            other => Err(mismatch("int", other)),
        }
    }
}

impl FromValue for i32 {
    fn from_value(value: &Value) -> Result<Self, String> {
        let wide = i64::from_value(value)?;
        i32::try_from(wide).map_err(|_| format!("{wide} out of range for i32"))
    }
}

impl FromValue for u64 {
    fn from_value(value: &Value) -> Result<Self, String> {
        let wide = i64::from_value(value)?;
        u64::try_from(wide).map_err(|_| format!("{wide} out of range for u64"))
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Float(x) => Ok(*x),
            Value::Int(i) => Ok(*i as f64),
            Value::String(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|e| format!("cannot parse {s:?} as float: {e}")),
            other => Err(mismatch("float", other)),
        }
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Bool(b) => Ok(*b),
            // TINYINT(1)
            Value::Int(0) => Ok(false),
            Value::Int(1) => Ok(true),
            other => Err(mismatch("bool", other)),
        }
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::String(s) => Ok(s.clone()),
            other => Err(mismatch("string", other)),
        }
    }
}

impl FromValue for NaiveDateTime {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::DateTime(dt) => Ok(*dt),
            Value::String(s) => NaiveDateTime::parse_from_str(s, DATETIME_FORMAT)
                .map_err(|e| format!("cannot parse {s:?} as datetime: {e}")),
            other => Err(mismatch("datetime", other)),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

/// Ordered column → value mapping.
///
/// Re-inserting an existing column replaces its value but keeps its original
/// position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    entries: Vec<(String, Value)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn set(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(column, value);
        self
    }

    /// Insert or replace a column value, returning the previous value.
    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        let column = column.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(c, _)| *c == column) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                self.entries.push((column, value));
                None
            }
        }
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(c, _)| c == column)
            .map(|(_, v)| v)
    }

    pub fn contains_key(&self, column: &str) -> bool {
        self.get(column).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(c, v)| (c.as_str(), v))
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(c, _)| c.as_str())
    }
}

impl<K, V> FromIterator<(K, V)> for Record
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = Record::new();
        for (k, v) in iter {
            record.insert(k, v);
        }
        record
    }
}

impl IntoIterator for Record {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl Serialize for Record {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

/// Build a [`Record`] from `column => value` pairs.
///
/// ```ignore
/// let data = liteorm::record! { "name" => "Ada", "age" => 36 };
/// ```
#[macro_export]
macro_rules! record {
    () => {
        $crate::Record::new()
    };
    ($($column:expr => $value:expr),+ $(,)?) => {{
        let mut record = $crate::Record::new();
        $( record.insert($column, $value); )+
        record
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_keeps_first_insertion_position() {
        let mut r = Record::new().set("a", 1).set("b", "x");
        let prev = r.insert("a", 2);
        assert_eq!(prev, Some(Value::Int(1)));
        let cols: Vec<&str> = r.columns().collect();
        assert_eq!(cols, vec!["a", "b"]);
        assert_eq!(r.get("a"), Some(&Value::Int(2)));
    }

    #[test]
    fn record_macro_builds_in_order() {
        let r = crate::record! { "name" => "Ada", "age" => 36, "admin" => false };
        let cols: Vec<&str> = r.columns().collect();
        assert_eq!(cols, vec!["name", "age", "admin"]);
        assert_eq!(r.get("age"), Some(&Value::Int(36)));
    }

    #[test]
    fn option_maps_to_null() {
        let v: Value = Option::<i32>::None.into();
        assert!(v.is_null());
        let v: Value = Some("x").into();
        assert_eq!(v, Value::String("x".into()));
    }

    #[test]
    fn from_value_conversions() {
        assert_eq!(i64::from_value(&Value::String("42".into())), Ok(42));
        assert_eq!(bool::from_value(&Value::Int(1)), Ok(true));
        assert_eq!(Option::<i64>::from_value(&Value::Null), Ok(None));
        assert!(String::from_value(&Value::Int(3)).is_err());
        assert!(i32::from_value(&Value::Int(i64::MAX)).is_err());
    }

    #[test]
    fn serializes_untagged() {
        let r = Record::new().set("id", 1).set("name", "a").set("gone", Value::Null);
        let json = serde_json::to_string(&r).unwrap();
        assert_eq!(json, r#"{"id":1,"name":"a","gone":null}"#);
    }
}
