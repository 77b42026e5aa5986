//! Row mapping traits and utilities

use crate::error::{OrmError, OrmResult};
use crate::value::{FromValue, Record, Value};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// One result row: column names in SELECT order plus their values.
///
/// Column names are shared between rows of the same result set.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<Value>,
    relations: BTreeMap<String, Vec<Row>>,
}

impl Row {
    /// Build a row. Columns past the end of `values` read as absent.
    pub fn new(columns: Arc<[String]>, values: Vec<Value>) -> Self {
        Self {
            columns,
            values,
            relations: BTreeMap::new(),
        }
    }

    /// Convenience constructor from `(column, value)` pairs.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        let (columns, values): (Vec<String>, Vec<Value>) = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .unzip();
        Self::new(columns.into(), values)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value by column name (first match).
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c == column)
            .and_then(|i| self.values.get(i))
    }

    /// Value by position.
    pub fn get_index(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Typed value by column name. A missing column is a decode error.
    pub fn try_get_column<T: FromValue>(&self, column: &str) -> OrmResult<T> {
        let value = self
            .get(column)
            .ok_or_else(|| OrmError::decode(column, "column not present in row"))?;
        T::from_value(value).map_err(|message| OrmError::decode(column, message))
    }

    /// Alias for [`Row::try_get_column`].
    pub fn get_as<T: FromValue>(&self, column: &str) -> OrmResult<T> {
        self.try_get_column(column)
    }

    /// Rows attached by eager loading under `name` (empty if none).
    pub fn related(&self, name: &str) -> &[Row] {
        self.relations.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub(crate) fn attach(&mut self, name: &str, rows: Vec<Row>) {
        self.relations.insert(name.to_string(), rows);
    }

    /// Copy the column values into an ordered [`Record`].
    pub fn to_record(&self) -> Record {
        self.columns
            .iter()
            .cloned()
            .zip(self.values.iter().cloned())
            .collect()
    }

    /// Consume the row into an ordered [`Record`], dropping relations.
    pub fn into_record(self) -> Record {
        self.columns.iter().cloned().zip(self.values).collect()
    }
}

impl Serialize for Row {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(self.values.len() + self.relations.len()))?;
        for (c, v) in self.columns.iter().zip(&self.values) {
            map.serialize_entry(c, v)?;
        }
        for (name, rows) in &self.relations {
            map.serialize_entry(name, rows)?;
        }
        map.end()
    }
}

/// Trait for types that can be constructed from a result row.
pub trait FromRow: Sized {
    fn from_row(row: &Row) -> OrmResult<Self>;
}

impl FromRow for Row {
    fn from_row(row: &Row) -> OrmResult<Self> {
        Ok(row.clone())
    }
}

impl FromRow for Record {
    fn from_row(row: &Row) -> OrmResult<Self> {
        Ok(row.to_record())
    }
}

impl FromRow for serde_json::Value {
    fn from_row(row: &Row) -> OrmResult<Self> {
        serde_json::to_value(row).map_err(|e| OrmError::decode("*", e.to_string()))
    }
}
