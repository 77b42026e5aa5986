//! PostgreSQL support: `Value` <-> wire encoding and the handle impl for
//! `tokio_postgres::Client`.

use crate::client::DbHandle;
use crate::error::{OrmError, OrmResult};
use crate::qb::Dialect;
use crate::row::Row;
use crate::value::{DATETIME_FORMAT, Value};
use bytes::BytesMut;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use std::error::Error;
use std::sync::Arc;
use tokio_postgres::types::{FromSql, IsNull, ToSql, Type};
use uuid::Uuid;

type WireResult<T> = Result<T, Box<dyn Error + Sync + Send>>;

fn is_text(ty: &Type) -> bool {
    matches!(
        *ty,
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME | Type::UNKNOWN
    )
}

impl ToSql for Value {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> WireResult<IsNull> {
        match self {
            Value::Null => Ok(IsNull::Yes),
            Value::Bool(b) => match *ty {
                Type::BOOL => b.to_sql(ty, out),
                Type::JSON | Type::JSONB => serde_json::Value::Bool(*b).to_sql(ty, out),
                _ if is_text(ty) => b.to_string().as_str().to_sql(ty, out),
                _ => encode_int(i64::from(*b), ty, out),
            },
            Value::Int(i) => encode_int(*i, ty, out),
            Value::Float(f) => encode_float(*f, ty, out),
            Value::String(s) => encode_str(s, ty, out),
            Value::DateTime(dt) => match *ty {
                Type::TIMESTAMP => dt.to_sql(ty, out),
                Type::TIMESTAMPTZ => dt.and_utc().to_sql(ty, out),
                Type::DATE => dt.date().to_sql(ty, out),
                _ if is_text(ty) => dt.format(DATETIME_FORMAT).to_string().as_str().to_sql(ty, out),
                _ => Err(format!("cannot encode datetime as {ty}").into()),
            },
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    tokio_postgres::types::to_sql_checked!();
}

fn encode_int(i: i64, ty: &Type, out: &mut BytesMut) -> WireResult<IsNull> {
    match *ty {
        Type::INT2 => i16::try_from(i)?.to_sql(ty, out),
        Type::INT4 => i32::try_from(i)?.to_sql(ty, out),
        Type::INT8 => i.to_sql(ty, out),
        Type::OID => u32::try_from(i)?.to_sql(ty, out),
        Type::FLOAT4 => (i as f32).to_sql(ty, out),
        Type::FLOAT8 => (i as f64).to_sql(ty, out),
        Type::NUMERIC => Decimal::from(i).to_sql(ty, out),
        Type::BOOL => (i != 0).to_sql(ty, out),
        Type::JSON | Type::JSONB => serde_json::Value::from(i).to_sql(ty, out),
        _ if is_text(ty) => i.to_string().as_str().to_sql(ty, out),
        _ => Err(format!("cannot encode integer as {ty}").into()),
    }
}

fn encode_float(f: f64, ty: &Type, out: &mut BytesMut) -> WireResult<IsNull> {
    match *ty {
        Type::FLOAT4 => (f as f32).to_sql(ty, out),
        Type::FLOAT8 => f.to_sql(ty, out),
        Type::NUMERIC => Decimal::try_from(f)?.to_sql(ty, out),
        Type::INT2 | Type::INT4 | Type::INT8 if f.fract() == 0.0 => encode_int(f as i64, ty, out),
        Type::JSON | Type::JSONB => serde_json::Value::from(f).to_sql(ty, out),
        _ if is_text(ty) => f.to_string().as_str().to_sql(ty, out),
        _ => Err(format!("cannot encode float as {ty}").into()),
    }
}

fn encode_str(s: &str, ty: &Type, out: &mut BytesMut) -> WireResult<IsNull> {
    match *ty {
        Type::INT2 | Type::INT4 | Type::INT8 | Type::OID => encode_int(s.trim().parse()?, ty, out),
        Type::FLOAT4 | Type::FLOAT8 => encode_float(s.trim().parse()?, ty, out),
        Type::NUMERIC => Decimal::from_str_exact(s.trim())?.to_sql(ty, out),
        Type::BOOL => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "t" | "1" => true.to_sql(ty, out),
            "false" | "f" | "0" => false.to_sql(ty, out),
            _ => Err(format!("cannot encode '{s}' as boolean").into()),
        },
        Type::TIMESTAMP => NaiveDateTime::parse_from_str(s, DATETIME_FORMAT)?.to_sql(ty, out),
        Type::TIMESTAMPTZ => DateTime::parse_from_rfc3339(s)?
            .with_timezone(&Utc)
            .to_sql(ty, out),
        Type::DATE => NaiveDate::parse_from_str(s, "%Y-%m-%d")?.to_sql(ty, out),
        Type::UUID => Uuid::parse_str(s.trim())?.to_sql(ty, out),
        Type::JSON | Type::JSONB => serde_json::from_str::<serde_json::Value>(s)?.to_sql(ty, out),
        // enums, citext and other text-shaped types take the raw bytes
        _ => s.to_sql(&Type::TEXT, out),
    }
}

impl<'a> FromSql<'a> for Value {
    fn from_sql(ty: &Type, raw: &'a [u8]) -> WireResult<Self> {
        Ok(match *ty {
            Type::BOOL => Value::Bool(bool::from_sql(ty, raw)?),
            Type::INT2 => Value::Int(i16::from_sql(ty, raw)?.into()),
            Type::INT4 => Value::Int(i32::from_sql(ty, raw)?.into()),
            Type::INT8 => Value::Int(i64::from_sql(ty, raw)?),
            Type::OID => Value::Int(u32::from_sql(ty, raw)?.into()),
            Type::FLOAT4 => Value::Float(f32::from_sql(ty, raw)?.into()),
            Type::FLOAT8 => Value::Float(f64::from_sql(ty, raw)?),
            Type::NUMERIC => {
                let d = Decimal::from_sql(ty, raw)?;
                let f = d
                    .to_f64()
                    .ok_or_else(|| format!("numeric {d} does not fit in f64"))?;
                Value::Float(f)
            }
            Type::TIMESTAMP => Value::DateTime(NaiveDateTime::from_sql(ty, raw)?),
            Type::TIMESTAMPTZ => Value::DateTime(DateTime::<Utc>::from_sql(ty, raw)?.naive_utc()),
            Type::DATE => Value::from(NaiveDate::from_sql(ty, raw)?),
            Type::UUID => Value::String(Uuid::from_sql(ty, raw)?.to_string()),
            Type::JSON | Type::JSONB => {
                Value::String(serde_json::Value::from_sql(ty, raw)?.to_string())
            }
            _ => Value::String(String::from_sql(ty, raw)?),
        })
    }

    fn from_sql_null(_ty: &Type) -> WireResult<Self> {
        Ok(Value::Null)
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }
}

/// Convert driver rows, sharing one column-name list across the result set.
pub(crate) fn convert_rows(rows: Vec<tokio_postgres::Row>) -> OrmResult<Vec<Row>> {
    let Some(first) = rows.first() else {
        return Ok(Vec::new());
    };
    let columns: Arc<[String]> = first
        .columns()
        .iter()
        .map(|c| c.name().to_string())
        .collect();

    rows.iter()
        .map(|row| {
            let values = (0..row.len())
                .map(|i| {
                    row.try_get::<_, Value>(i)
                        .map_err(|e| OrmError::decode(columns[i].as_str(), e.to_string()))
                })
                .collect::<OrmResult<Vec<_>>>()?;
            Ok(Row::new(Arc::clone(&columns), values))
        })
        .collect()
}

pub(crate) fn param_refs(params: &[Value]) -> Vec<&(dyn ToSql + Sync)> {
    params.iter().map(|v| v as &(dyn ToSql + Sync)).collect()
}

impl DbHandle for tokio_postgres::Client {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    async fn query(&self, sql: &str, params: &[Value]) -> OrmResult<Vec<Row>> {
        let refs = param_refs(params);
        let rows = tokio_postgres::Client::query(self, sql, &refs)
            .await
            .map_err(OrmError::from_pg_error)?;
        convert_rows(rows)
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> OrmResult<u64> {
        let refs = param_refs(params);
        tokio_postgres::Client::execute(self, sql, &refs)
            .await
            .map_err(OrmError::from_pg_error)
    }

    async fn batch_execute(&self, sql: &str) -> OrmResult<()> {
        tokio_postgres::Client::batch_execute(self, sql)
            .await
            .map_err(OrmError::from_pg_error)
    }
}

/// Statements run inside the transaction. Use `Transaction::commit` and
/// `Transaction::rollback` to finish it.
impl DbHandle for tokio_postgres::Transaction<'_> {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    async fn query(&self, sql: &str, params: &[Value]) -> OrmResult<Vec<Row>> {
        let refs = param_refs(params);
        let rows = tokio_postgres::Transaction::query(self, sql, &refs)
            .await
            .map_err(OrmError::from_pg_error)?;
        convert_rows(rows)
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> OrmResult<u64> {
        let refs = param_refs(params);
        tokio_postgres::Transaction::execute(self, sql, &refs)
            .await
            .map_err(OrmError::from_pg_error)
    }

    async fn batch_execute(&self, sql: &str) -> OrmResult<()> {
        tokio_postgres::Transaction::batch_execute(self, sql)
            .await
            .map_err(OrmError::from_pg_error)
    }

    async fn begin(&self) -> OrmResult<()> {
        Err(OrmError::configuration("Transaction already open"))
    }

    async fn commit(&self) -> OrmResult<()> {
        Err(OrmError::configuration(
            "Finish a tokio_postgres::Transaction with Transaction::commit",
        ))
    }

    async fn rollback(&self) -> OrmResult<()> {
        Err(OrmError::configuration(
            "Finish a tokio_postgres::Transaction with Transaction::rollback",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(value: Value, ty: &Type) -> Value {
        let mut buf = BytesMut::new();
        value.to_sql(ty, &mut buf).unwrap();
        Value::from_sql(ty, &buf).unwrap()
    }

    #[test]
    fn numeric_goes_through_decimal() {
        assert_eq!(roundtrip(Value::from("0"), &Type::NUMERIC), Value::Float(0.0));
        assert_eq!(roundtrip(Value::from("12345.625"), &Type::NUMERIC), Value::Float(12345.625));
        assert_eq!(roundtrip(Value::Int(-10000), &Type::NUMERIC), Value::Float(-10000.0));
        assert_eq!(roundtrip(Value::Float(-0.5), &Type::NUMERIC), Value::Float(-0.5));
        assert!(Value::from("1e5;").to_sql(&Type::NUMERIC, &mut BytesMut::new()).is_err());
    }

    #[test]
    fn uuid_strings_use_the_binary_form() {
        let id = "550e8400-e29b-41d4-a716-446655440000";
        let mut buf = BytesMut::new();
        Value::from(id).to_sql(&Type::UUID, &mut buf).unwrap();
        assert_eq!(buf.len(), 16);
        assert_eq!(Value::from_sql(&Type::UUID, &buf).unwrap(), Value::from(id));
        assert!(Value::from("not-a-uuid").to_sql(&Type::UUID, &mut BytesMut::new()).is_err());
    }

    #[test]
    fn json_strings_are_framed() {
        let mut buf = BytesMut::new();
        Value::from(r#"{"a":1}"#).to_sql(&Type::JSONB, &mut buf).unwrap();
        assert_eq!(buf.first(), Some(&1));
        assert_eq!(Value::from_sql(&Type::JSONB, &buf).unwrap(), Value::from(r#"{"a":1}"#));

        assert_eq!(roundtrip(Value::from("[1,2]"), &Type::JSON), Value::from("[1,2]"));
        assert!(Value::from("{oops").to_sql(&Type::JSONB, &mut BytesMut::new()).is_err());
    }

    #[test]
    fn int_respects_column_width() {
        let mut buf = BytesMut::new();
        Value::Int(7).to_sql(&Type::INT4, &mut buf).unwrap();
        assert_eq!(&buf[..], &7i32.to_be_bytes());

        let mut buf = BytesMut::new();
        assert!(Value::Int(70_000).to_sql(&Type::INT2, &mut buf).is_err());
    }

    #[test]
    fn null_encodes_as_null() {
        let mut buf = BytesMut::new();
        let is_null = Value::Null.to_sql(&Type::INT8, &mut buf).unwrap();
        assert!(matches!(is_null, IsNull::Yes));
        assert!(buf.is_empty());
    }

    #[test]
    fn decodes_common_types() {
        assert_eq!(Value::from_sql(&Type::INT4, &5i32.to_be_bytes()).unwrap(), Value::Int(5));
        assert_eq!(Value::from_sql(&Type::TEXT, b"hi").unwrap(), Value::from("hi"));
        assert_eq!(Value::from_sql_null(&Type::TEXT).unwrap(), Value::Null);
        let uuid = [0x12u8; 16];
        assert_eq!(
            Value::from_sql(&Type::UUID, &uuid).unwrap(),
            Value::from("12121212-1212-1212-1212-121212121212")
        );
    }
}
