//! Table DDL builder.
//!
//! ```ignore
//! orm.schema()
//!     .create("users", |t| {
//!         t.increments("id");
//!         t.string("email", 255).unique();
//!         t.string("nickname", 64).nullable();
//!         t.timestamps();
//!         t.soft_deletes();
//!     })
//!     .await?;
//! ```

use crate::client::DbHandle;
use crate::error::{OrmError, OrmResult};
use crate::ident;
use crate::qb::{DEFAULT_SOFT_DELETE_COLUMN, Dialect};
use crate::value::{DATETIME_FORMAT, Value};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnType {
    Increments,
    String(u32),
    Text,
    Integer,
    BigInteger,
    Boolean,
    Float,
    Timestamp,
    CreatedAt,
    UpdatedAt,
}

#[derive(Debug, Clone, PartialEq)]
struct ColumnDef {
    name: String,
    ty: ColumnType,
    nullable: bool,
    unique: bool,
    default: Option<Value>,
}

impl ColumnDef {
    fn to_sql(&self, dialect: Dialect) -> String {
        let pg = dialect == Dialect::Postgres;
        let ty = match self.ty {
            ColumnType::Increments if pg => "SERIAL PRIMARY KEY".to_string(),
            ColumnType::Increments => "INT AUTO_INCREMENT PRIMARY KEY".to_string(),
            ColumnType::String(len) => format!("VARCHAR({len})"),
            ColumnType::Text => "TEXT".to_string(),
            ColumnType::Integer if pg => "INTEGER".to_string(),
            ColumnType::Integer => "INT".to_string(),
            ColumnType::BigInteger => "BIGINT".to_string(),
            ColumnType::Boolean if pg => "BOOLEAN".to_string(),
            ColumnType::Boolean => "TINYINT(1)".to_string(),
            ColumnType::Float if pg => "DOUBLE PRECISION".to_string(),
            ColumnType::Float => "DOUBLE".to_string(),
            ColumnType::Timestamp => "TIMESTAMP".to_string(),
            ColumnType::CreatedAt => "TIMESTAMP DEFAULT CURRENT_TIMESTAMP".to_string(),
            ColumnType::UpdatedAt if pg => "TIMESTAMP DEFAULT CURRENT_TIMESTAMP".to_string(),
            ColumnType::UpdatedAt => {
                "TIMESTAMP DEFAULT CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP".to_string()
            }
        };

        let mut sql = format!("{} {ty}", self.name);
        let managed = matches!(
            self.ty,
            ColumnType::Increments | ColumnType::CreatedAt | ColumnType::UpdatedAt
        );
        if !managed {
            sql.push_str(if self.nullable { " NULL" } else { " NOT NULL" });
        }
        if let Some(default) = &self.default {
            sql.push_str(" DEFAULT ");
            sql.push_str(&default_literal(default));
        }
        if self.unique {
            sql.push_str(" UNIQUE");
        }
        sql
    }
}

/// DDL cannot take bind parameters, so defaults are rendered as escaped literals.
fn default_literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(true) => "TRUE".to_string(),
        Value::Bool(false) => "FALSE".to_string(),
        Value::Int(i) => i.to_string(),
        Value::Float(f) => f.to_string(),
        Value::String(s) => format!("'{}'", s.replace('\'', "''")),
        Value::DateTime(dt) => format!("'{}'", dt.format(DATETIME_FORMAT)),
    }
}

fn message(err: OrmError) -> String {
    match err {
        OrmError::Configuration(m) => m,
        other => other.to_string(),
    }
}

/// Column list for one `CREATE TABLE`.
///
/// Modifiers (`nullable`, `unique`, `default`) apply to the most recently
/// added column. Invalid names are reported by [`Blueprint::to_sql`].
#[derive(Debug, Clone)]
pub struct Blueprint {
    table: String,
    columns: Vec<ColumnDef>,
    error: Option<String>,
}

impl Blueprint {
    pub fn new(table: &str) -> Self {
        let mut bp = Self {
            table: table.to_string(),
            columns: Vec::new(),
            error: None,
        };
        if let Err(e) = ident::column(table) {
            bp.error = Some(message(e));
        }
        bp
    }

    fn push(&mut self, name: &str, ty: ColumnType, nullable: bool) -> &mut Self {
        if let Err(e) = ident::column(name)
            && self.error.is_none()
        {
            self.error = Some(message(e));
        }
        self.columns.push(ColumnDef {
            name: name.to_string(),
            ty,
            nullable,
            unique: false,
            default: None,
        });
        self
    }

    /// Auto-incrementing integer primary key.
    pub fn increments(&mut self, name: &str) -> &mut Self {
        self.push(name, ColumnType::Increments, false)
    }

    pub fn string(&mut self, name: &str, len: u32) -> &mut Self {
        self.push(name, ColumnType::String(len), false)
    }

    pub fn text(&mut self, name: &str) -> &mut Self {
        self.push(name, ColumnType::Text, false)
    }

    pub fn integer(&mut self, name: &str) -> &mut Self {
        self.push(name, ColumnType::Integer, false)
    }

    pub fn big_integer(&mut self, name: &str) -> &mut Self {
        self.push(name, ColumnType::BigInteger, false)
    }

    pub fn boolean(&mut self, name: &str) -> &mut Self {
        self.push(name, ColumnType::Boolean, false)
    }

    pub fn float(&mut self, name: &str) -> &mut Self {
        self.push(name, ColumnType::Float, false)
    }

    pub fn timestamp(&mut self, name: &str) -> &mut Self {
        self.push(name, ColumnType::Timestamp, false)
    }

    /// `created_at` and `updated_at`, both defaulting to the current time.
    pub fn timestamps(&mut self) -> &mut Self {
        self.push("created_at", ColumnType::CreatedAt, false);
        self.push("updated_at", ColumnType::UpdatedAt, false)
    }

    /// Nullable `deleted_at` used by soft deletes.
    pub fn soft_deletes(&mut self) -> &mut Self {
        self.push(DEFAULT_SOFT_DELETE_COLUMN, ColumnType::Timestamp, true)
    }

    pub fn nullable(&mut self) -> &mut Self {
        if let Some(col) = self.columns.last_mut() {
            col.nullable = true;
        }
        self
    }

    pub fn unique(&mut self) -> &mut Self {
        if let Some(col) = self.columns.last_mut() {
            col.unique = true;
        }
        self
    }

    pub fn default(&mut self, value: impl Into<Value>) -> &mut Self {
        if let Some(col) = self.columns.last_mut() {
            col.default = Some(value.into());
        }
        self
    }

    pub fn to_sql(&self, dialect: Dialect) -> OrmResult<String> {
        if let Some(e) = &self.error {
            return Err(OrmError::configuration(e.clone()));
        }
        if self.columns.is_empty() {
            return Err(OrmError::configuration(format!(
                "Table '{}' has no columns",
                self.table
            )));
        }
        let columns: Vec<String> = self.columns.iter().map(|c| c.to_sql(dialect)).collect();
        Ok(format!("CREATE TABLE {} ({})", self.table, columns.join(", ")))
    }
}

/// Runs DDL on a handle. Obtain one with [`Orm::schema`](crate::Orm::schema).
pub struct Schema<'h, H> {
    handle: &'h H,
}

impl<'h, H: DbHandle> Schema<'h, H> {
    pub fn new(handle: &'h H) -> Self {
        Self { handle }
    }

    pub async fn create<F>(&self, table: &str, define: F) -> OrmResult<()>
    where
        F: FnOnce(&mut Blueprint),
    {
        let mut blueprint = Blueprint::new(table);
        define(&mut blueprint);
        let sql = blueprint.to_sql(self.handle.dialect())?;
        self.run(&sql).await
    }

    pub async fn drop_if_exists(&self, table: &str) -> OrmResult<()> {
        let table = ident::column(table)?;
        self.run(&format!("DROP TABLE IF EXISTS {table}")).await
    }

    async fn run(&self, sql: &str) -> OrmResult<()> {
        debug!(target: "liteorm.sql", sql, "executing schema statement");
        self.handle.batch_execute(sql).await
    }
}
