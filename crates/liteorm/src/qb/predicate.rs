//! WHERE/HAVING condition fragments.
//!
//! Operators come in as strings from callers, so they are parsed against a
//! fixed allow-list before anything is stored. Values never touch the SQL
//! text; they are bound when the fragment is rendered.

use crate::error::{OrmError, OrmResult};
use crate::ident;
use crate::qb::binding::BindingTable;
use crate::qb::compile::Dialect;
use crate::value::Value;
use std::fmt;

/// Comparison operator accepted in conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
    Like,
    Is,
    IsNot,
}

impl Operator {
    /// Parse an operator string. Anything outside
    /// `=, !=, <, <=, >, >=, LIKE, IS, IS NOT` is rejected.
    pub fn parse(op: &str) -> OrmResult<Self> {
        let normalized = op.split_whitespace().collect::<Vec<_>>().join(" ");
        match normalized.to_ascii_uppercase().as_str() {
            "=" => Ok(Operator::Eq),
            "!=" => Ok(Operator::Ne),
            "<" => Ok(Operator::Lt),
            "<=" => Ok(Operator::Lte),
            ">" => Ok(Operator::Gt),
            ">=" => Ok(Operator::Gte),
            "LIKE" => Ok(Operator::Like),
            "IS" => Ok(Operator::Is),
            "IS NOT" => Ok(Operator::IsNot),
            _ => Err(OrmError::configuration(format!(
                "Operator '{op}' is not allowed"
            ))),
        }
    }

    pub fn as_sql(self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Ne => "!=",
            Operator::Lt => "<",
            Operator::Lte => "<=",
            Operator::Gt => ">",
            Operator::Gte => ">=",
            Operator::Like => "LIKE",
            Operator::Is => "IS",
            Operator::IsNot => "IS NOT",
        }
    }

    /// Plain comparison (usable in a JOIN ... ON).
    pub fn is_comparison(self) -> bool {
        !matches!(self, Operator::Like | Operator::Is | Operator::IsNot)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// Keyword joining a fragment to the one before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conjunction {
    /// First fragment.
    None,
    And,
    Or,
}

impl Conjunction {
    fn as_sql(self) -> &'static str {
        match self {
            Conjunction::None => "",
            Conjunction::And => " AND ",
            Conjunction::Or => " OR ",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Test {
    /// `column op <placeholder>`
    Compare { op: Operator, value: Value },
    /// `column IS [NOT] NULL`, no binding
    Null { is_null: bool },
    /// `column IS [NOT] TRUE|FALSE`, no binding
    Truth { negated: bool, value: bool },
    /// `column IN (<placeholders>)`
    In { values: Vec<Value> },
}

/// One condition fragment.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    column: String,
    conjunction: Conjunction,
    test: Test,
}

impl Predicate {
    /// Build a comparison. `column` must already be validated SQL text.
    pub(crate) fn compare(column: String, op: Operator, value: Value) -> OrmResult<Self> {
        let test = match (op, value) {
            (Operator::Is, Value::Null) => Test::Null { is_null: true },
            (Operator::IsNot, Value::Null) => Test::Null { is_null: false },
            (Operator::Is, Value::Bool(b)) => Test::Truth {
                negated: false,
                value: b,
            },
            (Operator::IsNot, Value::Bool(b)) => Test::Truth {
                negated: true,
                value: b,
            },
            (Operator::Is | Operator::IsNot, other) => {
                return Err(OrmError::configuration(format!(
                    "{op} only accepts NULL or a boolean, got {}",
                    other.type_name()
                )));
            }
            (op, value) => Test::Compare { op, value },
        };
        Ok(Self {
            column,
            conjunction: Conjunction::None,
            test,
        })
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn conjunction(&self) -> Conjunction {
        self.conjunction
    }

    /// Number of values this fragment binds.
    pub fn binding_count(&self) -> usize {
        match &self.test {
            Test::Compare { .. } => 1,
            Test::In { values } => values.len(),
            Test::Null { .. } | Test::Truth { .. } => 0,
        }
    }

    /// Render the fragment (without its conjunction), binding values into `table`.
    pub(crate) fn render(&self, table: &mut BindingTable, dialect: Dialect) -> String {
        let col = &self.column;
        match &self.test {
            Test::Compare { op, value } => {
                let ph = table.bind(col, value.clone(), dialect);
                format!("{col} {op} {ph}")
            }
            Test::Null { is_null: true } => format!("{col} IS NULL"),
            Test::Null { is_null: false } => format!("{col} IS NOT NULL"),
            Test::Truth { negated, value } => {
                let not = if *negated { " NOT" } else { "" };
                let lit = if *value { "TRUE" } else { "FALSE" };
                format!("{col} IS{not} {lit}")
            }
            // An empty IN list can never match.
            Test::In { values } if values.is_empty() => "1=0".to_string(),
            Test::In { values } => {
                let phs: Vec<String> = values
                    .iter()
                    .map(|v| table.bind(col, v.clone(), dialect))
                    .collect();
                format!("{col} IN ({})", phs.join(", "))
            }
        }
    }
}

/// Ordered list of fragments forming one boolean expression.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PredicateList {
    items: Vec<Predicate>,
}

impl PredicateList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `column op value`.
    pub fn add_condition(
        &mut self,
        column: &str,
        op: &str,
        value: impl Into<Value>,
        conjunction: Conjunction,
    ) -> OrmResult<()> {
        let column = ident::column(column)?;
        let op = Operator::parse(op)?;
        let predicate = Predicate::compare(column, op, value.into())?;
        self.push(predicate, conjunction);
        Ok(())
    }

    /// Append `column IS [NOT] NULL`.
    pub fn add_null_check(
        &mut self,
        column: &str,
        is_null: bool,
        conjunction: Conjunction,
    ) -> OrmResult<()> {
        let column = ident::column(column)?;
        self.push(
            Predicate {
                column,
                conjunction: Conjunction::None,
                test: Test::Null { is_null },
            },
            conjunction,
        );
        Ok(())
    }

    /// Append `column IN (values...)`.
    pub fn add_in(
        &mut self,
        column: &str,
        values: Vec<Value>,
        conjunction: Conjunction,
    ) -> OrmResult<()> {
        let column = ident::column(column)?;
        self.push(
            Predicate {
                column,
                conjunction: Conjunction::None,
                test: Test::In { values },
            },
            conjunction,
        );
        Ok(())
    }

    fn push(&mut self, mut predicate: Predicate, conjunction: Conjunction) {
        predicate.conjunction = if self.items.is_empty() {
            Conjunction::None
        } else if conjunction == Conjunction::None {
            Conjunction::And
        } else {
            conjunction
        };
        self.items.push(predicate);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Predicate> {
        self.items.iter()
    }

    /// Whether any fragment is joined with OR.
    pub fn has_or(&self) -> bool {
        self.items.iter().any(|p| p.conjunction == Conjunction::Or)
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Render all fragments in insertion order. `None` when empty.
    pub(crate) fn render(&self, table: &mut BindingTable, dialect: Dialect) -> Option<String> {
        if self.items.is_empty() {
            return None;
        }
        let mut sql = String::new();
        for p in &self.items {
            sql.push_str(p.conjunction.as_sql());
            sql.push_str(&p.render(table, dialect));
        }
        Some(sql)
    }
}
