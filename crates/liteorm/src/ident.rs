//! Safe SQL identifier handling.
//!
//! Column and table names are spliced into SQL text, so every name that
//! reaches the compiler goes through [`Ident::parse`] first.
//!
//! - Unquoted parts are validated against: `[A-Za-z_][A-Za-z0-9_$]*`
//! - Quoted parts use backticks (MySQL) or double quotes and may contain any
//!   character except NUL and the quote itself
//!
//! # Example
//! ```ignore
//! use liteorm::Ident;
//!
//! let t = Ident::parse("app.users")?;
//! let c = Ident::parse("`order`.id")?;
//! # Ok::<(), liteorm::OrmError>(())
//! ```

use crate::error::{OrmError, OrmResult};

/// A part of a SQL identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentPart {
    Unquoted(String),
    Quoted { quote: char, name: String },
}

/// A validated SQL identifier (column, table, or `schema.table.column`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ident {
    parts: Vec<IdentPart>,
}

impl Ident {
    /// Parse an identifier string, supporting dotted and quoted forms.
    pub fn parse(s: &str) -> OrmResult<Self> {
        if s.is_empty() {
            return Err(OrmError::configuration("Identifier cannot be empty"));
        }
        if s.contains('\0') {
            return Err(OrmError::configuration(
                "Identifier cannot contain NUL character",
            ));
        }

        let mut parts = Vec::new();
        let mut chars = s.chars().peekable();

        while chars.peek().is_some() {
            if !parts.is_empty() {
                match chars.next() {
                    Some('.') if chars.peek().is_none() => {
                        return Err(OrmError::configuration(format!(
                            "Trailing '.' in identifier '{s}'"
                        )));
                    }
                    Some('.') => {}
                    Some(c) => {
                        return Err(OrmError::configuration(format!(
                            "Invalid character '{c}' in identifier '{s}'"
                        )));
                    }
                    None => break,
                }
            }

            if let Some(&quote) = chars.peek().filter(|c| **c == '`' || **c == '"') {
                chars.next();
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some(c) if c == quote => break,
                        Some(c) => name.push(c),
                        None => {
                            return Err(OrmError::configuration(format!(
                                "Unclosed quoted identifier '{s}'"
                            )));
                        }
                    }
                }
                if name.is_empty() {
                    return Err(OrmError::configuration("Empty quoted identifier"));
                }
                parts.push(IdentPart::Quoted { quote, name });
                continue;
            }

            let mut name = String::new();
            while let Some(&c) = chars.peek() {
                if c == '.' {
                    break;
                }
                let ok = if name.is_empty() {
                    c == '_' || c.is_ascii_alphabetic()
                } else {
                    c == '_' || c == '$' || c.is_ascii_alphanumeric()
                };
                if !ok {
                    return Err(OrmError::configuration(format!(
                        "Invalid character '{c}' in identifier '{s}'"
                    )));
                }
                name.push(c);
                chars.next();
            }
            if name.is_empty() {
                return Err(OrmError::configuration(format!(
                    "Empty identifier part in '{s}'"
                )));
            }
            parts.push(IdentPart::Unquoted(name));
        }

        Ok(Self { parts })
    }

    /// Render back to SQL text.
    pub fn to_sql(&self) -> String {
        self.parts
            .iter()
            .map(|p| match p {
                IdentPart::Unquoted(n) => n.clone(),
                IdentPart::Quoted { quote, name } => format!("{quote}{name}{quote}"),
            })
            .collect::<Vec<_>>()
            .join(".")
    }

    /// The last part without quotes (`u.email` → `email`).
    pub fn base_name(&self) -> &str {
        match self.parts.last() {
            Some(IdentPart::Unquoted(n)) | Some(IdentPart::Quoted { name: n, .. }) => n,
            None => "",
        }
    }
}

const AGGREGATE_NAMES: [&str; 5] = ["COUNT", "SUM", "AVG", "MAX", "MIN"];

/// Parse `FUNC(arg)` where FUNC is an aggregate and arg is `*` or an identifier.
fn parse_aggregate_call(s: &str) -> Option<OrmResult<String>> {
    let open = s.find('(')?;
    let inner = s[open + 1..].strip_suffix(')')?;
    let func = s[..open].trim().to_ascii_uppercase();
    if !AGGREGATE_NAMES.contains(&func.as_str()) {
        return Some(Err(OrmError::configuration(format!(
            "Unsupported function in '{s}'"
        ))));
    }
    let inner = inner.trim();
    let arg = if inner == "*" {
        Ok("*".to_string())
    } else {
        Ident::parse(inner).map(|i| i.to_sql())
    };
    Some(arg.map(|arg| format!("{func}({arg})")))
}

/// Validate a column or table reference, returning its SQL text.
pub fn column(s: &str) -> OrmResult<String> {
    Ident::parse(s.trim()).map(|i| i.to_sql())
}

/// Validate a HAVING target: an identifier or an aggregate call.
pub fn having_target(s: &str) -> OrmResult<String> {
    let s = s.trim();
    match parse_aggregate_call(s) {
        Some(result) => result,
        None => column(s),
    }
}

/// Validate one projection term: `*`, `t.*`, an identifier or aggregate call,
/// each optionally followed by `AS alias`.
pub fn projection(s: &str) -> OrmResult<String> {
    let s = s.trim();
    if s.is_empty() {
        return Err(OrmError::configuration("Projection term cannot be empty"));
    }

    let (expr, alias) = match split_alias(s) {
        Some((expr, alias)) => (expr, Some(column(alias)?)),
        None => (s, None),
    };

    let expr = if expr == "*" {
        "*".to_string()
    } else if let Some(table) = expr.strip_suffix(".*") {
        format!("{}.*", column(table)?)
    } else if let Some(result) = parse_aggregate_call(expr) {
        result?
    } else {
        column(expr)?
    };

    Ok(match alias {
        Some(alias) => format!("{expr} AS {alias}"),
        None => expr,
    })
}

fn split_alias(s: &str) -> Option<(&str, &str)> {
    let upper = s.to_ascii_uppercase();
    let pos = upper.rfind(" AS ")?;
    Some((s[..pos].trim(), s[pos + 4..].trim()))
}

/// Derive a placeholder token base name from a column expression.
///
/// Lower-cases and folds every run of characters outside `[a-z0-9_]` into a
/// single `_`; leading/trailing underscores are trimmed.
pub fn placeholder_name(column: &str) -> String {
    let mut out = String::with_capacity(column.len());
    let mut pending_sep = false;
    for c in column.chars() {
        let c = c.to_ascii_lowercase();
        if c.is_ascii_alphanumeric() || c == '_' {
            if pending_sep && !out.is_empty() {
                out.push('_');
            }
            pending_sep = false;
            out.push(c);
        } else {
            pending_sep = true;
        }
    }
    let trimmed = out.trim_matches('_');
    if trimmed.is_empty() {
        "param".to_string()
    } else {
        trimmed.to_string()
    }
}
