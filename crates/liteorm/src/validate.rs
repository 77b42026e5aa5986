//! Rule-based validation of [`Record`] payloads before they are written.
//!
//! ```ignore
//! use liteorm::validate::{Rule, Validator};
//!
//! Validator::new()
//!     .rule("name", Rule::Required)
//!     .rule("email", Rule::Email)
//!     .validate(&data)?;
//! ```

use crate::value::{Record, Value};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Returns `true` if `s` looks like an email address.
#[cfg(feature = "validate")]
pub fn is_email(s: &str) -> bool {
    use std::sync::OnceLock;
    static EMAIL_RE: OnceLock<regex::Regex> = OnceLock::new();
    EMAIL_RE
        .get_or_init(|| {
            regex::Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("invalid built-in email regex")
        })
        .is_match(s)
}

/// Returns `true` if `s` parses as an absolute URL.
#[cfg(feature = "validate")]
pub fn is_url(s: &str) -> bool {
    url::Url::parse(s).is_ok()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rule {
    /// Present, not NULL and not an empty string.
    Required,
    #[cfg(feature = "validate")]
    Email,
    #[cfg(feature = "validate")]
    Url,
    /// At least `n` characters.
    MinLength(usize),
    /// At most `n` characters.
    MaxLength(usize),
    /// A number, or a string that parses as one.
    Numeric,
}

impl Rule {
    /// `None` when `value` passes, otherwise the message for `field`.
    fn check(&self, field: &str, value: Option<&Value>) -> Option<String> {
        let present = match value {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) if s.trim().is_empty() => None,
            Some(v) => Some(v),
        };

        let Some(value) = present else {
            // Only `Required` rejects a missing value; other rules skip it.
            return (*self == Rule::Required).then(|| format!("{field} is required."));
        };

        let ok = match self {
            Rule::Required => true,
            #[cfg(feature = "validate")]
            Rule::Email => value.as_str().is_some_and(is_email),
            #[cfg(feature = "validate")]
            Rule::Url => value.as_str().is_some_and(is_url),
            Rule::MinLength(n) => value.to_string().chars().count() >= *n,
            Rule::MaxLength(n) => value.to_string().chars().count() <= *n,
            Rule::Numeric => match value {
                Value::Int(_) | Value::Float(_) => true,
                Value::String(s) => s.trim().parse::<f64>().is_ok(),
                _ => false,
            },
        };
        if ok {
            return None;
        }

        Some(match self {
            Rule::Required => format!("{field} is required."),
            #[cfg(feature = "validate")]
            Rule::Email => format!("{field} must be a valid email address."),
            #[cfg(feature = "validate")]
            Rule::Url => format!("{field} must be a valid URL."),
            Rule::MinLength(n) => format!("{field} must be at least {n} characters."),
            Rule::MaxLength(n) => format!("{field} may not be greater than {n} characters."),
            Rule::Numeric => format!("{field} must be numeric."),
        })
    }
}

/// Failed rules, grouped by field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors {
    fields: BTreeMap<String, Vec<String>>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.fields.entry(field.into()).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Number of fields with at least one failure.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.fields.get(field).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<&str> = self
            .fields
            .values()
            .flatten()
            .map(String::as_str)
            .collect();
        f.write_str(&messages.join(" "))
    }
}

impl std::error::Error for ValidationErrors {}

/// Ordered list of `(field, rule)` checks.
#[derive(Debug, Clone, Default)]
pub struct Validator {
    rules: Vec<(String, Rule)>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rule(mut self, field: impl Into<String>, rule: Rule) -> Self {
        self.rules.push((field.into(), rule));
        self
    }

    pub fn rules(mut self, field: &str, rules: impl IntoIterator<Item = Rule>) -> Self {
        self.rules
            .extend(rules.into_iter().map(|r| (field.to_string(), r)));
        self
    }

    /// Check every rule against `data`, collecting all failures.
    pub fn validate(&self, data: &Record) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        for (field, rule) in &self.rules {
            if let Some(message) = rule.check(field, data.get(field)) {
                errors.add(field.as_str(), message);
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record;

    #[test]
    fn required_rejects_missing_null_and_blank() {
        let v = Validator::new()
            .rule("name", Rule::Required)
            .rule("bio", Rule::Required)
            .rule("nick", Rule::Required);
        let errors = v
            .validate(&record! { "bio" => Value::Null, "nick" => "  " })
            .unwrap_err();
        assert_eq!(errors.len(), 3);
        assert_eq!(errors.get("name"), Some(&["name is required.".to_string()][..]));
    }

    #[test]
    fn optional_rules_skip_missing_values() {
        let v = Validator::new()
            .rule("age", Rule::Numeric)
            .rule("name", Rule::MaxLength(3));
        assert!(v.validate(&record! {}).is_ok());
    }

    #[test]
    fn length_and_numeric() {
        let v = Validator::new()
            .rules("name", [Rule::MinLength(2), Rule::MaxLength(4)])
            .rule("age", Rule::Numeric);
        let errors = v
            .validate(&record! { "name" => "Bartholomew", "age" => "ten" })
            .unwrap_err();
        assert_eq!(
            errors.to_string(),
            "age must be numeric. name may not be greater than 4 characters."
        );
        assert!(v.validate(&record! { "name" => "Ada", "age" => "36" }).is_ok());
    }

    #[cfg(feature = "validate")]
    #[test]
    fn email_and_url() {
        assert!(is_email("ada@example.com"));
        assert!(!is_email("ada@example"));
        assert!(is_url("https://example.com/x"));
        assert!(!is_url("example.com"));

        let v = Validator::new()
            .rule("email", Rule::Email)
            .rule("site", Rule::Url);
        let errors = v
            .validate(&record! { "email" => "nope", "site" => "also nope" })
            .unwrap_err();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn converts_into_orm_error() {
        let errors = Validator::new()
            .rule("name", Rule::Required)
            .validate(&record! {})
            .unwrap_err();
        let err: crate::OrmError = errors.into();
        assert_eq!(err.to_string(), "Validation error: name is required.");
    }
}
