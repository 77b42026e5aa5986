//! Placeholder allocation.
//!
//! A [`BindingTable`] hands out one token per bound value. Tokens are derived
//! from the column name; a column seen again gets an occurrence suffix
//! (`status`, `status_2`, `status_3`, ...) so no binding can shadow another.

use crate::ident::placeholder_name;
use crate::qb::compile::Dialect;
use crate::value::Value;
use std::collections::{HashMap, HashSet};

/// One bound value and the token that refers to it.
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    /// Token name, unique within a statement (`status_2`).
    pub name: String,
    /// 1-based position in the statement.
    pub position: usize,
    pub value: Value,
}

/// Ordered set of bindings for one compiled statement.
#[derive(Debug, Clone, Default)]
pub struct BindingTable {
    bindings: Vec<Binding>,
    used: HashSet<String>,
    occurrences: HashMap<String, usize>,
}

impl BindingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a token for `column`, record `value` under it and return the
    /// placeholder text for `dialect`.
    pub fn bind(&mut self, column: &str, value: Value, dialect: Dialect) -> String {
        let base = placeholder_name(column);
        let seen = self.occurrences.entry(base.clone()).or_insert(0);

        // A raw column may itself look like a suffixed token (`status_2`),
        // so keep counting until the name is free.
        let name = loop {
            *seen += 1;
            let candidate = if *seen == 1 {
                base.clone()
            } else {
                format!("{base}_{seen}")
            };
            if !self.used.contains(&candidate) {
                break candidate;
            }
        };

        self.used.insert(name.clone());
        let position = self.bindings.len() + 1;
        let placeholder = dialect.placeholder(&name, position);
        self.bindings.push(Binding {
            name,
            position,
            value,
        });
        placeholder
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Binding> {
        self.bindings.iter()
    }

    pub fn into_vec(self) -> Vec<Binding> {
        self.bindings
    }
}
