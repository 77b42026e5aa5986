//! Eager loading for `with(..)` relations.
//!
//! Each relation costs exactly one extra query per `get()`, whatever the
//! number of parent rows: the distinct parent keys are collected and fetched
//! with a single `WHERE foreign_key IN (...)`.

use crate::client::DbHandle;
use crate::error::OrmResult;
use crate::exec::Executor;
use crate::ident;
use crate::qb::{ClauseSet, Conjunction, Statement, compile};
use crate::row::Row;
use crate::value::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    HasOne,
    HasMany,
}

/// A child table keyed on a column of the parent rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relation {
    name: String,
    kind: RelationKind,
    related_table: String,
    foreign_key: String,
    local_key: String,
}

impl Relation {
    /// Children in `related_table` whose `foreign_key` equals the parent's
    /// `local_key`, attached under `name`.
    ///
    /// ```ignore
    /// let users = orm
    ///     .table("users")
    ///     .with(Relation::has_many("posts", "posts", "user_id", "id"))
    ///     .get()
    ///     .await?;
    /// for post in users[0].related("posts") { /* ... */ }
    /// ```
    pub fn has_many(
        name: impl Into<String>,
        related_table: impl Into<String>,
        foreign_key: impl Into<String>,
        local_key: impl Into<String>,
    ) -> Self {
        Self::new(RelationKind::HasMany, name, related_table, foreign_key, local_key)
    }

    /// Like [`Relation::has_many`] but keeps at most one child per parent.
    pub fn has_one(
        name: impl Into<String>,
        related_table: impl Into<String>,
        foreign_key: impl Into<String>,
        local_key: impl Into<String>,
    ) -> Self {
        Self::new(RelationKind::HasOne, name, related_table, foreign_key, local_key)
    }

    fn new(
        kind: RelationKind,
        name: impl Into<String>,
        related_table: impl Into<String>,
        foreign_key: impl Into<String>,
        local_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            related_table: related_table.into(),
            foreign_key: foreign_key.into(),
            local_key: local_key.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> RelationKind {
        self.kind
    }

    pub(crate) fn validate(&self) -> OrmResult<()> {
        ident::column(&self.related_table)?;
        ident::column(&self.foreign_key)?;
        ident::column(&self.local_key)?;
        Ok(())
    }

    /// The query that loads children for `keys`.
    pub(crate) fn clauses(&self, keys: Vec<Value>) -> OrmResult<ClauseSet> {
        let mut clauses = ClauseSet::new();
        clauses.set_table(&self.related_table)?;
        clauses
            .predicates_mut()
            .add_in(&self.foreign_key, keys, Conjunction::And)?;
        Ok(clauses)
    }

    /// Load children for `parents` and attach them in place.
    pub(crate) async fn load<H: DbHandle>(
        &self,
        handle: &H,
        executor: &Executor,
        parents: &mut [Row],
    ) -> OrmResult<()> {
        let mut keys: Vec<Value> = Vec::new();
        for value in parents.iter().filter_map(|row| row.get(&self.local_key)) {
            if !value.is_null() && !keys.contains(value) {
                keys.push(value.clone());
            }
        }

        if keys.is_empty() {
            for parent in parents.iter_mut() {
                parent.attach(&self.name, Vec::new());
            }
            return Ok(());
        }

        let stmt = compile(&self.clauses(keys)?, Statement::Select, handle.dialect())?;
        let children = executor.execute(handle, &stmt).await?.into_rows()?;

        // Keys are compared by their text form so `1` and `'1'` match across drivers.
        let mut by_key: HashMap<String, Vec<Row>> = HashMap::new();
        for child in children {
            if let Some(fk) = child.get(&self.foreign_key).filter(|v| !v.is_null()) {
                by_key.entry(fk.to_string()).or_default().push(child);
            }
        }

        for parent in parents.iter_mut() {
            let mut matched = parent
                .get(&self.local_key)
                .filter(|v| !v.is_null())
                .and_then(|key| by_key.get(&key.to_string()))
                .cloned()
                .unwrap_or_default();
            if self.kind == RelationKind::HasOne {
                matched.truncate(1);
            }
            parent.attach(&self.name, matched);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qb::Dialect;

    #[test]
    fn batched_query_shape() {
        let rel = Relation::has_many("posts", "posts", "user_id", "id");
        let clauses = rel.clauses(vec![1.into(), 2.into(), 3.into()]).unwrap();
        let stmt = compile(&clauses, Statement::Select, Dialect::Named).unwrap();
        assert_eq!(
            stmt.sql(),
            "SELECT * FROM posts WHERE user_id IN (:user_id, :user_id_2, :user_id_3)"
        );
    }

    #[test]
    fn rejects_bad_identifiers() {
        assert!(Relation::has_one("p", "profiles; --", "user_id", "id").validate().is_err());
        assert!(Relation::has_one("p", "profiles", "user_id", "id").validate().is_ok());
    }
}
