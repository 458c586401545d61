//! Schema model for translated dumps.
//!
//! This module provides:
//! - Data models for table schemas, columns and constraints
//! - MySQL DDL parsing (`CREATE TABLE`, key-bearing `ALTER TABLE`)
//! - Dependency ordering with cycle breaking and FK deferral

mod ddl;
mod graph;

pub use ddl::*;
pub use graph::*;

use ahash::AHashMap;
use smallvec::SmallVec;
use std::fmt;

/// Unique identifier for a table within a catalog (document order)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TableId(pub u32);

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TableId({})", self.0)
    }
}

/// Column names of a key; most keys have one or two columns
pub type ColumnList = SmallVec<[String; 2]>;

/// Column definition as written in the source DDL
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnDefinition {
    pub name: String,
    /// Raw type token, e.g. `bigint(20) unsigned`
    pub type_token: String,
    pub nullable: bool,
    /// Raw default token, e.g. `'abc'`, `0`, `CURRENT_TIMESTAMP`
    pub default: Option<String>,
    pub auto_increment: bool,
    /// Raw `ON UPDATE` token
    pub on_update: Option<String>,
    /// Declared `PRIMARY KEY` inline
    pub primary_key: bool,
    /// Declared `UNIQUE` inline
    pub unique: bool,
    pub comment: Option<String>,
    /// Modifier tokens with no known meaning
    pub extra: Vec<String>,
}

impl ColumnDefinition {
    pub fn new(name: impl Into<String>, type_token: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_token: type_token.into(),
            nullable: true,
            ..Default::default()
        }
    }

    /// Lowercased type name without arguments or attributes (`bigint(20) unsigned` -> `bigint`)
    pub fn base_type(&self) -> String {
        let lower = self.type_token.to_lowercase();
        lower
            .split(|c: char| c == '(' || c.is_whitespace())
            .next()
            .unwrap_or("")
            .to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrimaryKey {
    pub name: Option<String>,
    pub columns: ColumnList,
}

/// Foreign key constraint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeyConstraint {
    pub name: String,
    /// Owning table
    pub table: String,
    pub columns: ColumnList,
    pub referenced_table: String,
    pub referenced_columns: ColumnList,
    /// Raw referential action, e.g. `CASCADE`, `SET NULL`
    pub on_delete: Option<String>,
    pub on_update: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniqueConstraint {
    pub name: Option<String>,
    pub columns: ColumnList,
}

/// Complete table schema
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnDefinition>,
    pub primary_key: Option<PrimaryKey>,
    pub foreign_keys: Vec<ForeignKeyConstraint>,
    pub unique_keys: Vec<UniqueConstraint>,
    /// `CHECK (...)` expressions, verbatim
    pub checks: Vec<String>,
    /// Body items that could not be understood, re-emitted verbatim
    pub opaque: Vec<String>,
    /// Table options after the closing parenthesis, lowercased key
    pub options: Vec<(String, String)>,
}

impl TableSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Get a column by name (case-insensitive)
    pub fn column(&self, name: &str) -> Option<&ColumnDefinition> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub fn column_mut(&mut self, name: &str) -> Option<&mut ColumnDefinition> {
        self.columns
            .iter_mut()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Whether `name` is the single column of the primary key
    pub fn is_single_pk(&self, name: &str) -> bool {
        match &self.primary_key {
            Some(pk) => pk.columns.len() == 1 && pk.columns[0].eq_ignore_ascii_case(name),
            None => false,
        }
    }
}

/// Set of table schemas collected from a dump, in document order
#[derive(Debug, Default)]
pub struct Catalog {
    /// Lowercased table name to id
    ids: AHashMap<String, TableId>,
    tables: Vec<TableSchema>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a table. A redefinition keeps the original position and
    /// replaces the content; the second value reports the replacement.
    pub fn insert(&mut self, table: TableSchema) -> (TableId, bool) {
        let key = table.name.to_lowercase();
        match self.ids.get(&key) {
            Some(&id) => {
                self.tables[id.0 as usize] = table;
                (id, true)
            }
            None => {
                let id = TableId(self.tables.len() as u32);
                self.ids.insert(key, id);
                self.tables.push(table);
                (id, false)
            }
        }
    }

    /// Get table ID by name (case-insensitive)
    pub fn table_id(&self, name: &str) -> Option<TableId> {
        self.ids.get(&name.to_lowercase()).copied()
    }

    pub fn get(&self, name: &str) -> Option<&TableSchema> {
        self.table_id(name).and_then(|id| self.table(id))
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut TableSchema> {
        let id = self.table_id(name)?;
        self.tables.get_mut(id.0 as usize)
    }

    pub fn table(&self, id: TableId) -> Option<&TableSchema> {
        self.tables.get(id.0 as usize)
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Iterate tables in document order
    pub fn iter(&self) -> impl Iterator<Item = (TableId, &TableSchema)> {
        self.tables
            .iter()
            .enumerate()
            .map(|(i, t)| (TableId(i as u32), t))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_type() {
        let col = ColumnDefinition::new("id", "BIGINT(20) unsigned");
        assert_eq!(col.base_type(), "bigint");
        assert!(col.nullable);
        assert_eq!(ColumnDefinition::new("x", "double precision").base_type(), "double");
    }

    #[test]
    fn test_catalog_duplicate_keeps_position() {
        let mut catalog = Catalog::new();
        catalog.insert(TableSchema::new("a"));
        catalog.insert(TableSchema::new("b"));

        let mut replacement = TableSchema::new("A");
        replacement.columns.push(ColumnDefinition::new("id", "int"));
        let (id, replaced) = catalog.insert(replacement);

        assert!(replaced);
        assert_eq!(id, TableId(0));
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.get("a").unwrap().columns.len(), 1);
    }

    #[test]
    fn test_single_pk() {
        let mut t = TableSchema::new("t");
        t.primary_key = Some(PrimaryKey {
            name: None,
            columns: ColumnList::from_vec(vec!["id".to_string()]),
        });
        assert!(t.is_single_pk("ID"));
        assert!(!t.is_single_pk("other"));
    }
}
