//! Table dependency ordering.
//!
//! Provides:
//! - Dependency graph construction from foreign keys (child -> parent)
//! - Pinned-first topological ordering with document-order tie breaks
//! - Cycle breaking and assignment of each FK to inline or deferred emission

use super::{Catalog, TableId};
use crate::diagnostics::{Diagnostic, DiagnosticKind};
use std::collections::BTreeSet;

/// Dependency graph over a catalog.
///
/// - A parent is a table referenced by another table's FK
/// - A child is a table that has an FK referencing another table
///
/// Self references and references to absent tables are not edges.
#[derive(Debug)]
pub struct SchemaGraph<'a> {
    pub catalog: &'a Catalog,
    /// For each table, distinct parent tables
    pub parents: Vec<Vec<TableId>>,
    /// For each table, distinct child tables
    pub children: Vec<Vec<TableId>>,
}

/// Ordering options
#[derive(Debug, Clone, Default)]
pub struct PlanOptions {
    /// Tables forced to the front, in this order
    pub pinned: Vec<String>,
    /// Defer every FK (schema-only output)
    pub defer_all: bool,
}

/// Emission plan for a catalog
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaPlan {
    /// Table creation order
    pub order: Vec<TableId>,
    /// Per table (indexed by id), per FK: emitted inside CREATE TABLE
    pub inline: Vec<Vec<bool>>,
    /// FKs emitted as ALTER TABLE after all data, as (table, fk index)
    pub deferred: Vec<(TableId, usize)>,
}

impl SchemaPlan {
    pub fn is_inline(&self, table: TableId, fk: usize) -> bool {
        self.inline
            .get(table.0 as usize)
            .and_then(|fks| fks.get(fk))
            .copied()
            .unwrap_or(false)
    }
}

impl<'a> SchemaGraph<'a> {
    /// Build a dependency graph from a catalog
    pub fn from_catalog(catalog: &'a Catalog) -> Self {
        let n = catalog.len();
        let mut parents: Vec<Vec<TableId>> = vec![Vec::new(); n];
        let mut children: Vec<Vec<TableId>> = vec![Vec::new(); n];

        for (child_id, table) in catalog.iter() {
            for fk in &table.foreign_keys {
                let Some(parent_id) = catalog.table_id(&fk.referenced_table) else {
                    continue;
                };
                if parent_id == child_id {
                    continue;
                }
                if !parents[child_id.0 as usize].contains(&parent_id) {
                    parents[child_id.0 as usize].push(parent_id);
                }
                if !children[parent_id.0 as usize].contains(&child_id) {
                    children[parent_id.0 as usize].push(child_id);
                }
            }
        }

        Self {
            catalog,
            parents,
            children,
        }
    }

    pub fn len(&self) -> usize {
        self.catalog.len()
    }

    pub fn is_empty(&self) -> bool {
        self.catalog.is_empty()
    }

    pub fn table_name(&self, id: TableId) -> &str {
        self.catalog.table(id).map_or("", |t| t.name.as_str())
    }

    /// Order tables and decide where each FK is emitted.
    pub fn plan(&self, options: &PlanOptions) -> (SchemaPlan, Vec<Diagnostic>) {
        let n = self.len();
        let mut notes = Vec::new();
        let mut order = Vec::with_capacity(n);
        let mut placed = vec![false; n];

        for name in &options.pinned {
            match self.catalog.table_id(name) {
                Some(id) if !placed[id.0 as usize] => {
                    placed[id.0 as usize] = true;
                    order.push(id);
                }
                Some(_) => {}
                None => notes.push(
                    Diagnostic::new(
                        DiagnosticKind::UnknownPinnedTable,
                        format!("pinned table {} is not defined in the dump", name),
                    )
                    .with_table(name),
                ),
            }
        }

        // Unsatisfied parents per table
        let mut in_degree: Vec<usize> = self
            .parents
            .iter()
            .map(|ps| ps.iter().filter(|p| !placed[p.0 as usize]).count())
            .collect();

        let mut ready: BTreeSet<TableId> = (0..n)
            .filter(|&i| !placed[i] && in_degree[i] == 0)
            .map(|i| TableId(i as u32))
            .collect();

        while order.len() < n {
            let next = match ready.pop_first() {
                Some(id) => id,
                None => {
                    let Some(id) = (0..n)
                        .filter(|&i| !placed[i])
                        .min_by_key(|&i| (in_degree[i], i))
                        .map(|i| TableId(i as u32))
                    else {
                        break;
                    };
                    notes.push(self.cycle_note(id, &placed));
                    id
                }
            };

            placed[next.0 as usize] = true;
            order.push(next);

            for &child in &self.children[next.0 as usize] {
                let c = child.0 as usize;
                if placed[c] {
                    continue;
                }
                in_degree[c] = in_degree[c].saturating_sub(1);
                if in_degree[c] == 0 {
                    ready.insert(child);
                }
            }
        }

        let mut position = vec![usize::MAX; n];
        for (pos, id) in order.iter().enumerate() {
            position[id.0 as usize] = pos;
        }

        let mut inline: Vec<Vec<bool>> = self
            .catalog
            .iter()
            .map(|(_, t)| vec![false; t.foreign_keys.len()])
            .collect();
        let mut deferred = Vec::new();

        for &id in &order {
            let Some(table) = self.catalog.table(id) else {
                continue;
            };
            for (idx, fk) in table.foreign_keys.iter().enumerate() {
                let is_inline = match self.catalog.table_id(&fk.referenced_table) {
                    None => {
                        notes.push(
                            Diagnostic::new(
                                DiagnosticKind::UnresolvedForeignKey,
                                format!(
                                    "constraint {} references missing table {}",
                                    fk.name, fk.referenced_table
                                ),
                            )
                            .with_table(&table.name),
                        );
                        false
                    }
                    Some(_) if options.defer_all => false,
                    Some(parent) if parent == id => true,
                    Some(parent) => position[parent.0 as usize] < position[id.0 as usize],
                };

                if is_inline {
                    inline[id.0 as usize][idx] = true;
                } else {
                    deferred.push((id, idx));
                }
            }
        }

        (
            SchemaPlan {
                order,
                inline,
                deferred,
            },
            notes,
        )
    }

    fn cycle_note(&self, id: TableId, placed: &[bool]) -> Diagnostic {
        let waiting: Vec<&str> = self.parents[id.0 as usize]
            .iter()
            .filter(|p| !placed[p.0 as usize])
            .map(|&p| self.table_name(p))
            .collect();
        Diagnostic::new(
            DiagnosticKind::CyclicDependency,
            format!(
                "cycle broken at {}; constraints to {} deferred",
                self.table_name(id),
                waiting.join(", ")
            ),
        )
        .with_table(self.table_name(id))
    }
}
