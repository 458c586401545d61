//! Per-run translation state.
//!
//! One `Translation` owns everything a run accumulates: the catalog, the
//! plan, schema pass-through statements, diagnostics and counters. The
//! schema pass feeds it DDL; the data pass feeds it everything else.

use super::postgres::{
    column_families, render_comment, render_insert, render_other, render_unterminated,
};
use super::types::TypeFamily;
use super::{ConvertStats, DeferredConstraint, PlanSummary, TranslateOptions, TranslateOutcome};
use crate::config::Mode;
use crate::diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
use crate::emit::{Preamble, RowExporter, SqlEmitter};
use crate::error::Result;
use crate::parser::{strip_leading_comments, InsertValues, ParsedStatement, Statement, StatementType};
use crate::schema::{parse_alter_table, Catalog, PlanOptions, SchemaGraph, SchemaPlan};
use std::io::Write;
use tracing::{debug, info};

pub struct Translation {
    options: TranslateOptions,
    catalog: Catalog,
    /// (statement index, offset) of each table's definition, by table id
    origins: Vec<(usize, u64)>,
    schema_passthrough: Vec<String>,
    plan: SchemaPlan,
    families: Vec<Vec<TypeFamily>>,
    diagnostics: Diagnostics,
    stats: ConvertStats,
}

impl Translation {
    pub fn new(options: TranslateOptions) -> Self {
        let diagnostics = Diagnostics::with_limit(options.diagnostics_limit);
        Self {
            options,
            catalog: Catalog::new(),
            origins: Vec::new(),
            schema_passthrough: Vec::new(),
            plan: SchemaPlan::default(),
            families: Vec::new(),
            diagnostics,
            stats: ConvertStats::default(),
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn plan(&self) -> &SchemaPlan {
        &self.plan
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn record(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    pub fn record_once(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push_once(diagnostic);
    }

    pub fn set_statement_count(&mut self, count: u64) {
        self.stats.statements = count;
    }

    fn record_notes(&mut self, stmt: &ParsedStatement) {
        for note in &stmt.notes {
            self.diagnostics.push(note.clone());
        }
    }

    fn note(&mut self, stmt: &ParsedStatement, kind: DiagnosticKind, table: &str, message: String) {
        let mut diagnostic = Diagnostic::new(kind, message).at(stmt.index, stmt.offset);
        if !table.is_empty() {
            diagnostic = diagnostic.with_table(table);
        }
        self.diagnostics.push(diagnostic);
    }

    /// Schema pass: collect table definitions and DDL pass-through.
    pub fn schema_statement(&mut self, stmt: &ParsedStatement) {
        match &stmt.statement {
            Statement::CreateTable(table) => {
                self.record_notes(stmt);
                let (id, replaced) = self.catalog.insert(table.clone());
                let slot = id.0 as usize;
                if slot == self.origins.len() {
                    self.origins.push((stmt.index, stmt.offset));
                } else {
                    self.origins[slot] = (stmt.index, stmt.offset);
                }
                if replaced {
                    self.note(
                        stmt,
                        DiagnosticKind::DuplicateTable,
                        &table.name,
                        format!("table {} defined again; the later definition wins", table.name),
                    );
                }
                debug!(table = %table.name, columns = table.columns.len(), "table defined");
            }
            Statement::InsertValues(_) => {}
            Statement::Other(other) => {
                self.record_notes(stmt);
                if !other.terminated {
                    return;
                }
                match other.kind {
                    StatementType::AlterTable => self.absorb_alter(stmt, &other.text, &other.table),
                    StatementType::CreateTable => {
                        self.note(
                            stmt,
                            DiagnosticKind::UnsupportedClause,
                            &other.table,
                            "CREATE TABLE without a column list passed through".to_string(),
                        );
                        self.push_schema_passthrough(&other.text);
                    }
                    StatementType::Unknown => {
                        let create = starts_with_create(&other.text);
                        let message = if create || self.options.mode != Mode::Schema {
                            "unrecognized statement passed through"
                        } else {
                            "unrecognized statement left out of schema output"
                        };
                        self.note(
                            stmt,
                            DiagnosticKind::UnclassifiedStatement,
                            "",
                            message.to_string(),
                        );
                        if create {
                            self.push_schema_passthrough(&other.text);
                        }
                    }
                    _ => {}
                }
            }
        }
    }

    fn absorb_alter(&mut self, stmt: &ParsedStatement, text: &str, table: &str) {
        match parse_alter_table(text, &mut self.catalog) {
            Some(outcome) => {
                debug!(table = %outcome.table, absorbed = outcome.absorbed, "alter table merged");
                self.diagnostics
                    .extend_at(outcome.diagnostics, stmt.index, stmt.offset);
                if let Some(remainder) = outcome.remainder {
                    self.push_schema_passthrough(&remainder);
                }
            }
            None => {
                self.note(
                    stmt,
                    DiagnosticKind::UnsupportedClause,
                    table,
                    format!("ALTER TABLE on undefined table {} passed through", table),
                );
                self.push_schema_passthrough(text);
            }
        }
    }

    fn push_schema_passthrough(&mut self, text: &str) {
        if let Some(sql) = render_other(text) {
            self.schema_passthrough.push(sql);
        }
    }

    /// Order the catalog once the schema pass is done.
    pub fn finish_schema(&mut self) {
        let options = PlanOptions {
            pinned: self.options.pinned.clone(),
            defer_all: self.options.mode == Mode::Schema,
        };
        let (plan, notes) = SchemaGraph::from_catalog(&self.catalog).plan(&options);

        for note in notes {
            let origin = note
                .table
                .as_deref()
                .and_then(|t| self.catalog.table_id(t))
                .and_then(|id| self.origins.get(id.0 as usize).copied());
            match origin {
                Some((index, offset)) => self.diagnostics.push(note.at(index, offset)),
                None => self.diagnostics.push(note),
            }
        }

        self.families = self.catalog.iter().map(|(_, t)| column_families(t)).collect();
        self.stats.tables = self.catalog.len();
        self.stats.deferred_fks = plan.deferred.len();
        info!(
            tables = self.catalog.len(),
            deferred = plan.deferred.len(),
            "schema pass complete"
        );
        self.plan = plan;
    }

    /// Preamble, drops, tables and schema pass-through
    pub fn write_schema<W: Write>(
        &mut self,
        emitter: &mut SqlEmitter<W>,
        source: Option<&str>,
    ) -> Result<()> {
        emitter.preamble(&Preamble {
            source,
            mode: self.options.mode,
        })?;
        if self.options.drop_tables {
            emitter.drops(&self.catalog, &self.plan)?;
        }
        emitter.tables(&self.catalog, &self.plan, &self.origins, &mut self.diagnostics)?;
        emitter.passthrough(&self.schema_passthrough)?;
        self.stats.passthrough += self.schema_passthrough.len() as u64;
        if self.options.mode == Mode::Full {
            emitter.begin_data()?;
        }
        Ok(())
    }

    /// Data pass, SQL output: one statement in, at most one statement out.
    pub fn write_data<W: Write>(
        &mut self,
        stmt: &ParsedStatement,
        emitter: &mut SqlEmitter<W>,
    ) -> Result<()> {
        match &stmt.statement {
            Statement::CreateTable(_) => {}
            Statement::InsertValues(insert) => {
                self.check_insert(stmt, insert);
                let families = self.families_for(insert);
                let mut zero_dates = 0;
                if let Some(sql) = render_insert(insert, &families, &mut zero_dates) {
                    emitter.statement(&sql)?;
                }
                self.note_zero_dates(stmt, &insert.table, zero_dates);
            }
            Statement::Other(other) if !other.terminated => {
                emitter.statement(&render_unterminated(&other.text))?;
                self.stats.passthrough += 1;
            }
            Statement::Other(other) => match other.kind {
                StatementType::Insert => {
                    self.note(
                        stmt,
                        DiagnosticKind::UnclassifiedStatement,
                        &other.table,
                        "INSERT without a VALUES list passed through".to_string(),
                    );
                    self.passthrough(&other.text, emitter)?;
                }
                StatementType::Unknown if !starts_with_create(&other.text) => {
                    self.passthrough(&other.text, emitter)?;
                }
                StatementType::Comment if self.options.keep_comments => {
                    match render_comment(&other.text) {
                        Some(sql) => emitter.statement(&sql)?,
                        None => self.stats.skipped += 1,
                    }
                }
                StatementType::Comment
                | StatementType::Set
                | StatementType::LockTables
                | StatementType::DropTable => self.stats.skipped += 1,
                _ => {}
            },
        }
        Ok(())
    }

    fn passthrough<W: Write>(&mut self, text: &str, emitter: &mut SqlEmitter<W>) -> Result<()> {
        if let Some(sql) = render_other(text) {
            debug!(statement = %sql.lines().next().unwrap_or(""), "passing through");
            emitter.statement(&sql)?;
            self.stats.passthrough += 1;
        }
        Ok(())
    }

    /// Data pass, row export. `None` counts and checks without writing.
    pub fn export_rows(
        &mut self,
        stmt: &ParsedStatement,
        exporter: Option<&mut RowExporter>,
    ) -> Result<()> {
        match &stmt.statement {
            Statement::InsertValues(insert) => {
                self.check_insert(stmt, insert);
                let families = self.families_for(insert);
                let mut zero_dates = 0;
                if let Some(exporter) = exporter {
                    exporter.export(insert, &families, &mut zero_dates)?;
                }
                self.note_zero_dates(stmt, &insert.table, zero_dates);
            }
            Statement::Other(other) if other.terminated && other.kind == StatementType::Insert => {
                self.note(
                    stmt,
                    DiagnosticKind::UnclassifiedStatement,
                    &other.table,
                    "INSERT without a VALUES list not exported".to_string(),
                );
            }
            _ => {}
        }
        Ok(())
    }

    /// Column families for an INSERT, following its column list when present
    fn families_for(&self, insert: &InsertValues) -> Vec<TypeFamily> {
        let Some(id) = self.catalog.table_id(&insert.table) else {
            return Vec::new();
        };
        let known = &self.families[id.0 as usize];
        match (&insert.columns, self.catalog.table(id)) {
            (Some(columns), Some(table)) => columns
                .iter()
                .map(|c| {
                    table
                        .column_index(c)
                        .and_then(|i| known.get(i).copied())
                        .unwrap_or(TypeFamily::Other)
                })
                .collect(),
            _ => known.clone(),
        }
    }

    fn check_insert(&mut self, stmt: &ParsedStatement, insert: &InsertValues) {
        self.record_notes(stmt);
        self.stats.inserts += 1;
        self.stats.rows += insert.rows.len() as u64;

        let expected = match &insert.columns {
            Some(columns) => Some(columns.len()),
            None => self.catalog.get(&insert.table).map(|t| t.columns.len()),
        };

        if let Some(expected) = expected {
            let mismatched: Vec<(usize, usize)> = insert
                .rows
                .iter()
                .enumerate()
                .filter(|(_, row)| row.len() != expected)
                .map(|(i, row)| (i, row.len()))
                .collect();
            for (i, width) in mismatched {
                self.note(
                    stmt,
                    DiagnosticKind::RowArityMismatch,
                    &insert.table,
                    format!("row {} has {} values, expected {}", i + 1, width, expected),
                );
            }
        }

        if let Some(trailing) = &insert.trailing {
            let clause = trailing.split_whitespace().take(4).collect::<Vec<_>>().join(" ");
            self.note(
                stmt,
                DiagnosticKind::UnsupportedClause,
                &insert.table,
                format!("trailing clause dropped: {} ...", clause),
            );
        }
    }

    fn note_zero_dates(&mut self, stmt: &ParsedStatement, table: &str, count: usize) {
        if count > 0 {
            self.note(
                stmt,
                DiagnosticKind::LossyConversion,
                table,
                format!("{} zero date value(s) written as NULL", count),
            );
        }
    }

    /// Sequence resets (full mode) and deferred constraints
    pub fn write_epilogue<W: Write>(&mut self, emitter: &mut SqlEmitter<W>) -> Result<()> {
        if self.options.mode == Mode::Full {
            emitter.sequences(&self.catalog, &self.plan)?;
        }
        emitter.deferred(&self.catalog, &self.plan)?;
        Ok(())
    }

    pub fn note_files(&mut self, files: usize) {
        self.stats.files = files;
    }

    pub fn plan_summary(&self) -> PlanSummary {
        let order = self
            .plan
            .order
            .iter()
            .filter_map(|&id| self.catalog.table(id))
            .map(|t| t.name.clone())
            .collect();

        let deferred = self
            .plan
            .deferred
            .iter()
            .filter_map(|&(id, idx)| self.catalog.table(id)?.foreign_keys.get(idx))
            .map(|fk| DeferredConstraint {
                table: fk.table.clone(),
                constraint: fk.name.clone(),
                references: fk.referenced_table.clone(),
                resolved: self.catalog.table_id(&fk.referenced_table).is_some(),
            })
            .collect();

        PlanSummary { order, deferred }
    }

    pub fn finish(self) -> TranslateOutcome {
        let plan = self.plan_summary();
        TranslateOutcome {
            mode: self.options.mode,
            stats: self.stats,
            plan,
            diagnostics: self.diagnostics,
        }
    }
}

/// `CREATE VIEW`, `CREATE INDEX` and the like belong with the schema
fn starts_with_create(text: &str) -> bool {
    strip_leading_comments(text)
        .get(..6)
        .is_some_and(|kw| kw.eq_ignore_ascii_case("create"))
}
