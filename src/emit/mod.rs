//! Output writers for translated dumps.
//!
//! `SqlEmitter` lays out the PostgreSQL script:
//! - preamble with session settings
//! - optional DROP block, then CREATE TABLE in plan order
//! - schema pass-through, data, sequence resets
//! - deferred foreign keys
//!
//! `RowExporter` writes one CSV per table instead.

mod rows;

pub use rows::RowExporter;

use crate::config::Mode;
use crate::convert::{render_create_table, render_deferred_fk, render_drop, render_setval, TypeMapper};
use crate::diagnostics::Diagnostics;
use crate::schema::{Catalog, SchemaPlan};
use std::io::{self, Write};

/// Session settings every translated script starts with
const SESSION_SETTINGS: &[&str] = &[
    "SET statement_timeout = 0;",
    "SET lock_timeout = 0;",
    "SET client_encoding = 'UTF8';",
    "SET standard_conforming_strings = on;",
    "SET check_function_bodies = false;",
    "SET client_min_messages = warning;",
    "SET row_security = off;",
];

/// Disables FK triggers while loading data
const REPLICA_ROLE: &str = "SET session_replication_role = 'replica';";
const ORIGIN_ROLE: &str = "SET session_replication_role = 'origin';";

/// Header information for the preamble
#[derive(Debug, Clone, Copy)]
pub struct Preamble<'a> {
    /// Input path, when the dump came from a file
    pub source: Option<&'a str>,
    pub mode: Mode,
}

pub struct SqlEmitter<W: Write> {
    writer: W,
    statements: u64,
}

impl<W: Write> SqlEmitter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            statements: 0,
        }
    }

    /// Statements written so far
    pub fn statements(&self) -> u64 {
        self.statements
    }

    pub fn preamble(&mut self, preamble: &Preamble) -> io::Result<()> {
        writeln!(self.writer, "-- PostgreSQL dump translated from MySQL")?;
        writeln!(
            self.writer,
            "-- Generated by dump-translate {}",
            env!("CARGO_PKG_VERSION")
        )?;
        if let Some(source) = preamble.source {
            writeln!(self.writer, "-- Source: {}", source)?;
        }
        writeln!(self.writer, "-- Mode: {}", preamble.mode)?;
        writeln!(self.writer)?;

        for setting in SESSION_SETTINGS {
            writeln!(self.writer, "{}", setting)?;
        }
        if preamble.mode == Mode::Full {
            writeln!(self.writer, "{}", REPLICA_ROLE)?;
        }
        writeln!(self.writer)?;
        self.writer.flush()
    }

    pub fn section(&mut self, title: &str) -> io::Result<()> {
        writeln!(self.writer, "--\n-- {}\n--\n", title)
    }

    /// Write one complete statement and flush it.
    pub fn statement(&mut self, sql: &str) -> io::Result<()> {
        self.writer.write_all(sql.as_bytes())?;
        self.writer.write_all(b"\n\n")?;
        self.statements += 1;
        self.writer.flush()
    }

    /// DROP TABLE IF EXISTS for every table, dependents first
    pub fn drops(&mut self, catalog: &Catalog, plan: &SchemaPlan) -> io::Result<()> {
        if plan.order.is_empty() {
            return Ok(());
        }
        self.section("Drop existing tables")?;
        for &id in plan.order.iter().rev() {
            if let Some(table) = catalog.table(id) {
                self.statement(&render_drop(&table.name))?;
            }
        }
        Ok(())
    }

    /// CREATE TABLE statements in plan order.
    ///
    /// `origins[id]` is the (statement index, offset) the table was defined at;
    /// rendering notes are stamped with it.
    pub fn tables(
        &mut self,
        catalog: &Catalog,
        plan: &SchemaPlan,
        origins: &[(usize, u64)],
        diagnostics: &mut Diagnostics,
    ) -> io::Result<()> {
        if plan.order.is_empty() {
            return Ok(());
        }
        self.section("Tables")?;
        for &id in &plan.order {
            let Some(table) = catalog.table(id) else {
                continue;
            };
            let inline = plan.inline.get(id.0 as usize).map_or(&[][..], |v| v.as_slice());
            let mut notes = Vec::new();
            let sql = render_create_table(table, inline, &mut notes);
            let (index, offset) = origins.get(id.0 as usize).copied().unwrap_or_default();
            diagnostics.extend_at(notes, index, offset);
            self.statement(&sql)?;
        }
        Ok(())
    }

    /// Statements kept verbatim (apart from quoting) after the tables
    pub fn passthrough(&mut self, statements: &[String]) -> io::Result<()> {
        if statements.is_empty() {
            return Ok(());
        }
        self.section("Other schema statements")?;
        for sql in statements {
            self.statement(sql)?;
        }
        Ok(())
    }

    pub fn begin_data(&mut self) -> io::Result<()> {
        self.section("Data")
    }

    /// Restore trigger firing and move serial sequences past loaded keys
    pub fn sequences(&mut self, catalog: &Catalog, plan: &SchemaPlan) -> io::Result<()> {
        self.writer.write_all(ORIGIN_ROLE.as_bytes())?;
        self.writer.write_all(b"\n\n")?;

        let mut resets = Vec::new();
        for &id in &plan.order {
            let Some(table) = catalog.table(id) else {
                continue;
            };
            for column in &table.columns {
                if column.auto_increment && TypeMapper::serial_type(&column.type_token).is_some() {
                    resets.push(render_setval(&table.name, &column.name));
                }
            }
        }

        if resets.is_empty() {
            return self.writer.flush();
        }
        self.section("Sequences")?;
        for sql in &resets {
            self.statement(sql)?;
        }
        Ok(())
    }

    /// Foreign keys that could not be created with their table
    pub fn deferred(&mut self, catalog: &Catalog, plan: &SchemaPlan) -> io::Result<()> {
        if plan.deferred.is_empty() {
            return Ok(());
        }
        self.section("Foreign keys")?;
        for &(id, idx) in &plan.deferred {
            if let Some(fk) = catalog.table(id).and_then(|t| t.foreign_keys.get(idx)) {
                self.statement(&render_deferred_fk(fk))?;
            }
        }
        Ok(())
    }

    pub fn finish(mut self) -> io::Result<W> {
        self.writer.flush()?;
        Ok(self.writer)
    }
}
