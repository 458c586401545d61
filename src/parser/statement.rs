//! Classified statements and the in-memory dump document.

use super::{
    parse_insert, parse_statement, InsertValues, MalformedKind, Parser, StatementType,
    TextEncoding,
};
use crate::diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
use crate::schema::{parse_create_table, TableSchema};
use std::io::Read;

/// A statement that is not translated structurally
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtherStatement {
    pub kind: StatementType,
    /// Table name for table statements, empty otherwise
    pub table: String,
    pub text: String,
    /// False for a best-effort tail cut off by end of input
    pub terminated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    CreateTable(TableSchema),
    InsertValues(InsertValues),
    Other(OtherStatement),
}

/// A statement with its location in the input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedStatement {
    pub index: usize,
    pub offset: u64,
    pub statement: Statement,
    /// Parse notes, stamped with this statement's location
    pub notes: Vec<Diagnostic>,
}

impl ParsedStatement {
    pub fn from_text(index: usize, offset: u64, text: &str, terminated: bool) -> Self {
        let (statement, notes) = Statement::from_text(text, terminated);
        let notes = absolute(notes, offset)
            .into_iter()
            .map(|note| note.at(index, offset))
            .collect();
        Self {
            index,
            offset,
            statement,
            notes,
        }
    }

    /// Record how the statement text was decoded
    pub fn with_encoding(mut self, encoding: TextEncoding) -> Self {
        if let Statement::InsertValues(insert) = &mut self.statement {
            insert.encoding = encoding;
        }
        self
    }
}

impl Statement {
    /// Classify and parse decoded statement text.
    ///
    /// Notes are returned unstamped; the caller knows the location.
    pub fn from_text(text: &str, terminated: bool) -> (Statement, Vec<Diagnostic>) {
        let (kind, table) = parse_statement(text);
        let mut notes = Vec::new();

        let other = |kind: StatementType, table: String| {
            Statement::Other(OtherStatement {
                kind,
                table,
                text: text.to_string(),
                terminated,
            })
        };

        if !terminated {
            notes.push(Diagnostic::new(
                DiagnosticKind::UnterminatedStatement,
                "input ended inside a statement; tail kept as-is",
            ));
            return (other(kind, table), notes);
        }

        let statement = match kind {
            StatementType::CreateTable => match parse_create_table(text) {
                Some((schema, mut ddl_notes)) => {
                    notes.append(&mut ddl_notes);
                    Statement::CreateTable(schema)
                }
                None => other(kind, table),
            },
            StatementType::Insert => match parse_insert(text) {
                Some((insert, error)) => {
                    if let Some(err) = error {
                        let message = match err.kind {
                            MalformedKind::UnterminatedQuote => "unterminated quoted literal",
                            MalformedKind::UnterminatedRow => "unterminated row",
                        };
                        let mut note = Diagnostic::new(
                            DiagnosticKind::MalformedLiteral,
                            format!(
                                "{}; {} rows kept, remainder skipped",
                                message,
                                insert.rows.len()
                            ),
                        )
                        .with_table(&insert.table);
                        note.offset = Some(err.offset as u64);
                        notes.push(note);
                    }
                    Statement::InsertValues(insert)
                }
                // INSERT ... SELECT and friends stay untranslated
                None => other(kind, table),
            },
            _ => other(kind, table),
        };

        (statement, notes)
    }

    pub fn kind(&self) -> StatementType {
        match self {
            Statement::CreateTable(_) => StatementType::CreateTable,
            Statement::InsertValues(_) => StatementType::Insert,
            Statement::Other(o) => o.kind,
        }
    }
}

/// Whole dump held in memory, in document order
#[derive(Debug, Clone, Default)]
pub struct DumpDocument {
    pub statements: Vec<ParsedStatement>,
    /// Set when some statement was not valid UTF-8
    pub encoding_fallback: Option<Diagnostic>,
}

impl DumpDocument {
    /// Read and classify every statement of a dump.
    ///
    /// A malformed literal offset is made absolute (statement offset + position).
    pub fn parse<R: Read>(reader: R, buffer_size: usize) -> std::io::Result<Self> {
        let mut parser = Parser::new(reader, buffer_size);
        let mut doc = Self::default();

        while let Some(raw) = parser.read_statement()? {
            let (text, fallback) = raw.decode();
            if fallback && doc.encoding_fallback.is_none() {
                doc.encoding_fallback = Some(encoding_note(raw.index, raw.offset));
            }
            doc.statements.push(
                ParsedStatement::from_text(raw.index, raw.offset, &text, raw.terminated)
                    .with_encoding(TextEncoding::from_fallback(fallback)),
            );
        }

        Ok(doc)
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ParsedStatement> {
        self.statements.iter()
    }

    /// Every parse note in document order
    pub fn diagnostics(&self) -> Diagnostics {
        let mut diagnostics = Diagnostics::new();
        if let Some(note) = &self.encoding_fallback {
            diagnostics.push(note.clone());
        }
        for stmt in &self.statements {
            for note in &stmt.notes {
                diagnostics.push(note.clone());
            }
        }
        diagnostics
    }
}

pub fn encoding_note(index: usize, offset: u64) -> Diagnostic {
    Diagnostic::new(
        DiagnosticKind::EncodingFallback,
        "input is not valid UTF-8; decoded as Latin-1",
    )
    .at(index, offset)
}

/// Turn statement-relative literal offsets into input offsets
pub fn absolute(notes: Vec<Diagnostic>, statement_offset: u64) -> Vec<Diagnostic> {
    notes
        .into_iter()
        .map(|mut note| {
            if let Some(rel) = note.offset {
                note.offset = Some(statement_offset + rel);
            }
            note
        })
        .collect()
}
