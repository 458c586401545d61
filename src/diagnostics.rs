//! Diagnostics collected while translating a dump.
//!
//! Nothing here is fatal: every entry records a place where translation
//! was best-effort (a value passed through, a constraint deferred, a row
//! kept despite a width mismatch) so the run stays observable.

use schemars::JsonSchema;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Default cap on stored diagnostics; overflow is only counted.
pub const DEFAULT_DIAGNOSTICS_LIMIT: usize = 10_000;

/// Kinds of non-fatal conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// Unterminated quote or parenthesis inside a value list
    MalformedLiteral,
    /// Statement with an unknown leading keyword, passed through
    UnclassifiedStatement,
    /// Foreign key referencing a table absent from the dump
    UnresolvedForeignKey,
    /// Cycle broken while ordering tables
    CyclicDependency,
    /// Row width differs from the known column count
    RowArityMismatch,
    /// Column type with no mapping rule, passed through unchanged
    UnsupportedTypeToken,
    /// Clause or option with no target equivalent
    UnsupportedClause,
    /// Translation that narrows or drops information
    LossyConversion,
    /// Input ended inside a statement
    UnterminatedStatement,
    /// Input was not valid UTF-8 and was read as Latin-1
    EncodingFallback,
    /// Table defined more than once; the later definition wins
    DuplicateTable,
    /// Pinned table name that never appears in the dump
    UnknownPinnedTable,
}

impl DiagnosticKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticKind::MalformedLiteral => "malformed_literal",
            DiagnosticKind::UnclassifiedStatement => "unclassified_statement",
            DiagnosticKind::UnresolvedForeignKey => "unresolved_foreign_key",
            DiagnosticKind::CyclicDependency => "cyclic_dependency",
            DiagnosticKind::RowArityMismatch => "row_arity_mismatch",
            DiagnosticKind::UnsupportedTypeToken => "unsupported_type_token",
            DiagnosticKind::UnsupportedClause => "unsupported_clause",
            DiagnosticKind::LossyConversion => "lossy_conversion",
            DiagnosticKind::UnterminatedStatement => "unterminated_statement",
            DiagnosticKind::EncodingFallback => "encoding_fallback",
            DiagnosticKind::DuplicateTable => "duplicate_table",
            DiagnosticKind::UnknownPinnedTable => "unknown_pinned_table",
        }
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single recorded condition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, JsonSchema)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    /// Zero-based index of the statement in the input
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statement: Option<usize>,
    /// Byte offset of the statement (or the literal, when known)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    pub message: String,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            statement: None,
            offset: None,
            table: None,
            message: message.into(),
        }
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    /// Stamp the statement location unless one is already set.
    pub fn at(mut self, statement: usize, offset: u64) -> Self {
        if self.statement.is_none() {
            self.statement = Some(statement);
        }
        if self.offset.is_none() {
            self.offset = Some(offset);
        }
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.kind)?;
        if let Some(t) = &self.table {
            write!(f, " {}:", t)?;
        }
        write!(f, " {}", self.message)?;
        match (self.statement, self.offset) {
            (Some(s), Some(o)) => write!(f, " (statement #{}, byte {})", s + 1, o),
            (Some(s), None) => write!(f, " (statement #{})", s + 1),
            _ => Ok(()),
        }
    }
}

/// Ordered collection of diagnostics with a storage cap
#[derive(Debug)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
    limit: usize,
    suppressed: usize,
    counts: BTreeMap<DiagnosticKind, usize>,
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self::new()
    }
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::with_limit(DEFAULT_DIAGNOSTICS_LIMIT)
    }

    pub fn with_limit(limit: usize) -> Self {
        Self {
            entries: Vec::new(),
            limit,
            suppressed: 0,
            counts: BTreeMap::new(),
        }
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        tracing::debug!(kind = %diagnostic.kind, "{}", diagnostic.message);
        *self.counts.entry(diagnostic.kind).or_insert(0) += 1;
        if self.entries.len() < self.limit {
            self.entries.push(diagnostic);
        } else {
            self.suppressed += 1;
        }
    }

    /// Record only the first diagnostic of this kind.
    pub fn push_once(&mut self, diagnostic: Diagnostic) {
        if !self.counts.contains_key(&diagnostic.kind) {
            self.push(diagnostic);
        }
    }

    /// Add notes produced by a parsing stage, stamped with the statement location.
    pub fn extend_at<I>(&mut self, notes: I, statement: usize, offset: u64)
    where
        I: IntoIterator<Item = Diagnostic>,
    {
        for note in notes {
            self.push(note.at(statement, offset));
        }
    }

    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    /// Total recorded, including suppressed entries
    pub fn total(&self) -> usize {
        self.entries.len() + self.suppressed
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    pub fn count(&self, kind: DiagnosticKind) -> usize {
        self.counts.get(&kind).copied().unwrap_or(0)
    }

    pub fn suppressed(&self) -> usize {
        self.suppressed
    }

    pub fn report(&self) -> DiagnosticReport {
        DiagnosticReport {
            total: self.total(),
            suppressed: self.suppressed,
            counts: self
                .counts
                .iter()
                .map(|(k, v)| (k.as_str().to_string(), *v))
                .collect(),
            diagnostics: self.entries.clone(),
        }
    }

    /// Print a human readable summary to stderr
    pub fn print_summary(&self, max_shown: usize) {
        if self.is_empty() {
            return;
        }

        eprintln!("\nDiagnostics ({}):", self.total());
        for (kind, count) in &self.counts {
            eprintln!("  {:<24} {}", kind.as_str(), count);
        }
        eprintln!();
        for diagnostic in self.entries.iter().take(max_shown) {
            eprintln!("  ⚠ {}", diagnostic);
        }

        let hidden = self.total().saturating_sub(max_shown);
        if hidden > 0 {
            eprintln!("  ... ({} more, use --report for the full list)", hidden);
        }
    }
}

/// Serializable form of a diagnostics collection
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct DiagnosticReport {
    pub total: usize,
    pub suppressed: usize,
    /// Count per kind, keyed by the snake_case kind name
    pub counts: BTreeMap<String, usize>,
    pub diagnostics: Vec<Diagnostic>,
}
