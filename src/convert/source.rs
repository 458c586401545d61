//! Statement sources for the two translation passes.

use crate::diagnostics::Diagnostic;
use crate::error::Result;
use crate::input::open_input;
use crate::parser::{
    encoding_note, parse_statement, DumpDocument, ParsedStatement, Parser, StatementType,
    TextEncoding,
};
use indicatif::ProgressBar;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    /// Table definitions and other DDL
    Schema,
    /// Rows and everything passed through in document order
    Data,
}

impl Pass {
    fn label(&self) -> &'static str {
        match self {
            Pass::Schema => "schema",
            Pass::Data => "data",
        }
    }
}

/// Anything that can replay a dump's statements in document order
pub trait StatementSource {
    /// Visit the statements `pass` needs. Sources may skip statements the
    /// pass ignores anyway.
    fn each(
        &mut self,
        pass: Pass,
        visit: &mut dyn FnMut(&ParsedStatement) -> Result<()>,
    ) -> Result<()>;

    /// Statements in the dump, known after the first pass
    fn statement_count(&self) -> u64;

    /// First non-UTF-8 statement, if any
    fn encoding_fallback(&self) -> Option<Diagnostic>;
}

impl StatementSource for &DumpDocument {
    fn each(
        &mut self,
        _pass: Pass,
        visit: &mut dyn FnMut(&ParsedStatement) -> Result<()>,
    ) -> Result<()> {
        for stmt in self.iter() {
            visit(stmt)?;
        }
        Ok(())
    }

    fn statement_count(&self) -> u64 {
        self.len() as u64
    }

    fn encoding_fallback(&self) -> Option<Diagnostic> {
        self.encoding_fallback.clone()
    }
}

/// Streams a dump file once per pass without holding it in memory
pub struct FileSource {
    path: PathBuf,
    buffer_size: usize,
    progress: Option<ProgressBar>,
    statements: u64,
    fallback: Option<Diagnostic>,
}

impl FileSource {
    pub fn new(path: &Path, buffer_size: usize) -> Self {
        Self {
            path: path.to_path_buf(),
            buffer_size,
            progress: None,
            statements: 0,
            fallback: None,
        }
    }

    pub fn with_progress(mut self, progress: Option<ProgressBar>) -> Self {
        self.progress = progress;
        self
    }
}

impl StatementSource for FileSource {
    fn each(
        &mut self,
        pass: Pass,
        visit: &mut dyn FnMut(&ParsedStatement) -> Result<()>,
    ) -> Result<()> {
        if let Some(pb) = &self.progress {
            pb.set_message(pass.label());
        }

        let reader = open_input(&self.path, self.progress.as_ref())?;
        let mut parser = Parser::new(reader, self.buffer_size);
        let mut count = 0u64;

        while let Some(raw) = parser.read_statement()? {
            count += 1;
            let (text, fallback) = raw.decode();
            if fallback && self.fallback.is_none() {
                self.fallback = Some(encoding_note(raw.index, raw.offset));
            }
            if raw.terminated && !needed(pass, &text) {
                continue;
            }
            let stmt = ParsedStatement::from_text(raw.index, raw.offset, &text, raw.terminated)
                .with_encoding(TextEncoding::from_fallback(fallback));
            visit(&stmt)?;
        }

        self.statements = count;
        Ok(())
    }

    fn statement_count(&self) -> u64 {
        self.statements
    }

    fn encoding_fallback(&self) -> Option<Diagnostic> {
        self.fallback.clone()
    }
}

/// Skip full parsing of rows in the schema pass and of DDL in the data pass
fn needed(pass: Pass, text: &str) -> bool {
    let (kind, _) = parse_statement(text);
    match pass {
        Pass::Schema => kind != StatementType::Insert,
        Pass::Data => !matches!(kind, StatementType::CreateTable | StatementType::AlterTable),
    }
}
