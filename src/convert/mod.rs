//! Translation of MySQL dumps into PostgreSQL.
//!
//! A run makes two passes over the input:
//! - schema pass: CREATE/ALTER TABLE into the catalog, then ordering
//! - data pass: INSERT rows rewritten (or exported) in document order
//!
//! Everything non-fatal is recorded in `Diagnostics`; only I/O and
//! configuration problems abort a run.

mod postgres;
mod source;
mod translation;
mod types;

pub use postgres::{
    backticks_to_double_quotes, column_families, is_zero_date, quote_ident, quote_literal,
    render_comment, render_create_table, render_default, render_deferred_fk, render_drop,
    render_fk, render_insert, render_other, render_setval, render_unterminated, render_value,
    strip_conditional_comments,
};
pub use source::{FileSource, Pass, StatementSource};
pub use translation::Translation;
pub use types::{MappedType, TypeFamily, TypeMapper};

use crate::config::Mode;
use crate::diagnostics::{DiagnosticReport, Diagnostics, DEFAULT_DIAGNOSTICS_LIMIT};
use crate::emit::{RowExporter, SqlEmitter};
use crate::error::{Result, TranslateError};
use crate::parser::{determine_buffer_size, DumpDocument, SqlDialect};
use crate::progress::byte_bar;
use schemars::JsonSchema;
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

const OUTPUT_BUFFER_SIZE: usize = 256 * 1024;

/// What to produce and how
#[derive(Debug, Clone)]
pub struct TranslateOptions {
    pub mode: Mode,
    /// Tables created first, in this order
    pub pinned: Vec<String>,
    pub drop_tables: bool,
    pub keep_comments: bool,
    pub diagnostics_limit: usize,
}

impl Default for TranslateOptions {
    fn default() -> Self {
        Self {
            mode: Mode::Full,
            pinned: Vec::new(),
            drop_tables: false,
            keep_comments: false,
            diagnostics_limit: DEFAULT_DIAGNOSTICS_LIMIT,
        }
    }
}

/// Configuration for the convert command
#[derive(Debug)]
pub struct ConvertConfig {
    /// Input dump file
    pub input: PathBuf,
    /// Output SQL file (None for stdout), or the CSV directory in rows mode
    pub output: Option<PathBuf>,
    pub from_dialect: SqlDialect,
    pub to_dialect: SqlDialect,
    pub options: TranslateOptions,
    /// Run both passes but write nothing
    pub dry_run: bool,
    /// Show progress
    pub progress: bool,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::new(),
            output: None,
            from_dialect: SqlDialect::MySql,
            to_dialect: SqlDialect::Postgres,
            options: TranslateOptions::default(),
            dry_run: false,
            progress: false,
        }
    }
}

/// Counters for one run
#[derive(Debug, Clone, Default, Serialize, JsonSchema)]
pub struct ConvertStats {
    /// Statements read from the input
    pub statements: u64,
    pub tables: usize,
    /// INSERT statements translated or exported
    pub inserts: u64,
    pub rows: u64,
    /// Statements copied through with quoting fixes only
    pub passthrough: u64,
    /// Session, lock, drop and comment statements left out
    pub skipped: u64,
    pub deferred_fks: usize,
    /// CSV files written (rows mode)
    pub files: usize,
}

/// A foreign key added after all tables exist
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct DeferredConstraint {
    pub table: String,
    pub constraint: String,
    pub references: String,
    /// False when the referenced table is not in the dump
    pub resolved: bool,
}

/// Table order and deferred constraints, by name
#[derive(Debug, Clone, Default, Serialize, JsonSchema)]
pub struct PlanSummary {
    pub order: Vec<String>,
    pub deferred: Vec<DeferredConstraint>,
}

/// Result of a completed run
#[derive(Debug)]
pub struct TranslateOutcome {
    pub mode: Mode,
    pub stats: ConvertStats,
    pub plan: PlanSummary,
    pub diagnostics: Diagnostics,
}

impl TranslateOutcome {
    pub fn report(&self, input: Option<&Path>) -> RunReport {
        RunReport {
            input: input.map(|p| p.display().to_string()),
            mode: self.mode,
            stats: self.stats.clone(),
            plan: self.plan.clone(),
            diagnostics: self.diagnostics.report(),
        }
    }
}

/// The `--report` / `--json` document
#[derive(Debug, Serialize, JsonSchema)]
pub struct RunReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,
    pub mode: Mode,
    pub stats: ConvertStats,
    pub plan: PlanSummary,
    pub diagnostics: DiagnosticReport,
}

/// Where translated output goes
pub enum Target<'a, W: Write> {
    /// One SQL script (full and schema modes)
    Sql(&'a mut W),
    /// CSV directory (rows mode); `None` checks rows without writing
    Rows(Option<PathBuf>),
}

/// Run both passes over `source` into `target`.
pub fn execute<S, W>(
    source: &mut S,
    options: &TranslateOptions,
    target: Target<'_, W>,
    source_name: Option<&str>,
) -> Result<TranslateOutcome>
where
    S: StatementSource,
    W: Write,
{
    let mut translation = schema_pass(source, options)?;

    match (options.mode, target) {
        (Mode::Rows, Target::Rows(dir)) => {
            info!("data pass: exporting rows");
            let mut exporter = dir.map(RowExporter::new).transpose()?;
            source.each(Pass::Data, &mut |stmt| {
                translation.export_rows(stmt, exporter.as_mut())
            })?;
            if let Some(exporter) = exporter {
                let files = exporter.finish()?;
                translation.note_files(files.len());
            }
        }
        (Mode::Full | Mode::Schema, Target::Sql(writer)) => {
            let mut emitter = SqlEmitter::new(writer);
            translation.write_schema(&mut emitter, source_name)?;
            if options.mode == Mode::Full {
                info!("data pass: translating rows");
                source.each(Pass::Data, &mut |stmt| {
                    translation.write_data(stmt, &mut emitter)
                })?;
            }
            translation.write_epilogue(&mut emitter)?;
            emitter.finish()?;
        }
        (mode, _) => {
            return Err(TranslateError::Config(format!(
                "{} mode cannot write to this output",
                mode
            )))
        }
    }

    Ok(translation.finish())
}

/// Schema pass only: catalog, plan and their diagnostics.
pub fn plan_source<S: StatementSource>(
    source: &mut S,
    options: &TranslateOptions,
) -> Result<TranslateOutcome> {
    Ok(schema_pass(source, options)?.finish())
}

fn schema_pass<S: StatementSource>(
    source: &mut S,
    options: &TranslateOptions,
) -> Result<Translation> {
    let mut translation = Translation::new(options.clone());
    info!(mode = %options.mode, "schema pass");
    source.each(Pass::Schema, &mut |stmt| {
        translation.schema_statement(stmt);
        Ok(())
    })?;
    if let Some(note) = source.encoding_fallback() {
        translation.record_once(note);
    }
    translation.set_statement_count(source.statement_count());
    translation.finish_schema();
    Ok(translation)
}

/// Translate an in-memory document (full or schema mode) into `writer`.
pub fn translate_document<W: Write>(
    doc: &DumpDocument,
    options: &TranslateOptions,
    writer: &mut W,
) -> Result<TranslateOutcome> {
    execute(&mut &*doc, options, Target::Sql(writer), None)
}

/// Export an in-memory document's rows to CSV files in `dir`.
pub fn export_document_rows(
    doc: &DumpDocument,
    options: &TranslateOptions,
    dir: &Path,
) -> Result<TranslateOutcome> {
    let options = TranslateOptions {
        mode: Mode::Rows,
        ..options.clone()
    };
    execute::<_, io::Sink>(&mut &*doc, &options, Target::Rows(Some(dir.to_path_buf())), None)
}

fn check_dialects(from: SqlDialect, to: SqlDialect) -> Result<()> {
    if from == SqlDialect::MySql && to == SqlDialect::Postgres {
        Ok(())
    } else {
        Err(TranslateError::UnsupportedDialect {
            from: from.to_string(),
            to: to.to_string(),
        })
    }
}

/// Translate a dump file according to `config`.
pub fn run(config: &ConvertConfig) -> Result<TranslateOutcome> {
    check_dialects(config.from_dialect, config.to_dialect)?;

    let file_size = std::fs::metadata(&config.input)?.len();
    let progress = config.progress.then(|| byte_bar(file_size, "schema"));
    let mut source = FileSource::new(&config.input, determine_buffer_size(file_size))
        .with_progress(progress.clone());
    let name = config.input.display().to_string();
    let options = &config.options;

    let outcome = match options.mode {
        Mode::Rows => {
            let dir = match (&config.output, config.dry_run) {
                (_, true) => None,
                (Some(dir), false) => Some(dir.clone()),
                (None, false) => {
                    return Err(TranslateError::Config(
                        "rows mode requires --output <directory>".to_string(),
                    ))
                }
            };
            execute::<_, io::Sink>(&mut source, options, Target::Rows(dir), Some(&name))?
        }
        _ if config.dry_run => {
            let mut sink = io::sink();
            execute(&mut source, options, Target::Sql(&mut sink), Some(&name))?
        }
        _ => match &config.output {
            Some(path) => {
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                let mut writer =
                    BufWriter::with_capacity(OUTPUT_BUFFER_SIZE, File::create(path)?);
                execute(&mut source, options, Target::Sql(&mut writer), Some(&name))?
            }
            None => {
                let stdout = io::stdout();
                let mut writer = BufWriter::with_capacity(OUTPUT_BUFFER_SIZE, stdout.lock());
                execute(&mut source, options, Target::Sql(&mut writer), Some(&name))?
            }
        },
    };

    if let Some(pb) = progress {
        pb.finish_and_clear();
    }

    info!(
        statements = outcome.stats.statements,
        rows = outcome.stats.rows,
        diagnostics = outcome.diagnostics.total(),
        "translation complete"
    );
    Ok(outcome)
}

/// Schema pass over a dump file, for the `order` command.
pub fn plan_file(path: &Path, options: &TranslateOptions) -> Result<TranslateOutcome> {
    let file_size = std::fs::metadata(path)?.len();
    let mut source = FileSource::new(path, determine_buffer_size(file_size));
    plan_source(&mut source, options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::DiagnosticKind;

    const DUMP: &str = "\
CREATE TABLE `orders` (
  `id` int(11) NOT NULL AUTO_INCREMENT,
  `user_id` int(11) NOT NULL,
  PRIMARY KEY (`id`),
  CONSTRAINT `fk_orders_user` FOREIGN KEY (`user_id`) REFERENCES `users` (`id`)
) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4;
CREATE TABLE `users` (
  `id` int(11) NOT NULL AUTO_INCREMENT,
  `name` varchar(50) DEFAULT NULL,
  PRIMARY KEY (`id`)
) ENGINE=InnoDB;
LOCK TABLES `users` WRITE;
INSERT INTO `users` VALUES (1,'O\\'Brien'),(2,NULL);
UNLOCK TABLES;
INSERT INTO `orders` VALUES (10,1);
";

    fn translate(sql: &str, options: &TranslateOptions) -> (String, TranslateOutcome) {
        let doc = DumpDocument::parse(sql.as_bytes(), 4096).unwrap();
        let mut out = Vec::new();
        let outcome = translate_document(&doc, options, &mut out).unwrap();
        (String::from_utf8(out).unwrap(), outcome)
    }

    #[test]
    fn test_full_translation_layout() {
        let (out, outcome) = translate(DUMP, &TranslateOptions::default());

        let users = out.find("CREATE TABLE \"users\"").unwrap();
        let orders = out.find("CREATE TABLE \"orders\"").unwrap();
        assert!(users < orders);
        assert!(out.contains("\"id\" SERIAL PRIMARY KEY"));
        assert!(out.contains("(1, 'O''Brien'),\n(2, NULL);"));
        assert!(!out.contains("LOCK TABLES"));
        assert!(!out.contains("ENGINE"));
        assert!(out.contains("setval"));

        assert_eq!(outcome.plan.order, vec!["users", "orders"]);
        assert!(outcome.plan.deferred.is_empty());
        assert_eq!(outcome.stats.inserts, 2);
        assert_eq!(outcome.stats.rows, 3);
        assert_eq!(outcome.stats.skipped, 2);
    }

    #[test]
    fn test_schema_mode_defers_everything() {
        let options = TranslateOptions {
            mode: Mode::Schema,
            ..Default::default()
        };
        let (out, outcome) = translate(DUMP, &options);
        assert!(!out.contains("INSERT"));
        assert!(!out.contains("session_replication_role"));
        assert!(!out.contains("setval"));
        let alter = out.find("ALTER TABLE \"orders\" ADD CONSTRAINT").unwrap();
        assert!(alter > out.find("CREATE TABLE \"orders\"").unwrap());
        assert_eq!(outcome.plan.deferred.len(), 1);
    }

    #[test]
    fn test_translation_is_deterministic() {
        let (first, _) = translate(DUMP, &TranslateOptions::default());
        let (second, _) = translate(DUMP, &TranslateOptions::default());
        assert_eq!(first, second);
    }

    #[test]
    fn test_rows_mode_needs_directory_target() {
        let doc = DumpDocument::parse(DUMP.as_bytes(), 4096).unwrap();
        let options = TranslateOptions {
            mode: Mode::Rows,
            ..Default::default()
        };
        let mut out = Vec::new();
        let err = translate_document(&doc, &options, &mut out).unwrap_err();
        assert!(matches!(err, TranslateError::Config(_)));
    }

    #[test]
    fn test_export_document_rows() {
        let dir = tempfile::tempdir().unwrap();
        let doc = DumpDocument::parse(DUMP.as_bytes(), 4096).unwrap();
        let outcome = export_document_rows(&doc, &TranslateOptions::default(), dir.path()).unwrap();
        assert_eq!(outcome.stats.files, 2);
        let users = std::fs::read_to_string(dir.path().join("users.csv")).unwrap();
        assert_eq!(users, "1,O'Brien\n2,\n");
    }

    #[test]
    fn test_unsupported_dialect_pair() {
        let err = check_dialects(SqlDialect::Postgres, SqlDialect::MySql).unwrap_err();
        assert!(err.to_string().contains("postgres → mysql"));
        assert!(check_dialects(SqlDialect::MySql, SqlDialect::Postgres).is_ok());
    }

    #[test]
    fn test_cycle_reported_and_deferred() {
        let sql = "CREATE TABLE a (id int, b_id int, FOREIGN KEY (b_id) REFERENCES b (id));\n\
                   CREATE TABLE b (id int, a_id int, FOREIGN KEY (a_id) REFERENCES a (id));";
        let (out, outcome) = translate(sql, &TranslateOptions::default());
        assert_eq!(outcome.diagnostics.count(DiagnosticKind::CyclicDependency), 1);
        assert_eq!(outcome.plan.deferred.len(), 1);
        assert!(out.trim_end().ends_with(';'));
        assert!(out.contains("ALTER TABLE \"a\" ADD CONSTRAINT"));
    }
}
