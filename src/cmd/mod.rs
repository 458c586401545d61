mod convert;
mod order;
mod report_schema;

use clap::{ArgAction, CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::io;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "dump-translate")]
#[command(version)]
#[command(about = "Translate MySQL dump files into PostgreSQL", long_about = None)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace); RUST_LOG overrides
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Translate a MySQL dump into PostgreSQL SQL or per-table CSV files
    Convert {
        /// Input dump file (supports .gz, .bz2, .xz, .zst compression)
        file: PathBuf,

        /// Output SQL file (default: stdout); output directory in rows mode
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output mode: full, schema, rows
        #[arg(short, long)]
        mode: Option<String>,

        /// Source dialect
        #[arg(long, default_value = "mysql")]
        from: String,

        /// Target dialect
        #[arg(long, default_value = "postgres")]
        to: String,

        /// Tables to create first, in order (comma-separated)
        #[arg(long)]
        pin: Option<String>,

        /// YAML config file; command-line flags take precedence
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Emit DROP TABLE IF EXISTS before creating tables
        #[arg(long)]
        drop_tables: bool,

        /// Keep the dump's comments in the output
        #[arg(long)]
        keep_comments: bool,

        /// Maximum diagnostics kept in the report (overflow is only counted)
        #[arg(long)]
        diagnostics_limit: Option<usize>,

        /// Write the run report (stats, plan, diagnostics) as JSON to this file
        #[arg(long)]
        report: Option<PathBuf>,

        /// Print the run report as JSON on stdout
        #[arg(long)]
        json: bool,

        /// Exit with status 2 when any diagnostic was recorded
        #[arg(long)]
        strict: bool,

        /// Show progress during processing
        #[arg(short, long)]
        progress: bool,

        /// Run without writing any output
        #[arg(long)]
        dry_run: bool,
    },

    /// Print table creation order and deferred foreign keys
    Order {
        /// Input dump file (supports .gz, .bz2, .xz, .zst compression)
        file: PathBuf,

        /// Tables to place first, in order (comma-separated)
        #[arg(long)]
        pin: Option<String>,

        /// Order as for schema-only output (every foreign key deferred)
        #[arg(long)]
        schema: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the JSON Schema of the convert report
    ReportSchema,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

pub fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Convert {
            file,
            output,
            mode,
            from,
            to,
            pin,
            config,
            drop_tables,
            keep_comments,
            diagnostics_limit,
            report,
            json,
            strict,
            progress,
            dry_run,
        } => convert::run(convert::ConvertArgs {
            file,
            output,
            mode,
            from,
            to,
            pin,
            config,
            drop_tables,
            keep_comments,
            diagnostics_limit,
            report,
            json,
            strict,
            progress,
            dry_run,
        }),
        Commands::Order {
            file,
            pin,
            schema,
            json,
        } => order::run(file, pin, schema, json),
        Commands::ReportSchema => report_schema::run(),
        Commands::Completions { shell } => {
            generate(
                shell,
                &mut Cli::command(),
                "dump-translate",
                &mut io::stdout(),
            );
            Ok(())
        }
    }
}

/// Split a comma-separated table list
pub(crate) fn parse_table_list(list: Option<&str>) -> Vec<String> {
    list.map(|s| {
        s.split(',')
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect()
    })
    .unwrap_or_default()
}
