//! Convert command CLI handler.

use super::parse_table_list;
use crate::config::{Mode, TranslateYamlConfig};
use crate::convert::{self, ConvertConfig, TranslateOptions, TranslateOutcome};
use crate::diagnostics::DEFAULT_DIAGNOSTICS_LIMIT;
use crate::parser::SqlDialect;
use std::path::PathBuf;
use std::time::Instant;

/// Diagnostics listed individually in the stderr summary
const SUMMARY_LIMIT: usize = 20;

pub struct ConvertArgs {
    pub file: PathBuf,
    pub output: Option<PathBuf>,
    pub mode: Option<String>,
    pub from: String,
    pub to: String,
    pub pin: Option<String>,
    pub config: Option<PathBuf>,
    pub drop_tables: bool,
    pub keep_comments: bool,
    pub diagnostics_limit: Option<usize>,
    pub report: Option<PathBuf>,
    pub json: bool,
    pub strict: bool,
    pub progress: bool,
    pub dry_run: bool,
}

pub fn run(args: ConvertArgs) -> anyhow::Result<()> {
    if !args.file.exists() {
        anyhow::bail!("input file does not exist: {}", args.file.display());
    }

    let from = args
        .from
        .parse::<SqlDialect>()
        .map_err(|e| anyhow::anyhow!("{}", e))?;
    let to = args
        .to
        .parse::<SqlDialect>()
        .map_err(|e| anyhow::anyhow!("{}", e))?;

    let options = resolve_options(&args)?;

    if options.mode == Mode::Rows && args.output.is_none() && !args.dry_run {
        anyhow::bail!("rows mode writes one CSV per table. Use --output <dir>");
    }
    if args.json && options.mode != Mode::Rows && args.output.is_none() && !args.dry_run {
        anyhow::bail!("--json prints the report on stdout; write SQL elsewhere with --output <file>");
    }

    let config = ConvertConfig {
        input: args.file.clone(),
        output: args.output.clone(),
        from_dialect: from,
        to_dialect: to,
        options,
        dry_run: args.dry_run,
        progress: args.progress && !args.json,
    };

    let start_time = Instant::now();
    let outcome = convert::run(&config)?;
    let elapsed = start_time.elapsed();

    let report = outcome.report(Some(&args.file));
    if let Some(path) = &args.report {
        std::fs::write(path, serde_json::to_string_pretty(&report)?)?;
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_stats(&outcome, &args, elapsed.as_secs_f64());
        outcome.diagnostics.print_summary(SUMMARY_LIMIT);
    }

    if args.strict && !outcome.diagnostics.is_empty() {
        eprintln!(
            "Strict mode: {} diagnostics recorded",
            outcome.diagnostics.total()
        );
        std::process::exit(2);
    }

    Ok(())
}

/// YAML file first, then command-line flags on top
fn resolve_options(args: &ConvertArgs) -> anyhow::Result<TranslateOptions> {
    let yaml = match &args.config {
        Some(path) => TranslateYamlConfig::load(path)?,
        None => TranslateYamlConfig::default(),
    };

    let mode = match &args.mode {
        Some(m) => m.parse::<Mode>().map_err(|e| anyhow::anyhow!("{}", e))?,
        None => yaml.mode.unwrap_or_default(),
    };

    let pinned = match args.pin.as_deref() {
        Some(list) => parse_table_list(Some(list)),
        None => yaml.pin,
    };

    Ok(TranslateOptions {
        mode,
        pinned,
        drop_tables: args.drop_tables || yaml.drop_tables.unwrap_or(false),
        keep_comments: args.keep_comments || yaml.keep_comments.unwrap_or(false),
        diagnostics_limit: args
            .diagnostics_limit
            .or(yaml.diagnostics_limit)
            .unwrap_or(DEFAULT_DIAGNOSTICS_LIMIT),
    })
}

fn print_stats(outcome: &TranslateOutcome, args: &ConvertArgs, elapsed: f64) {
    let stats = &outcome.stats;

    if args.progress || args.dry_run {
        eprintln!();
        eprintln!("Translation Statistics:");
        eprintln!("  Mode: {}", outcome.mode);
        eprintln!("  Statements read: {}", stats.statements);
        eprintln!("  Tables: {}", stats.tables);
        eprintln!("  INSERT statements: {}", stats.inserts);
        eprintln!("  Rows: {}", stats.rows);
        eprintln!("  Passed through: {}", stats.passthrough);
        eprintln!("  Skipped: {}", stats.skipped);
        eprintln!("  Deferred foreign keys: {}", stats.deferred_fks);
        if outcome.mode == Mode::Rows {
            eprintln!("  CSV files: {}", stats.files);
        }
        eprintln!("  Elapsed: {:.3}s", elapsed);
    }

    if args.dry_run {
        eprintln!();
        eprintln!("(Dry run - no output written)");
    } else if let Some(out) = &args.output {
        eprintln!("Output: {}", out.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> ConvertArgs {
        ConvertArgs {
            file: PathBuf::from("dump.sql"),
            output: None,
            mode: None,
            from: "mysql".to_string(),
            to: "postgres".to_string(),
            pin: None,
            config: None,
            drop_tables: false,
            keep_comments: false,
            diagnostics_limit: None,
            report: None,
            json: false,
            strict: false,
            progress: false,
            dry_run: false,
        }
    }

    #[test]
    fn test_flags_override_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfg.yaml");
        std::fs::write(
            &path,
            "mode: schema\npin: [a, b]\nkeep_comments: true\ndiagnostics_limit: 7\n",
        )
        .unwrap();

        let mut a = args();
        a.config = Some(path);
        a.mode = Some("full".to_string());
        a.pin = Some("c".to_string());

        let options = resolve_options(&a).unwrap();
        assert_eq!(options.mode, Mode::Full);
        assert_eq!(options.pinned, vec!["c"]);
        assert!(options.keep_comments);
        assert!(!options.drop_tables);
        assert_eq!(options.diagnostics_limit, 7);
    }

    #[test]
    fn test_defaults_without_config() {
        let options = resolve_options(&args()).unwrap();
        assert_eq!(options.mode, Mode::Full);
        assert!(options.pinned.is_empty());
        assert_eq!(options.diagnostics_limit, DEFAULT_DIAGNOSTICS_LIMIT);
    }

    #[test]
    fn test_bad_mode_is_rejected() {
        let mut a = args();
        a.mode = Some("everything".to_string());
        let err = resolve_options(&a).unwrap_err();
        assert!(err.to_string().contains("Unknown mode"));
    }
}
