//! Order command: table creation order and deferred constraints.

use super::parse_table_list;
use crate::config::Mode;
use crate::convert::{self, TranslateOptions};
use crate::diagnostics::DiagnosticKind;
use std::path::PathBuf;

pub fn run(file: PathBuf, pin: Option<String>, schema: bool, json: bool) -> anyhow::Result<()> {
    if !file.exists() {
        anyhow::bail!("input file does not exist: {}", file.display());
    }

    let options = TranslateOptions {
        mode: if schema { Mode::Schema } else { Mode::Full },
        pinned: parse_table_list(pin.as_deref()),
        ..Default::default()
    };

    let outcome = convert::plan_file(&file, &options)?;
    let plan = &outcome.plan;

    if json {
        println!("{}", serde_json::to_string_pretty(plan)?);
        return Ok(());
    }

    if plan.order.is_empty() {
        eprintln!("No tables found in the file.");
        return Ok(());
    }

    for name in &plan.order {
        println!("{}", name);
    }

    if !plan.deferred.is_empty() {
        eprintln!();
        eprintln!("Deferred foreign keys ({}):", plan.deferred.len());
        for fk in &plan.deferred {
            let marker = if fk.resolved { "" } else { " (missing table)" };
            eprintln!(
                "  {}.{} -> {}{}",
                fk.table, fk.constraint, fk.references, marker
            );
        }
    }

    let cycles = outcome.diagnostics.count(DiagnosticKind::CyclicDependency);
    if cycles > 0 {
        eprintln!();
        eprintln!("Warning: {} dependency cycle(s) broken", cycles);
    }
    let unknown = outcome.diagnostics.count(DiagnosticKind::UnknownPinnedTable);
    if unknown > 0 {
        eprintln!("Warning: {} pinned table(s) not found in the dump", unknown);
    }

    Ok(())
}
