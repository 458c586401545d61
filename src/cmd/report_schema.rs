//! Report schema command: JSON Schema of the convert report.

use crate::convert::RunReport;
use schemars::schema_for;

pub fn run() -> anyhow::Result<()> {
    let schema = schema_for!(RunReport);
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}
