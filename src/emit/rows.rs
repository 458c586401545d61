//! Per-table CSV export of INSERT rows.

use crate::convert::{is_zero_date, TypeFamily};
use crate::parser::{InsertValues, TextEncoding, Value};
use crate::writer::CsvWriterPool;
use std::borrow::Cow;
use std::path::PathBuf;

/// Appends every INSERT's rows to `<dir>/<table>.csv`
pub struct RowExporter {
    pool: CsvWriterPool,
    rows: u64,
}

impl RowExporter {
    pub fn new(output_dir: PathBuf) -> std::io::Result<Self> {
        let pool = CsvWriterPool::new(output_dir);
        pool.ensure_output_dir()?;
        Ok(Self { pool, rows: 0 })
    }

    /// Write one statement's rows; zero dates in temporal columns become empty fields.
    /// Returns the number of rows written.
    pub fn export(
        &mut self,
        insert: &InsertValues,
        families: &[TypeFamily],
        zero_dates: &mut usize,
    ) -> csv::Result<usize> {
        if insert.rows.is_empty() {
            return Ok(0);
        }

        let writer = self.pool.get_writer(&insert.table)?;
        for row in &insert.rows {
            let fields = row.values.iter().enumerate().map(|(i, value)| {
                let family = families.get(i).copied().unwrap_or(TypeFamily::Other);
                csv_field(value, family, insert.encoding, zero_dates)
            });
            writer.write_record(fields)?;
        }
        writer.flush()?;

        self.rows += insert.rows.len() as u64;
        Ok(insert.rows.len())
    }

    pub fn rows(&self) -> u64 {
        self.rows
    }

    pub fn tables(&self) -> usize {
        self.pool.len()
    }

    pub fn files(&self) -> Vec<(PathBuf, u64)> {
        self.pool.files()
    }

    pub fn finish(mut self) -> std::io::Result<Vec<(PathBuf, u64)>> {
        self.pool.close_all()?;
        Ok(self.pool.files())
    }
}

/// Binary columns get the statement's original bytes back.
fn csv_field<'v>(
    value: &'v Value,
    family: TypeFamily,
    encoding: TextEncoding,
    zero_dates: &mut usize,
) -> Cow<'v, [u8]> {
    match value {
        Value::Null => Cow::Borrowed(b""),
        Value::Text(s) if family == TypeFamily::Temporal && is_zero_date(s) => {
            *zero_dates += 1;
            Cow::Borrowed(b"")
        }
        Value::Text(s) if family == TypeFamily::Binary => encoding.source_bytes(s),
        Value::Text(s) | Value::Bare(s) => Cow::Borrowed(s.as_bytes()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_insert;
    use std::fs;

    #[test]
    fn test_export_appends_across_statements() {
        let dir = tempfile::tempdir().unwrap();
        let mut exporter = RowExporter::new(dir.path().join("rows")).unwrap();
        let mut zero = 0;

        let (first, _) = parse_insert("INSERT INTO `t` VALUES (1,'a'),(2,NULL);").unwrap();
        let (second, _) = parse_insert("INSERT INTO `t` VALUES (3,'x,y');").unwrap();
        let families = [TypeFamily::Integer, TypeFamily::Text];
        assert_eq!(exporter.export(&first, &families, &mut zero).unwrap(), 2);
        assert_eq!(exporter.export(&second, &families, &mut zero).unwrap(), 1);

        let files = exporter.finish().unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].1, 3);
        let text = fs::read_to_string(dir.path().join("rows/t.csv")).unwrap();
        assert_eq!(text, "1,a\n2,\n3,\"x,y\"\n");
    }

    #[test]
    fn test_zero_dates_become_empty() {
        let dir = tempfile::tempdir().unwrap();
        let mut exporter = RowExporter::new(dir.path().to_path_buf()).unwrap();
        let mut zero = 0;
        let (insert, _) =
            parse_insert("INSERT INTO d VALUES (1,'0000-00-00 00:00:00'),(2,'2024-01-02');").unwrap();
        exporter
            .export(&insert, &[TypeFamily::Integer, TypeFamily::Temporal], &mut zero)
            .unwrap();
        exporter.finish().unwrap();
        assert_eq!(zero, 1);
        let text = fs::read_to_string(dir.path().join("d.csv")).unwrap();
        assert_eq!(text, "1,\n2,2024-01-02\n");
    }

    #[test]
    fn test_latin1_blob_bytes_written_raw() {
        let dir = tempfile::tempdir().unwrap();
        let mut exporter = RowExporter::new(dir.path().to_path_buf()).unwrap();
        let mut zero = 0;
        let (mut insert, _) = parse_insert("INSERT INTO b VALUES (1,'\u{ff}\u{e9}','\u{e9}');").unwrap();
        insert.encoding = TextEncoding::Latin1;
        exporter
            .export(
                &insert,
                &[TypeFamily::Integer, TypeFamily::Binary, TypeFamily::Text],
                &mut zero,
            )
            .unwrap();
        exporter.finish().unwrap();
        let bytes = fs::read(dir.path().join("b.csv")).unwrap();
        assert_eq!(bytes, b"1,\xff\xe9,\xc3\xa9\n");
    }
}
