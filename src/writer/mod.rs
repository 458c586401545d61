use ahash::AHashMap;
use csv::{QuoteStyle, WriterBuilder};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

pub const WRITER_BUFFER_SIZE: usize = 256 * 1024;

/// Header-free CSV file for one table's rows
pub struct CsvTableWriter {
    writer: csv::Writer<BufWriter<File>>,
    path: PathBuf,
    rows: u64,
}

impl CsvTableWriter {
    pub fn create(path: &Path) -> std::io::Result<Self> {
        let file = File::create(path)?;
        let writer = WriterBuilder::new()
            .has_headers(false)
            .flexible(true)
            .quote_style(QuoteStyle::Necessary)
            .from_writer(BufWriter::with_capacity(WRITER_BUFFER_SIZE, file));

        Ok(Self {
            writer,
            path: path.to_path_buf(),
            rows: 0,
        })
    }

    pub fn write_record<I, T>(&mut self, record: I) -> csv::Result<()>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        self.writer.write_record(record)?;
        self.rows += 1;
        Ok(())
    }

    pub fn flush(&mut self) -> std::io::Result<()> {
        self.writer.flush()
    }

    pub fn rows(&self) -> u64 {
        self.rows
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// One CSV writer per table, created on first use
pub struct CsvWriterPool {
    output_dir: PathBuf,
    writers: AHashMap<String, CsvTableWriter>,
}

impl CsvWriterPool {
    pub fn new(output_dir: PathBuf) -> Self {
        Self {
            output_dir,
            writers: AHashMap::new(),
        }
    }

    pub fn ensure_output_dir(&self) -> std::io::Result<()> {
        fs::create_dir_all(&self.output_dir)
    }

    pub fn get_writer(&mut self, table_name: &str) -> std::io::Result<&mut CsvTableWriter> {
        use std::collections::hash_map::Entry;

        match self.writers.entry(table_name.to_lowercase()) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let filename = self
                    .output_dir
                    .join(format!("{}.csv", sanitize_file_stem(table_name)));
                let writer = CsvTableWriter::create(&filename)?;
                Ok(entry.insert(writer))
            }
        }
    }

    pub fn flush(&mut self, table_name: &str) -> std::io::Result<()> {
        match self.writers.get_mut(&table_name.to_lowercase()) {
            Some(writer) => writer.flush(),
            None => Ok(()),
        }
    }

    pub fn close_all(&mut self) -> std::io::Result<()> {
        for (_, writer) in self.writers.iter_mut() {
            writer.flush()?;
        }
        Ok(())
    }

    /// Files written so far with their row counts, sorted by path
    pub fn files(&self) -> Vec<(PathBuf, u64)> {
        let mut files: Vec<_> = self
            .writers
            .values()
            .map(|w| (w.path().to_path_buf(), w.rows()))
            .collect();
        files.sort();
        files
    }

    pub fn len(&self) -> usize {
        self.writers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writers.is_empty()
    }
}

/// Table name made safe for use as a file name
pub fn sanitize_file_stem(name: &str) -> String {
    let stem: String = name
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | '$') {
                c
            } else {
                '_'
            }
        })
        .collect();
    match stem.trim_matches('.') {
        "" => "_".to_string(),
        s => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_file_stem() {
        assert_eq!(sanitize_file_stem("users"), "users");
        assert_eq!(sanitize_file_stem("my table/x"), "my_table_x");
        assert_eq!(sanitize_file_stem(".."), "_");
    }

    #[test]
    fn test_pool_appends_per_table() {
        let dir = tempfile::tempdir().unwrap();
        let mut pool = CsvWriterPool::new(dir.path().to_path_buf());
        pool.ensure_output_dir().unwrap();

        pool.get_writer("t").unwrap().write_record(["1", "a,b"]).unwrap();
        pool.flush("t").unwrap();
        pool.get_writer("T").unwrap().write_record(["2", ""]).unwrap();
        pool.close_all().unwrap();

        assert_eq!(pool.len(), 1);
        let text = fs::read_to_string(dir.path().join("t.csv")).unwrap();
        assert_eq!(text, "1,\"a,b\"\n2,\n");
        assert_eq!(pool.files()[0].1, 2);
    }
}
