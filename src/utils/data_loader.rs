//! Table loading and saving

use super::fs::write_atomic_with;
use crate::error::{PerfError, Result};
use polars::prelude::*;
use std::path::Path;

/// CSV loader for upstream candidate tables
#[derive(Debug, Clone)]
pub struct DataLoader {
    /// Rows used to infer column types
    infer_schema_length: usize,
}

impl Default for DataLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DataLoader {
    pub fn new() -> Self {
        Self {
            infer_schema_length: 1000,
        }
    }

    pub fn with_infer_schema_length(mut self, rows: usize) -> Self {
        self.infer_schema_length = rows.max(1);
        self
    }

    /// Load a CSV file with a header row
    pub fn load_csv(&self, path: &Path) -> Result<DataFrame> {
        if !path.exists() {
            return Err(PerfError::DataError(format!("{} does not exist", path.display())));
        }
        let df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(self.infer_schema_length))
            .try_into_reader_with_file_path(Some(path.to_path_buf()))?
            .finish()?;

        tracing::debug!(path = %path.display(), rows = df.height(), cols = df.width(), "Table loaded");
        Ok(df)
    }
}

/// Write `df` as CSV atomically
pub fn save_csv(df: &mut DataFrame, path: &Path) -> Result<()> {
    write_atomic_with(path, |writer| {
        CsvWriter::new(writer).include_header(true).finish(df)?;
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_csv() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "CandidateID,Age,Industry").unwrap();
        writeln!(file, "c1,25,Retail").unwrap();
        writeln!(file, "c2,31,Banking").unwrap();

        let df = DataLoader::new().load_csv(file.path()).unwrap();
        assert_eq!(df.height(), 2);
        assert_eq!(df.width(), 3);
        assert_eq!(df.column("Age").unwrap().dtype(), &DataType::Int64);
    }

    #[test]
    fn test_missing_file() {
        let result = DataLoader::new().load_csv(Path::new("/nonexistent/table.csv"));
        assert!(matches!(result, Err(PerfError::DataError(_))));
    }

    #[test]
    fn test_save_csv_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let mut df = df!("a" => &[1i64, 2, 3], "b" => &["x", "y", "z"]).unwrap();
        save_csv(&mut df, &path).unwrap();

        let loaded = DataLoader::new().load_csv(&path).unwrap();
        assert_eq!(loaded.height(), 3);
        assert_eq!(loaded.width(), 2);
    }
}
