//! # CSV Connection
//!
//! Owns the data directory and the low-level CSV file helpers shared by the
//! CSV repositories.
//!
//! ## File Structure
//!
//! ```text
//! {data_directory}/
//! ├── herd_config.yaml
//! ├── animals.csv
//! ├── weighings.csv
//! ├── medications.csv
//! ├── reproductive_events.csv
//! ├── breeding_seasons.csv
//! └── coverages.csv
//! ```

use anyhow::{Context, Result};
use csv::{Reader, Writer};
use log::{debug, info, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use super::herd_repository::HerdRepository;
use crate::backend::storage::traits::Connection;

#[derive(Debug, Clone)]
pub struct CsvConnection {
    base_directory: PathBuf,
}

impl CsvConnection {
    /// Create a connection rooted at `base_directory`, creating it if needed
    pub fn new<P: AsRef<Path>>(base_directory: P) -> Result<Self> {
        let base_path = base_directory.as_ref().to_path_buf();
        if !base_path.exists() {
            fs::create_dir_all(&base_path)
                .with_context(|| format!("Failed to create data directory {}", base_path.display()))?;
            info!("Created data directory: {}", base_path.display());
        }
        Ok(Self {
            base_directory: base_path,
        })
    }

    pub fn base_directory(&self) -> &Path {
        &self.base_directory
    }

    pub fn file_path(&self, file_name: &str) -> PathBuf {
        self.base_directory.join(file_name)
    }

    /// Read every row of `file_name`. Missing file reads as empty; rows that
    /// fail to deserialize are skipped with a warning.
    pub fn read_records<T: DeserializeOwned>(&self, file_name: &str) -> Result<Vec<T>> {
        let path = self.file_path(file_name);
        if !path.exists() {
            debug!("{} does not exist yet, treating as empty", path.display());
            return Ok(Vec::new());
        }

        let mut reader = Reader::from_path(&path)
            .with_context(|| format!("Failed to open {}", path.display()))?;
        let mut records = Vec::new();
        for (row, result) in reader.deserialize::<T>().enumerate() {
            match result {
                Ok(record) => records.push(record),
                Err(e) => warn!("Skipping malformed row {} in {}: {}", row + 2, file_name, e),
            }
        }
        Ok(records)
    }

    /// Replace `file_name` with `records`, via a temp file and rename
    pub fn write_records<T: Serialize>(&self, file_name: &str, records: &[T]) -> Result<()> {
        let path = self.file_path(file_name);
        let temp_path = path.with_extension("csv.tmp");

        {
            let file = File::create(&temp_path)
                .with_context(|| format!("Failed to create {}", temp_path.display()))?;
            let mut writer = Writer::from_writer(BufWriter::new(file));
            for record in records {
                writer.serialize(record)?;
            }
            writer.flush()?;
        }

        fs::rename(&temp_path, &path)
            .with_context(|| format!("Failed to replace {}", path.display()))?;
        debug!("Wrote {} rows to {}", records.len(), path.display());
        Ok(())
    }
}

impl Connection for CsvConnection {
    type HerdRepository = HerdRepository;

    fn create_herd_repository(&self) -> Self::HerdRepository {
        HerdRepository::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::TempDir;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Row {
        id: String,
        value: f64,
        note: Option<String>,
    }

    #[test]
    fn test_creates_missing_base_directory() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let nested = temp_dir.path().join("farm").join("data");
        let connection = CsvConnection::new(&nested)?;
        assert!(nested.is_dir());
        assert_eq!(connection.file_path("animals.csv"), nested.join("animals.csv"));
        Ok(())
    }

    #[test]
    fn test_missing_file_reads_empty() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let connection = CsvConnection::new(temp_dir.path())?;
        let rows: Vec<Row> = connection.read_records("nothing.csv")?;
        assert!(rows.is_empty());
        Ok(())
    }

    #[test]
    fn test_write_then_read_skips_malformed_rows() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let connection = CsvConnection::new(temp_dir.path())?;

        let rows = vec![
            Row {
                id: "a".to_string(),
                value: 1.5,
                note: None,
            },
            Row {
                id: "b".to_string(),
                value: 2.0,
                note: Some("ok".to_string()),
            },
        ];
        connection.write_records("rows.csv", &rows)?;
        assert!(!temp_dir.path().join("rows.csv.tmp").exists());

        let mut content = fs::read_to_string(connection.file_path("rows.csv"))?;
        content.push_str("c,not-a-number,\n");
        fs::write(connection.file_path("rows.csv"), content)?;

        let read: Vec<Row> = connection.read_records("rows.csv")?;
        assert_eq!(read, rows);
        Ok(())
    }
}
