use anyhow::{Context, Result, anyhow};
use chrono::{NaiveDate, Utc};
use polars::prelude::*;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::info;
use uuid::Uuid;

/// Reads input records and writes merged tables under a local output directory.
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        LocalStorage { root: root.into() }
    }

    /// `merged/YYYY/MM/DD/<run id>.parquet` under the storage root.
    pub fn generate_merged_path(&self, date: NaiveDate, run_id: Uuid) -> PathBuf {
        self.root
            .join("merged")
            .join(date.format("%Y/%m/%d").to_string())
            .join(format!("{run_id}.parquet"))
    }

    pub fn store_parquet(&self, df: &mut DataFrame) -> Result<PathBuf> {
        let path = self.generate_merged_path(Utc::now().date_naive(), Uuid::new_v4());

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create output directory: {}", parent.display()))?;
        }

        let mut buf = Vec::new();
        {
            let writer = ParquetWriter::new(&mut buf);
            writer.finish(df)?;
        }

        std::fs::write(&path, &buf)
            .with_context(|| format!("Failed to write parquet file: {}", path.display()))?;

        info!("Stored Parquet file: {} ({} bytes)", path.display(), buf.len());
        Ok(path)
    }

    /// Load a JSON array or JSON-lines file into raw records.
    pub fn load_records(path: &Path) -> Result<Vec<Value>> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read input file: {}", path.display()))?;

        let records = Self::parse_records(&content)
            .with_context(|| format!("Failed to parse JSON records from {}", path.display()))?;

        info!("Loaded {} records from {}", records.len(), path.display());
        Ok(records)
    }

    pub fn parse_records(content: &str) -> Result<Vec<Value>> {
        let trimmed = content.trim_start();

        if trimmed.starts_with('[') {
            let data: Vec<Value> = serde_json::from_str(trimmed)?;
            return Ok(data);
        }

        content
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(idx, line)| {
                serde_json::from_str(line).map_err(|e| anyhow!("Invalid JSON on line {}: {}", idx + 1, e))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_merged_path_layout() {
        let storage = LocalStorage::new("out");
        let run_id = Uuid::nil();
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();

        assert_eq!(
            storage.generate_merged_path(date, run_id),
            PathBuf::from("out/merged/2024/03/09/00000000-0000-0000-0000-000000000000.parquet")
        );
    }

    #[test]
    fn test_parse_json_lines_and_arrays() {
        let lines = "{\"movie_id\": \"tt1\"}\n\n{\"movie_id\": \"tt2\"}\n";
        assert_eq!(LocalStorage::parse_records(lines).unwrap().len(), 2);

        let array = "  [{\"movie_id\": \"tt1\"}, {\"movie_id\": \"tt2\"}, {\"movie_id\": \"tt3\"}]";
        assert_eq!(LocalStorage::parse_records(array).unwrap().len(), 3);

        let err = LocalStorage::parse_records("{\"movie_id\": 1}\n{oops").unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_load_records_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{{\"review_date\": \"10 February 2006\", \"movie_id\": \"tt0111161\"}}").unwrap();

        let records = LocalStorage::load_records(file.path()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["movie_id"], "tt0111161");
    }

    #[test]
    fn test_store_parquet_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());

        let mut df = DataFrame::new(vec![
            Series::new("movie_id".into(), ["tt1", "tt2"]).into(),
            Series::new("has_summary".into(), [1i32, 0]).into(),
        ])
        .unwrap();

        let path = storage.store_parquet(&mut df).unwrap();
        assert!(path.exists());
        assert!(path.starts_with(dir.path().join("merged")));
        assert_eq!(path.extension().unwrap(), "parquet");
    }
}
