//! Run metadata and the on-disk run folder.
//!
//! Every run gets its own folder under the configured base directory and a
//! `run_info.csv` sidecar describing what produced the data file next to it.

use crate::error::BenchResult;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Everything worth knowing about a run besides the waveforms themselves.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunMetadata {
    /// Short name of the run, used in the folder and data file names.
    pub run_name: String,
    /// Free-form run category, e.g. "bench_test".
    pub run_type: String,
    /// Wall-clock start of the run.
    pub started: DateTime<Local>,
    /// Software version that produced the data.
    pub software_version: String,
    /// Instrument identities and settings, as (field, value) rows.
    pub records: Vec<(String, String)>,
}

impl Default for RunMetadata {
    fn default() -> Self {
        Self {
            run_name: "run".to_string(),
            run_type: String::new(),
            started: Local::now(),
            software_version: env!("CARGO_PKG_VERSION").to_string(),
            records: Vec::new(),
        }
    }
}

impl RunMetadata {
    /// Folder name for this run: date first so runs sort chronologically.
    pub fn folder_name(&self) -> String {
        format!("{}_{}", self.started.format("%Y-%m-%d"), self.run_name)
    }

    /// Name of the HDF5 data file inside the run folder.
    pub fn data_file_name(&self) -> String {
        format!("{}.h5", self.run_name)
    }

    /// Write the `run_info.csv` sidecar into `dir`.
    pub fn write_sidecar(&self, dir: &Path) -> BenchResult<PathBuf> {
        let path = dir.join("run_info.csv");
        let mut writer = csv::Writer::from_path(&path)?;
        writer.write_record(["field", "value"])?;
        writer.write_record(["run_name", &self.run_name])?;
        writer.write_record(["run_type", &self.run_type])?;
        writer.write_record(["started", &self.started.to_rfc3339()])?;
        writer.write_record(["software_version", &self.software_version])?;
        for (field, value) in &self.records {
            writer.write_record([field.as_str(), value.as_str()])?;
        }
        writer.flush()?;
        Ok(path)
    }
}

/// Builder for [`RunMetadata`].
#[derive(Default)]
pub struct RunMetadataBuilder {
    inner: RunMetadata,
}

impl RunMetadataBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn run_name(mut self, name: &str) -> Self {
        self.inner.run_name = name.to_string();
        self
    }

    pub fn run_type(mut self, run_type: &str) -> Self {
        self.inner.run_type = run_type.to_string();
        self
    }

    pub fn record(mut self, field: &str, value: &str) -> Self {
        self.inner
            .records
            .push((field.to_string(), value.to_string()));
        self
    }

    pub fn build(self) -> RunMetadata {
        self.inner
    }
}

/// Create the run folder under `base`, never clobbering an existing one.
/// A name collision gets a numeric suffix (`..._2`, `..._3`, ...).
pub fn create_run_dir(base: &Path, metadata: &RunMetadata) -> BenchResult<PathBuf> {
    fs::create_dir_all(base)?;
    let name = metadata.folder_name();
    let first = base.join(&name);
    if !first.exists() {
        fs::create_dir(&first)?;
        return Ok(first);
    }
    let mut suffix = 2u32;
    loop {
        let candidate = base.join(format!("{name}_{suffix}"));
        if !candidate.exists() {
            fs::create_dir(&candidate)?;
            return Ok(candidate);
        }
        suffix += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn metadata() -> RunMetadata {
        RunMetadataBuilder::new()
            .run_name("amp_v2")
            .run_type("bench_test")
            .record("oscilloscope", "TEKTRONIX,MSO44B")
            .build()
    }

    #[test]
    fn colliding_run_dirs_get_suffixes() {
        let base = TempDir::new().unwrap();
        let meta = metadata();
        let first = create_run_dir(base.path(), &meta).unwrap();
        let second = create_run_dir(base.path(), &meta).unwrap();
        assert_ne!(first, second);
        assert!(second
            .file_name()
            .unwrap()
            .to_string_lossy()
            .ends_with("_2"));
    }

    #[test]
    fn sidecar_contains_all_records() {
        let base = TempDir::new().unwrap();
        let meta = metadata();
        let path = meta.write_sidecar(base.path()).unwrap();

        let mut reader = csv::Reader::from_path(path).unwrap();
        let rows: Vec<(String, String)> = reader
            .deserialize()
            .collect::<Result<_, _>>()
            .unwrap();
        assert!(rows.contains(&("run_name".into(), "amp_v2".into())));
        assert!(rows.contains(&("oscilloscope".into(), "TEKTRONIX,MSO44B".into())));
    }

    #[test]
    fn folder_name_starts_with_date() {
        let meta = metadata();
        let name = meta.folder_name();
        assert!(name.ends_with("_amp_v2"));
        assert_eq!(name.split('_').next().unwrap().len(), 10);
    }
}
