//! In-memory store for tests and dry runs.

use crate::error::{BenchError, BenchResult};
use crate::storage::RunStore;
use std::collections::BTreeMap;

/// Records every write so tests can assert on grouping, batching and
/// finalization order. Group iteration order is insertion order.
#[derive(Default)]
pub struct MemStore {
    /// Group name, in creation order.
    pub groups: Vec<String>,
    /// Group -> dataset name -> rows of voltage samples.
    pub datasets: BTreeMap<String, Vec<(String, Vec<Vec<f64>>)>>,
    /// Sample interval writes (value, unit).
    pub time_steps: Vec<(f64, String)>,
    /// Free-text records on the run root.
    pub text_records: Vec<(String, String)>,
    pub finalized: bool,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dataset names written under `group`, in write order.
    pub fn dataset_names(&self, group: &str) -> Vec<&str> {
        self.datasets
            .get(group)
            .map(|sets| sets.iter().map(|(name, _)| name.as_str()).collect())
            .unwrap_or_default()
    }

    fn check_open(&self) -> BenchResult<()> {
        if self.finalized {
            return Err(BenchError::Storage("write after finalize".into()));
        }
        Ok(())
    }
}

impl RunStore for MemStore {
    fn ensure_group(&mut self, group: &str) -> BenchResult<()> {
        self.check_open()?;
        if !self.groups.iter().any(|g| g == group) {
            self.groups.push(group.to_string());
            self.datasets.insert(group.to_string(), Vec::new());
        }
        Ok(())
    }

    fn write_batch(&mut self, group: &str, dataset: &str, batch: &[Vec<f64>]) -> BenchResult<()> {
        self.check_open()?;
        let sets = self
            .datasets
            .get_mut(group)
            .ok_or_else(|| BenchError::Storage(format!("unknown group {group:?}")))?;
        sets.push((dataset.to_string(), batch.to_vec()));
        Ok(())
    }

    fn write_time_step(&mut self, time_step: f64, unit: &str) -> BenchResult<()> {
        self.check_open()?;
        self.time_steps.push((time_step, unit.to_string()));
        Ok(())
    }

    fn write_text_record(&mut self, key: &str, value: &str) -> BenchResult<()> {
        self.check_open()?;
        self.text_records.push((key.to_string(), value.to_string()));
        Ok(())
    }

    fn finalize(&mut self) -> BenchResult<()> {
        self.check_open()?;
        self.finalized = true;
        Ok(())
    }
}
