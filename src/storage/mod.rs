//! Run data persistence.
//!
//! Captured waveforms are batched in memory and flushed as two-dimensional
//! datasets, grouped per stimulus voltage. The [`RunStore`] trait is the seam
//! between the sweep loop and the backing format; the HDF5 backend is the
//! production store, the in-memory backend serves tests and dry runs.

use crate::error::BenchResult;

pub mod memory;
pub use memory::MemStore;

#[cfg(feature = "storage_hdf5")]
pub mod hdf5_store;
#[cfg(feature = "storage_hdf5")]
pub use hdf5_store::Hdf5Store;

/// Destination for one run's captured data.
///
/// Implementations are synchronous; the capture loop is the only writer and
/// batches keep the write rate far below instrument latency.
pub trait RunStore {
    /// Create (or reopen) the group for one stimulus voltage.
    fn ensure_group(&mut self, group: &str) -> BenchResult<()>;

    /// Write one batch of waveforms as a `batch.len() x samples` dataset
    /// under `group`. Rows are voltage samples of consecutive captures.
    fn write_batch(&mut self, group: &str, dataset: &str, batch: &[Vec<f64>]) -> BenchResult<()>;

    /// Record the shared sample interval once per run, with its unit.
    fn write_time_step(&mut self, time_step: f64, unit: &str) -> BenchResult<()>;

    /// Attach one free-text record (instrument identity, coupling, ...) to
    /// the run root.
    fn write_text_record(&mut self, key: &str, value: &str) -> BenchResult<()>;

    /// Flush and close the store. No writes may follow.
    fn finalize(&mut self) -> BenchResult<()>;
}

/// Group name for one stimulus voltage, e.g. `PulserVoltage_0p010V`.
/// The decimal point is replaced so the name is safe as a path component.
pub fn voltage_group_name(voltage: f64) -> String {
    format!("PulserVoltage_{voltage:.3}V").replacen('.', "p", 1)
}

/// Dataset name for the batch ending at `last_index`, e.g. `run_20_39`.
/// The lower bound is the batch-aligned start so names stay stable even for
/// a short trailing batch.
pub fn batch_dataset_name(last_index: usize, batch_size: usize) -> String {
    let start = last_index / batch_size * batch_size;
    format!("run_{start}_{last_index}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_name_replaces_decimal_point() {
        assert_eq!(voltage_group_name(0.01), "PulserVoltage_0p010V");
        assert_eq!(voltage_group_name(1.25), "PulserVoltage_1p250V");
    }

    #[test]
    fn dataset_names_are_batch_aligned() {
        assert_eq!(batch_dataset_name(19, 20), "run_0_19");
        assert_eq!(batch_dataset_name(39, 20), "run_20_39");
        // trailing partial batch keeps the aligned lower bound
        assert_eq!(batch_dataset_name(44, 20), "run_40_44");
    }
}
