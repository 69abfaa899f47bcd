//! HDF5 backend for run data.
//!
//! One file per run. Waveform batches land as deflate-compressed 2-D
//! datasets under per-voltage groups, the sample interval as a scalar
//! dataset with a unit attribute, and free-text records as variable-length
//! string attributes on the file root. The layout is readable from
//! Python/MATLAB analysis scripts without any custom tooling.

use crate::error::{BenchError, BenchResult};
use crate::storage::RunStore;
use hdf5::types::VarLenUnicode;
use hdf5::{File, Group};
use log::{debug, info};
use ndarray::Array2;
use std::path::{Path, PathBuf};

const DEFLATE_LEVEL: u8 = 4;

pub struct Hdf5Store {
    file: Option<File>,
    path: PathBuf,
}

impl Hdf5Store {
    /// Open `path` read-write, creating it if absent.
    pub fn open(path: &Path) -> BenchResult<Self> {
        let file = if path.exists() {
            File::open_rw(path)?
        } else {
            File::create(path)?
        };
        info!("run data file {}", path.display());
        Ok(Self {
            file: Some(file),
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn file(&self) -> BenchResult<&File> {
        self.file
            .as_ref()
            .ok_or_else(|| BenchError::Storage("write after finalize".into()))
    }

    fn group(&self, name: &str) -> BenchResult<Group> {
        let file = self.file()?;
        if let Ok(group) = file.group(name) {
            Ok(group)
        } else {
            Ok(file.create_group(name)?)
        }
    }
}

fn varlen(value: &str) -> BenchResult<VarLenUnicode> {
    value
        .parse::<VarLenUnicode>()
        .map_err(|e| BenchError::Storage(format!("string not storable as attribute: {e}")))
}

impl RunStore for Hdf5Store {
    fn ensure_group(&mut self, group: &str) -> BenchResult<()> {
        self.group(group).map(|_| ())
    }

    fn write_batch(&mut self, group: &str, dataset: &str, batch: &[Vec<f64>]) -> BenchResult<()> {
        let rows = batch.len();
        let cols = batch.first().map(Vec::len).unwrap_or(0);
        let mut flat = Vec::with_capacity(rows * cols);
        for row in batch {
            if row.len() != cols {
                return Err(BenchError::Storage(format!(
                    "ragged batch: row of {} samples in a {}-sample batch",
                    row.len(),
                    cols
                )));
            }
            flat.extend_from_slice(row);
        }
        let data = Array2::from_shape_vec((rows, cols), flat)
            .map_err(|e| BenchError::Storage(e.to_string()))?;

        let group = self.group(group)?;
        group
            .new_dataset_builder()
            .deflate(DEFLATE_LEVEL)
            .with_data(&data)
            .create(dataset)?;
        debug!("wrote {} ({} x {})", dataset, rows, cols);
        Ok(())
    }

    fn write_time_step(&mut self, time_step: f64, unit: &str) -> BenchResult<()> {
        let file = self.file()?;
        let ds = file.new_dataset::<f64>().create("time_step")?;
        ds.write_scalar(&time_step)?;
        ds.new_attr::<VarLenUnicode>()
            .create("unit")?
            .write_scalar(&varlen(unit)?)?;
        Ok(())
    }

    fn write_text_record(&mut self, key: &str, value: &str) -> BenchResult<()> {
        let file = self.file()?;
        let attr = if file.attr(key).is_ok() {
            file.attr(key)?
        } else {
            file.new_attr::<VarLenUnicode>().create(key)?
        };
        attr.write_scalar(&varlen(value)?)?;
        Ok(())
    }

    fn finalize(&mut self) -> BenchResult<()> {
        match self.file.take() {
            Some(file) => {
                file.flush()?;
                Ok(())
            }
            None => Err(BenchError::Storage("finalize called twice".into())),
        }
    }
}
