//! Publishing finished runs.
//!
//! Once a run folder is complete (data file plus sidecar) it can be handed
//! to a publisher. The directory publisher copies the folder to a second
//! location, typically a mounted analysis share; local-only runs use the
//! no-op publisher.

use crate::error::{BenchError, BenchResult};
use log::info;
use std::fs;
use std::path::{Path, PathBuf};

pub trait RunPublisher {
    /// Publish a completed run folder. Returns where it landed.
    fn publish(&self, run_dir: &Path) -> BenchResult<PathBuf>;
}

/// Copies the run folder into a destination directory, keeping the folder
/// name. An already-published run of the same name is an error rather than
/// an overwrite.
pub struct DirectoryPublisher {
    destination: PathBuf,
}

impl DirectoryPublisher {
    pub fn new(destination: &Path) -> Self {
        Self {
            destination: destination.to_path_buf(),
        }
    }
}

impl RunPublisher for DirectoryPublisher {
    fn publish(&self, run_dir: &Path) -> BenchResult<PathBuf> {
        let name = run_dir
            .file_name()
            .ok_or_else(|| BenchError::Storage(format!("bad run dir {}", run_dir.display())))?;
        let target = self.destination.join(name);
        if target.exists() {
            return Err(BenchError::Storage(format!(
                "already published: {}",
                target.display()
            )));
        }
        fs::create_dir_all(&target)?;

        for entry in fs::read_dir(run_dir)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                fs::copy(entry.path(), target.join(entry.file_name()))?;
            }
        }
        info!("published run to {}", target.display());
        Ok(target)
    }
}

/// Leaves the run where it is.
pub struct NoopPublisher;

impl RunPublisher for NoopPublisher {
    fn publish(&self, run_dir: &Path) -> BenchResult<PathBuf> {
        Ok(run_dir.to_path_buf())
    }
}
