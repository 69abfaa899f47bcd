//! # ASIC Bench Test Library
//!
//! Core library for the `asic-bench` tool: automated characterization sweeps
//! of an analog front-end (ASIC) driven by a pulse generator and observed on
//! an oscilloscope, both controlled over a SCPI instrument link.
//!
//! ## Crate Structure
//!
//! - **`config`**: Loading and validating run configuration from TOML files.
//! - **`error`**: The crate-wide [`BenchError`](error::BenchError) taxonomy.
//! - **`instrument`**: The [`ScpiSession`](instrument::ScpiSession) transport
//!   trait, the TCP transport, a scripted mock, and the pulse-generator and
//!   oscilloscope command wrappers.
//! - **`ranging`**: Amplitude-to-scope-range lookup applied before captures.
//! - **`waveform`**: Binary curve decoding and physical-axis reconstruction.
//! - **`sweep`**: The sweep controller that walks the stimulus voltages and
//!   batches captured waveforms into the run store.
//! - **`storage`**: The [`RunStore`](storage::RunStore) interface with an
//!   in-memory store and an HDF5 store (feature `storage_hdf5`).
//! - **`metadata`**: Run folder naming and the `run_info.csv` sidecar.
//! - **`publish`**: The end-of-run "publish completed file" hook.

pub mod config;
pub mod error;
pub mod instrument;
pub mod metadata;
pub mod publish;
pub mod ranging;
pub mod storage;
pub mod sweep;
pub mod waveform;

pub use error::{BenchError, BenchResult};
