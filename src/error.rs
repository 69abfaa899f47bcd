//! Custom error types for the bench-test tool.
//!
//! `BenchError` consolidates the failure modes of a sweep run:
//!
//! - **`Instrument`**: the SCPI session is unreachable, a command was
//!   rejected, or the transport failed mid-transaction. Aborts the current
//!   voltage's capture loop; data already flushed to storage stays valid.
//! - **`Timeout`**: a single instrument transaction exceeded its bound. The
//!   transport enforces this on every write/query/raw read so an unresponsive
//!   instrument cannot hang a sweep indefinitely.
//! - **`Decode`**: the waveform binary payload or a calibration read-back
//!   could not be interpreted. Raised instead of silently truncating.
//! - **`Storage`**: the output store could not be created or written.
//! - **`Capture`**: context wrapper attaching the sweep voltage, run index and
//!   channel to whatever went wrong inside a capture loop, so a run can be
//!   resumed manually from the right place.

use std::time::Duration;
use thiserror::Error;

/// Convenience alias for results using the crate error type.
pub type BenchResult<T> = std::result::Result<T, BenchError>;

#[derive(Error, Debug)]
pub enum BenchError {
    #[error("instrument communication error: {0}")]
    Instrument(String),

    #[error("instrument transaction timed out after {0:?}")]
    Timeout(Duration),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("sidecar write failed: {0}")]
    Sidecar(#[from] csv::Error),

    #[error("invalid sweep specification: {0}")]
    InvalidSweep(String),

    #[error("capture failed at {voltage} V (run {run_index}, channel {channel}): {source}")]
    Capture {
        voltage: f64,
        run_index: usize,
        channel: u8,
        #[source]
        source: Box<BenchError>,
    },
}

impl BenchError {
    /// Wrap an error with the sweep position it occurred at.
    pub fn in_capture(self, voltage: f64, run_index: usize, channel: u8) -> Self {
        BenchError::Capture {
            voltage,
            run_index,
            channel,
            source: Box::new(self),
        }
    }

    /// True for faults of the instrument link itself (unreachable session,
    /// rejected command, transaction timeout). These are the only errors the
    /// bounded query retry is allowed to swallow, since re-issuing a SCPI
    /// query is idempotent.
    pub fn is_instrument(&self) -> bool {
        matches!(self, BenchError::Instrument(_) | BenchError::Timeout(_))
    }
}

#[cfg(feature = "storage_hdf5")]
impl From<hdf5::Error> for BenchError {
    fn from(err: hdf5::Error) -> Self {
        BenchError::Storage(err.to_string())
    }
}

/// Failures interpreting instrument responses during waveform transfer.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum DecodeError {
    #[error("curve payload too short: {len} bytes, need at least {min} (header + terminator)")]
    TruncatedPayload { len: usize, min: usize },

    #[error("curve payload has {len} sample bytes, not a whole number of 16-bit samples")]
    MisalignedPayload { len: usize },

    #[error("calibration query {query:?} returned non-numeric response {response:?}")]
    Calibration { query: String, response: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_context_carries_position() {
        let err = BenchError::Instrument("socket closed".into()).in_capture(0.25, 17, 1);
        match err {
            BenchError::Capture {
                voltage,
                run_index,
                channel,
                source,
            } => {
                assert_eq!(voltage, 0.25);
                assert_eq!(run_index, 17);
                assert_eq!(channel, 1);
                assert!(source.is_instrument());
            }
            other => panic!("unexpected variant: {:?}", other),
        }
    }

    #[test]
    fn decode_errors_are_not_retryable() {
        let err = BenchError::Decode(DecodeError::TruncatedPayload { len: 4, min: 9 });
        assert!(!err.is_instrument());
        assert!(BenchError::Timeout(Duration::from_secs(5)).is_instrument());
    }
}
