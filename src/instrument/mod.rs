//! Instrument session layer.
//!
//! A [`ScpiSession`] is a text command/response channel (plus a raw binary
//! read for curve transfers) to a single addressable instrument. The bench
//! holds two of them, one to the pulse generator and one to the oscilloscope,
//! constructed once and passed by ownership into the device wrappers. There
//! is no ambient global instrument state.

use crate::error::{BenchError, BenchResult};
use async_trait::async_trait;
use log::warn;
use std::time::Duration;

pub mod mock;
pub mod pulser;
pub mod scope;
pub mod tcp;

pub use mock::MockSession;
pub use pulser::PulseGenerator;
pub use scope::Oscilloscope;
pub use tcp::TcpSession;

/// A command/response session to one SCPI instrument.
#[async_trait]
pub trait ScpiSession: Send {
    /// Send a command that expects no response.
    async fn write(&mut self, command: &str) -> BenchResult<()>;

    /// Send a query and read back one textual response line (trimmed).
    async fn query(&mut self, command: &str) -> BenchResult<String>;

    /// Read one raw binary message, exactly as the instrument framed it
    /// (including any transfer header and trailing terminator).
    async fn read_raw(&mut self) -> BenchResult<Vec<u8>>;
}

/// Issue a query with bounded retry and linear backoff.
///
/// Only instrument-communication faults are retried; re-issuing a SCPI query
/// is idempotent. Decode and storage errors propagate immediately.
pub async fn query_with_retry<S: ScpiSession>(
    session: &mut S,
    command: &str,
    attempts: usize,
) -> BenchResult<String> {
    let mut last_err = None;
    for attempt in 1..=attempts.max(1) {
        match session.query(command).await {
            Ok(response) => return Ok(response),
            Err(err) if err.is_instrument() && attempt < attempts => {
                warn!(
                    "query {:?} failed (attempt {}/{}): {}",
                    command, attempt, attempts, err
                );
                tokio::time::sleep(Duration::from_millis(100 * attempt as u64)).await;
                last_err = Some(err);
            }
            Err(err) => return Err(err),
        }
    }
    Err(last_err.unwrap_or_else(|| BenchError::Instrument("no attempts made".into())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn retry_recovers_from_transient_fault() {
        let mut session = MockSession::new().with_response("*IDN?", "TEKTRONIX,MSO44B");
        session.fail_next_queries(2);

        let response = query_with_retry(&mut session, "*IDN?", 3).await.unwrap();
        assert_eq!(response, "TEKTRONIX,MSO44B");
    }

    #[tokio::test]
    async fn retry_gives_up_after_bound() {
        let mut session = MockSession::new().with_response("*IDN?", "x");
        session.fail_next_queries(5);

        let err = query_with_retry(&mut session, "*IDN?", 3).await.unwrap_err();
        assert!(err.is_instrument());
    }
}
