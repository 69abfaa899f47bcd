//! Scripted instrument session for tests.
//!
//! Responses are registered per query; a query with a single registered
//! response keeps returning it, a query with several pops them in order.
//! Every command written is recorded so tests can assert on the exact SCPI
//! stream an operation produced.

use crate::error::{BenchError, BenchResult};
use crate::instrument::ScpiSession;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};

#[derive(Default)]
pub struct MockSession {
    responses: HashMap<String, VecDeque<String>>,
    raw_messages: VecDeque<Vec<u8>>,
    /// Every command sent through `write` or `query`, in order.
    pub commands: Vec<String>,
    fail_queries: usize,
    fail_on_command: Option<String>,
    raw_reads_before_failure: Option<usize>,
}

impl MockSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a response for `query`; repeatable if it stays the only one.
    pub fn with_response(mut self, query: &str, response: &str) -> Self {
        self.responses
            .entry(query.to_string())
            .or_default()
            .push_back(response.to_string());
        self
    }

    /// Queue a raw message for `read_raw`; the last queued message is
    /// repeated once the queue would run dry.
    pub fn with_raw(mut self, message: Vec<u8>) -> Self {
        self.raw_messages.push_back(message);
        self
    }

    /// Make the next `n` queries fail with an instrument error.
    pub fn fail_next_queries(&mut self, n: usize) {
        self.fail_queries = n;
    }

    /// Fail any write or query of exactly this command.
    pub fn fail_on_command(mut self, command: &str) -> Self {
        self.fail_on_command = Some(command.to_string());
        self
    }

    /// Let `n` raw reads succeed, then fail every later one.
    pub fn fail_raw_after(mut self, n: usize) -> Self {
        self.raw_reads_before_failure = Some(n);
        self
    }

    /// Commands recorded so far, joined for easy comparison.
    pub fn command_log(&self) -> Vec<String> {
        self.commands.clone()
    }

    fn check_injected_fault(&self, command: &str) -> BenchResult<()> {
        if self.fail_on_command.as_deref() == Some(command) {
            return Err(BenchError::Instrument(format!(
                "injected fault on {command:?}"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl ScpiSession for MockSession {
    async fn write(&mut self, command: &str) -> BenchResult<()> {
        self.check_injected_fault(command)?;
        self.commands.push(command.to_string());
        Ok(())
    }

    async fn query(&mut self, command: &str) -> BenchResult<String> {
        self.check_injected_fault(command)?;
        self.commands.push(command.to_string());
        if self.fail_queries > 0 {
            self.fail_queries -= 1;
            return Err(BenchError::Instrument(format!(
                "injected transient fault on {command:?}"
            )));
        }
        let queue = self.responses.get_mut(command).ok_or_else(|| {
            BenchError::Instrument(format!("no scripted response for {command:?}"))
        })?;
        if queue.len() > 1 {
            Ok(queue.pop_front().unwrap_or_default())
        } else {
            Ok(queue.front().cloned().unwrap_or_default())
        }
    }

    async fn read_raw(&mut self) -> BenchResult<Vec<u8>> {
        if let Some(remaining) = self.raw_reads_before_failure.as_mut() {
            if *remaining == 0 {
                return Err(BenchError::Instrument("injected raw read fault".into()));
            }
            *remaining -= 1;
        }
        if self.raw_messages.len() > 1 {
            Ok(self.raw_messages.pop_front().unwrap_or_default())
        } else {
            self.raw_messages
                .front()
                .cloned()
                .ok_or_else(|| BenchError::Instrument("no scripted raw message".into()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn single_response_repeats() {
        let mut session = MockSession::new().with_response("WFMOutpre:XINcr?", "4e-9");
        for _ in 0..3 {
            assert_eq!(session.query("WFMOutpre:XINcr?").await.unwrap(), "4e-9");
        }
        assert_eq!(session.commands.len(), 3);
    }

    #[tokio::test]
    async fn multiple_responses_pop_in_order() {
        let mut session = MockSession::new()
            .with_response("Q?", "1")
            .with_response("Q?", "2");
        assert_eq!(session.query("Q?").await.unwrap(), "1");
        assert_eq!(session.query("Q?").await.unwrap(), "2");
        assert_eq!(session.query("Q?").await.unwrap(), "2");
    }
}
