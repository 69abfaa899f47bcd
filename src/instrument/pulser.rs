//! Pulse generator command wrapper.

use crate::error::BenchResult;
use crate::instrument::{query_with_retry, ScpiSession};
use log::{debug, info};

/// The stimulus source of the bench (a Teledyne T3AFG-class arbitrary
/// waveform generator on the original setup). Owns its session exclusively.
pub struct PulseGenerator<S: ScpiSession> {
    session: S,
    identity: Option<String>,
}

impl<S: ScpiSession> PulseGenerator<S> {
    pub fn new(session: S) -> Self {
        Self {
            session,
            identity: None,
        }
    }

    /// Query and cache `*IDN?`.
    pub async fn identify(&mut self) -> BenchResult<String> {
        let response = query_with_retry(&mut self.session, "*IDN?", 3).await?;
        info!("pulse generator identity: {}", response);
        self.identity = Some(response.clone());
        Ok(response)
    }

    /// Cached identity, if `identify` was called.
    pub fn identity(&self) -> Option<&str> {
        self.identity.as_deref()
    }

    /// Set the pulse amplitude on channel 1, in volts.
    pub async fn set_amplitude(&mut self, volts: f64) -> BenchResult<()> {
        debug!("pulser amplitude -> {} V", volts);
        self.session
            .write(&format!("C1:BSWV AMP, {}", volts))
            .await
    }

    pub fn session(&self) -> &S {
        &self.session
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instrument::MockSession;

    #[tokio::test]
    async fn amplitude_command_format() {
        let mut pulser = PulseGenerator::new(MockSession::new());
        pulser.set_amplitude(0.05).await.unwrap();
        pulser.set_amplitude(1.0).await.unwrap();
        assert_eq!(
            pulser.session().commands,
            vec!["C1:BSWV AMP, 0.05", "C1:BSWV AMP, 1"]
        );
    }
}
