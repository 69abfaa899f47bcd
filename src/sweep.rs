//! Stimulus sweep orchestration.
//!
//! A sweep steps the pulse generator through a list of amplitudes. At each
//! step the scope is re-ranged twice (once from the commanded amplitude,
//! once from the amplitude actually measured on the monitor channel), the
//! bench is left to settle, and a fixed number of waveforms is captured and
//! flushed to the store in batches.

use crate::error::{BenchError, BenchResult};
use crate::instrument::{Oscilloscope, PulseGenerator, ScpiSession};
use crate::ranging::RangeSelector;
use crate::storage::{batch_dataset_name, voltage_group_name, RunStore};
use log::{info, warn};
use serde::Deserialize;
use std::time::Duration;
use tokio::time::sleep;

fn default_channel() -> u8 {
    1
}

fn default_amplitude_channel() -> u8 {
    2
}

fn default_batch_size() -> usize {
    20
}

fn default_settle() -> Duration {
    Duration::from_millis(500)
}

/// One sweep, as configured. Voltages are visited in the order given.
#[derive(Debug, Deserialize, Clone)]
pub struct SweepSpec {
    /// Stimulus amplitudes to visit, volts.
    pub voltages: Vec<f64>,
    /// Captures per voltage.
    pub repeats: usize,
    /// Scope channel carrying the signal under test.
    #[serde(default = "default_channel")]
    pub channel: u8,
    /// Scope channel carrying the stimulus monitor; its measurement slot
    /// supplies the measured amplitude for the second re-ranging pass.
    #[serde(default = "default_amplitude_channel")]
    pub amplitude_channel: u8,
    /// Captures buffered before each flush to the store.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Dwell after each re-ranging before anything is trusted.
    #[serde(with = "humantime_serde", default = "default_settle")]
    pub settle: Duration,
}

impl SweepSpec {
    pub fn validate(&self) -> BenchResult<()> {
        if self.voltages.is_empty() {
            return Err(BenchError::InvalidSweep("no voltages to sweep".into()));
        }
        if let Some(v) = self
            .voltages
            .iter()
            .find(|v| !v.is_finite() || **v <= 0.0)
        {
            return Err(BenchError::InvalidSweep(format!(
                "stimulus amplitude must be finite and positive, got {v}"
            )));
        }
        if self.repeats == 0 {
            return Err(BenchError::InvalidSweep("repeats must be at least 1".into()));
        }
        if self.batch_size == 0 {
            return Err(BenchError::InvalidSweep(
                "batch_size must be at least 1".into(),
            ));
        }
        for (name, ch) in [
            ("channel", self.channel),
            ("amplitude_channel", self.amplitude_channel),
        ] {
            if !(1..=4).contains(&ch) {
                return Err(BenchError::InvalidSweep(format!(
                    "{name} must be 1..=4, got {ch}"
                )));
            }
        }
        if self.channel == self.amplitude_channel {
            return Err(BenchError::InvalidSweep(
                "signal and monitor must be different channels".into(),
            ));
        }
        Ok(())
    }
}

/// Totals reported after a completed sweep.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub voltages: usize,
    pub captures: usize,
    pub batches: usize,
}

/// Drives one sweep over an owned pulser and scope.
pub struct SweepController<P: ScpiSession, O: ScpiSession> {
    pulser: PulseGenerator<P>,
    scope: Oscilloscope<O>,
    selector: RangeSelector,
    spec: SweepSpec,
}

impl<P: ScpiSession, O: ScpiSession> SweepController<P, O> {
    pub fn new(pulser: PulseGenerator<P>, scope: Oscilloscope<O>, spec: SweepSpec) -> Self {
        let selector = RangeSelector::new(spec.channel, spec.amplitude_channel);
        Self {
            pulser,
            scope,
            selector,
            spec,
        }
    }

    pub fn spec(&self) -> &SweepSpec {
        &self.spec
    }

    /// Run the sweep, writing captures into `store`.
    ///
    /// On an instrument fault mid-capture the buffered partial batch is
    /// flushed and the store finalized before the error propagates, so
    /// everything captured up to the fault survives on disk.
    pub async fn run<R: RunStore>(&mut self, store: &mut R) -> BenchResult<SweepReport> {
        let mut report = SweepReport::default();

        // The acquisition record is fixed for the session, so the sample
        // interval is recorded once, before any voltage is visited.
        let time_step = self.scope.time_increment().await?;
        let unit = self.scope.x_unit().await?;
        store.write_time_step(time_step, &unit)?;

        for &voltage in &self.spec.voltages.clone() {
            info!(
                "stimulus {} V, {} captures",
                voltage, self.spec.repeats
            );
            let group = voltage_group_name(voltage);
            store.ensure_group(&group)?;

            if let Err(err) = self.step_voltage(voltage).await {
                finalize_after_fault(store);
                return Err(err.in_capture(voltage, 0, self.spec.channel));
            }

            let mut batch: Vec<Vec<f64>> = Vec::with_capacity(self.spec.batch_size);
            for run_index in 0..self.spec.repeats {
                let wave = match self.scope.read_waveform(self.spec.channel).await {
                    Ok(wave) => wave,
                    Err(err) => {
                        if !batch.is_empty() {
                            let dataset = batch_dataset_name(
                                run_index.saturating_sub(1),
                                self.spec.batch_size,
                            );
                            if let Err(flush_err) = store.write_batch(&group, &dataset, &batch) {
                                warn!("flush of partial batch failed: {}", flush_err);
                            }
                        }
                        finalize_after_fault(store);
                        return Err(err.in_capture(voltage, run_index, self.spec.channel));
                    }
                };

                batch.push(wave.voltage);
                report.captures += 1;

                if batch.len() == self.spec.batch_size {
                    let dataset = batch_dataset_name(run_index, self.spec.batch_size);
                    store.write_batch(&group, &dataset, &batch)?;
                    report.batches += 1;
                    batch.clear();
                }
            }

            if !batch.is_empty() {
                let dataset = batch_dataset_name(self.spec.repeats - 1, self.spec.batch_size);
                store.write_batch(&group, &dataset, &batch)?;
                report.batches += 1;
            }
            report.voltages += 1;
        }

        store.finalize()?;
        Ok(report)
    }

    /// Bring the scope onto range for the commanded amplitude, set the
    /// stimulus, settle, then range again from the amplitude actually
    /// measured on the monitor channel.
    async fn step_voltage(&mut self, voltage: f64) -> BenchResult<()> {
        self.selector.apply(&mut self.scope, voltage).await?;
        self.pulser.set_amplitude(voltage).await?;
        sleep(self.spec.settle).await;

        let measured = self.scope.measurement(self.spec.amplitude_channel).await?;
        self.selector.apply(&mut self.scope, measured).await?;
        Ok(())
    }

    pub fn pulser(&mut self) -> &mut PulseGenerator<P> {
        &mut self.pulser
    }

    pub fn scope(&mut self) -> &mut Oscilloscope<O> {
        &mut self.scope
    }
}

fn finalize_after_fault<R: RunStore>(store: &mut R) {
    if let Err(err) = store.finalize() {
        warn!("finalize after fault failed: {}", err);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> SweepSpec {
        SweepSpec {
            voltages: vec![0.01, 0.05],
            repeats: 3,
            channel: 1,
            amplitude_channel: 2,
            batch_size: 2,
            settle: Duration::from_millis(0),
        }
    }

    #[test]
    fn valid_spec_passes() {
        spec().validate().unwrap();
    }

    #[test]
    fn empty_voltage_list_is_rejected() {
        let mut s = spec();
        s.voltages.clear();
        assert!(matches!(
            s.validate().unwrap_err(),
            BenchError::InvalidSweep(_)
        ));
    }

    #[test]
    fn nonpositive_voltage_is_rejected() {
        let mut s = spec();
        s.voltages.push(0.0);
        assert!(s.validate().is_err());
        s.voltages.pop();
        s.voltages.push(f64::NAN);
        assert!(s.validate().is_err());
    }

    #[test]
    fn shared_signal_and_monitor_channel_is_rejected() {
        let mut s = spec();
        s.amplitude_channel = s.channel;
        assert!(s.validate().is_err());
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let mut s = spec();
        s.batch_size = 0;
        assert!(s.validate().is_err());
    }
}
