//! Amplitude-driven scope range selection.
//!
//! The bench keeps the capture channel near full scale by re-ranging the
//! scope from the expected signal amplitude. The mapping is a fixed lookup
//! table calibrated against the readout chain, not a computed ratio: each
//! amplitude interval carries a vertical scale and optionally a trigger
//! level for the intervals where the default trigger would sit in the noise.

use crate::error::BenchResult;
use crate::instrument::{Oscilloscope, ScpiSession};
use log::{debug, warn};

/// One amplitude interval of the calibration table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangeEntry {
    /// Upper bound of the interval, volts (exclusive).
    pub max_amplitude: f64,
    /// Vertical scale to apply, volts per division.
    pub vertical_scale: f64,
    /// Trigger level override, volts. `None` keeps the current level.
    pub trigger_level: Option<f64>,
}

/// Calibrated amplitude intervals, ascending and half-open: an amplitude
/// selects the first entry whose `max_amplitude` is strictly above it, so
/// each interval is `[previous bound, max_amplitude)`.
pub const RANGE_TABLE: [RangeEntry; 15] = [
    range(0.003, 0.0005, Some(0.00056)),
    range(0.007, 0.0008, None),
    range(0.013, 0.0016, Some(0.00096)),
    range(0.022, 0.0024, None),
    range(0.032, 0.0036, None),
    range(0.050, 0.0055, Some(0.0015)),
    range(0.070, 0.0075, Some(0.0025)),
    range(0.110, 0.014, None),
    range(0.170, 0.02, Some(0.031)),
    range(0.250, 0.03, None),
    range(0.350, 0.04, Some(0.05)),
    range(0.520, 0.06, None),
    range(0.800, 0.09, Some(0.160)),
    range(1.0, 0.12, Some(0.270)),
    range(1.4, 0.16, Some(0.400)),
];

const fn range(max_amplitude: f64, vertical_scale: f64, trigger_level: Option<f64>) -> RangeEntry {
    RangeEntry {
        max_amplitude,
        vertical_scale,
        trigger_level,
    }
}

/// Picks and applies range table entries for one capture channel.
pub struct RangeSelector {
    /// Channel carrying the signal under test.
    pub channel: u8,
    /// Channel carrying the stimulus monitor, kept on the same scale.
    pub monitor_channel: u8,
}

impl RangeSelector {
    pub fn new(channel: u8, monitor_channel: u8) -> Self {
        Self {
            channel,
            monitor_channel,
        }
    }

    /// Table entry for `amplitude`. Amplitudes outside the calibrated span
    /// clamp to the nearest end with a warning rather than failing the sweep.
    pub fn entry_for(&self, amplitude: f64) -> RangeEntry {
        if amplitude < 0.0 {
            warn!(
                "negative amplitude {} V, clamping to finest range entry",
                amplitude
            );
            return RANGE_TABLE[0];
        }
        for entry in &RANGE_TABLE {
            if amplitude < entry.max_amplitude {
                return *entry;
            }
        }
        let last = RANGE_TABLE[RANGE_TABLE.len() - 1];
        warn!(
            "amplitude {} V above calibrated range (max {} V), clamping to coarsest entry",
            amplitude, last.max_amplitude
        );
        last
    }

    /// Re-range the scope for an expected `amplitude`: both channels get the
    /// entry's vertical scale and the trigger level is moved when the entry
    /// carries one.
    pub async fn apply<S: ScpiSession>(
        &self,
        scope: &mut Oscilloscope<S>,
        amplitude: f64,
    ) -> BenchResult<RangeEntry> {
        let entry = self.entry_for(amplitude);
        debug!(
            "re-ranging for {} V: scale {} V/div",
            amplitude, entry.vertical_scale
        );
        scope
            .set_vertical_scale(self.channel, entry.vertical_scale)
            .await?;
        scope
            .set_vertical_scale(self.monitor_channel, entry.vertical_scale)
            .await?;
        if let Some(level) = entry.trigger_level {
            scope.set_trigger(self.channel, level).await?;
        }
        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instrument::MockSession;

    #[test]
    fn table_is_ascending_and_scales_monotonic() {
        for pair in RANGE_TABLE.windows(2) {
            assert!(pair[0].max_amplitude < pair[1].max_amplitude);
            assert!(pair[0].vertical_scale < pair[1].vertical_scale);
        }
    }

    #[test]
    fn intervals_are_lower_inclusive() {
        let selector = RangeSelector::new(1, 2);
        // A bound belongs to the interval it opens, not the one it closes.
        assert_eq!(selector.entry_for(0.003).vertical_scale, 0.0008);
        assert_eq!(selector.entry_for(0.050).vertical_scale, 0.0075);
        assert_eq!(selector.entry_for(1.0).vertical_scale, 0.16);
        // Just below a bound stays in the lower interval.
        assert_eq!(selector.entry_for(0.0029).vertical_scale, 0.0005);
        assert_eq!(selector.entry_for(0.049).vertical_scale, 0.0055);
        assert_eq!(selector.entry_for(0.0).vertical_scale, 0.0005);
    }

    #[test]
    fn out_of_span_amplitudes_clamp_to_the_nearest_end() {
        let selector = RangeSelector::new(1, 2);
        assert_eq!(selector.entry_for(1.4), RANGE_TABLE[14]);
        assert_eq!(selector.entry_for(2.5), RANGE_TABLE[14]);
        assert_eq!(selector.entry_for(-0.1), RANGE_TABLE[0]);
    }

    #[tokio::test]
    async fn apply_scales_both_channels_and_sets_trigger() {
        let selector = RangeSelector::new(1, 2);
        let mut scope = Oscilloscope::new(MockSession::new());
        selector.apply(&mut scope, 0.04).await.unwrap();
        assert_eq!(
            scope.session().commands,
            vec![
                ":CH1:SCALE 0.0055",
                ":CH2:SCALE 0.0055",
                "TRIGger:A:EDGE:SOURce CH1",
                "TRIGger:A:LEVel:CH1 0.0015",
            ]
        );
    }

    #[tokio::test]
    async fn reapplying_the_same_amplitude_repeats_the_same_commands() {
        let selector = RangeSelector::new(1, 2);
        let mut scope = Oscilloscope::new(MockSession::new());
        selector.apply(&mut scope, 0.04).await.unwrap();
        let first = scope.session().commands.clone();
        selector.apply(&mut scope, 0.04).await.unwrap();
        assert_eq!(scope.session().commands[first.len()..], first[..]);
    }

    #[tokio::test]
    async fn apply_without_trigger_override_leaves_trigger_alone() {
        let selector = RangeSelector::new(1, 2);
        let mut scope = Oscilloscope::new(MockSession::new());
        selector.apply(&mut scope, 0.2).await.unwrap();
        assert!(scope
            .session()
            .commands
            .iter()
            .all(|c| !c.starts_with("TRIGger")));
    }
}
