//! Waveform transfer decoding and physical-axis reconstruction.
//!
//! A curve transfer arrives as a fixed 8-byte header, the samples as
//! big-endian signed 16-bit integers, and a single terminator byte. The
//! framing is instrument-protocol-specific and must match exactly; anything
//! shorter or misaligned is a [`DecodeError`] rather than a silently shifted
//! sample array.

use crate::error::DecodeError;

/// Transfer header length in bytes (`#<d><6-digit length>` on this scope).
pub const CURVE_HEADER_LEN: usize = 8;
/// Trailing terminator length in bytes.
pub const CURVE_TERMINATOR_LEN: usize = 1;

/// Strip the curve framing and reinterpret the payload as big-endian i16.
pub fn decode_curve(raw: &[u8]) -> Result<Vec<i16>, DecodeError> {
    let min = CURVE_HEADER_LEN + CURVE_TERMINATOR_LEN;
    if raw.len() < min {
        return Err(DecodeError::TruncatedPayload {
            len: raw.len(),
            min,
        });
    }
    let payload = &raw[CURVE_HEADER_LEN..raw.len() - CURVE_TERMINATOR_LEN];
    if payload.len() % 2 != 0 {
        return Err(DecodeError::MisalignedPayload {
            len: payload.len(),
        });
    }
    Ok(payload
        .chunks_exact(2)
        .map(|pair| i16::from_be_bytes([pair[0], pair[1]]))
        .collect())
}

/// Calibration scalars read back from the instrument after a transfer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Preamble {
    /// Horizontal sample interval, seconds.
    pub x_increment: f64,
    /// Time of the first sample relative to the trigger, seconds.
    pub x_zero: f64,
    /// Pretrigger offset, samples.
    pub x_offset: f64,
    /// Volts per raw count.
    pub y_multiplier: f64,
    /// Vertical offset, raw counts.
    pub y_offset: f64,
    /// Vertical zero, volts.
    pub y_zero: f64,
}

impl Preamble {
    /// `time[i] = x_zero + (i - x_offset) * x_increment`
    pub fn time_axis(&self, len: usize) -> Vec<f64> {
        (0..len)
            .map(|i| self.x_zero + (i as f64 - self.x_offset) * self.x_increment)
            .collect()
    }

    /// `voltage[i] = y_zero + (raw[i] - y_offset) * y_multiplier`
    pub fn voltage_axis(&self, raw: &[i16]) -> Vec<f64> {
        raw.iter()
            .map(|&s| self.y_zero + (f64::from(s) - self.y_offset) * self.y_multiplier)
            .collect()
    }

    /// Build both axes from one raw sample array.
    pub fn reconstruct(&self, raw: &[i16]) -> Waveform {
        Waveform {
            time: self.time_axis(raw.len()),
            voltage: self.voltage_axis(raw),
        }
    }
}

/// One captured trace in physical units. Both axes always have equal length,
/// fixed by the instrument's acquisition record length for the session.
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    pub time: Vec<f64>,
    pub voltage: Vec<f64>,
}

impl Waveform {
    pub fn len(&self) -> usize {
        self.voltage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voltage.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn framed(samples: &[i16]) -> Vec<u8> {
        let mut raw = b"#6000004".to_vec();
        for s in samples {
            raw.extend_from_slice(&s.to_be_bytes());
        }
        raw.push(b'\n');
        raw
    }

    #[test]
    fn decodes_big_endian_samples() {
        let raw = framed(&[0, 1, -1, i16::MAX, i16::MIN]);
        assert_eq!(
            decode_curve(&raw).unwrap(),
            vec![0, 1, -1, i16::MAX, i16::MIN]
        );
    }

    #[test]
    fn empty_sample_payload_is_valid() {
        let raw = framed(&[]);
        assert_eq!(decode_curve(&raw).unwrap(), Vec::<i16>::new());
    }

    #[test]
    fn short_payload_is_truncated_error() {
        let err = decode_curve(&[0u8; 4]).unwrap_err();
        assert_eq!(err, DecodeError::TruncatedPayload { len: 4, min: 9 });
    }

    #[test]
    fn odd_payload_is_misaligned_error() {
        let mut raw = framed(&[7]);
        raw.insert(raw.len() - 1, 0xFF); // one stray byte before the terminator
        let err = decode_curve(&raw).unwrap_err();
        assert_eq!(err, DecodeError::MisalignedPayload { len: 3 });
    }

    #[test]
    fn affine_reconstruction_matches_documented_transforms() {
        let preamble = Preamble {
            x_increment: 2e-9,
            x_zero: -1e-6,
            x_offset: 100.0,
            y_multiplier: 4e-4,
            y_offset: -26.0,
            y_zero: 0.005,
        };
        let raw = [-26i16, 0, 1000];
        let wave = preamble.reconstruct(&raw);

        assert_eq!(wave.len(), 3);
        for (i, t) in wave.time.iter().enumerate() {
            let expected = -1e-6 + (i as f64 - 100.0) * 2e-9;
            assert!((t - expected).abs() < 1e-18);
        }
        assert!((wave.voltage[0] - 0.005).abs() < 1e-12);
        assert!((wave.voltage[1] - (0.005 + 26.0 * 4e-4)).abs() < 1e-12);
        assert!((wave.voltage[2] - (0.005 + 1026.0 * 4e-4)).abs() < 1e-12);
    }
}
