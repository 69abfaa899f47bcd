//! Oscilloscope command wrapper.
//!
//! Wraps one [`ScpiSession`] with the command vocabulary the sweep needs:
//! vertical/horizontal scaling, edge trigger, measurement-channel read-back,
//! and the channel-select/format/curve sequence of a waveform transfer.

use crate::error::{BenchResult, DecodeError};
use crate::instrument::{query_with_retry, ScpiSession};
use crate::waveform::{decode_curve, Preamble, Waveform};
use log::{debug, info};

pub struct Oscilloscope<S: ScpiSession> {
    session: S,
    identity: Option<String>,
}

impl<S: ScpiSession> Oscilloscope<S> {
    pub fn new(session: S) -> Self {
        Self {
            session,
            identity: None,
        }
    }

    /// Query and cache `*IDN?`.
    pub async fn identify(&mut self) -> BenchResult<String> {
        let response = query_with_retry(&mut self.session, "*IDN?", 3).await?;
        info!("oscilloscope identity: {}", response);
        self.identity = Some(response.clone());
        Ok(response)
    }

    pub fn identity(&self) -> Option<&str> {
        self.identity.as_deref()
    }

    /// Volts per division on one channel.
    pub async fn set_vertical_scale(&mut self, channel: u8, scale: f64) -> BenchResult<()> {
        self.session
            .write(&format!(":CH{channel}:SCALE {scale}"))
            .await
    }

    /// Seconds per division on the main timebase.
    pub async fn set_horizontal_scale(&mut self, scale: f64) -> BenchResult<()> {
        self.session
            .write(&format!(":HOR:MAIN:SCALE {scale}"))
            .await
    }

    /// Edge trigger on `channel` at `level` volts.
    pub async fn set_trigger(&mut self, channel: u8, level: f64) -> BenchResult<()> {
        self.session
            .write(&format!("TRIGger:A:EDGE:SOURce CH{channel}"))
            .await?;
        self.session
            .write(&format!("TRIGger:A:LEVel:CH{channel} {level}"))
            .await
    }

    /// Value of one of the scope's measurement slots (e.g. a configured
    /// amplitude measurement), with bounded retry on transient comm faults.
    pub async fn measurement(&mut self, measurement_channel: u8) -> BenchResult<f64> {
        let query = format!(":MEASU:MEAS{measurement_channel}:VALue?");
        let response = query_with_retry(&mut self.session, &query, 3).await?;
        parse_f64(&query, &response)
    }

    /// Coupling mode of a channel, recorded as run metadata.
    pub async fn coupling(&mut self, channel: u8) -> BenchResult<String> {
        self.session
            .query(&format!(":CHANnel{channel}:COUPling?"))
            .await
    }

    /// Sample interval of the current acquisition record, in seconds.
    pub async fn time_increment(&mut self) -> BenchResult<f64> {
        self.query_f64("WFMOutpre:XINcr?").await
    }

    /// Horizontal unit string, e.g. "s".
    pub async fn x_unit(&mut self) -> BenchResult<String> {
        let unit = self.session.query("WFMOutpre:XUNit?").await?;
        Ok(unquote(&unit))
    }

    /// Vertical unit string, e.g. "V".
    pub async fn y_unit(&mut self) -> BenchResult<String> {
        let unit = self.session.query("WFMOutpre:YUNit?").await?;
        Ok(unquote(&unit))
    }

    /// Read back the horizontal and vertical calibration scalars needed to
    /// reconstruct physical axes from raw samples.
    pub async fn preamble(&mut self) -> BenchResult<Preamble> {
        Ok(Preamble {
            x_increment: self.query_f64("WFMOutpre:XINcr?").await?,
            x_zero: self.query_f64("WFMOutpre:XZEro?").await?,
            x_offset: self.query_f64("WFMOutpre:PT_OFF?").await?,
            y_multiplier: self.query_f64("WFMOutpre:YMUlt?").await?,
            y_offset: self.query_f64("WFMOutpre:YOFf?").await?,
            y_zero: self.query_f64("WFMOutpre:YZEro?").await?,
        })
    }

    /// Capture one waveform from `channel`.
    ///
    /// Selects the channel, fixes the transfer format at 2 bytes/sample
    /// binary, requests the curve, decodes the raw payload and reconstructs
    /// the time and voltage axes from the preamble.
    pub async fn read_waveform(&mut self, channel: u8) -> BenchResult<Waveform> {
        self.session
            .write(&format!(":DATA:SOURCE CH{channel}"))
            .await?;
        self.session.write(":WFMOutpre:BYT_Nr 2").await?;
        self.session.write(":WFMOutpre:ENCdg BINARY").await?;

        self.session.write(":CURVE?").await?;
        let raw = self.session.read_raw().await?;
        let samples = decode_curve(&raw)?;
        debug!("curve transfer: {} samples from CH{}", samples.len(), channel);

        let preamble = self.preamble().await?;
        Ok(preamble.reconstruct(&samples))
    }

    async fn query_f64(&mut self, query: &str) -> BenchResult<f64> {
        let response = self.session.query(query).await?;
        parse_f64(query, &response)
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut S {
        &mut self.session
    }
}

fn parse_f64(query: &str, response: &str) -> BenchResult<f64> {
    response.trim().parse::<f64>().map_err(|_| {
        DecodeError::Calibration {
            query: query.to_string(),
            response: response.to_string(),
        }
        .into()
    })
}

fn unquote(s: &str) -> String {
    s.trim().trim_matches('"').to_string()
}
