//! Configuration management.
use crate::error::BenchError;
use crate::sweep::SweepSpec;
use config::Config;
use serde::Deserialize;
use std::time::Duration;

fn default_timeout() -> Duration {
    Duration::from_secs(5)
}

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub log_level: String,
    /// Socket address of the pulse generator, e.g. "169.254.7.108:5025".
    pub pulser_address: String,
    /// Socket address of the oscilloscope, e.g. "169.254.7.109:5025".
    pub scope_address: String,
    /// Bound on every single instrument transaction.
    #[serde(with = "humantime_serde", default = "default_timeout")]
    pub timeout: Duration,
    pub storage: StorageSettings,
    pub sweep: SweepSpec,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageSettings {
    /// Directory the run folder is created under.
    pub base_dir: String,
    /// Optional run name; the run date is appended to it.
    pub run_name: Option<String>,
    /// Free-form run type recorded in the sidecar, e.g. "bench_test".
    pub run_type: Option<String>,
    /// If set, the finished HDF5 file is copied here (e.g. a mounted share).
    pub publish_dir: Option<String>,
}

impl Settings {
    pub fn new(config_name: Option<&str>) -> Result<Self, BenchError> {
        let config_path = format!("config/{}", config_name.unwrap_or("default"));
        let s = Config::builder()
            .add_source(config::File::with_name(&config_path))
            .build()
            .map_err(BenchError::Config)?;

        let settings: Settings = s.try_deserialize().map_err(BenchError::Config)?;
        settings.sweep.validate()?;
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;

    const EXAMPLE: &str = r#"
        log_level = "info"
        pulser_address = "169.254.7.108:5025"
        scope_address = "169.254.7.109:5025"
        timeout = "2s"

        [storage]
        base_dir = "./Data"
        run_type = "bench_test"

        [sweep]
        voltages = [0.010, 0.050, 0.100]
        repeats = 45
        channel = 1
        amplitude_channel = 2
        batch_size = 20
        settle = "500ms"
    "#;

    #[test]
    fn parses_full_settings() {
        let settings: Settings = Config::builder()
            .add_source(config::File::from_str(EXAMPLE, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(settings.timeout, Duration::from_secs(2));
        assert_eq!(settings.sweep.voltages.len(), 3);
        assert_eq!(settings.sweep.batch_size, 20);
        assert_eq!(settings.sweep.settle, Duration::from_millis(500));
        assert!(settings.storage.publish_dir.is_none());
        settings.sweep.validate().unwrap();
    }
}
