//! CLI entry point for the bench-test tool.
//!
//! Subcommands:
//! - `run`: execute a full stimulus sweep and persist the captured data
//! - `identify`: connect to both instruments and print their identities
//!
//! ```bash
//! asic-bench run --config amp_v2
//! asic-bench identify
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};

use asic_bench::config::Settings;
use asic_bench::instrument::{Oscilloscope, PulseGenerator, TcpSession};

#[derive(Parser)]
#[command(name = "asic-bench")]
#[command(about = "Pulse sweep bench automation for ASIC readout tests", long_about = None)]
struct Cli {
    /// Config name under config/ (without extension)
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a sweep and write the run folder
    Run,
    /// Print the *IDN? response of both instruments and exit
    Identify,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = Settings::new(cli.config.as_deref())?;

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(settings.log_level.as_str()),
    )
    .init();

    match cli.command {
        Commands::Run => run_sweep(settings).await,
        Commands::Identify => identify(settings).await,
    }
}

async fn connect(
    settings: &Settings,
) -> Result<(PulseGenerator<TcpSession>, Oscilloscope<TcpSession>)> {
    let pulser_session = TcpSession::connect(&settings.pulser_address, settings.timeout).await?;
    let scope_session = TcpSession::connect(&settings.scope_address, settings.timeout).await?;
    let mut pulser = PulseGenerator::new(pulser_session);
    let mut scope = Oscilloscope::new(scope_session);
    pulser.identify().await?;
    scope.identify().await?;
    Ok((pulser, scope))
}

async fn identify(settings: Settings) -> Result<()> {
    let (pulser, scope) = connect(&settings).await?;
    println!("pulse generator: {}", pulser.identity().unwrap_or("?"));
    println!("oscilloscope:    {}", scope.identity().unwrap_or("?"));
    Ok(())
}

#[cfg(feature = "storage_hdf5")]
async fn run_sweep(settings: Settings) -> Result<()> {
    use asic_bench::metadata::{create_run_dir, RunMetadataBuilder};
    use asic_bench::publish::{DirectoryPublisher, NoopPublisher, RunPublisher};
    use asic_bench::storage::{Hdf5Store, RunStore};
    use asic_bench::sweep::SweepController;
    use std::path::Path;

    let (pulser, mut scope) = connect(&settings).await?;

    let coupling = scope.coupling(settings.sweep.channel).await?;
    let x_unit = scope.x_unit().await?;
    let y_unit = scope.y_unit().await?;
    let voltages = settings
        .sweep
        .voltages
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    let metadata = RunMetadataBuilder::new()
        .run_name(settings.storage.run_name.as_deref().unwrap_or("bench"))
        .run_type(settings.storage.run_type.as_deref().unwrap_or(""))
        .record("pulse_generator", pulser.identity().unwrap_or("?"))
        .record("oscilloscope", scope.identity().unwrap_or("?"))
        .record(
            &format!("ch{}_coupling", settings.sweep.channel),
            &coupling,
        )
        .record("x_unit", &x_unit)
        .record("y_unit", &y_unit)
        .record("repeats_per_voltage", &settings.sweep.repeats.to_string())
        .record("sweep_voltages", &voltages)
        .build();

    let run_dir = create_run_dir(Path::new(&settings.storage.base_dir), &metadata)?;
    let mut store = Hdf5Store::open(&run_dir.join(metadata.data_file_name()))?;
    for (field, value) in &metadata.records {
        store.write_text_record(field, value)?;
    }

    let mut controller = SweepController::new(pulser, scope, settings.sweep.clone());
    let report = controller.run(&mut store).await?;
    metadata.write_sidecar(&run_dir)?;

    let published = match settings.storage.publish_dir.as_deref() {
        Some(dir) => DirectoryPublisher::new(Path::new(dir)).publish(&run_dir)?,
        None => NoopPublisher.publish(&run_dir)?,
    };

    println!(
        "sweep complete: {} voltages, {} captures, {} batches",
        report.voltages, report.captures, report.batches
    );
    println!("run folder: {}", published.display());
    Ok(())
}

#[cfg(not(feature = "storage_hdf5"))]
async fn run_sweep(_settings: Settings) -> Result<()> {
    eprintln!("HDF5 storage not compiled in - sweep data would have nowhere to go");
    eprintln!("Rebuild with: cargo build --features storage_hdf5");
    std::process::exit(1)
}
