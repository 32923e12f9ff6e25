#[cfg(not(target_os = "linux"))]
compile_error!("co2mon reads the sensor through hidraw and only builds on Linux");

mod stdout_sink;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use co2mon_core::{
    ArmingKey, FileSink, HidrawAccess, MeasurementSink, MonitorConfig, OutputMode,
    ProtocolVariant, SessionManager, ShutdownToken,
};
use tracing::{error, info};

use stdout_sink::StdoutSink;

#[derive(Parser, Debug)]
#[command(author, version, about = "Monitor for USB CO2 mini sensors (hidraw)", long_about = None)]
struct Args {
    /// Load settings from a TOML file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Write the effective settings to a TOML file and exit
    #[arg(long, value_name = "FILE")]
    write_config: Option<PathBuf>,

    /// hidraw device node of the sensor
    #[arg(short, long)]
    device: Option<PathBuf>,

    /// Firmware variant: plain or obfuscated
    #[arg(long)]
    variant: Option<ProtocolVariant>,

    /// Arming key, 16 hex digits
    #[arg(long)]
    key: Option<ArmingKey>,

    /// Where measurements go: files or stdout
    #[arg(short, long)]
    output: Option<OutputMode>,

    /// File holding the latest CO2 value
    #[arg(long, value_name = "FILE")]
    co2_file: Option<PathBuf>,

    /// File holding the latest temperature
    #[arg(long, value_name = "FILE")]
    temp_file: Option<PathBuf>,

    /// Seconds without a report before the device is re-armed
    #[arg(long, value_name = "SECS")]
    read_timeout: Option<u64>,

    /// Seconds between checks for the device node while it is absent
    #[arg(long, value_name = "SECS")]
    poll_interval: Option<u64>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    /// File settings (or defaults), overridden by whatever was given on the
    /// command line.
    fn resolve(&self) -> Result<MonitorConfig> {
        let mut config = match &self.config {
            Some(path) => MonitorConfig::load_from_file(path)
                .with_context(|| format!("failed to load config '{}'", path.display()))?,
            None => MonitorConfig::default(),
        };

        let session = &mut config.session;
        if let Some(device) = &self.device {
            session.device_path = device.clone();
        }
        if let Some(variant) = self.variant {
            session.variant = variant;
        }
        if let Some(key) = self.key {
            session.key = key;
        }
        if let Some(secs) = self.read_timeout {
            session.read_timeout_secs = secs;
        }
        if let Some(secs) = self.poll_interval {
            session.presence_poll_secs = secs;
        }

        let output = &mut config.output;
        if let Some(mode) = self.output {
            output.mode = mode;
        }
        if let Some(path) = &self.co2_file {
            output.co2_path = path.clone();
        }
        if let Some(path) = &self.temp_file {
            output.temperature_path = path.clone();
        }

        config.validate().context("invalid settings")?;
        Ok(config)
    }
}

fn main() {
    let args = Args::parse();

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(if args.verbose {
                    tracing::Level::DEBUG.into()
                } else {
                    tracing::Level::INFO.into()
                })
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    if let Err(e) = run(&args) {
        error!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<()> {
    let config = args.resolve()?;

    if let Some(path) = &args.write_config {
        config
            .save_to_file(path)
            .with_context(|| format!("failed to write config '{}'", path.display()))?;
        info!(path = %path.display(), "Configuration written");
        return Ok(());
    }

    let shutdown = ShutdownToken::new();
    {
        let token = shutdown.clone();
        ctrlc::set_handler(move || token.cancel())
            .context("failed to install Ctrl-C handler")?;
    }

    let mut sink: Box<dyn MeasurementSink> = match config.output.mode {
        OutputMode::Files => Box::new(FileSink::new(
            &config.output.co2_path,
            &config.output.temperature_path,
        )),
        OutputMode::Stdout => Box::new(StdoutSink::new()),
    };

    info!(
        device = %config.session.device_path.display(),
        variant = %config.session.variant,
        output = %config.output.mode,
        "Starting co2mon"
    );

    let access = HidrawAccess::new(shutdown.clone());
    let mut session = SessionManager::new(access, config.session);
    let result = session.run(&mut sink, &shutdown);

    let stats = session.stats();
    info!(
        reads = stats.reads,
        measurements = stats.measurements,
        rejected = stats.rejected,
        rearms = stats.stalls,
        losses = stats.losses,
        "Session finished"
    );

    result.context("monitoring stopped")
}
