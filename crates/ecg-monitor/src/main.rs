//! ECG Monitor - headless acquisition and analysis
//!
//! Signal flow: device or simulator → lead buffers → per-tick filter, beat
//! detection and heart rate → log / JSON lines → optional CSV export.

mod acquisition_service;
mod export;

use acquisition_service::{AcquisitionService, MonitorUpdate, ServiceCommand};
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use ecg_core::{AcquisitionState, SampleSource, TestProfile};
use ecg_processing::{LineSource, MonitorConfig, TickDecoder};
use ecg_simulation::{EcgSimulator, SimulatedSource, SimulatorConfig};
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ProfileArg {
    LeadIi,
    LeadIii,
    SevenLead,
    TwelveLead,
    Live,
}

impl From<ProfileArg> for TestProfile {
    fn from(arg: ProfileArg) -> Self {
        match arg {
            ProfileArg::LeadIi => TestProfile::LeadII,
            ProfileArg::LeadIii => TestProfile::LeadIII,
            ProfileArg::SevenLead => TestProfile::SevenLead,
            ProfileArg::TwelveLead => TestProfile::TwelveLead,
            ProfileArg::Live => TestProfile::LiveMonitoring,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "ecg-monitor", version, about = "Headless ECG acquisition monitor")]
struct Cli {
    /// Monitor configuration (JSON); defaults to the preset for --profile
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Test to run
    #[arg(short, long, value_enum)]
    profile: Option<ProfileArg>,

    /// Seconds to acquire before shutting down
    #[arg(short, long, default_value_t = 10.0)]
    duration: f64,

    /// Replay recorded transport lines instead of simulating
    #[arg(long)]
    replay: Option<PathBuf>,

    /// Simulated heart rate in bpm
    #[arg(long, default_value_t = 72.0)]
    heart_rate: f64,

    /// Seed for the simulator's noise
    #[arg(long)]
    seed: Option<u64>,

    /// Directory to write a CSV export of the final buffers into
    #[arg(long)]
    export: Option<PathBuf>,

    /// Print every update as a JSON line
    #[arg(long)]
    json: bool,

    /// Print the effective configuration and exit
    #[arg(long)]
    print_config: bool,
}

fn load_config(cli: &Cli) -> Result<MonitorConfig> {
    let mut config = match &cli.config {
        Some(path) => MonitorConfig::from_file(path)
            .with_context(|| format!("failed to load configuration {}", path.display()))?,
        None => MonitorConfig::for_profile(cli.profile.map(Into::into).unwrap_or_default()),
    };
    if let (Some(_), Some(profile)) = (&cli.config, cli.profile) {
        config.profile = profile.into();
    }
    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn build_source(cli: &Cli, config: &MonitorConfig) -> Result<Box<dyn SampleSource>> {
    if let Some(path) = &cli.replay {
        let file =
            File::open(path).with_context(|| format!("cannot open replay {}", path.display()))?;
        let decoder = TickDecoder::new(config.layout.arity(), &config.decoder);
        let rate = config.effective_sample_rate();
        info!(path = %path.display(), rate, "replaying recorded transport");
        return Ok(Box::new(
            LineSource::new(BufReader::new(file), decoder).paced(rate),
        ));
    }

    let simulator = EcgSimulator::new(SimulatorConfig {
        sample_rate_hz: config.effective_sample_rate(),
        heart_rate_bpm: cli.heart_rate,
        seed: cli.seed,
        ..SimulatorConfig::default()
    })
    .context("invalid simulator settings")?;
    Ok(Box::new(
        SimulatedSource::new(simulator, config.layout.clone())
            .paced()
            .awaiting_start(),
    ))
}

fn report_update(update: &MonitorUpdate, json: bool, ticks_per_second: u64) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(update)?);
        return Ok(());
    }
    if update.tick % ticks_per_second != 0 {
        return Ok(());
    }

    let rates: Vec<String> = update
        .frames
        .iter()
        .map(|frame| format!("{}={}", frame.lead, frame.heart_rate))
        .collect();
    info!(
        tick = update.tick,
        state = ?update.state,
        accepted = update.stats.frames_accepted,
        "bpm {}",
        rates.join(" ")
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;

    if cli.print_config {
        println!("{}", config.to_json()?);
        return Ok(());
    }

    info!(
        test = config.profile.description(),
        sample_rate = config.effective_sample_rate(),
        "starting ECG monitor"
    );

    let profile = config.profile;
    let ticks_per_second = (1000 / config.tick_interval_ms).max(1);
    let source = build_source(&cli, &config)?;
    let service = AcquisitionService::new(config, source)?;
    let mut updates = service.subscribe();
    let commands = service.command_handle();
    let task = tokio::spawn(service.run());

    commands.send(ServiceCommand::Start).await?;

    let deadline = tokio::time::sleep(Duration::from_secs_f64(cli.duration.max(0.0)));
    tokio::pin!(deadline);
    loop {
        tokio::select! {
            _ = &mut deadline => break,
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
            update = updates.recv() => match update {
                Ok(update) => {
                    report_update(&update, cli.json, ticks_per_second)?;
                    if let AcquisitionState::LinkLost { reason } = &update.state {
                        warn!(%reason, "acquisition ended");
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "display lagged behind the tick");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }

    commands.send(ServiceCommand::Shutdown).await.ok();
    let report = task.await.context("acquisition task failed")??;

    if let Some(dir) = &cli.export {
        let path = export::export_to_dir(&report.export, dir, profile)?;
        println!("exported {} rows to {}", report.export.rows.len(), path.display());
    }

    info!(
        session = %report.session_id,
        ticks = report.ticks,
        accepted = report.stats.frames_accepted,
        malformed = report.stats.malformed_ticks,
        "session finished"
    );
    Ok(())
}
