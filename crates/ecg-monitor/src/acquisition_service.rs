//! Acquisition service runtime
//!
//! A dedicated producer thread polls the sample source and feeds the pipeline's
//! buffers; a `tokio` interval drives the processing tick and broadcasts one
//! `MonitorUpdate` per tick. Control commands arrive over an `mpsc` channel.

use anyhow::{anyhow, Context, Result};
use ecg_core::{AcquisitionState, DeviceCommand, RenderFrame, SampleSource};
use ecg_processing::{
    AcquisitionHandle, AcquisitionPipeline, ExportTable, IngestStats, MonitorConfig, PollOutcome,
};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc as std_mpsc, Arc};
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Producer back-off after a poll that returned nothing
const IDLE_BACKOFF: Duration = Duration::from_millis(2);

/// Commands for controlling acquisition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceCommand {
    Start,
    Stop,
    Shutdown,
}

/// Per-tick output for subscribers
#[derive(Debug, Clone, Serialize)]
pub struct MonitorUpdate {
    pub session_id: Uuid,
    pub tick: u64,
    pub frames: Vec<RenderFrame>,
    pub state: AcquisitionState,
    pub stats: IngestStats,
}

/// Final state handed back when the service shuts down
#[derive(Debug, Clone)]
pub struct ServiceReport {
    pub session_id: Uuid,
    pub ticks: u64,
    pub state: AcquisitionState,
    pub stats: IngestStats,
    pub export: ExportTable,
}

pub struct AcquisitionService {
    session_id: Uuid,
    pipeline: AcquisitionPipeline,
    source: Box<dyn SampleSource>,
    update_sender: broadcast::Sender<MonitorUpdate>,
    command_receiver: mpsc::Receiver<ServiceCommand>,
    command_sender: mpsc::Sender<ServiceCommand>,
}

impl AcquisitionService {
    pub fn new(config: MonitorConfig, source: Box<dyn SampleSource>) -> Result<Self> {
        if source.arity() != config.layout.arity() {
            return Err(anyhow!(
                "source delivers {} channels, layout expects {}",
                source.arity(),
                config.layout.arity()
            ));
        }

        let pipeline =
            AcquisitionPipeline::new(config).context("failed to build acquisition pipeline")?;
        let (update_sender, _) = broadcast::channel(64);
        let (command_sender, command_receiver) = mpsc::channel(32);

        Ok(Self {
            session_id: Uuid::new_v4(),
            pipeline,
            source,
            update_sender,
            command_receiver,
            command_sender,
        })
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Get a receiver for per-tick updates
    pub fn subscribe(&self) -> broadcast::Receiver<MonitorUpdate> {
        self.update_sender.subscribe()
    }

    /// Get command sender for controlling acquisition
    pub fn command_handle(&self) -> mpsc::Sender<ServiceCommand> {
        self.command_sender.clone()
    }

    /// Run until `Shutdown` or until every command sender is dropped
    pub async fn run(self) -> Result<ServiceReport> {
        let Self {
            session_id,
            mut pipeline,
            source,
            update_sender,
            mut command_receiver,
            command_sender,
        } = self;
        // Only external handles keep the command channel open
        drop(command_sender);

        let shutdown = Arc::new(AtomicBool::new(false));
        let (device_sender, device_receiver) = std_mpsc::channel();
        let producer = spawn_producer(
            pipeline.handle(),
            source,
            device_receiver,
            Arc::clone(&shutdown),
        )?;

        let period = Duration::from_millis(pipeline.config().tick_interval_ms.max(1));
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(%session_id, tick_ms = period.as_millis() as u64, "acquisition service started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let frames = pipeline.tick();
                    let handle = pipeline.handle();
                    let update = MonitorUpdate {
                        session_id,
                        tick: pipeline.ticks(),
                        frames,
                        state: handle.state(),
                        stats: handle.stats(),
                    };
                    // No subscribers is fine
                    let _ = update_sender.send(update);
                }

                command = command_receiver.recv() => {
                    match command {
                        Some(ServiceCommand::Start) => match pipeline.start() {
                            Ok(()) => forward(&device_sender, DeviceCommand::Start),
                            Err(e) => warn!(error = %e, "cannot start acquisition"),
                        },
                        Some(ServiceCommand::Stop) => {
                            pipeline.stop();
                            forward(&device_sender, DeviceCommand::Stop);
                        }
                        Some(ServiceCommand::Shutdown) => {
                            info!("shutdown requested");
                            break;
                        }
                        None => {
                            debug!("command channel closed");
                            break;
                        }
                    }
                }
            }
        }

        shutdown.store(true, Ordering::Relaxed);
        drop(device_sender);
        let joined = tokio::task::spawn_blocking(move || producer.join()).await;
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(_)) => error!("producer thread panicked"),
            Err(e) => error!(error = %e, "failed to join producer thread"),
        }

        let handle = pipeline.handle();
        let report = ServiceReport {
            session_id,
            ticks: pipeline.ticks(),
            state: handle.state(),
            stats: handle.stats(),
            export: pipeline.export_rows(),
        };
        info!(
            %session_id,
            ticks = report.ticks,
            accepted = report.stats.frames_accepted,
            malformed = report.stats.malformed_ticks,
            "acquisition service stopped"
        );
        Ok(report)
    }
}

fn forward(device: &std_mpsc::Sender<DeviceCommand>, command: DeviceCommand) {
    if device.send(command).is_err() {
        debug!(?command, "producer already gone, device command dropped");
    }
}

fn spawn_producer(
    handle: AcquisitionHandle,
    mut source: Box<dyn SampleSource>,
    device: std_mpsc::Receiver<DeviceCommand>,
    shutdown: Arc<AtomicBool>,
) -> Result<JoinHandle<()>> {
    std::thread::Builder::new()
        .name("ecg-producer".to_string())
        .spawn(move || {
            while !shutdown.load(Ordering::Relaxed) {
                while let Ok(command) = device.try_recv() {
                    if let Err(e) = source.send_command(command) {
                        warn!(error = %e, ?command, "device command failed");
                    }
                }

                match handle.poll_source(source.as_mut()) {
                    PollOutcome::LinkLost => break,
                    PollOutcome::Idle => std::thread::sleep(IDLE_BACKOFF),
                    _ => {}
                }
            }
            debug!("producer thread exiting");
        })
        .context("failed to spawn producer thread")
}
