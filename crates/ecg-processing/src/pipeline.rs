//! Acquisition orchestration.
//!
//! The producer side (`AcquisitionHandle`) decodes transport ticks, completes the
//! derived leads and appends to the shared lead buffers. The consumer side
//! (`AcquisitionPipeline::tick`) copies the buffers under the same lock and runs
//! filter, detection, landmark search and heart-rate estimation on the copy.

use crate::beat_detector::BeatDetector;
use crate::config::MonitorConfig;
use crate::derived_leads::complete_frame;
use crate::filters::{FilterMode, SignalFilter, StreamingFilter, MIN_FILTER_WINDOW};
use crate::heart_rate::HeartRateEstimator;
use crate::landmarks::LandmarkAnnotator;
use ecg_core::{
    AcquisitionState, BufferSnapshot, ChannelLayout, EcgError, EcgResult, HeartRate, Lead,
    LeadFrame, LeadSet, RenderFrame, SampleSource, SourceEvent, WindowStats,
};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, error, info, warn};

/// Producer-side counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestStats {
    pub frames_accepted: u64,
    /// Ticks discarded whole because they could not be decoded
    pub malformed_ticks: u64,
    /// Polls that returned no data within the read timeout
    pub idle_polls: u64,
    /// Valid ticks that arrived while acquisition was not running
    pub frames_ignored: u64,
}

/// What one poll of the transport did to the buffers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    Accepted,
    Ignored,
    Malformed,
    Idle,
    LinkLost,
}

/// Buffer contents in chronological order, one column per displayed lead
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportTable {
    pub leads: Vec<Lead>,
    pub rows: Vec<(usize, Vec<f64>)>,
}

impl ExportTable {
    /// `Sample` followed by the lead names
    pub fn header(&self) -> Vec<String> {
        std::iter::once("Sample".to_string())
            .chain(self.leads.iter().map(|lead| lead.name().to_string()))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[derive(Debug)]
struct SharedState {
    leads: LeadSet,
    state: AcquisitionState,
    stats: IngestStats,
}

/// Cloneable producer handle onto the pipeline's buffers
#[derive(Debug, Clone)]
pub struct AcquisitionHandle {
    shared: Arc<Mutex<SharedState>>,
    layout: Arc<ChannelLayout>,
}

impl AcquisitionHandle {
    fn new(leads: LeadSet, layout: ChannelLayout) -> Self {
        Self {
            shared: Arc::new(Mutex::new(SharedState {
                leads,
                state: AcquisitionState::Idle,
                stats: IngestStats::default(),
            })),
            layout: Arc::new(layout),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SharedState> {
        // Every critical section leaves the buffers consistent, so a poisoned
        // lock still guards valid data
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append one tick of raw channel values in layout order.
    ///
    /// Returns `Ok(false)` when acquisition is not running. A tick with the wrong
    /// arity is rejected whole and leaves the buffers untouched.
    pub fn ingest(&self, values: &[f64]) -> EcgResult<bool> {
        let frame = match LeadFrame::from_channels(&self.layout, values) {
            Ok(frame) => complete_frame(&frame),
            Err(e) => {
                self.lock().stats.malformed_ticks += 1;
                warn!(error = %e, "discarding malformed tick");
                return Err(e);
            }
        };

        let mut shared = self.lock();
        if !shared.state.accepts_samples() {
            shared.stats.frames_ignored += 1;
            return Ok(false);
        }
        shared.leads.push_frame(&frame)?;
        shared.stats.frames_accepted += 1;
        Ok(true)
    }

    /// Poll `source` once and apply the result
    pub fn poll_source<S: SampleSource + ?Sized>(&self, source: &mut S) -> PollOutcome {
        match source.poll() {
            SourceEvent::Frame(values) => match self.ingest(&values) {
                Ok(true) => PollOutcome::Accepted,
                Ok(false) => PollOutcome::Ignored,
                Err(e) if e.is_tick_local() => PollOutcome::Malformed,
                Err(e) => {
                    self.mark_link_lost(e.to_string());
                    PollOutcome::LinkLost
                }
            },
            SourceEvent::Malformed(reason) => {
                self.lock().stats.malformed_ticks += 1;
                debug!(%reason, "transport delivered a malformed tick");
                PollOutcome::Malformed
            }
            SourceEvent::Idle => {
                self.lock().stats.idle_polls += 1;
                PollOutcome::Idle
            }
            SourceEvent::Disconnected(reason) => {
                self.mark_link_lost(reason);
                PollOutcome::LinkLost
            }
        }
    }

    /// Begin or resume appending; a lost link cannot be restarted
    pub fn start(&self) -> EcgResult<()> {
        let mut shared = self.lock();
        if let AcquisitionState::LinkLost { reason } = &shared.state {
            return Err(EcgError::LinkLost {
                reason: reason.clone(),
            });
        }
        if shared.state != AcquisitionState::Running {
            shared.state = AcquisitionState::Running;
            info!(buffered = shared.leads.len(), "acquisition started");
        }
        Ok(())
    }

    /// Freeze the buffers; their contents stay available to the tick and export
    pub fn stop(&self) {
        let mut shared = self.lock();
        if shared.state == AcquisitionState::Running {
            shared.state = AcquisitionState::Stopped;
            info!(buffered = shared.leads.len(), "acquisition stopped");
        }
    }

    pub fn mark_link_lost(&self, reason: impl Into<String>) {
        let reason = reason.into();
        let mut shared = self.lock();
        if !matches!(shared.state, AcquisitionState::LinkLost { .. }) {
            error!(%reason, "acquisition link lost");
            shared.state = AcquisitionState::LinkLost { reason };
        }
    }

    pub fn state(&self) -> AcquisitionState {
        self.lock().state.clone()
    }

    pub fn stats(&self) -> IngestStats {
        self.lock().stats.clone()
    }

    pub fn layout(&self) -> &ChannelLayout {
        &self.layout
    }

    /// Atomic copy of every buffer plus the state it was taken in
    pub fn snapshot(&self) -> (Vec<BufferSnapshot>, AcquisitionState) {
        let shared = self.lock();
        (shared.leads.snapshot(), shared.state.clone())
    }

    pub fn export_rows(&self) -> ExportTable {
        let shared = self.lock();
        ExportTable {
            leads: shared.leads.leads().to_vec(),
            rows: shared.leads.rows(),
        }
    }
}

/// Per-tick processing chain over the displayed leads
pub struct AcquisitionPipeline {
    config: MonitorConfig,
    sample_rate: f64,
    handle: AcquisitionHandle,
    filter: SignalFilter,
    streaming: Vec<StreamingFilter>,
    detector: BeatDetector,
    annotator: LandmarkAnnotator,
    estimator: HeartRateEstimator,
    ticks: u64,
}

impl AcquisitionPipeline {
    /// Validate `config` and design every stage; all setup errors surface here
    pub fn new(config: MonitorConfig) -> EcgResult<Self> {
        config.validate()?;
        let sample_rate = config.effective_sample_rate();
        let leads = config.profile.leads();

        let lead_set = LeadSet::new(&leads, config.buffer_capacity)?;
        let filter = SignalFilter::new(&config.filter, sample_rate)?;
        let streaming = leads
            .iter()
            .map(|_| StreamingFilter::new(filter.bank().clone(), config.buffer_capacity))
            .collect();

        info!(
            profile = config.profile.description(),
            leads = leads.len(),
            sample_rate,
            capacity = config.buffer_capacity,
            mode = ?config.filter.mode,
            "acquisition pipeline built"
        );

        Ok(Self {
            detector: BeatDetector::new(&config.detection, sample_rate),
            annotator: LandmarkAnnotator::new(&config.landmarks, sample_rate),
            estimator: HeartRateEstimator::new(sample_rate),
            handle: AcquisitionHandle::new(lead_set, config.layout.clone()),
            config,
            sample_rate,
            filter,
            streaming,
            ticks: 0,
        })
    }

    /// Producer handle for the transport thread
    pub fn handle(&self) -> AcquisitionHandle {
        self.handle.clone()
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn ingest(&self, values: &[f64]) -> EcgResult<bool> {
        self.handle.ingest(values)
    }

    pub fn poll_source<S: SampleSource + ?Sized>(&self, source: &mut S) -> PollOutcome {
        self.handle.poll_source(source)
    }

    pub fn start(&self) -> EcgResult<()> {
        self.handle.start()
    }

    pub fn stop(&self) {
        self.handle.stop()
    }

    pub fn state(&self) -> AcquisitionState {
        self.handle.state()
    }

    pub fn export_rows(&self) -> ExportTable {
        self.handle.export_rows()
    }

    /// One render frame per displayed lead, in profile order.
    ///
    /// Never waits on the transport; without new samples the frames are
    /// recomputed from the unchanged buffers.
    pub fn tick(&mut self) -> Vec<RenderFrame> {
        let (snapshots, _state) = self.handle.snapshot();
        self.ticks += 1;

        let mut frames = Vec::with_capacity(snapshots.len());
        for (idx, snapshot) in snapshots.iter().enumerate() {
            let filtered = match self.filter.mode() {
                FilterMode::Causal => match self.streaming.get_mut(idx) {
                    Some(streaming) => streaming.update(snapshot),
                    None => snapshot.window.clone(),
                },
                FilterMode::ZeroPhase if snapshot.filled < MIN_FILTER_WINDOW => {
                    snapshot.window.clone()
                }
                FilterMode::ZeroPhase => self.filter.filter_window(&snapshot.window),
            };
            frames.push(self.render(snapshot, filtered));
        }

        if let Some(frame) = frames.first() {
            debug!(
                tick = self.ticks,
                lead = %frame.lead,
                bpm = %frame.heart_rate,
                beats = frame.r_peaks().len(),
                "tick processed"
            );
        }
        frames
    }

    fn render(&self, snapshot: &BufferSnapshot, mut samples: Vec<f64>) -> RenderFrame {
        if self.config.center_output && !samples.is_empty() {
            let mean = WindowStats::calculate(&samples).mean;
            for sample in &mut samples {
                *sample -= mean;
            }
        }

        if snapshot.filled < self.config.detection.min_window {
            return RenderFrame {
                lead: snapshot.lead,
                samples,
                landmarks: Vec::new(),
                heart_rate: HeartRate::Undetermined,
                phase: snapshot.phase,
                threshold: None,
            };
        }

        let detection = self.detector.detect(&samples);
        let landmarks = self.annotator.annotate(&samples, &detection.beats);
        let heart_rate = self.estimator.estimate(&detection.beats);

        RenderFrame {
            lead: snapshot.lead,
            samples,
            landmarks,
            heart_rate,
            phase: snapshot.phase,
            threshold: detection.threshold,
        }
    }
}
