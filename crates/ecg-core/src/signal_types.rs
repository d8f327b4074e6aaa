//! Per-tick results handed from the processing pipeline to the presentation layer

use crate::lead::Lead;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Characteristic deflections of one cardiac cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WaveKind {
    P,
    Q,
    R,
    S,
    T,
}

impl fmt::Display for WaveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            WaveKind::P => "P",
            WaveKind::Q => "Q",
            WaveKind::R => "R",
            WaveKind::S => "S",
            WaveKind::T => "T",
        };
        f.write_str(label)
    }
}

/// A located wave, indexed into the window it was found in
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub kind: WaveKind,
    pub index: usize,
    pub amplitude: f64,
}

impl Landmark {
    pub fn new(kind: WaveKind, index: usize, amplitude: f64) -> Self {
        Self {
            kind,
            index,
            amplitude,
        }
    }
}

/// R-peak indices found in one detection pass, ascending
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeatRecord {
    peaks: Vec<usize>,
}

impl BeatRecord {
    /// Sorts and deduplicates the given indices
    pub fn new(mut peaks: Vec<usize>) -> Self {
        peaks.sort_unstable();
        peaks.dedup();
        Self { peaks }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn peaks(&self) -> &[usize] {
        &self.peaks
    }

    pub fn len(&self) -> usize {
        self.peaks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peaks.is_empty()
    }

    /// Spacing between consecutive peaks, in samples
    pub fn intervals(&self) -> Vec<usize> {
        self.peaks.windows(2).map(|pair| pair[1] - pair[0]).collect()
    }
}

/// Heart-rate estimate for one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HeartRate {
    /// Fewer than two beats in the window
    Undetermined,
    Bpm(u32),
}

impl HeartRate {
    pub fn bpm(&self) -> Option<u32> {
        match self {
            HeartRate::Bpm(value) => Some(*value),
            HeartRate::Undetermined => None,
        }
    }

    pub fn is_determined(&self) -> bool {
        matches!(self, HeartRate::Bpm(_))
    }
}

impl fmt::Display for HeartRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeartRate::Bpm(value) => write!(f, "{}", value),
            HeartRate::Undetermined => f.write_str("--"),
        }
    }
}

/// Fill state of a lead buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BufferPhase {
    /// Fewer than `capacity` samples received
    Warming,
    /// Full ring buffer
    Steady,
}

/// Lifecycle of an acquisition session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AcquisitionState {
    /// Configured but never started
    Idle,
    Running,
    /// Buffers frozen; last frames stay valid
    Stopped,
    /// Terminal transport failure
    LinkLost { reason: String },
}

impl AcquisitionState {
    pub fn accepts_samples(&self) -> bool {
        matches!(self, AcquisitionState::Running)
    }
}

/// One tick of output for a single lead
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderFrame {
    pub lead: Lead,
    /// Filtered (and, when configured, mean-centred) window
    pub samples: Vec<f64>,
    pub landmarks: Vec<Landmark>,
    pub heart_rate: HeartRate,
    pub phase: BufferPhase,
    /// Detection threshold applied to `samples`, if detection ran
    pub threshold: Option<f64>,
}

impl RenderFrame {
    /// Landmarks of one kind, in window order
    pub fn landmarks_of(&self, kind: WaveKind) -> impl Iterator<Item = &Landmark> {
        self.landmarks.iter().filter(move |l| l.kind == kind)
    }

    pub fn r_peaks(&self) -> Vec<usize> {
        self.landmarks_of(WaveKind::R).map(|l| l.index).collect()
    }
}

/// Summary statistics of a window
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowStats {
    pub mean: f64,
    /// Population standard deviation
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
}

impl WindowStats {
    pub fn calculate(data: &[f64]) -> Self {
        if data.is_empty() {
            return Self {
                mean: 0.0,
                std_dev: 0.0,
                min: 0.0,
                max: 0.0,
            };
        }

        let n = data.len() as f64;
        let mean = data.iter().sum::<f64>() / n;
        let variance = data.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
        let min = data.iter().fold(f64::INFINITY, |a, &b| a.min(b));
        let max = data.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b));

        Self {
            mean,
            std_dev: variance.sqrt(),
            min,
            max,
        }
    }

    pub fn peak_to_peak(&self) -> f64 {
        self.max - self.min
    }
}
