//! Synthetic ECG generator with Gaussian-sum PQRST morphology

use crate::rhythm_patterns::RhythmPattern;
use ecg_core::{config_error, ChannelLayout, EcgResult, Lead, LeadFrame};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::f64::consts::PI;
use tracing::info;

/// Upper bound of the hardware's integer sample range
pub const QUANTIZED_MAX: f64 = 999.0;

/// Beats further than this from the current instant contribute nothing
const BEAT_HORIZON_S: f64 = 0.5;

/// First R wave, leaves room for the leading P wave
const FIRST_BEAT_S: f64 = 0.3;

/// Baseline wander frequency, roughly a breathing cycle
const WANDER_HZ: f64 = 0.15;

/// One Gaussian deflection relative to the R peak
#[derive(Debug, Clone, Copy)]
struct Wave {
    offset_s: f64,
    width_s: f64,
    amplitude: f64,
}

const PQRST: [Wave; 5] = [
    Wave { offset_s: -0.20, width_s: 0.025, amplitude: 0.12 },
    Wave { offset_s: -0.035, width_s: 0.010, amplitude: -0.12 },
    Wave { offset_s: 0.0, width_s: 0.012, amplitude: 1.0 },
    Wave { offset_s: 0.035, width_s: 0.010, amplitude: -0.22 },
    Wave { offset_s: 0.28, width_s: 0.045, amplitude: 0.28 },
];

/// Projection of the cardiac vector onto lead I, relative to lead II
const LEAD_I_GAIN: f64 = 0.6;

fn precordial_gain(lead: Lead) -> Option<f64> {
    match lead {
        Lead::V1 => Some(-0.4),
        Lead::V2 => Some(0.3),
        Lead::V3 => Some(0.7),
        Lead::V4 => Some(1.1),
        Lead::V5 => Some(1.0),
        Lead::V6 => Some(0.8),
        _ => None,
    }
}

/// Configuration for ECG simulation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    pub sample_rate_hz: f64,
    /// Base heart rate, shaped over time by `rhythm`
    pub heart_rate_bpm: f64,
    pub rhythm: RhythmPattern,
    /// R-wave height on lead II in output units
    pub amplitude: f64,
    /// Isoelectric level (mid-scale of the 0-999 range)
    pub offset: f64,
    /// Gaussian noise standard deviation, per lead
    pub noise_std: f64,
    /// Baseline wander amplitude
    pub baseline_wander: f64,
    /// Power line interference amplitude (0 = none)
    pub mains_amplitude: f64,
    pub mains_hz: f64,
    /// Round and clamp to the integer range the hardware produces
    pub quantize: bool,
    /// Random seed for reproducibility
    pub seed: Option<u64>,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: 50.0,
            heart_rate_bpm: 72.0,
            rhythm: RhythmPattern::Constant,
            amplitude: 300.0,
            offset: 500.0,
            noise_std: 3.0,
            baseline_wander: 20.0,
            mains_amplitude: 0.0,
            mains_hz: 50.0,
            quantize: true,
            seed: None,
        }
    }
}

impl SimulatorConfig {
    /// Noise-free configuration, handy for deterministic checks
    pub fn clean(sample_rate_hz: f64, heart_rate_bpm: f64) -> Self {
        Self {
            sample_rate_hz,
            heart_rate_bpm,
            noise_std: 0.0,
            baseline_wander: 0.0,
            seed: Some(0),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> EcgResult<()> {
        if !(self.sample_rate_hz.is_finite() && self.sample_rate_hz > 0.0) {
            return Err(config_error!(
                "simulator sample rate must be positive, got {}",
                self.sample_rate_hz
            ));
        }
        if !(20.0..=300.0).contains(&self.heart_rate_bpm) {
            return Err(config_error!(
                "simulated heart rate {} bpm outside 20-300",
                self.heart_rate_bpm
            ));
        }
        if !(self.noise_std.is_finite() && self.noise_std >= 0.0) {
            return Err(config_error!("noise std must be non-negative, got {}", self.noise_std));
        }
        Ok(())
    }
}

/// ECG signal simulator
///
/// Lead II carries the full cardiac waveform; lead I is a scaled projection of it
/// and the other limb leads follow from I and II by Einthoven's law, so the output
/// is consistent with derived-lead arithmetic downstream. Precordial leads are
/// independent scalings with their own noise.
pub struct EcgSimulator {
    config: SimulatorConfig,
    rng: StdRng,
    noise: Normal<f64>,
    sample_index: u64,
    beats: VecDeque<f64>,
    next_beat: f64,
}

impl EcgSimulator {
    pub fn new(config: SimulatorConfig) -> EcgResult<Self> {
        config.validate()?;

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let noise = Normal::new(0.0, config.noise_std)
            .map_err(|e| config_error!("failed to create noise distribution: {}", e))?;

        info!(
            sample_rate = config.sample_rate_hz,
            bpm = config.heart_rate_bpm,
            rhythm = config.rhythm.description(),
            "ECG simulator created"
        );

        Ok(Self {
            config,
            rng,
            noise,
            sample_index: 0,
            beats: VecDeque::new(),
            next_beat: FIRST_BEAT_S,
        })
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    /// Simulated time of the next sample, in seconds
    pub fn time(&self) -> f64 {
        self.sample_index as f64 / self.config.sample_rate_hz
    }

    pub fn samples_generated(&self) -> u64 {
        self.sample_index
    }

    /// Instantaneous heart rate at the current simulated time
    pub fn current_bpm(&self) -> f64 {
        self.config.rhythm.bpm_at(self.time(), self.config.heart_rate_bpm)
    }

    /// Restart simulated time; the random stream continues
    pub fn reset(&mut self) {
        self.sample_index = 0;
        self.beats.clear();
        self.next_beat = FIRST_BEAT_S;
    }

    fn schedule_beats(&mut self, time: f64) {
        while self.next_beat <= time + BEAT_HORIZON_S {
            self.beats.push_back(self.next_beat);
            let bpm = self.config.rhythm.bpm_at(self.next_beat, self.config.heart_rate_bpm);
            self.next_beat += 60.0 / bpm;
        }
        while self.beats.front().is_some_and(|&beat| beat < time - BEAT_HORIZON_S) {
            self.beats.pop_front();
        }
    }

    /// Lead II waveform at `time`, before offset and noise
    fn cardiac(&self, time: f64) -> f64 {
        let shape: f64 = self
            .beats
            .iter()
            .flat_map(|&beat| {
                PQRST.iter().map(move |wave| {
                    let d = (time - beat - wave.offset_s) / wave.width_s;
                    wave.amplitude * (-0.5 * d * d).exp()
                })
            })
            .sum();

        let mut value = self.config.amplitude * shape;
        value += self.config.baseline_wander * (2.0 * PI * WANDER_HZ * time).sin();
        if self.config.mains_amplitude != 0.0 {
            value += self.config.mains_amplitude * (2.0 * PI * self.config.mains_hz * time).sin();
        }
        value
    }

    fn output(&self, centered: f64) -> f64 {
        let value = self.config.offset + centered;
        if self.config.quantize {
            value.round().clamp(0.0, QUANTIZED_MAX)
        } else {
            value
        }
    }

    /// Advance one sample and return every one of the twelve leads
    pub fn next_leads(&mut self) -> LeadFrame {
        let time = self.time();
        self.schedule_beats(time);
        let base = self.cardiac(time);

        let ii = base + self.noise.sample(&mut self.rng);
        let i = LEAD_I_GAIN * base + self.noise.sample(&mut self.rng);
        let limb = [
            (Lead::I, i),
            (Lead::II, ii),
            (Lead::III, ii - i),
            (Lead::AVR, -(i + ii) / 2.0),
            (Lead::AVL, i - ii / 2.0),
            (Lead::AVF, ii - i / 2.0),
        ];

        let mut frame = LeadFrame::new();
        for (lead, value) in limb {
            frame.set(lead, self.output(value));
        }
        for lead in Lead::ALL {
            if let Some(gain) = precordial_gain(lead) {
                let value = gain * base + self.noise.sample(&mut self.rng);
                frame.set(lead, self.output(value));
            }
        }

        self.sample_index += 1;
        frame
    }

    /// Advance one sample and return the channels of `layout`, in layout order
    pub fn next_frame(&mut self, layout: &ChannelLayout) -> Vec<f64> {
        let frame = self.next_leads();
        layout
            .channels()
            .iter()
            .map(|lead| frame.get(*lead).unwrap_or(self.config.offset))
            .collect()
    }

    /// Generate `count` consecutive frames
    pub fn generate(&mut self, layout: &ChannelLayout, count: usize) -> Vec<Vec<f64>> {
        (0..count).map(|_| self.next_frame(layout)).collect()
    }
}
