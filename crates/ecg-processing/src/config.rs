//! Configuration for the acquisition and processing pipeline

use crate::filters::{FilterBank, FilterKind, FilterMode};
use ecg_core::{ChannelLayout, EcgError, EcgResult, TestProfile};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Powerline notch selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MainsFilter {
    Off,
    Hz50,
    Hz60,
}

impl MainsFilter {
    /// Notch frequency, if enabled
    pub fn frequency(&self) -> Option<f64> {
        match self {
            MainsFilter::Off => None,
            MainsFilter::Hz50 => Some(50.0),
            MainsFilter::Hz60 => Some(60.0),
        }
    }
}

/// Filter selection, mirroring the monitor's filter-settings screen
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSettings {
    pub kind: FilterKind,
    /// High-pass corner for baseline wander ("DFT"); `None` disables it
    pub baseline_cutoff_hz: Option<f64>,
    /// Low-pass corner for muscle noise ("EMG"), used by band-pass only
    pub muscle_cutoff_hz: Option<f64>,
    /// Powerline notch ("AC")
    pub mains: MainsFilter,
    pub order: usize,
    pub mode: FilterMode,
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            kind: FilterKind::Highpass,
            baseline_cutoff_hz: Some(0.5),
            muscle_cutoff_hz: None,
            mains: MainsFilter::Off,
            order: 2,
            mode: FilterMode::Causal,
        }
    }
}

/// R-peak detection parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Threshold = mean + k * std of the window
    pub threshold_k: f64,
    /// Highest rate the spacing floor allows; 120 bpm gives fs/2 samples
    pub max_heart_rate_bpm: f64,
    /// Fewer real samples than this and detection reports nothing
    pub min_window: usize,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            threshold_k: 0.5,
            max_heart_rate_bpm: 120.0,
            min_window: 10,
        }
    }
}

/// Landmark search windows, in seconds relative to R, Q and S
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LandmarkConfig {
    /// Half-width of the Q and S searches around R
    pub qs_window_s: f64,
    /// P window is `[q - p_far_s, q - p_near_s)`
    pub p_near_s: f64,
    pub p_far_s: f64,
    /// T window is `(s + t_near_s, s + t_far_s]`
    pub t_near_s: f64,
    pub t_far_s: f64,
}

impl Default for LandmarkConfig {
    fn default() -> Self {
        Self {
            qs_window_s: 0.2,
            p_near_s: 0.1,
            p_far_s: 0.2,
            t_near_s: 0.15,
            t_far_s: 0.35,
        }
    }
}

/// Wire format delivered by the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WireFormat {
    /// Whitespace-separated numbers, one tick per line
    Ascii,
    /// `arity` little-endian i16 values per tick
    BinaryI16,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    pub format: WireFormat,
    /// Single-channel ASCII: keep only the last N digits of a digit-only line
    pub digit_window: Option<usize>,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            format: WireFormat::Ascii,
            digit_window: None,
        }
    }
}

/// Complete monitor configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Native sample rate; derived from the tick interval when absent
    pub sample_rate_hz: Option<f64>,
    pub tick_interval_ms: u64,
    pub buffer_capacity: usize,
    pub layout: ChannelLayout,
    pub profile: TestProfile,
    pub filter: FilterSettings,
    pub detection: DetectionConfig,
    pub landmarks: LandmarkConfig,
    /// Subtract the window mean after filtering
    pub center_output: bool,
    pub decoder: DecoderConfig,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: None,
            tick_interval_ms: 50,
            buffer_capacity: ecg_core::DEFAULT_CAPACITY,
            layout: ChannelLayout::default(),
            profile: TestProfile::default(),
            filter: FilterSettings::default(),
            detection: DetectionConfig::default(),
            landmarks: LandmarkConfig::default(),
            center_output: true,
            decoder: DecoderConfig::default(),
        }
    }
}

/// Presets for the supported tests
impl MonitorConfig {
    /// Single-lead rhythm strip from a one-channel front-end
    pub fn lead_ii_test() -> Self {
        Self {
            sample_rate_hz: Some(50.0),
            decoder: DecoderConfig {
                format: WireFormat::Ascii,
                digit_window: Some(3),
            },
            ..Self::default()
        }
    }

    /// Full 12-lead view from the 8-channel front-end
    pub fn twelve_lead_test() -> Self {
        Self {
            sample_rate_hz: Some(50.0),
            buffer_capacity: 80,
            layout: ChannelLayout::eight_channel(),
            profile: TestProfile::TwelveLead,
            ..Self::default()
        }
    }

    /// Precordial leads plus lead II from the 8-channel front-end
    pub fn seven_lead_test() -> Self {
        Self {
            profile: TestProfile::SevenLead,
            ..Self::twelve_lead_test()
        }
    }

    /// Preset matching a profile
    pub fn for_profile(profile: TestProfile) -> Self {
        match profile {
            TestProfile::LeadII | TestProfile::LiveMonitoring => Self {
                profile,
                ..Self::lead_ii_test()
            },
            TestProfile::LeadIII | TestProfile::TwelveLead => Self {
                profile,
                ..Self::twelve_lead_test()
            },
            TestProfile::SevenLead => Self::seven_lead_test(),
        }
    }

    /// The one rate shared by filter design, detection, landmarks and BPM
    pub fn effective_sample_rate(&self) -> f64 {
        match self.sample_rate_hz {
            Some(rate) => rate,
            None if self.tick_interval_ms > 0 => 1000.0 / self.tick_interval_ms as f64,
            None => 0.0,
        }
    }

    /// Validate everything that would otherwise fail mid-stream
    pub fn validate(&self) -> EcgResult<()> {
        if self.tick_interval_ms == 0 {
            return Err(ecg_core::config_error!("tick interval must be positive"));
        }

        let rate = self.effective_sample_rate();
        if !(rate.is_finite() && rate > 0.0) {
            return Err(EcgError::InvalidSampleRate { rate });
        }

        if self.buffer_capacity < self.detection.min_window {
            return Err(ecg_core::config_error!(
                "buffer capacity {} is below the detection minimum of {} samples",
                self.buffer_capacity,
                self.detection.min_window
            ));
        }

        self.layout.validate()?;
        self.profile.check_layout(&self.layout)?;

        if self.filter.kind == FilterKind::Bandpass && self.filter.muscle_cutoff_hz.is_none() {
            return Err(ecg_core::config_error!(
                "band-pass filtering needs a muscle cutoff"
            ));
        }
        // Designing the bank surfaces every corner problem
        FilterBank::from_settings(&self.filter, rate)?;

        if !(self.detection.threshold_k.is_finite() && self.detection.threshold_k >= 0.0) {
            return Err(ecg_core::config_error!(
                "threshold multiplier must be non-negative"
            ));
        }
        let max_bpm = self.detection.max_heart_rate_bpm;
        if !(max_bpm.is_finite() && max_bpm > 0.0) {
            return Err(ecg_core::config_error!(
                "maximum heart rate must be positive"
            ));
        }

        let lm = &self.landmarks;
        if lm.qs_window_s <= 0.0 || lm.p_near_s >= lm.p_far_s || lm.t_near_s >= lm.t_far_s {
            return Err(ecg_core::config_error!(
                "landmark windows must be non-empty and ordered"
            ));
        }

        if let Some(0) = self.decoder.digit_window {
            return Err(ecg_core::config_error!("digit window must be at least one digit"));
        }

        Ok(())
    }

    pub fn to_json(&self) -> EcgResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| EcgError::ConfigParse(e.to_string()))
    }

    /// Parse and validate a JSON document
    pub fn from_json_str(json: &str) -> EcgResult<Self> {
        let config: MonitorConfig =
            serde_json::from_str(json).map_err(|e| EcgError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> EcgResult<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }
}
