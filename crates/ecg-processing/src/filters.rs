//! Digital filters for ECG baseline-wander and noise removal

use crate::config::FilterSettings;
use ecg_core::{BufferSnapshot, EcgError, EcgResult};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::f64::consts::PI;
use tracing::{debug, warn};

/// Windows shorter than this pass through unfiltered
pub const MIN_FILTER_WINDOW: usize = 10;

/// Default quality factor of the mains notch
pub const DEFAULT_NOTCH_Q: f64 = 30.0;

/// Filter types supported by the design routines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterType {
    ButterworthLowpass,
    ButterworthHighpass,
    ButterworthBandpass,
    /// Notch filter for powerline interference
    Notch,
}

/// Which single-stage response the pipeline applies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterKind {
    /// Baseline-wander removal only
    Highpass,
    /// Baseline-wander plus muscle-noise rejection
    Bandpass,
}

/// How filters are applied to a window; fixed for the whole pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterMode {
    /// Forward-only with state carried across ticks
    Causal,
    /// Forward-backward over each snapshot
    ZeroPhase,
}

/// Filter configuration parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterConfig {
    pub filter_type: FilterType,
    /// Filter order (for Butterworth filters)
    pub order: usize,
    /// Cutoff frequency for lowpass/highpass (Hz)
    pub cutoff_freq: Option<f64>,
    /// Low cutoff for bandpass (Hz)
    pub low_cutoff: Option<f64>,
    /// High cutoff for bandpass (Hz)
    pub high_cutoff: Option<f64>,
    /// Notch frequency (Hz) - typically 50 or 60
    pub notch_freq: Option<f64>,
    pub notch_q: Option<f64>,
}

impl FilterConfig {
    pub fn lowpass(cutoff_freq: f64, order: usize) -> Self {
        Self {
            filter_type: FilterType::ButterworthLowpass,
            order,
            cutoff_freq: Some(cutoff_freq),
            low_cutoff: None,
            high_cutoff: None,
            notch_freq: None,
            notch_q: None,
        }
    }

    pub fn highpass(cutoff_freq: f64, order: usize) -> Self {
        Self {
            filter_type: FilterType::ButterworthHighpass,
            order,
            cutoff_freq: Some(cutoff_freq),
            low_cutoff: None,
            high_cutoff: None,
            notch_freq: None,
            notch_q: None,
        }
    }

    pub fn bandpass(low_cutoff: f64, high_cutoff: f64, order: usize) -> Self {
        Self {
            filter_type: FilterType::ButterworthBandpass,
            order,
            cutoff_freq: None,
            low_cutoff: Some(low_cutoff),
            high_cutoff: Some(high_cutoff),
            notch_freq: None,
            notch_q: None,
        }
    }

    pub fn notch(freq: f64, q: f64) -> Self {
        Self {
            filter_type: FilterType::Notch,
            order: 2,
            cutoff_freq: None,
            low_cutoff: None,
            high_cutoff: None,
            notch_freq: Some(freq),
            notch_q: Some(q),
        }
    }
}

fn check_sample_rate(fs: f64) -> EcgResult<()> {
    if !(fs.is_finite() && fs > 0.0) {
        return Err(EcgError::InvalidSampleRate { rate: fs });
    }
    Ok(())
}

fn check_corner(cutoff: f64, fs: f64) -> EcgResult<()> {
    let nyquist = fs / 2.0;
    if !(cutoff.is_finite() && cutoff > 0.0) {
        return Err(ecg_core::config_error!(
            "filter corner must be positive, got {} Hz",
            cutoff
        ));
    }
    if cutoff >= nyquist {
        return Err(EcgError::CutoffAboveNyquist {
            cutoff_hz: cutoff,
            nyquist_hz: nyquist,
        });
    }
    Ok(())
}

/// Single biquad section (2nd order)
#[derive(Debug, Clone, PartialEq)]
pub struct BiquadSection {
    // y[n] = b0*x[n] + b1*x[n-1] + b2*x[n-2] - a1*y[n-1] - a2*y[n-2]
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,
    x1: f64,
    x2: f64,
    y1: f64,
    y2: f64,
}

impl BiquadSection {
    fn from_coefficients(b0: f64, b1: f64, b2: f64, a1: f64, a2: f64) -> Self {
        Self {
            b0,
            b1,
            b2,
            a1,
            a2,
            x1: 0.0,
            x2: 0.0,
            y1: 0.0,
            y2: 0.0,
        }
    }

    /// Second-order Butterworth-family lowpass with quality factor `q`
    fn lowpass(k: f64, q: f64) -> Self {
        let k2 = k * k;
        let norm = 1.0 / (1.0 + k / q + k2);
        let b0 = k2 * norm;
        Self::from_coefficients(
            b0,
            2.0 * b0,
            b0,
            2.0 * (k2 - 1.0) * norm,
            (1.0 - k / q + k2) * norm,
        )
    }

    fn highpass(k: f64, q: f64) -> Self {
        let k2 = k * k;
        let norm = 1.0 / (1.0 + k / q + k2);
        Self::from_coefficients(
            norm,
            -2.0 * norm,
            norm,
            2.0 * (k2 - 1.0) * norm,
            (1.0 - k / q + k2) * norm,
        )
    }

    /// First-order lowpass, used for the odd pole of odd-order designs
    fn lowpass_first_order(k: f64) -> Self {
        let norm = 1.0 / (1.0 + k);
        Self::from_coefficients(k * norm, k * norm, 0.0, (k - 1.0) * norm, 0.0)
    }

    fn highpass_first_order(k: f64) -> Self {
        let norm = 1.0 / (1.0 + k);
        Self::from_coefficients(norm, -norm, 0.0, (k - 1.0) * norm, 0.0)
    }

    fn process_sample(&mut self, input: f64) -> f64 {
        let output = self.b0 * input + self.b1 * self.x1 + self.b2 * self.x2
            - self.a1 * self.y1
            - self.a2 * self.y2;

        self.x2 = self.x1;
        self.x1 = input;
        self.y2 = self.y1;
        self.y1 = output;

        output
    }

    /// Gain at 0 Hz
    fn dc_gain(&self) -> f64 {
        let den = 1.0 + self.a1 + self.a2;
        if den.abs() < f64::EPSILON {
            return 0.0;
        }
        (self.b0 + self.b1 + self.b2) / den
    }

    /// Load the state a constant input `x0` would have settled to; returns the
    /// section's steady output so the next section can be primed with it
    fn prime(&mut self, x0: f64) -> f64 {
        let y0 = self.dc_gain() * x0;
        self.x1 = x0;
        self.x2 = x0;
        self.y1 = y0;
        self.y2 = y0;
        y0
    }

    fn reset(&mut self) {
        self.x1 = 0.0;
        self.x2 = 0.0;
        self.y1 = 0.0;
        self.y2 = 0.0;
    }
}

/// Butterworth sections for a lowpass or highpass of arbitrary order
fn butterworth_sections(
    cutoff: f64,
    fs: f64,
    order: usize,
    highpass: bool,
) -> EcgResult<Vec<BiquadSection>> {
    check_sample_rate(fs)?;
    check_corner(cutoff, fs)?;
    if order == 0 {
        return Err(ecg_core::config_error!("filter order must be at least 1"));
    }

    // Pre-warped corner for the bilinear transform
    let k = (PI * cutoff / fs).tan();
    let n = order as f64;

    let mut sections = Vec::with_capacity((order + 1) / 2);
    for idx in 0..order / 2 {
        let q = 1.0 / (2.0 * (PI * (2 * idx + 1) as f64 / (2.0 * n)).sin());
        sections.push(if highpass {
            BiquadSection::highpass(k, q)
        } else {
            BiquadSection::lowpass(k, q)
        });
    }
    if order % 2 == 1 {
        sections.push(if highpass {
            BiquadSection::highpass_first_order(k)
        } else {
            BiquadSection::lowpass_first_order(k)
        });
    }

    Ok(sections)
}

/// A per-sample filter whose state persists between calls
pub trait SampleFilter: Send {
    fn process_sample(&mut self, input: f64) -> f64;

    /// Settle the internal state as if `x0` had been applied forever; returns
    /// the settled output
    fn prime(&mut self, x0: f64) -> f64;

    fn reset(&mut self);

    fn name(&self) -> &str;

    fn box_clone(&self) -> Box<dyn SampleFilter>;

    fn process_block(&mut self, input: &[f64]) -> Vec<f64> {
        input.iter().map(|x| self.process_sample(*x)).collect()
    }
}

impl Clone for Box<dyn SampleFilter> {
    fn clone(&self) -> Self {
        self.box_clone()
    }
}

/// Butterworth filter implementation using cascaded biquad sections
#[derive(Debug, Clone)]
pub struct ButterworthFilter {
    filter_config: FilterConfig,
    biquads: Vec<BiquadSection>,
    sampling_rate: f64,
}

impl ButterworthFilter {
    /// Design the filter for `sampling_rate`; invalid corners fail here, at setup
    pub fn new(filter_config: FilterConfig, sampling_rate: f64) -> EcgResult<Self> {
        let order = filter_config.order;
        let biquads = match filter_config.filter_type {
            FilterType::ButterworthLowpass => {
                let cutoff = filter_config.cutoff_freq.ok_or_else(|| {
                    ecg_core::config_error!("lowpass filter requires a cutoff frequency")
                })?;
                butterworth_sections(cutoff, sampling_rate, order, false)?
            }
            FilterType::ButterworthHighpass => {
                let cutoff = filter_config.cutoff_freq.ok_or_else(|| {
                    ecg_core::config_error!("highpass filter requires a cutoff frequency")
                })?;
                butterworth_sections(cutoff, sampling_rate, order, true)?
            }
            FilterType::ButterworthBandpass => {
                let (low, high) = match (filter_config.low_cutoff, filter_config.high_cutoff) {
                    (Some(low), Some(high)) => (low, high),
                    _ => {
                        return Err(ecg_core::config_error!(
                            "bandpass filter requires low and high cutoff frequencies"
                        ))
                    }
                };
                if low >= high {
                    return Err(ecg_core::config_error!(
                        "bandpass low cutoff {} Hz must be below high cutoff {} Hz",
                        low,
                        high
                    ));
                }
                let mut sections = butterworth_sections(low, sampling_rate, order, true)?;
                sections.extend(butterworth_sections(high, sampling_rate, order, false)?);
                sections
            }
            FilterType::Notch => {
                return Err(ecg_core::config_error!(
                    "notch response is provided by NotchFilter"
                ))
            }
        };

        Ok(ButterworthFilter {
            filter_config,
            biquads,
            sampling_rate,
        })
    }

    pub fn config(&self) -> &FilterConfig {
        &self.filter_config
    }

    pub fn sampling_rate(&self) -> f64 {
        self.sampling_rate
    }

    pub fn section_count(&self) -> usize {
        self.biquads.len()
    }
}

impl SampleFilter for ButterworthFilter {
    fn process_sample(&mut self, input: f64) -> f64 {
        self.biquads
            .iter_mut()
            .fold(input, |sample, biquad| biquad.process_sample(sample))
    }

    fn prime(&mut self, x0: f64) -> f64 {
        self.biquads
            .iter_mut()
            .fold(x0, |level, biquad| biquad.prime(level))
    }

    fn reset(&mut self) {
        for biquad in &mut self.biquads {
            biquad.reset();
        }
    }

    fn name(&self) -> &str {
        "Butterworth Filter"
    }

    fn box_clone(&self) -> Box<dyn SampleFilter> {
        Box::new(self.clone())
    }
}

/// Notch filter for powerline interference removal
#[derive(Debug, Clone)]
pub struct NotchFilter {
    notch_freq: f64,
    q_factor: f64,
    section: BiquadSection,
}

impl NotchFilter {
    pub fn new(notch_freq: f64, q_factor: f64, sampling_rate: f64) -> EcgResult<Self> {
        check_sample_rate(sampling_rate)?;
        check_corner(notch_freq, sampling_rate)?;
        if !(q_factor.is_finite() && q_factor > 0.0) {
            return Err(ecg_core::config_error!(
                "notch quality factor must be positive, got {}",
                q_factor
            ));
        }

        let omega = 2.0 * PI * notch_freq / sampling_rate;
        let alpha = omega.sin() / (2.0 * q_factor);
        let cos_omega = omega.cos();
        let a0 = 1.0 + alpha;

        let section = BiquadSection::from_coefficients(
            1.0 / a0,
            -2.0 * cos_omega / a0,
            1.0 / a0,
            -2.0 * cos_omega / a0,
            (1.0 - alpha) / a0,
        );

        Ok(NotchFilter {
            notch_freq,
            q_factor,
            section,
        })
    }

    pub fn notch_freq(&self) -> f64 {
        self.notch_freq
    }

    pub fn q_factor(&self) -> f64 {
        self.q_factor
    }
}

impl SampleFilter for NotchFilter {
    fn process_sample(&mut self, input: f64) -> f64 {
        self.section.process_sample(input)
    }

    fn prime(&mut self, x0: f64) -> f64 {
        self.section.prime(x0)
    }

    fn reset(&mut self) {
        self.section.reset();
    }

    fn name(&self) -> &str {
        "Notch Filter"
    }

    fn box_clone(&self) -> Box<dyn SampleFilter> {
        Box::new(self.clone())
    }
}

/// Filter bank for chaining filters in series
#[derive(Clone, Default)]
pub struct FilterBank {
    filters: Vec<Box<dyn SampleFilter>>,
}

impl FilterBank {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_filter(&mut self, filter: Box<dyn SampleFilter>) {
        self.filters.push(filter);
    }

    /// Build the bank described by the monitor's filter settings
    pub fn from_settings(settings: &FilterSettings, sampling_rate: f64) -> EcgResult<Self> {
        check_sample_rate(sampling_rate)?;
        let mut bank = FilterBank::new();

        match (settings.kind, settings.baseline_cutoff_hz, settings.muscle_cutoff_hz) {
            (FilterKind::Bandpass, Some(low), Some(high)) => {
                let bandpass = ButterworthFilter::new(
                    FilterConfig::bandpass(low, high, settings.order),
                    sampling_rate,
                )?;
                bank.add_filter(Box::new(bandpass));
            }
            (FilterKind::Bandpass, None, Some(high)) => {
                let lowpass = ButterworthFilter::new(
                    FilterConfig::lowpass(high, settings.order),
                    sampling_rate,
                )?;
                bank.add_filter(Box::new(lowpass));
            }
            (_, Some(cutoff), _) => {
                let highpass = ButterworthFilter::new(
                    FilterConfig::highpass(cutoff, settings.order),
                    sampling_rate,
                )?;
                bank.add_filter(Box::new(highpass));
            }
            (_, None, _) => {}
        }

        if let Some(freq) = settings.mains.frequency() {
            let notch = NotchFilter::new(freq, DEFAULT_NOTCH_Q, sampling_rate)?;
            bank.add_filter(Box::new(notch));
        }

        debug!(
            stages = bank.len(),
            sampling_rate,
            kind = ?settings.kind,
            "filter bank designed"
        );
        Ok(bank)
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.filters.iter().map(|f| f.name()).collect()
    }

    /// One-shot causal pass over `window`, primed on its first sample
    pub fn run_forward(&self, window: &[f64]) -> Vec<f64> {
        let Some(&first) = window.first() else {
            return Vec::new();
        };
        let mut bank = self.clone();
        bank.prime(first);
        bank.process_block(window)
    }

    /// Forward-backward pass; zero phase shift, squared magnitude response
    pub fn run_zero_phase(&self, window: &[f64]) -> Vec<f64> {
        let mut forward = self.run_forward(window);
        forward.reverse();
        let mut backward = self.run_forward(&forward);
        backward.reverse();
        backward
    }
}

impl SampleFilter for FilterBank {
    fn process_sample(&mut self, input: f64) -> f64 {
        self.filters
            .iter_mut()
            .fold(input, |sample, filter| filter.process_sample(sample))
    }

    fn prime(&mut self, x0: f64) -> f64 {
        // Each stage settles on the steady output of the stage before it
        self.filters
            .iter_mut()
            .fold(x0, |level, filter| filter.prime(level))
    }

    fn reset(&mut self) {
        for filter in &mut self.filters {
            filter.reset();
        }
    }

    fn name(&self) -> &str {
        "Filter Bank"
    }

    fn box_clone(&self) -> Box<dyn SampleFilter> {
        Box::new(self.clone())
    }
}

impl std::fmt::Debug for FilterBank {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterBank")
            .field("filters", &self.names())
            .finish()
    }
}

/// Stateless window filter; every call starts from a freshly primed bank
#[derive(Debug, Clone)]
pub struct SignalFilter {
    bank: FilterBank,
    mode: FilterMode,
    sample_rate: f64,
}

impl SignalFilter {
    pub fn new(settings: &FilterSettings, sample_rate: f64) -> EcgResult<Self> {
        Ok(Self {
            bank: FilterBank::from_settings(settings, sample_rate)?,
            mode: settings.mode,
            sample_rate,
        })
    }

    /// Filter a window with the default corners for `kind`: a 0.5 Hz high-pass,
    /// or a 0.5 to 40 Hz band-pass, both order 2
    pub fn apply(window: &[f64], kind: FilterKind, sample_rate: f64) -> EcgResult<Vec<f64>> {
        let settings = FilterSettings {
            kind,
            muscle_cutoff_hz: Some(40.0),
            ..FilterSettings::default()
        };
        Ok(Self::new(&settings, sample_rate)?.filter_window(window))
    }

    /// Same-length filtered copy; short windows pass through unmodified
    pub fn filter_window(&self, window: &[f64]) -> Vec<f64> {
        if window.len() < MIN_FILTER_WINDOW || self.bank.is_empty() {
            return window.to_vec();
        }
        match self.mode {
            FilterMode::Causal => self.bank.run_forward(window),
            FilterMode::ZeroPhase => self.bank.run_zero_phase(window),
        }
    }

    pub fn mode(&self) -> FilterMode {
        self.mode
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn bank(&self) -> &FilterBank {
        &self.bank
    }
}

/// Causal filter for one lead that carries its state across ticks.
///
/// Only samples that arrived since the previous tick are filtered; the output
/// history is kept in a ring the same size as the lead buffer.
#[derive(Debug, Clone)]
pub struct StreamingFilter {
    prototype: FilterBank,
    bank: FilterBank,
    filtered: VecDeque<f64>,
    capacity: usize,
    consumed: u64,
    generation: u64,
    primed: bool,
}

impl StreamingFilter {
    pub fn new(bank: FilterBank, capacity: usize) -> Self {
        Self {
            prototype: bank.clone(),
            bank,
            filtered: VecDeque::with_capacity(capacity),
            capacity,
            consumed: 0,
            generation: 0,
            primed: false,
        }
    }

    /// Advance over the new samples in `snapshot` and return the filtered window
    pub fn update(&mut self, snapshot: &BufferSnapshot) -> Vec<f64> {
        if snapshot.generation != self.generation || snapshot.total_pushed < self.consumed {
            debug!(lead = %snapshot.lead, "lead buffer restarted, resetting filter state");
            self.reset();
            self.generation = snapshot.generation;
        }

        let arrived = (snapshot.total_pushed - self.consumed) as usize;
        let available = arrived.min(snapshot.filled);
        if arrived > available {
            warn!(
                lead = %snapshot.lead,
                missed = arrived - available,
                "samples evicted before they could be filtered"
            );
        }

        let start = snapshot.window.len() - available;
        for &sample in &snapshot.window[start..] {
            if !self.primed {
                self.bank.prime(sample);
                self.primed = true;
            }
            let output = self.bank.process_sample(sample);
            if self.filtered.len() == self.capacity {
                self.filtered.pop_front();
            }
            self.filtered.push_back(output);
        }
        self.consumed = snapshot.total_pushed;

        if snapshot.filled < MIN_FILTER_WINDOW || self.prototype.is_empty() {
            return snapshot.window.clone();
        }

        let pad_value = self.filtered.front().copied().unwrap_or(0.0);
        let pad = snapshot.window.len().saturating_sub(self.filtered.len());
        let mut window = Vec::with_capacity(snapshot.window.len());
        window.extend(std::iter::repeat(pad_value).take(pad));
        window.extend(self.filtered.iter().copied());
        window
    }

    pub fn reset(&mut self) {
        self.bank = self.prototype.clone();
        self.filtered.clear();
        self.consumed = 0;
        self.primed = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MainsFilter;
    use ecg_core::{BufferPhase, Lead, LeadBuffer, LeadFrame, LeadSet};
    use proptest::prelude::*;

    fn sine(freq: f64, fs: f64, n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| (2.0 * PI * freq * i as f64 / fs).sin())
            .collect()
    }

    fn rms(data: &[f64]) -> f64 {
        (data.iter().map(|x| x * x).sum::<f64>() / data.len() as f64).sqrt()
    }

    #[test]
    fn test_cutoff_above_nyquist_rejected() {
        let result = ButterworthFilter::new(FilterConfig::lowpass(30.0, 2), 50.0);
        assert!(matches!(result, Err(EcgError::CutoffAboveNyquist { .. })));

        let result = ButterworthFilter::new(FilterConfig::highpass(25.0, 2), 50.0);
        assert!(matches!(result, Err(EcgError::CutoffAboveNyquist { .. })));

        assert!(NotchFilter::new(50.0, 30.0, 50.0).is_err());
        assert!(ButterworthFilter::new(FilterConfig::highpass(0.5, 2), 0.0).is_err());
    }

    #[test]
    fn test_bandpass_corner_order() {
        let result = ButterworthFilter::new(FilterConfig::bandpass(40.0, 0.5, 2), 250.0);
        assert!(matches!(result, Err(EcgError::InvalidConfig { .. })));
    }

    #[test]
    fn test_section_count_follows_order() {
        let second = ButterworthFilter::new(FilterConfig::highpass(0.5, 2), 50.0).unwrap();
        assert_eq!(second.section_count(), 1);
        let third = ButterworthFilter::new(FilterConfig::highpass(0.5, 3), 50.0).unwrap();
        assert_eq!(third.section_count(), 2);
        let band = ButterworthFilter::new(FilterConfig::bandpass(0.5, 40.0, 2), 250.0).unwrap();
        assert_eq!(band.section_count(), 2);
    }

    #[test]
    fn test_butterworth_lowpass_attenuates() {
        let fs = 250.0;
        let mut filter = ButterworthFilter::new(FilterConfig::lowpass(10.0, 2), fs).unwrap();

        let pass = filter.process_block(&sine(2.0, fs, 1000));
        filter.reset();
        let stop = filter.process_block(&sine(80.0, fs, 1000));

        assert!(rms(&pass[500..]) > 0.65);
        assert!(rms(&stop[500..]) < 0.05);
    }

    #[test]
    fn test_highpass_removes_offset() {
        let fs = 50.0;
        let mut filter = ButterworthFilter::new(FilterConfig::highpass(0.5, 2), fs).unwrap();
        let output = filter.process_block(&vec![500.0; 400]);
        assert!(output[399].abs() < 1.0);
    }

    #[test]
    fn test_primed_highpass_starts_settled() {
        let fs = 50.0;
        let mut filter = ButterworthFilter::new(FilterConfig::highpass(0.5, 2), fs).unwrap();
        filter.prime(500.0);
        let output = filter.process_block(&[500.0; 20]);
        assert!(output.iter().all(|y| y.abs() < 1e-9));
    }

    #[test]
    fn test_notch_rejects_mains() {
        let fs = 500.0;
        let mut notch = NotchFilter::new(50.0, 30.0, fs).unwrap();
        let output = notch.process_block(&sine(50.0, fs, 2000));
        assert!(rms(&output[1500..]) < 0.05);
    }

    #[test]
    fn test_settings_build_expected_stages() {
        let settings = FilterSettings::default();
        let bank = FilterBank::from_settings(&settings, 20.0).unwrap();
        assert_eq!(bank.names(), vec!["Butterworth Filter"]);

        let settings = FilterSettings {
            kind: FilterKind::Bandpass,
            muscle_cutoff_hz: Some(40.0),
            mains: MainsFilter::Hz50,
            ..FilterSettings::default()
        };
        let bank = FilterBank::from_settings(&settings, 500.0).unwrap();
        assert_eq!(bank.names(), vec!["Butterworth Filter", "Notch Filter"]);

        // Neither the 40 Hz corner nor the 50 Hz notch fits under a 10 Hz Nyquist
        assert!(FilterBank::from_settings(&settings, 20.0).is_err());
    }

    #[test]
    fn test_short_window_passes_through() {
        let window = vec![1.0, 5.0, 2.0, 8.0];
        let filtered = SignalFilter::apply(&window, FilterKind::Highpass, 50.0).unwrap();
        assert_eq!(filtered, window);
    }

    #[test]
    fn test_zero_phase_keeps_peak_position() {
        let fs = 50.0;
        let mut window = vec![0.0; 100];
        window[50] = 300.0;
        let settings = FilterSettings {
            mode: FilterMode::ZeroPhase,
            ..FilterSettings::default()
        };
        let filter = SignalFilter::new(&settings, fs).unwrap();
        let output = filter.filter_window(&window);

        let argmax = output
            .iter()
            .enumerate()
            .fold(0, |best, (i, v)| if *v > output[best] { i } else { best });
        assert_eq!(argmax, 50);
    }

    #[test]
    fn test_streaming_filter_matches_one_shot_pass() {
        let fs = 50.0;
        let bank = FilterBank::from_settings(&FilterSettings::default(), fs).unwrap();
        let mut streaming = StreamingFilter::new(bank.clone(), 40);
        let mut buffer = LeadBuffer::new(40).unwrap();
        let input: Vec<f64> = (0..30).map(|i| 500.0 + (i % 7) as f64 * 10.0).collect();

        let mut last = Vec::new();
        for chunk in input.chunks(3) {
            for &x in chunk {
                buffer.push(x);
            }
            let snapshot = BufferSnapshot {
                lead: Lead::II,
                window: buffer.snapshot(),
                filled: buffer.len(),
                total_pushed: buffer.total_pushed(),
                generation: buffer.generation(),
                phase: BufferPhase::Warming,
            };
            last = streaming.update(&snapshot);
        }

        let expected = bank.run_forward(&input);
        assert_eq!(last.len(), 40);
        for (got, want) in last[10..].iter().zip(expected.iter()) {
            assert!((got - want).abs() < 1e-9);
        }
    }

    #[test]
    fn test_streaming_filter_unchanged_buffer_is_idempotent() {
        let bank = FilterBank::from_settings(&FilterSettings::default(), 50.0).unwrap();
        let mut streaming = StreamingFilter::new(bank, 20);
        let mut buffer = LeadBuffer::new(20).unwrap();
        for i in 0..25 {
            buffer.push(i as f64);
        }
        let snapshot = BufferSnapshot {
            lead: Lead::I,
            window: buffer.snapshot(),
            filled: buffer.len(),
            total_pushed: buffer.total_pushed(),
            generation: buffer.generation(),
            phase: buffer.phase(),
        };

        let first = streaming.update(&snapshot);
        let second = streaming.update(&snapshot);
        assert_eq!(first, second);
    }

    #[test]
    fn test_streaming_filter_forgets_cleared_buffer() {
        let bank = FilterBank::from_settings(&FilterSettings::default(), 50.0).unwrap();
        let mut streaming = StreamingFilter::new(bank, 20);
        let mut set = LeadSet::new(&[Lead::II], 20).unwrap();
        let mut frame = LeadFrame::new();

        for i in 0..20 {
            frame.set(Lead::II, if i % 5 == 0 { 900.0 } else { 500.0 });
            set.push_frame(&frame).unwrap();
        }
        streaming.update(&set.snapshot()[0]);

        set.clear();
        frame.set(Lead::II, 500.0);
        for _ in 0..10 {
            set.push_frame(&frame).unwrap();
        }
        let output = streaming.update(&set.snapshot()[0]);

        assert_eq!(output.len(), 20);
        let (lo, hi) = output
            .iter()
            .fold((f64::MAX, f64::MIN), |(lo, hi), v| (lo.min(*v), hi.max(*v)));
        assert!(hi - lo < 1e-6, "range {}", hi - lo);
    }

    proptest! {
        #[test]
        fn prop_filter_preserves_length(window in proptest::collection::vec(-1000.0f64..1000.0, 0..200),
                                        zero_phase in any::<bool>()) {
            let settings = FilterSettings {
                mode: if zero_phase { FilterMode::ZeroPhase } else { FilterMode::Causal },
                ..FilterSettings::default()
            };
            let filter = SignalFilter::new(&settings, 50.0).unwrap();
            prop_assert_eq!(filter.filter_window(&window).len(), window.len());
        }
    }
}
