//! R-peak detection with an adaptive amplitude threshold and a spacing floor

use crate::config::DetectionConfig;
use ecg_core::{BeatRecord, WindowStats};
use tracing::debug;

/// Result of one detection pass
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub beats: BeatRecord,
    /// `None` when the window was too short to evaluate
    pub threshold: Option<f64>,
}

impl Detection {
    fn none() -> Self {
        Self {
            beats: BeatRecord::empty(),
            threshold: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BeatDetector {
    threshold_k: f64,
    min_distance: usize,
    min_window: usize,
}

impl BeatDetector {
    pub fn new(config: &DetectionConfig, sample_rate: f64) -> Self {
        let spacing = sample_rate * 60.0 / config.max_heart_rate_bpm;
        // Sample counts truncate; a floor of one sample still forbids duplicates
        let min_distance = if spacing.is_finite() && spacing >= 1.0 {
            spacing as usize
        } else {
            1
        };

        Self {
            threshold_k: config.threshold_k,
            min_distance,
            min_window: config.min_window,
        }
    }

    /// Minimum index distance between two reported peaks
    pub fn min_distance(&self) -> usize {
        self.min_distance
    }

    pub fn detect(&self, signal: &[f64]) -> Detection {
        if signal.len() < self.min_window {
            return Detection::none();
        }

        let stats = WindowStats::calculate(signal);
        let threshold = stats.mean + self.threshold_k * stats.std_dev;

        let candidates: Vec<usize> = local_maxima(signal)
            .into_iter()
            .filter(|&idx| signal[idx] > threshold)
            .collect();

        let peaks = enforce_spacing(signal, candidates, self.min_distance);
        debug!(
            peaks = peaks.len(),
            threshold,
            min_distance = self.min_distance,
            "beat detection pass"
        );

        Detection {
            beats: BeatRecord::new(peaks),
            threshold: Some(threshold),
        }
    }
}

/// Indices of local maxima; a flat top reports its first sample.
///
/// A peak needs a strictly lower neighbour on each side, so the first and last
/// samples never qualify.
pub fn local_maxima(signal: &[f64]) -> Vec<usize> {
    let mut peaks = Vec::new();
    if signal.len() < 3 {
        return peaks;
    }

    let last = signal.len() - 1;
    let mut i = 1;
    while i < last {
        if signal[i - 1] < signal[i] {
            let mut plateau_end = i;
            while plateau_end < last && signal[plateau_end + 1] == signal[i] {
                plateau_end += 1;
            }
            if plateau_end < last && signal[plateau_end + 1] < signal[i] {
                peaks.push(i);
            }
            i = plateau_end + 1;
        } else {
            i += 1;
        }
    }
    peaks
}

/// Keep the tallest candidates first, dropping any closer than `min_distance`
/// to one already kept; equal heights favour the earlier index
fn enforce_spacing(signal: &[f64], mut candidates: Vec<usize>, min_distance: usize) -> Vec<usize> {
    candidates.sort_by(|&a, &b| signal[b].total_cmp(&signal[a]).then(a.cmp(&b)));

    let mut kept: Vec<usize> = Vec::with_capacity(candidates.len());
    for idx in candidates {
        if kept.iter().all(|&k| k.abs_diff(idx) >= min_distance) {
            kept.push(idx);
        }
    }
    kept.sort_unstable();
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn detector(fs: f64) -> BeatDetector {
        BeatDetector::new(&DetectionConfig::default(), fs)
    }

    fn two_spike_window() -> Vec<f64> {
        let mut window = vec![0.0; 70];
        window.extend([50.0, 300.0, 50.0, 0.0, -50.0, -300.0, -50.0, 0.0, 50.0, 300.0]);
        window
    }

    #[test]
    fn test_spacing_floor_at_120_bpm() {
        assert_eq!(detector(50.0).min_distance(), 25);
        assert_eq!(detector(20.0).min_distance(), 10);
    }

    #[test]
    fn test_two_spike_scenario_yields_one_peak() {
        let detection = detector(50.0).detect(&two_spike_window());
        // The spike at 79 sits on the last sample and has no right neighbour
        assert_eq!(detection.beats.peaks(), &[71]);
        assert!(detection.threshold.is_some());
    }

    #[test]
    fn test_short_window_reports_nothing() {
        let detection = detector(50.0).detect(&[0.0, 5.0, 0.0, 5.0, 0.0]);
        assert!(detection.beats.is_empty());
        assert_eq!(detection.threshold, None);
    }

    #[test]
    fn test_flat_window_has_no_peaks() {
        let detection = detector(50.0).detect(&[3.0; 100]);
        assert!(detection.beats.is_empty());
    }

    #[test]
    fn test_plateau_reports_left_edge() {
        let signal = [0.0, 1.0, 4.0, 4.0, 4.0, 1.0, 0.0];
        assert_eq!(local_maxima(&signal), vec![2]);

        // A rising edge into the window end is not a peak
        assert!(local_maxima(&[0.0, 1.0, 2.0, 2.0]).is_empty());
    }

    #[test]
    fn test_equal_heights_keep_earliest() {
        let mut signal = vec![0.0; 40];
        signal[10] = 100.0;
        signal[20] = 100.0;
        let detection = detector(50.0).detect(&signal);
        assert_eq!(detection.beats.peaks(), &[10]);
    }

    #[test]
    fn test_taller_peak_suppresses_close_neighbour() {
        let mut signal = vec![0.0; 60];
        signal[10] = 80.0;
        signal[20] = 100.0;
        signal[50] = 90.0;
        let detection = detector(50.0).detect(&signal);
        assert_eq!(detection.beats.peaks(), &[20, 50]);
    }

    #[test]
    fn test_peaks_below_threshold_ignored() {
        let mut signal = vec![0.0; 100];
        signal[20] = 100.0;
        signal[60] = 100.0;
        signal[85] = 1.0;
        let detection = detector(50.0).detect(&signal);
        assert_eq!(detection.beats.peaks(), &[20, 60]);
    }

    proptest! {
        #[test]
        fn prop_peak_spacing(signal in proptest::collection::vec(-500.0f64..500.0, 10..300),
                             fs in 10.0f64..250.0) {
            let detector = detector(fs);
            let detection = detector.detect(&signal);
            for pair in detection.beats.peaks().windows(2) {
                prop_assert!(pair[1] - pair[0] >= detector.min_distance());
            }
        }
    }
}
