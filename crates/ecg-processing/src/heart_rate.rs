//! Beats-per-minute from R-peak spacing

use ecg_core::{BeatRecord, HeartRate};

/// Converts a detection pass into a BPM value.
///
/// The rate is the plain mean of all RR intervals, truncated to an integer; a
/// missed or spurious beat shifts it, there is no outlier rejection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeartRateEstimator {
    sample_rate: f64,
}

impl HeartRateEstimator {
    pub fn new(sample_rate: f64) -> Self {
        Self { sample_rate }
    }

    pub fn estimate(&self, beats: &BeatRecord) -> HeartRate {
        let peaks = beats.peaks();
        if peaks.len() < 2 || !(self.sample_rate.is_finite() && self.sample_rate > 0.0) {
            return HeartRate::Undetermined;
        }

        let (first, last) = (peaks[0], peaks[peaks.len() - 1]);
        let mean_interval = (last - first) as f64 / (peaks.len() - 1) as f64;
        if mean_interval <= 0.0 {
            return HeartRate::Undetermined;
        }

        HeartRate::Bpm((60.0 * self.sample_rate / mean_interval) as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::beat_detector::BeatDetector;
    use crate::config::DetectionConfig;
    use std::f64::consts::PI;

    #[test]
    fn test_fewer_than_two_beats_undetermined() {
        let estimator = HeartRateEstimator::new(50.0);
        assert_eq!(estimator.estimate(&BeatRecord::empty()), HeartRate::Undetermined);
        assert_eq!(estimator.estimate(&BeatRecord::new(vec![12])), HeartRate::Undetermined);
    }

    #[test]
    fn test_regular_rhythm() {
        let estimator = HeartRateEstimator::new(50.0);
        // 40 samples at 50 Hz is 0.8 s
        assert_eq!(estimator.estimate(&BeatRecord::new(vec![5, 45, 85])), HeartRate::Bpm(75));
    }

    #[test]
    fn test_bpm_from_sinusoidal_peaks() {
        let fs = 50.0;
        let period = 40.0;
        let signal: Vec<f64> = (0..200)
            .map(|i| (2.0 * PI * (i as f64 - 5.0) / period).cos())
            .collect();

        let detection = BeatDetector::new(&DetectionConfig::default(), fs).detect(&signal);
        let bpm = HeartRateEstimator::new(fs)
            .estimate(&detection.beats)
            .bpm()
            .unwrap();

        let expected = (60.0 / (period / fs)).round() as i64;
        assert!((bpm as i64 - expected).abs() <= 1, "bpm {bpm} vs {expected}");
    }

    #[test]
    fn test_extra_beat_skews_average() {
        // Known limitation: one spurious beat at 100 raises a 75 bpm rhythm to 85
        let estimator = HeartRateEstimator::new(50.0);
        let beats = BeatRecord::new(vec![0, 40, 80, 100, 140]);
        assert_eq!(estimator.estimate(&beats), HeartRate::Bpm(85));
    }

    #[test]
    fn test_truncates() {
        // 60 * 50 / 33 = 90.9
        let estimator = HeartRateEstimator::new(50.0);
        assert_eq!(estimator.estimate(&BeatRecord::new(vec![0, 33])), HeartRate::Bpm(90));
    }
}
