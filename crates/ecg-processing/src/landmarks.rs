//! P, Q, S and T search around detected R peaks

use crate::config::LandmarkConfig;
use ecg_core::{BeatRecord, Landmark, WaveKind};

/// Search windows converted to sample counts for one sample rate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LandmarkAnnotator {
    qs_window: usize,
    p_near: usize,
    p_far: usize,
    t_near: usize,
    t_far: usize,
}

fn samples(seconds: f64, sample_rate: f64) -> usize {
    let count = seconds * sample_rate;
    if count.is_finite() && count > 0.0 {
        count as usize
    } else {
        0
    }
}

impl LandmarkAnnotator {
    pub fn new(config: &LandmarkConfig, sample_rate: f64) -> Self {
        Self {
            qs_window: samples(config.qs_window_s, sample_rate),
            p_near: samples(config.p_near_s, sample_rate),
            p_far: samples(config.p_far_s, sample_rate),
            t_near: samples(config.t_near_s, sample_rate),
            t_far: samples(config.t_far_s, sample_rate),
        }
    }

    /// Q and S half-window in samples
    pub fn qs_window(&self) -> usize {
        self.qs_window
    }

    /// Annotate every beat in `signal`; output is ordered by beat, then P, Q, R, S, T.
    ///
    /// Each search is independent and silently skipped when its window is empty or
    /// falls outside the signal.
    pub fn annotate(&self, signal: &[f64], beats: &BeatRecord) -> Vec<Landmark> {
        let mut landmarks = Vec::with_capacity(beats.len() * 5);

        for &r in beats.peaks() {
            if r >= signal.len() {
                continue;
            }

            let q = argmin(signal, r.saturating_sub(self.qs_window), r);
            let s = argmin(signal, r + 1, (r + self.qs_window + 1).min(signal.len()));
            let p = q.and_then(|q| {
                argmax(signal, q.saturating_sub(self.p_far), q.saturating_sub(self.p_near))
            });
            let t = s.and_then(|s| {
                argmax(
                    signal,
                    s + self.t_near + 1,
                    (s + self.t_far + 1).min(signal.len()),
                )
            });

            let found = [
                (WaveKind::P, p),
                (WaveKind::Q, q),
                (WaveKind::R, Some(r)),
                (WaveKind::S, s),
                (WaveKind::T, t),
            ];
            landmarks.extend(
                found
                    .into_iter()
                    .filter_map(|(kind, idx)| idx.map(|i| Landmark::new(kind, i, signal[i]))),
            );
        }

        landmarks
    }
}

/// Earliest index of the minimum over `start..end`
fn argmin(signal: &[f64], start: usize, end: usize) -> Option<usize> {
    extreme(signal, start, end, |candidate, best| candidate < best)
}

/// Earliest index of the maximum over `start..end`
fn argmax(signal: &[f64], start: usize, end: usize) -> Option<usize> {
    extreme(signal, start, end, |candidate, best| candidate > best)
}

fn extreme(
    signal: &[f64],
    start: usize,
    end: usize,
    better: impl Fn(f64, f64) -> bool,
) -> Option<usize> {
    let end = end.min(signal.len());
    if start >= end {
        return None;
    }
    let mut best = start;
    for idx in start + 1..end {
        if better(signal[idx], signal[best]) {
            best = idx;
        }
    }
    Some(best)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn annotator(fs: f64) -> LandmarkAnnotator {
        LandmarkAnnotator::new(&LandmarkConfig::default(), fs)
    }

    fn find(landmarks: &[Landmark], kind: WaveKind) -> Option<usize> {
        landmarks.iter().find(|l| l.kind == kind).map(|l| l.index)
    }

    #[test]
    fn test_window_sizes_at_50_hz() {
        let annotator = annotator(50.0);
        assert_eq!(annotator.qs_window(), 10);
        assert_eq!(annotator, LandmarkAnnotator {
            qs_window: 10,
            p_near: 5,
            p_far: 10,
            t_near: 7,
            t_far: 17,
        });
    }

    #[test]
    fn test_full_cycle_located() {
        let mut signal = vec![0.0; 100];
        signal[22] = 20.0; // P
        signal[30] = -15.0; // Q
        signal[35] = 300.0; // R
        signal[38] = -40.0; // S
        signal[50] = 60.0; // T

        let landmarks = annotator(50.0).annotate(&signal, &BeatRecord::new(vec![35]));
        assert_eq!(find(&landmarks, WaveKind::Q), Some(30));
        assert_eq!(find(&landmarks, WaveKind::S), Some(38));
        assert_eq!(find(&landmarks, WaveKind::P), Some(22));
        assert_eq!(find(&landmarks, WaveKind::T), Some(50));
        assert_eq!(find(&landmarks, WaveKind::R), Some(35));

        let kinds: Vec<WaveKind> = landmarks.iter().map(|l| l.kind).collect();
        assert_eq!(kinds, vec![WaveKind::P, WaveKind::Q, WaveKind::R, WaveKind::S, WaveKind::T]);
        assert_eq!(landmarks[2].amplitude, 300.0);
    }

    #[test]
    fn test_peak_at_window_start_has_no_q_or_p() {
        let signal: Vec<f64> = (0..40).map(|i| if i == 0 { 100.0 } else { -(i as f64) }).collect();
        let landmarks = annotator(50.0).annotate(&signal, &BeatRecord::new(vec![0]));
        assert_eq!(find(&landmarks, WaveKind::Q), None);
        assert_eq!(find(&landmarks, WaveKind::P), None);
        assert_eq!(find(&landmarks, WaveKind::S), Some(10));
    }

    #[test]
    fn test_peak_near_window_end_has_no_t() {
        let mut signal = vec![0.0; 80];
        signal[75] = 300.0;
        signal[77] = -50.0;
        let landmarks = annotator(50.0).annotate(&signal, &BeatRecord::new(vec![75]));
        assert_eq!(find(&landmarks, WaveKind::S), Some(77));
        assert_eq!(find(&landmarks, WaveKind::T), None);
    }

    #[test]
    fn test_ties_resolve_to_earliest() {
        let signal = vec![0.0; 60];
        let landmarks = annotator(50.0).annotate(&signal, &BeatRecord::new(vec![30]));
        assert_eq!(find(&landmarks, WaveKind::Q), Some(20));
        assert_eq!(find(&landmarks, WaveKind::S), Some(31));
        assert_eq!(find(&landmarks, WaveKind::P), Some(10));
        assert_eq!(find(&landmarks, WaveKind::T), Some(39));
    }

    #[test]
    fn test_no_beats_no_landmarks() {
        let landmarks = annotator(50.0).annotate(&[1.0; 50], &BeatRecord::empty());
        assert!(landmarks.is_empty());
    }
}
