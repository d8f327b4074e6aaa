//! Heart-rate trajectories for the synthetic generator

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Lowest rate a pattern may produce; keeps beat scheduling finite
pub const MIN_RHYTHM_BPM: f64 = 20.0;

/// How the instantaneous heart rate evolves over simulated time
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RhythmPattern {
    /// Fixed rate
    #[default]
    Constant,
    /// Linear change from the base rate to `target_bpm` over `duration_s`, then hold
    Ramp { target_bpm: f64, duration_s: f64 },
    /// Rate modulated by breathing (respiratory sinus arrhythmia)
    RespiratorySinus { depth_bpm: f64, breath_hz: f64 },
}

impl RhythmPattern {
    /// Instantaneous rate at `time` seconds for a base rate of `base_bpm`
    pub fn bpm_at(&self, time: f64, base_bpm: f64) -> f64 {
        let bpm = match *self {
            RhythmPattern::Constant => base_bpm,
            RhythmPattern::Ramp {
                target_bpm,
                duration_s,
            } => {
                if duration_s <= 0.0 || time >= duration_s {
                    target_bpm
                } else {
                    base_bpm + (target_bpm - base_bpm) * (time / duration_s)
                }
            }
            RhythmPattern::RespiratorySinus {
                depth_bpm,
                breath_hz,
            } => base_bpm + depth_bpm * (2.0 * PI * breath_hz * time).sin(),
        };
        bpm.max(MIN_RHYTHM_BPM)
    }

    pub fn description(&self) -> &'static str {
        match self {
            RhythmPattern::Constant => "Regular sinus rhythm",
            RhythmPattern::Ramp { .. } => "Rate ramp",
            RhythmPattern::RespiratorySinus { .. } => "Respiratory sinus arrhythmia",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant() {
        assert_eq!(RhythmPattern::Constant.bpm_at(12.5, 72.0), 72.0);
    }

    #[test]
    fn test_ramp_then_hold() {
        let ramp = RhythmPattern::Ramp {
            target_bpm: 120.0,
            duration_s: 10.0,
        };
        assert_eq!(ramp.bpm_at(0.0, 60.0), 60.0);
        assert!((ramp.bpm_at(5.0, 60.0) - 90.0).abs() < 1e-9);
        assert_eq!(ramp.bpm_at(30.0, 60.0), 120.0);
    }

    #[test]
    fn test_respiratory_modulation_bounds() {
        let rsa = RhythmPattern::RespiratorySinus {
            depth_bpm: 6.0,
            breath_hz: 0.25,
        };
        for i in 0..400 {
            let bpm = rsa.bpm_at(i as f64 * 0.05, 70.0);
            assert!((64.0..=76.0).contains(&bpm));
        }
        assert!((rsa.bpm_at(1.0, 70.0) - 76.0).abs() < 1e-9);
    }

    #[test]
    fn test_rate_floor() {
        let ramp = RhythmPattern::Ramp {
            target_bpm: 0.0,
            duration_s: 0.0,
        };
        assert_eq!(ramp.bpm_at(1.0, 60.0), MIN_RHYTHM_BPM);
    }

    #[test]
    fn test_serde_tagging() {
        let json = serde_json::to_string(&RhythmPattern::RespiratorySinus {
            depth_bpm: 4.0,
            breath_hz: 0.2,
        })
        .unwrap();
        assert!(json.contains("\"kind\":\"respiratory_sinus\""));
        let back: RhythmPattern = serde_json::from_str(&json).unwrap();
        assert_eq!(back.description(), "Respiratory sinus arrhythmia");
    }
}
