//! Einthoven and Goldberger relations for the limb leads

use ecg_core::{Lead, LeadFrame};

/// The four limb leads computed from leads I and II
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DerivedLimbLeads {
    pub iii: f64,
    pub avr: f64,
    pub avl: f64,
    pub avf: f64,
}

impl DerivedLimbLeads {
    pub fn get(&self, lead: Lead) -> Option<f64> {
        match lead {
            Lead::III => Some(self.iii),
            Lead::AVR => Some(self.avr),
            Lead::AVL => Some(self.avl),
            Lead::AVF => Some(self.avf),
            _ => None,
        }
    }
}

/// Compute III, aVR, aVL and aVF for one sampling instant
pub fn derive_limb_leads(lead_i: f64, lead_ii: f64) -> DerivedLimbLeads {
    let iii = lead_ii - lead_i;
    DerivedLimbLeads {
        iii,
        avr: -(lead_i + lead_ii) / 2.0,
        avl: (lead_i - iii) / 2.0,
        avf: (lead_ii + iii) / 2.0,
    }
}

/// Fill in the derivable limb leads of `frame` from its leads I and II.
///
/// Directly acquired values are never overwritten; precordial leads pass through
/// unchanged. A frame without both I and II is returned as is.
pub fn complete_frame(frame: &LeadFrame) -> LeadFrame {
    let mut completed = *frame;
    if let (Some(lead_i), Some(lead_ii)) = (frame.get(Lead::I), frame.get(Lead::II)) {
        let derived = derive_limb_leads(lead_i, lead_ii);
        for lead in [Lead::III, Lead::AVR, Lead::AVL, Lead::AVF] {
            if !completed.contains(lead) {
                if let Some(value) = derived.get(lead) {
                    completed.set(lead, value);
                }
            }
        }
    }
    completed
}

#[cfg(test)]
mod tests {
    use super::*;
    use ecg_core::ChannelLayout;
    use proptest::prelude::*;

    #[test]
    fn test_reference_values() {
        let derived = derive_limb_leads(100.0, 150.0);
        assert_eq!(derived.iii, 50.0);
        assert_eq!(derived.avr, -125.0);
        assert_eq!(derived.avl, 25.0);
        assert_eq!(derived.avf, 100.0);
    }

    #[test]
    fn test_complete_frame_from_eight_channels() {
        let layout = ChannelLayout::eight_channel();
        let raw = [100.0, 4.0, 5.0, 150.0, 3.0, 6.0, 1.0, 2.0];
        let frame = LeadFrame::from_channels(&layout, &raw).unwrap();
        let completed = complete_frame(&frame);

        assert_eq!(completed.get(Lead::III), Some(50.0));
        assert_eq!(completed.get(Lead::AVF), Some(100.0));
        assert_eq!(completed.get(Lead::V1), Some(1.0));
        assert_eq!(completed.get(Lead::V4), Some(4.0));
        assert_eq!(completed.iter().count(), Lead::COUNT);
    }

    #[test]
    fn test_acquired_lead_is_not_overwritten() {
        let mut frame = LeadFrame::new();
        frame.set(Lead::I, 1.0);
        frame.set(Lead::II, 2.0);
        frame.set(Lead::III, 7.0);
        let completed = complete_frame(&frame);
        assert_eq!(completed.get(Lead::III), Some(7.0));
        assert_eq!(completed.get(Lead::AVR), Some(-1.5));
    }

    #[test]
    fn test_single_lead_frame_unchanged() {
        let mut frame = LeadFrame::new();
        frame.set(Lead::II, 512.0);
        assert_eq!(complete_frame(&frame), frame);
    }

    proptest! {
        #[test]
        fn prop_einthoven_and_goldberger(lead_i in -5000.0f64..5000.0, lead_ii in -5000.0f64..5000.0) {
            let derived = derive_limb_leads(lead_i, lead_ii);
            prop_assert!((derived.iii - (lead_ii - lead_i)).abs() < 1e-9);
            prop_assert!((derived.avr + derived.avl + derived.avf).abs() < 1e-9);
        }
    }
}
