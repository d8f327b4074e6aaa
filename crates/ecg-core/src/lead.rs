//! Lead identifiers, acquisition layouts and test profiles

use crate::error::{EcgError, EcgResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The twelve standard ECG leads
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Lead {
    I,
    II,
    III,
    #[serde(rename = "aVR")]
    AVR,
    #[serde(rename = "aVL")]
    AVL,
    #[serde(rename = "aVF")]
    AVF,
    V1,
    V2,
    V3,
    V4,
    V5,
    V6,
}

impl Lead {
    /// Number of distinct leads
    pub const COUNT: usize = 12;

    /// All leads in conventional 12-lead display order
    pub const ALL: [Lead; Lead::COUNT] = [
        Lead::I,
        Lead::II,
        Lead::III,
        Lead::AVR,
        Lead::AVL,
        Lead::AVF,
        Lead::V1,
        Lead::V2,
        Lead::V3,
        Lead::V4,
        Lead::V5,
        Lead::V6,
    ];

    /// Dense index into per-lead arrays
    pub fn index(self) -> usize {
        self as usize
    }

    /// Conventional display name
    pub fn name(self) -> &'static str {
        match self {
            Lead::I => "I",
            Lead::II => "II",
            Lead::III => "III",
            Lead::AVR => "aVR",
            Lead::AVL => "aVL",
            Lead::AVF => "aVF",
            Lead::V1 => "V1",
            Lead::V2 => "V2",
            Lead::V3 => "V3",
            Lead::V4 => "V4",
            Lead::V5 => "V5",
            Lead::V6 => "V6",
        }
    }

    /// Limb leads that can be computed from leads I and II
    pub fn is_derivable(self) -> bool {
        matches!(self, Lead::III | Lead::AVR | Lead::AVL | Lead::AVF)
    }

    pub fn is_precordial(self) -> bool {
        matches!(
            self,
            Lead::V1 | Lead::V2 | Lead::V3 | Lead::V4 | Lead::V5 | Lead::V6
        )
    }
}

impl fmt::Display for Lead {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Lead {
    type Err = EcgError;

    /// Accepts the display names plus the "Lead II" / "L2" spellings used by acquisition hardware
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let name = trimmed.strip_prefix("Lead ").unwrap_or(trimmed);

        let lead = match name {
            "I" | "L1" => Lead::I,
            "II" | "L2" => Lead::II,
            "III" | "L3" => Lead::III,
            "aVR" | "AVR" => Lead::AVR,
            "aVL" | "AVL" => Lead::AVL,
            "aVF" | "AVF" => Lead::AVF,
            "V1" => Lead::V1,
            "V2" => Lead::V2,
            "V3" => Lead::V3,
            "V4" => Lead::V4,
            "V5" => Lead::V5,
            "V6" => Lead::V6,
            _ => return Err(EcgError::UnknownLead(s.to_string())),
        };
        Ok(lead)
    }
}

/// Order in which the transport delivers directly acquired channels
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelLayout {
    channels: Vec<Lead>,
}

impl ChannelLayout {
    /// Create a layout, rejecting empty or duplicated channel lists
    pub fn new(channels: Vec<Lead>) -> EcgResult<Self> {
        let layout = Self { channels };
        layout.validate()?;
        Ok(layout)
    }

    /// Single directly acquired lead
    pub fn single(lead: Lead) -> Self {
        Self { channels: vec![lead] }
    }

    /// The 8-channel front-end order: lead I, V4, V5, lead II, V3, V6, V1, V2
    pub fn eight_channel() -> Self {
        Self {
            channels: vec![
                Lead::I,
                Lead::V4,
                Lead::V5,
                Lead::II,
                Lead::V3,
                Lead::V6,
                Lead::V1,
                Lead::V2,
            ],
        }
    }

    /// Number of values expected per tick
    pub fn arity(&self) -> usize {
        self.channels.len()
    }

    pub fn channels(&self) -> &[Lead] {
        &self.channels
    }

    pub fn acquires(&self, lead: Lead) -> bool {
        self.channels.contains(&lead)
    }

    /// True when the layout can produce `lead`, directly or through the limb relations
    pub fn supports(&self, lead: Lead) -> bool {
        self.acquires(lead)
            || (lead.is_derivable() && self.acquires(Lead::I) && self.acquires(Lead::II))
    }

    pub fn validate(&self) -> EcgResult<()> {
        if self.channels.is_empty() {
            return Err(crate::config_error!("channel layout must contain at least one lead"));
        }
        for (i, lead) in self.channels.iter().enumerate() {
            if self.channels[..i].contains(lead) {
                return Err(crate::config_error!("lead {} appears twice in the channel layout", lead));
            }
        }
        Ok(())
    }
}

impl Default for ChannelLayout {
    fn default() -> Self {
        ChannelLayout::single(Lead::II)
    }
}

/// Test selections offered by the monitor, each showing a fixed set of leads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TestProfile {
    LeadII,
    LeadIII,
    SevenLead,
    TwelveLead,
    LiveMonitoring,
}

impl TestProfile {
    /// Leads displayed for this test, in display order
    pub fn leads(&self) -> Vec<Lead> {
        match self {
            TestProfile::LeadII | TestProfile::LiveMonitoring => vec![Lead::II],
            TestProfile::LeadIII => vec![Lead::III],
            TestProfile::SevenLead => vec![
                Lead::V1,
                Lead::V2,
                Lead::V3,
                Lead::V4,
                Lead::V5,
                Lead::V6,
                Lead::II,
            ],
            TestProfile::TwelveLead => Lead::ALL.to_vec(),
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            TestProfile::LeadII => "Lead II ECG Test",
            TestProfile::LeadIII => "Lead III ECG Test",
            TestProfile::SevenLead => "7 Lead ECG Test",
            TestProfile::TwelveLead => "12 Lead ECG Test",
            TestProfile::LiveMonitoring => "ECG Live Monitoring",
        }
    }

    /// Check that every displayed lead can be produced by `layout`
    pub fn check_layout(&self, layout: &ChannelLayout) -> EcgResult<()> {
        match self.leads().into_iter().find(|lead| !layout.supports(*lead)) {
            Some(lead) => Err(EcgError::UnsupportedLead { lead }),
            None => Ok(()),
        }
    }
}

impl Default for TestProfile {
    fn default() -> Self {
        TestProfile::LeadII
    }
}

/// Amplitudes of every available lead at one sampling instant
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LeadFrame {
    values: [Option<f64>; Lead::COUNT],
}

impl LeadFrame {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a frame from raw channel values in layout order
    pub fn from_channels(layout: &ChannelLayout, values: &[f64]) -> EcgResult<Self> {
        if values.len() != layout.arity() {
            return Err(EcgError::TickArity {
                expected: layout.arity(),
                actual: values.len(),
            });
        }

        let mut frame = Self::new();
        for (lead, value) in layout.channels().iter().zip(values) {
            frame.set(*lead, *value);
        }
        Ok(frame)
    }

    pub fn get(&self, lead: Lead) -> Option<f64> {
        self.values[lead.index()]
    }

    pub fn set(&mut self, lead: Lead, value: f64) {
        self.values[lead.index()] = Some(value);
    }

    pub fn contains(&self, lead: Lead) -> bool {
        self.values[lead.index()].is_some()
    }

    /// Present leads with their values, in canonical lead order
    pub fn iter(&self) -> impl Iterator<Item = (Lead, f64)> + '_ {
        Lead::ALL
            .iter()
            .filter_map(move |lead| self.get(*lead).map(|value| (*lead, value)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lead_names_round_trip() {
        for lead in Lead::ALL {
            assert_eq!(lead.name().parse::<Lead>().unwrap(), lead);
        }
        assert_eq!("Lead II".parse::<Lead>().unwrap(), Lead::II);
        assert_eq!("L1".parse::<Lead>().unwrap(), Lead::I);
        assert!("V7".parse::<Lead>().is_err());
    }

    #[test]
    fn test_lead_serde_names() {
        assert_eq!(serde_json::to_string(&Lead::AVR).unwrap(), "\"aVR\"");
        let lead: Lead = serde_json::from_str("\"aVF\"").unwrap();
        assert_eq!(lead, Lead::AVF);
    }

    #[test]
    fn test_layout_rejects_duplicates() {
        assert!(ChannelLayout::new(vec![Lead::I, Lead::I]).is_err());
        assert!(ChannelLayout::new(Vec::new()).is_err());
        assert!(ChannelLayout::new(vec![Lead::I, Lead::II]).is_ok());
    }

    #[test]
    fn test_eight_channel_supports_twelve_leads() {
        let layout = ChannelLayout::eight_channel();
        assert_eq!(layout.arity(), 8);
        assert!(TestProfile::TwelveLead.check_layout(&layout).is_ok());
        assert!(TestProfile::SevenLead.check_layout(&layout).is_ok());
    }

    #[test]
    fn test_single_lead_layout_cannot_derive() {
        let layout = ChannelLayout::single(Lead::II);
        assert!(TestProfile::LeadII.check_layout(&layout).is_ok());
        match TestProfile::LeadIII.check_layout(&layout) {
            Err(EcgError::UnsupportedLead { lead }) => assert_eq!(lead, Lead::III),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_frame_from_channels() {
        let layout = ChannelLayout::eight_channel();
        let values = [1.0, 4.0, 5.0, 2.0, 3.0, 6.0, 7.0, 8.0];
        let frame = LeadFrame::from_channels(&layout, &values).unwrap();

        assert_eq!(frame.get(Lead::I), Some(1.0));
        assert_eq!(frame.get(Lead::II), Some(2.0));
        assert_eq!(frame.get(Lead::V2), Some(8.0));
        assert_eq!(frame.get(Lead::III), None);
        assert_eq!(frame.iter().count(), 8);

        assert!(LeadFrame::from_channels(&layout, &values[..7]).is_err());
    }
}
