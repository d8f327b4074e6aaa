//! ECG-Processing: filtering, beat detection and the acquisition pipeline
//!
//! Stages run once per display tick on a snapshot of the lead buffers:
//! filter, centre, detect R peaks, locate P/Q/S/T, estimate the heart rate.

pub mod beat_detector;
pub mod config;
pub mod derived_leads;
pub mod filters;
pub mod heart_rate;
pub mod landmarks;
pub mod pipeline;
pub mod transport;

pub use beat_detector::{BeatDetector, Detection};
pub use config::{
    DecoderConfig, DetectionConfig, FilterSettings, LandmarkConfig, MainsFilter, MonitorConfig,
    WireFormat,
};
pub use derived_leads::{complete_frame, derive_limb_leads, DerivedLimbLeads};
pub use filters::{
    ButterworthFilter, FilterBank, FilterConfig, FilterKind, FilterMode, FilterType, NotchFilter,
    SampleFilter, SignalFilter, StreamingFilter,
};
pub use heart_rate::HeartRateEstimator;
pub use landmarks::LandmarkAnnotator;
pub use pipeline::{AcquisitionHandle, AcquisitionPipeline, ExportTable, IngestStats, PollOutcome};
pub use transport::{LineSource, TickDecoder};
