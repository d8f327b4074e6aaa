//! ECG-Core: Foundation types for ECG acquisition and analysis
//!
//! Lead identifiers, rolling sample buffers, per-tick result types and the
//! transport contract shared by the processing, simulation and monitor crates.

pub mod error;
pub mod lead;
pub mod sample_buffer;
pub mod signal_types;
pub mod source;

pub use error::{EcgError, EcgResult};
pub use lead::*;
pub use sample_buffer::*;
pub use signal_types::*;
pub use source::*;
