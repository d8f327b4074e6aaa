//! ECG-Simulation: synthetic ECG generation for testing and development
//!
//! Produces PQRST waveforms with configurable rhythm, noise and interference, and
//! a simulated device implementing the `SampleSource` transport contract.

pub mod ecg_simulator;
pub mod rhythm_patterns;
pub mod simulated_source;

pub use ecg_simulator::*;
pub use rhythm_patterns::*;
pub use simulated_source::*;
