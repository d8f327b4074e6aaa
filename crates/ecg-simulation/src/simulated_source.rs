//! Simulated acquisition device
//!
//! Wraps `EcgSimulator` behind the `SampleSource` contract so the pipeline and the
//! monitor service can run without hardware.

use crate::ecg_simulator::EcgSimulator;
use ecg_core::{ChannelLayout, DeviceCommand, EcgResult, SampleSource, SourceEvent};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Longest a paced poll sleeps before reporting an idle poll
const MAX_PACING_SLEEP: Duration = Duration::from_millis(20);

pub struct SimulatedSource {
    simulator: EcgSimulator,
    layout: ChannelLayout,
    paced: bool,
    streaming: bool,
    clock_start: Instant,
    since_start: u64,
    emitted: u64,
    max_frames: Option<u64>,
}

impl SimulatedSource {
    /// Unpaced source that streams immediately
    pub fn new(simulator: EcgSimulator, layout: ChannelLayout) -> Self {
        Self {
            simulator,
            layout,
            paced: false,
            streaming: true,
            clock_start: Instant::now(),
            since_start: 0,
            emitted: 0,
            max_frames: None,
        }
    }

    /// Emit frames no faster than the simulator's sample rate
    pub fn paced(mut self) -> Self {
        self.paced = true;
        self.clock_start = Instant::now();
        self.since_start = 0;
        self
    }

    /// Disconnect after `frames` frames, like a recording that ends
    pub fn with_max_frames(mut self, frames: u64) -> Self {
        self.max_frames = Some(frames);
        self
    }

    /// Wait for a start command before streaming
    pub fn awaiting_start(mut self) -> Self {
        self.streaming = false;
        self
    }

    pub fn emitted(&self) -> u64 {
        self.emitted
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    pub fn simulator(&self) -> &EcgSimulator {
        &self.simulator
    }

    fn next_due(&self) -> Instant {
        let rate = self.simulator.config().sample_rate_hz;
        self.clock_start + Duration::from_secs_f64(self.since_start as f64 / rate)
    }
}

impl SampleSource for SimulatedSource {
    fn poll(&mut self) -> SourceEvent {
        if self.max_frames.is_some_and(|limit| self.emitted >= limit) {
            return SourceEvent::Disconnected("simulation finished".to_string());
        }
        if !self.streaming {
            return SourceEvent::Idle;
        }

        if self.paced {
            let due = self.next_due();
            let now = Instant::now();
            if due > now {
                std::thread::sleep((due - now).min(MAX_PACING_SLEEP));
                if Instant::now() < due {
                    return SourceEvent::Idle;
                }
            }
        }

        self.since_start += 1;
        self.emitted += 1;
        SourceEvent::Frame(self.simulator.next_frame(&self.layout))
    }

    fn arity(&self) -> usize {
        self.layout.arity()
    }

    fn send_command(&mut self, command: DeviceCommand) -> EcgResult<()> {
        match command {
            DeviceCommand::Start => {
                if !self.streaming {
                    info!("simulated device streaming");
                }
                self.streaming = true;
                self.clock_start = Instant::now();
                self.since_start = 0;
            }
            DeviceCommand::Stop => {
                self.streaming = false;
                debug!(emitted = self.emitted, "simulated device paused");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecg_simulator::SimulatorConfig;
    use ecg_core::Lead;

    fn source(layout: ChannelLayout) -> SimulatedSource {
        let simulator = EcgSimulator::new(SimulatorConfig::clean(50.0, 75.0)).unwrap();
        SimulatedSource::new(simulator, layout)
    }

    #[test]
    fn test_frames_match_layout() {
        let mut source = source(ChannelLayout::eight_channel());
        assert_eq!(source.arity(), 8);
        match source.poll() {
            SourceEvent::Frame(values) => assert_eq!(values.len(), 8),
            other => panic!("expected a frame, got {other:?}"),
        }
    }

    #[test]
    fn test_max_frames_disconnects() {
        let mut source = source(ChannelLayout::single(Lead::II)).with_max_frames(3);
        for _ in 0..3 {
            assert!(matches!(source.poll(), SourceEvent::Frame(_)));
        }
        assert!(matches!(source.poll(), SourceEvent::Disconnected(_)));
        assert_eq!(source.emitted(), 3);
    }

    #[test]
    fn test_start_stop_commands() {
        let mut source = source(ChannelLayout::single(Lead::II)).awaiting_start();
        assert_eq!(source.poll(), SourceEvent::Idle);

        source.send_command(DeviceCommand::Start).unwrap();
        assert!(matches!(source.poll(), SourceEvent::Frame(_)));

        source.send_command(DeviceCommand::Stop).unwrap();
        assert!(!source.is_streaming());
        assert_eq!(source.poll(), SourceEvent::Idle);
    }

    #[test]
    fn test_pacing_limits_rate() {
        let simulator = EcgSimulator::new(SimulatorConfig::clean(200.0, 75.0)).unwrap();
        let mut source = SimulatedSource::new(simulator, ChannelLayout::single(Lead::II)).paced();

        let started = Instant::now();
        let mut frames = 0;
        while frames < 5 {
            if let SourceEvent::Frame(_) = source.poll() {
                frames += 1;
            }
        }
        // Frame 4 is due 20 ms after the first
        assert!(started.elapsed() >= Duration::from_millis(19));
    }
}
