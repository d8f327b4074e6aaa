//! Contract between the acquisition transport and the pipeline

use crate::error::EcgResult;
use serde::{Deserialize, Serialize};

/// Control commands understood by the acquisition front-end
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceCommand {
    Start,
    Stop,
}

impl DeviceCommand {
    /// Wire encoding: an ASCII digit terminated by CRLF
    pub fn as_bytes(&self) -> &'static [u8] {
        match self {
            DeviceCommand::Start => b"1\r\n",
            DeviceCommand::Stop => b"0\r\n",
        }
    }
}

/// Outcome of one poll of the transport
#[derive(Debug, Clone, PartialEq)]
pub enum SourceEvent {
    /// Raw channel values for one tick, in layout order
    Frame(Vec<f64>),
    /// A tick arrived but could not be decoded; it is dropped whole
    Malformed(String),
    /// Nothing arrived within the read timeout
    Idle,
    /// The link is gone and will not recover
    Disconnected(String),
}

/// A transport the producer thread can poll.
///
/// `poll` must return within a short timeout (tens of milliseconds) so the
/// producer can observe stop requests.
pub trait SampleSource: Send {
    fn poll(&mut self) -> SourceEvent;

    /// Number of channel values carried by each frame
    fn arity(&self) -> usize;

    /// Forward a start/stop request to the device; sources without a control
    /// channel ignore it
    fn send_command(&mut self, _command: DeviceCommand) -> EcgResult<()> {
        Ok(())
    }
}

impl<S: SampleSource + ?Sized> SampleSource for Box<S> {
    fn poll(&mut self) -> SourceEvent {
        (**self).poll()
    }

    fn arity(&self) -> usize {
        (**self).arity()
    }

    fn send_command(&mut self, command: DeviceCommand) -> EcgResult<()> {
        (**self).send_command(command)
    }
}

/// Replays a fixed list of events, then reports a disconnect
#[derive(Debug, Clone, Default)]
pub struct ScriptedSource {
    events: std::collections::VecDeque<SourceEvent>,
    arity: usize,
}

impl ScriptedSource {
    pub fn new(arity: usize, events: impl IntoIterator<Item = SourceEvent>) -> Self {
        Self {
            events: events.into_iter().collect(),
            arity,
        }
    }
}

impl SampleSource for ScriptedSource {
    fn poll(&mut self) -> SourceEvent {
        self.events
            .pop_front()
            .unwrap_or_else(|| SourceEvent::Disconnected("script exhausted".to_string()))
    }

    fn arity(&self) -> usize {
        self.arity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripted_source_ends_with_disconnect() {
        let mut source = ScriptedSource::new(1, vec![SourceEvent::Frame(vec![1.0]), SourceEvent::Idle]);
        assert_eq!(source.poll(), SourceEvent::Frame(vec![1.0]));
        assert_eq!(source.poll(), SourceEvent::Idle);
        assert!(matches!(source.poll(), SourceEvent::Disconnected(_)));
        assert!(matches!(source.poll(), SourceEvent::Disconnected(_)));
    }

    #[test]
    fn test_command_encoding() {
        assert_eq!(DeviceCommand::Start.as_bytes(), b"1\r\n");
        assert_eq!(DeviceCommand::Stop.as_bytes(), b"0\r\n");
    }

    #[test]
    fn test_boxed_source() {
        let mut source: Box<dyn SampleSource> =
            Box::new(ScriptedSource::new(2, vec![SourceEvent::Frame(vec![1.0, 2.0])]));
        assert_eq!(source.arity(), 2);
        assert_eq!(source.poll(), SourceEvent::Frame(vec![1.0, 2.0]));
    }
}
