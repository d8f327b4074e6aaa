//! Decoding of raw transport ticks and a line-oriented `SampleSource`

use crate::config::{DecoderConfig, WireFormat};
use ecg_core::{DeviceCommand, EcgError, EcgResult, SampleSource, SourceEvent};
use std::io::{BufRead, ErrorKind, Write};
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

/// Longest a paced poll sleeps before reporting an idle poll
const MAX_PACING_SLEEP: Duration = Duration::from_millis(20);

/// Strict all-or-nothing decoder for one tick of channel values
#[derive(Debug, Clone, PartialEq)]
pub struct TickDecoder {
    arity: usize,
    format: WireFormat,
    digit_window: Option<usize>,
}

impl TickDecoder {
    pub fn new(arity: usize, config: &DecoderConfig) -> Self {
        Self {
            arity,
            format: config.format,
            digit_window: config.digit_window,
        }
    }

    pub fn arity(&self) -> usize {
        self.arity
    }

    pub fn format(&self) -> WireFormat {
        self.format
    }

    /// Parse whitespace-separated numbers; any bad token or a count other than
    /// the arity rejects the whole line
    pub fn decode_line(&self, line: &str) -> EcgResult<Vec<f64>> {
        let line = line.trim();
        if line.is_empty() {
            return Err(EcgError::MalformedTick {
                reason: "empty line".to_string(),
            });
        }

        if let Some(window) = self.digit_window {
            if self.arity == 1 && line.bytes().all(|b| b.is_ascii_digit()) {
                let digits = &line[line.len().saturating_sub(window)..];
                return Ok(vec![parse_value(digits)?]);
            }
        }

        let values = line
            .split_whitespace()
            .map(parse_value)
            .collect::<EcgResult<Vec<f64>>>()?;

        if values.len() != self.arity {
            return Err(EcgError::TickArity {
                expected: self.arity,
                actual: values.len(),
            });
        }
        Ok(values)
    }

    /// Decode `arity` little-endian i16 values
    pub fn decode_binary(&self, frame: &[u8]) -> EcgResult<Vec<f64>> {
        if frame.len() != self.arity * 2 {
            return Err(EcgError::MalformedTick {
                reason: format!(
                    "binary frame of {} bytes, expected {}",
                    frame.len(),
                    self.arity * 2
                ),
            });
        }

        Ok(frame
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f64)
            .collect())
    }

    /// Decode one raw record in the configured wire format
    pub fn decode(&self, record: &[u8]) -> EcgResult<Vec<f64>> {
        match self.format {
            WireFormat::BinaryI16 => self.decode_binary(record),
            WireFormat::Ascii => {
                let text = std::str::from_utf8(record).map_err(|e| EcgError::MalformedTick {
                    reason: format!("invalid UTF-8: {}", e),
                })?;
                self.decode_line(text)
            }
        }
    }
}

fn parse_value(token: &str) -> EcgResult<f64> {
    let value: f64 = token.parse().map_err(|_| EcgError::MalformedTick {
        reason: format!("non-numeric token '{}'", token),
    })?;
    if !value.is_finite() {
        return Err(EcgError::MalformedTick {
            reason: format!("non-finite token '{}'", token),
        });
    }
    Ok(value)
}

/// Adapts a blocking reader with a short read timeout (a serial port handle, a
/// pipe, a recorded file) into a `SampleSource`.
///
/// ASCII records end at `\n`; binary records are fixed-size. Timeouts surface as
/// idle polls, end of stream and hard I/O errors as a disconnect.
pub struct LineSource<R> {
    reader: R,
    decoder: TickDecoder,
    pending: Vec<u8>,
    commands: Option<Box<dyn Write + Send>>,
    finished: bool,
    pacing: Option<Pacing>,
}

/// Release schedule for records read faster than they were acquired
#[derive(Debug, Clone, Copy)]
struct Pacing {
    rate_hz: f64,
    clock_start: Instant,
    released: u64,
}

impl Pacing {
    fn restart(&mut self) {
        self.clock_start = Instant::now();
        self.released = 0;
    }

    fn next_due(&self) -> Instant {
        self.clock_start + Duration::from_secs_f64(self.released as f64 / self.rate_hz)
    }

    /// Wait briefly for the next record's slot; false if it is still not due
    fn wait_turn(&self) -> bool {
        let due = self.next_due();
        let now = Instant::now();
        if due > now {
            std::thread::sleep((due - now).min(MAX_PACING_SLEEP));
            return Instant::now() >= due;
        }
        true
    }
}

impl<R: BufRead + Send> LineSource<R> {
    pub fn new(reader: R, decoder: TickDecoder) -> Self {
        Self {
            reader,
            decoder,
            pending: Vec::new(),
            commands: None,
            finished: false,
            pacing: None,
        }
    }

    /// Release records no faster than `rate_hz`, for replaying a recording at
    /// the speed it was acquired. Non-positive rates leave the source unpaced.
    pub fn paced(mut self, rate_hz: f64) -> Self {
        self.pacing = (rate_hz.is_finite() && rate_hz > 0.0).then(|| Pacing {
            rate_hz,
            clock_start: Instant::now(),
            released: 0,
        });
        self
    }

    /// Attach the device's command channel for start/stop requests
    pub fn with_command_sink(mut self, sink: Box<dyn Write + Send>) -> Self {
        self.commands = Some(sink);
        self
    }

    fn decode_pending(&mut self) -> SourceEvent {
        let record = std::mem::take(&mut self.pending);
        match self.decoder.decode(&record) {
            Ok(values) => SourceEvent::Frame(values),
            Err(e) => {
                warn!(error = %e, "discarding malformed tick");
                SourceEvent::Malformed(e.to_string())
            }
        }
    }

    fn disconnect(&mut self, reason: String) -> SourceEvent {
        if !self.finished {
            error!(%reason, "transport link lost");
        }
        self.finished = true;
        SourceEvent::Disconnected(reason)
    }

    fn poll_ascii(&mut self) -> SourceEvent {
        match self.reader.read_until(b'\n', &mut self.pending) {
            Ok(0) if self.pending.is_empty() => self.disconnect("end of stream".to_string()),
            // Either a complete line or a final unterminated one before EOF
            Ok(_) => self.decode_pending(),
            Err(e) => self.read_error(e),
        }
    }

    fn poll_binary(&mut self) -> SourceEvent {
        let record_len = self.decoder.arity() * 2;
        while self.pending.len() < record_len {
            let wanted = record_len - self.pending.len();
            let pending = &mut self.pending;
            let filled = self.reader.fill_buf().map(|buf| {
                let take = buf.len().min(wanted);
                pending.extend_from_slice(&buf[..take]);
                take
            });
            let taken = match filled {
                Ok(taken) => taken,
                Err(e) => return self.read_error(e),
            };
            if taken == 0 {
                return self.disconnect("end of stream".to_string());
            }
            self.reader.consume(taken);
        }
        self.decode_pending()
    }

    fn read_error(&mut self, e: std::io::Error) -> SourceEvent {
        match e.kind() {
            ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted => {
                SourceEvent::Idle
            }
            _ => self.disconnect(e.to_string()),
        }
    }
}

impl<R: BufRead + Send> SampleSource for LineSource<R> {
    fn poll(&mut self) -> SourceEvent {
        if self.finished {
            return SourceEvent::Disconnected("end of stream".to_string());
        }
        if let Some(pacing) = &self.pacing {
            if !pacing.wait_turn() {
                return SourceEvent::Idle;
            }
        }

        let event = match self.decoder.format() {
            WireFormat::Ascii => self.poll_ascii(),
            WireFormat::BinaryI16 => self.poll_binary(),
        };
        if let (Some(pacing), SourceEvent::Frame(_) | SourceEvent::Malformed(_)) =
            (self.pacing.as_mut(), &event)
        {
            pacing.released += 1;
        }
        event
    }

    fn arity(&self) -> usize {
        self.decoder.arity()
    }

    fn send_command(&mut self, command: DeviceCommand) -> EcgResult<()> {
        if let (DeviceCommand::Start, Some(pacing)) = (command, self.pacing.as_mut()) {
            pacing.restart();
        }
        if let Some(sink) = self.commands.as_mut() {
            sink.write_all(command.as_bytes())?;
            sink.flush()?;
            debug!(?command, "command sent to device");
        }
        Ok(())
    }
}
