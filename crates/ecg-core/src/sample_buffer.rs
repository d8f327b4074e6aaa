//! Fixed-capacity rolling sample windows, one per lead

use crate::error::{EcgError, EcgResult};
use crate::lead::{Lead, LeadFrame};
use crate::signal_types::BufferPhase;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Default window length in samples
pub const DEFAULT_CAPACITY: usize = 100;

/// Rolling window holding the most recent samples of one lead, oldest first
#[derive(Debug, Clone, PartialEq)]
pub struct LeadBuffer {
    samples: VecDeque<f64>,
    capacity: usize,
    total_pushed: u64,
    generation: u64,
}

impl LeadBuffer {
    pub fn new(capacity: usize) -> EcgResult<Self> {
        if capacity == 0 {
            return Err(crate::config_error!("buffer capacity must be at least one sample"));
        }

        Ok(LeadBuffer {
            samples: VecDeque::with_capacity(capacity),
            capacity,
            total_pushed: 0,
            generation: 0,
        })
    }

    /// Append one sample, evicting the oldest once the window is full
    pub fn push(&mut self, sample: f64) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
        self.total_pushed += 1;
    }

    /// Fixed-length copy of the window.
    ///
    /// During warm-up the copy is left-padded with the oldest available value (zero
    /// for an empty buffer) so downstream stages always see `capacity` samples.
    pub fn snapshot(&self) -> Vec<f64> {
        let pad_value = self.samples.front().copied().unwrap_or(0.0);
        let pad = self.capacity - self.samples.len();

        let mut window = Vec::with_capacity(self.capacity);
        window.extend(std::iter::repeat(pad_value).take(pad));
        window.extend(self.samples.iter().copied());
        window
    }

    /// Samples actually held, without padding
    pub fn contents(&self) -> Vec<f64> {
        self.samples.iter().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &f64> {
        self.samples.iter()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Samples pushed since creation or the last clear, including evicted ones
    pub fn total_pushed(&self) -> u64 {
        self.total_pushed
    }

    /// Number of times the buffer has been cleared
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_full(&self) -> bool {
        self.samples.len() == self.capacity
    }

    pub fn phase(&self) -> BufferPhase {
        if self.is_full() {
            BufferPhase::Steady
        } else {
            BufferPhase::Warming
        }
    }

    /// Drop every sample and start a new generation
    pub fn clear(&mut self) {
        self.samples.clear();
        self.total_pushed = 0;
        self.generation += 1;
    }
}

/// Point-in-time copy of one lead buffer handed to the processing tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BufferSnapshot {
    pub lead: Lead,
    /// Padded window, always `capacity` long
    pub window: Vec<f64>,
    /// Number of real samples in the window
    pub filled: usize,
    /// Push count of the current generation at the time of the snapshot
    pub total_pushed: u64,
    /// Bumped whenever the buffer is cleared
    #[serde(default)]
    pub generation: u64,
    pub phase: BufferPhase,
}

/// Lead buffers that advance in lockstep, one sample per lead per tick
#[derive(Debug, Clone)]
pub struct LeadSet {
    leads: Vec<Lead>,
    buffers: Vec<LeadBuffer>,
}

impl LeadSet {
    /// Create one buffer per lead; duplicated leads are rejected
    pub fn new(leads: &[Lead], capacity: usize) -> EcgResult<Self> {
        if leads.is_empty() {
            return Err(crate::config_error!("lead set must contain at least one lead"));
        }

        let mut ordered: Vec<Lead> = Vec::with_capacity(leads.len());
        for lead in leads {
            if ordered.contains(lead) {
                return Err(crate::config_error!("lead {} requested twice", lead));
            }
            ordered.push(*lead);
        }

        let buffers = ordered
            .iter()
            .map(|_| LeadBuffer::new(capacity))
            .collect::<EcgResult<Vec<_>>>()?;

        Ok(LeadSet {
            leads: ordered,
            buffers,
        })
    }

    /// Append one instant to every buffer.
    ///
    /// The frame must carry a value for every owned lead; otherwise nothing is
    /// appended, so buffer lengths never diverge.
    pub fn push_frame(&mut self, frame: &LeadFrame) -> EcgResult<()> {
        if let Some(missing) = self.leads.iter().find(|lead| !frame.contains(**lead)) {
            return Err(EcgError::MalformedTick {
                reason: format!("frame has no value for lead {}", missing),
            });
        }

        for (lead, buffer) in self.leads.iter().zip(self.buffers.iter_mut()) {
            if let Some(value) = frame.get(*lead) {
                buffer.push(value);
            }
        }
        Ok(())
    }

    pub fn leads(&self) -> &[Lead] {
        &self.leads
    }

    pub fn get(&self, lead: Lead) -> Option<&LeadBuffer> {
        self.leads
            .iter()
            .position(|l| *l == lead)
            .map(|idx| &self.buffers[idx])
    }

    pub fn iter(&self) -> impl Iterator<Item = (Lead, &LeadBuffer)> {
        self.leads.iter().copied().zip(self.buffers.iter())
    }

    /// Copy every buffer at once
    pub fn snapshot(&self) -> Vec<BufferSnapshot> {
        self.iter()
            .map(|(lead, buffer)| BufferSnapshot {
                lead,
                window: buffer.snapshot(),
                filled: buffer.len(),
                total_pushed: buffer.total_pushed(),
                generation: buffer.generation(),
                phase: buffer.phase(),
            })
            .collect()
    }

    /// Number of real samples per buffer (identical across the set)
    pub fn len(&self) -> usize {
        self.buffers.first().map(LeadBuffer::len).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.buffers.first().map(LeadBuffer::capacity).unwrap_or(0)
    }

    /// Rows of `(sample_index, value per lead)` in chronological order
    pub fn rows(&self) -> Vec<(usize, Vec<f64>)> {
        (0..self.len())
            .map(|idx| {
                let values = self
                    .buffers
                    .iter()
                    .map(|buffer| buffer.samples[idx])
                    .collect();
                (idx, values)
            })
            .collect()
    }

    pub fn clear(&mut self) {
        for buffer in &mut self.buffers {
            buffer.clear();
        }
    }
}
