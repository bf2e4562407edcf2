use serde::Serialize;
use serde::ser::{SerializeStruct, Serializer};

use super::frame::{CompositorTiming, FrameClassification, FrameSample};

/// Upper bound on the ring capacity; well above any shipping headset.
pub const MAX_REFRESH_RATE_HZ: f32 = 1000.0;

/// Session-lifetime frame counters, cleared only by [`FrameHistory::reset`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FrameTotals {
    pub dropped: u64,
    pub missed: u64,
    pub throttled: u64,
    pub predicted: u64,
    pub total: u64,
}

impl FrameTotals {
    pub fn record(&mut self, timing: &CompositorTiming) {
        self.missed += u64::from(timing.num_mis_presented);
        self.predicted += u64::from(timing.predicted_frames());
        self.dropped += u64::from(timing.num_dropped_frames);
        self.throttled += u64::from(timing.throttled_frames());
        self.total += u64::from(timing.num_frame_presents);
    }
}

/// One second of classified frames per track, indexed by
/// `frame_index % capacity`.
#[derive(Debug, Clone)]
pub struct FrameHistory {
    cpu: Vec<FrameSample>,
    gpu: Vec<FrameSample>,
    cursor: usize,
    totals: FrameTotals,
}

impl FrameHistory {
    /// Ring sized to the refresh rate. Callers validate the rate first; the
    /// capacity is clamped to `1..=MAX_REFRESH_RATE_HZ` so indexing never wraps
    /// silently.
    pub fn new(refresh_rate_hz: f32) -> Self {
        let capacity = capacity_for(refresh_rate_hz);
        Self {
            cpu: vec![FrameSample::default(); capacity],
            gpu: vec![FrameSample::default(); capacity],
            cursor: 0,
            totals: FrameTotals::default(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.cpu.len()
    }

    /// Index the next sample will be written to.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn totals(&self) -> FrameTotals {
        self.totals
    }

    /// Writes both tracks at the cursor, then advances it.
    pub fn record(&mut self, frame: FrameClassification, timing: &CompositorTiming) {
        self.cpu[self.cursor] = frame.cpu;
        self.gpu[self.cursor] = frame.gpu;
        self.totals.record(timing);
        self.cursor = (self.cursor + 1) % self.capacity();
    }

    /// Samples stored at the cursor, i.e. the slot the next write replaces.
    pub fn at_cursor(&self) -> FrameClassification {
        FrameClassification {
            cpu: self.cpu[self.cursor],
            gpu: self.gpu[self.cursor],
        }
    }

    /// Raw ring storage, in slot order.
    pub fn cpu(&self) -> &[FrameSample] {
        &self.cpu
    }

    pub fn gpu(&self) -> &[FrameSample] {
        &self.gpu
    }

    /// Oldest to newest.
    pub fn cpu_chronological(&self) -> impl DoubleEndedIterator<Item = &FrameSample> {
        chronological(&self.cpu, self.cursor)
    }

    pub fn gpu_chronological(&self) -> impl DoubleEndedIterator<Item = &FrameSample> {
        chronological(&self.gpu, self.cursor)
    }

    pub fn reset(&mut self) {
        self.cpu.fill(FrameSample::default());
        self.gpu.fill(FrameSample::default());
        self.cursor = 0;
        self.totals = FrameTotals::default();
    }
}

/// Serialized as both tracks in chronological order, oldest first.
impl Serialize for FrameHistory {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("FrameHistory", 3)?;
        state.serialize_field("capacity", &self.capacity())?;
        state.serialize_field("cpu", &Chronological(&self.cpu, self.cursor))?;
        state.serialize_field("gpu", &Chronological(&self.gpu, self.cursor))?;
        state.end()
    }
}

struct Chronological<'a>(&'a [FrameSample], usize);

impl Serialize for Chronological<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(chronological(self.0, self.1))
    }
}

fn capacity_for(refresh_rate_hz: f32) -> usize {
    if !refresh_rate_hz.is_finite() {
        return 1;
    }
    refresh_rate_hz.round().clamp(1.0, MAX_REFRESH_RATE_HZ) as usize
}

fn chronological(ring: &[FrameSample], cursor: usize) -> impl DoubleEndedIterator<Item = &FrameSample> {
    ring[cursor..].iter().chain(ring[..cursor].iter())
}
