use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use looper_arena::{Chunk, Pool, Sample, SampleAllocator};
use looper_transport::Track;

/// A destination for freshly captured audio. The capture callback pushes every
/// incoming buffer through exactly one target.
pub trait SampleTarget {
    fn push(&mut self, input: &[f32]);
}

/// Which concrete target the capture callback should dispatch to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TargetKind {
    Recycle = 0,
    Track = 1,
}

/// The single authoritative idle/recording transition, as one atomic byte.
///
/// Written at a state transition, read once per callback. A reader that sees
/// the previous value routes one buffer to the previous destination; that
/// staleness window is bounded to one callback and is pinned down in the
/// station tests.
pub struct ActiveTargetCell(AtomicU8);

impl ActiveTargetCell {
    pub fn new() -> Self {
        Self(AtomicU8::new(TargetKind::Recycle as u8))
    }

    pub fn set(&self, kind: TargetKind) {
        self.0.store(kind as u8, Ordering::Release);
    }

    pub fn get(&self) -> TargetKind {
        match self.0.load(Ordering::Acquire) {
            0 => TargetKind::Recycle,
            _ => TargetKind::Track,
        }
    }
}

impl Default for ActiveTargetCell {
    fn default() -> Self {
        Self::new()
    }
}

/// Always-running history buffer: the source of pre-roll.
///
/// Two alternating chunks. Incoming audio fills the current chunk; when it
/// would overflow, the standby chunk is reset and becomes current, and the
/// just-filled chunk is kept whole as the previous accumulator. Except at
/// session start there is always at least one full chunk of immediate history
/// on hand.
pub struct RecycleTarget {
    current: Arc<Chunk>,
    standby: Arc<Chunk>,
}

impl RecycleTarget {
    pub fn new(pool: &Pool) -> Self {
        Self {
            current: pool.allocate_chunk(),
            standby: pool.allocate_chunk(),
        }
    }

    fn rotate(&mut self) {
        self.standby.reset();
        std::mem::swap(&mut self.current, &mut self.standby);
    }

    fn current_sample(&self) -> Sample {
        Sample::new(self.current.clone(), 0, self.current.len())
    }

    fn previous_sample(&self) -> Option<Sample> {
        (!self.standby.is_empty())
            .then(|| Sample::new(self.standby.clone(), 0, self.standby.len()))
    }

    /// Elements of history currently on hand.
    pub fn history_len(&self) -> usize {
        self.current.len() + self.standby.len()
    }

    /// Splice the most recent `n` elements of history into `target`, oldest
    /// first, padding with zero filler when the session is younger than `n`.
    /// Goes through `push_sample` so the already-carved history is never
    /// copied.
    pub fn splice_tail_into(&self, n: usize, pool: &Pool, target: &mut TrackTarget<'_>) {
        let current = self.current_sample();
        let previous = self.previous_sample();

        let from_current = n.min(current.len());
        let from_previous = (n - from_current).min(previous.as_ref().map_or(0, Sample::len));
        let zeros = n - from_current - from_previous;

        if zeros > 0 {
            target.push_sample(pool.zero_sample(zeros));
        }
        if let Some(previous) = previous {
            if from_previous > 0 {
                target.push_sample(previous.tail(from_previous));
            }
        }
        if from_current > 0 {
            target.push_sample(current.tail(from_current));
        }
    }

    /// Abandon both chunks (their ownership passes logically to the track the
    /// history was just spliced into) and start over on fresh chunks.
    pub fn reseed(&mut self, pool: &Pool) {
        self.current = pool.allocate_chunk();
        self.standby = pool.allocate_chunk();
    }
}

impl SampleTarget for RecycleTarget {
    fn push(&mut self, input: &[f32]) {
        let mut rest = input;
        while !rest.is_empty() {
            let written = self.current.append(rest);
            rest = &rest[written..];
            if !rest.is_empty() {
                self.rotate();
            }
        }
    }
}

/// Appends into the track currently being recorded.
///
/// Borrowed fresh for each push; the track and its carving allocator stay
/// owned by the recorder state machine, so concurrent recorders never share
/// a chunk and each track's samples keep coalescing.
pub struct TrackTarget<'a> {
    pool: &'a Pool,
    allocator: &'a mut SampleAllocator,
    track: &'a mut Track,
}

impl<'a> TrackTarget<'a> {
    pub fn new(pool: &'a Pool, allocator: &'a mut SampleAllocator, track: &'a mut Track) -> Self {
        Self {
            pool,
            allocator,
            track,
        }
    }

    /// Splice an already-carved Sample (pre-roll) without a copy round trip.
    pub fn push_sample(&mut self, sample: Sample) {
        self.track.append(sample);
    }
}

impl SampleTarget for TrackTarget<'_> {
    fn push(&mut self, input: &[f32]) {
        let sample = self.allocator.allocate(self.pool, input.len());
        sample.fill_from(input);
        self.track.append(sample);
    }
}
