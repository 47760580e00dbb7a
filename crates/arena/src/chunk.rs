use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

/// A fixed-capacity backing buffer in the audio arena.
///
/// Elements are stored as `f32` bit patterns in relaxed atomics so the capture
/// callback can write freshly carved regions while other threads read already
/// published regions, without a lock on the hot path. A region is written
/// exactly once, by the thread that carved it, before the `Sample` referencing
/// it is shared.
///
/// `reset()` rewinds the allocation cursor and bumps the generation counter.
/// Samples remember the generation they were carved from, so a read through a
/// stale Sample trips a debug assertion instead of silently returning recycled
/// data.
pub struct Chunk {
    id: u32,
    generation: AtomicU32,
    cursor: AtomicUsize,
    data: Box<[AtomicU32]>,
}

impl Chunk {
    pub(crate) fn new(id: u32, capacity: usize) -> Self {
        assert!(capacity > 0, "chunk capacity must be greater than 0");
        let mut data = Vec::with_capacity(capacity);
        data.resize_with(capacity, || AtomicU32::new(0.0f32.to_bits()));
        Self {
            id,
            generation: AtomicU32::new(0),
            cursor: AtomicUsize::new(0),
            data: data.into_boxed_slice(),
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Elements allocated so far.
    pub fn len(&self) -> usize {
        self.cursor.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn remaining(&self) -> usize {
        self.capacity() - self.len()
    }

    pub fn generation(&self) -> u32 {
        self.generation.load(Ordering::Acquire)
    }

    /// Reserve `len` elements, returning the start index of the carved region.
    /// Returns None when the chunk does not have room for the whole request;
    /// a carved region never spans two chunks.
    pub(crate) fn reserve(&self, len: usize) -> Option<usize> {
        let start = self.cursor.load(Ordering::Acquire);
        if len > self.capacity() - start {
            return None;
        }
        self.cursor.store(start + len, Ordering::Release);
        Some(start)
    }

    /// Append as much of `input` as fits, advancing the cursor. Returns the
    /// number of elements written. Only the chunk's current owner may append.
    pub fn append(&self, input: &[f32]) -> usize {
        let start = self.cursor.load(Ordering::Acquire);
        let n = input.len().min(self.capacity() - start);
        self.write_at(start, &input[..n]);
        self.cursor.store(start + n, Ordering::Release);
        n
    }

    pub(crate) fn write_at(&self, index: usize, input: &[f32]) {
        assert!(
            index + input.len() <= self.capacity(),
            "write past chunk capacity"
        );
        for (slot, &value) in self.data[index..index + input.len()].iter().zip(input) {
            slot.store(value.to_bits(), Ordering::Relaxed);
        }
    }

    pub(crate) fn read_into(&self, index: usize, out: &mut [f32]) {
        let n = out.len();
        assert!(index + n <= self.capacity(), "read past chunk capacity");
        for (value, slot) in out.iter_mut().zip(&self.data[index..index + n]) {
            *value = f32::from_bits(slot.load(Ordering::Relaxed));
        }
    }

    pub(crate) fn value_at(&self, index: usize) -> f32 {
        f32::from_bits(self.data[index].load(Ordering::Relaxed))
    }

    /// Rewind the cursor for reuse. Only permitted once no live Sample still
    /// reads the overwritten region; the generation bump lets stale Samples
    /// assert in debug builds.
    pub fn reset(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.cursor.store(0, Ordering::Release);
    }
}
