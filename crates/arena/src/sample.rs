use std::sync::Arc;

use crate::Chunk;

/// An immutable slice of arena memory: (chunk, start, length).
///
/// Distinct from a raw audio element -- a Sample is a window onto a chunk, not
/// the data itself. Cloning is cheap (one refcount bump). Adjusting a Sample
/// means constructing a new one with a shifted start or length.
#[derive(Clone)]
pub struct Sample {
    chunk: Arc<Chunk>,
    start: usize,
    len: usize,
    generation: u32,
}

impl Sample {
    /// A sample over an explicit chunk region. Callers own the region's
    /// lifecycle; `Pool` carving is the usual way to get one.
    pub fn new(chunk: Arc<Chunk>, start: usize, len: usize) -> Self {
        assert!(
            start + len <= chunk.capacity(),
            "sample extends past chunk capacity"
        );
        let generation = chunk.generation();
        Self {
            chunk,
            start,
            len,
            generation,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn chunk_id(&self) -> u32 {
        self.chunk.id()
    }

    /// True when `other` begins exactly where this sample ends, in the same
    /// chunk and generation.
    pub fn adjacent_to(&self, other: &Sample) -> bool {
        Arc::ptr_eq(&self.chunk, &other.chunk)
            && self.generation == other.generation
            && self.start + self.len == other.start
    }

    /// Combine two adjacent samples into one covering both ranges.
    pub fn merge_with(&self, other: &Sample) -> Sample {
        assert!(self.adjacent_to(other), "merging non-adjacent samples");
        Sample {
            chunk: self.chunk.clone(),
            start: self.start,
            len: self.len + other.len,
            generation: self.generation,
        }
    }

    /// A new sample with the first `n` elements removed.
    pub fn skip_front(&self, n: usize) -> Sample {
        assert!(n <= self.len, "skipping more than the sample length");
        Sample {
            chunk: self.chunk.clone(),
            start: self.start + n,
            len: self.len - n,
            generation: self.generation,
        }
    }

    /// A new sample holding only the first `new_len` elements.
    pub fn truncated(&self, new_len: usize) -> Sample {
        assert!(new_len <= self.len, "truncating past the sample length");
        Sample {
            chunk: self.chunk.clone(),
            start: self.start,
            len: new_len,
            generation: self.generation,
        }
    }

    /// A new sample holding only the last `n` elements.
    pub fn tail(&self, n: usize) -> Sample {
        self.skip_front(self.len - n)
    }

    /// Copy the whole region into the carved chunk memory. Called once by the
    /// allocator's owner, right after carving, before the Sample is shared.
    pub fn fill_from(&self, input: &[f32]) {
        assert_eq!(input.len(), self.len, "fill length mismatch");
        self.debug_check_generation();
        self.chunk.write_at(self.start, input);
    }

    pub fn read_into(&self, offset: usize, out: &mut [f32]) {
        assert!(offset + out.len() <= self.len, "read past sample length");
        self.debug_check_generation();
        self.chunk.read_into(self.start + offset, out);
    }

    pub fn value_at(&self, index: usize) -> f32 {
        assert!(index < self.len, "index past sample length");
        self.debug_check_generation();
        self.chunk.value_at(self.start + index)
    }

    pub fn to_vec(&self) -> Vec<f32> {
        let mut out = vec![0.0; self.len];
        self.read_into(0, &mut out);
        out
    }

    fn debug_check_generation(&self) {
        debug_assert_eq!(
            self.generation,
            self.chunk.generation(),
            "sample outlived a chunk reset (chunk {})",
            self.chunk.id()
        );
    }
}

impl std::fmt::Debug for Sample {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sample")
            .field("chunk", &self.chunk.id())
            .field("start", &self.start)
            .field("len", &self.len)
            .field("generation", &self.generation)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk_with(data: &[f32]) -> Arc<Chunk> {
        let chunk = Arc::new(Chunk::new(7, data.len().max(1)));
        chunk.append(data);
        chunk
    }

    #[test]
    fn adjacency_requires_same_chunk_and_touching_ranges() {
        let chunk = chunk_with(&[0.0; 8]);
        let a = Sample::new(chunk.clone(), 0, 3);
        let b = Sample::new(chunk.clone(), 3, 2);
        let c = Sample::new(chunk.clone(), 6, 2);
        assert!(a.adjacent_to(&b));
        assert!(!b.adjacent_to(&a));
        assert!(!a.adjacent_to(&c));

        let other = chunk_with(&[0.0; 8]);
        let d = Sample::new(other, 3, 2);
        assert!(!a.adjacent_to(&d));
    }

    #[test]
    fn merge_covers_both_ranges() {
        let chunk = chunk_with(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        let a = Sample::new(chunk.clone(), 0, 2);
        let b = Sample::new(chunk, 2, 3);
        let merged = a.merge_with(&b);
        assert_eq!(merged.len(), 5);
        assert_eq!(merged.to_vec(), vec![1.0, 2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    #[should_panic(expected = "merging non-adjacent samples")]
    fn merge_rejects_gap() {
        let chunk = chunk_with(&[0.0; 8]);
        let a = Sample::new(chunk.clone(), 0, 2);
        let b = Sample::new(chunk, 4, 2);
        let _ = a.merge_with(&b);
    }

    #[test]
    fn skip_and_truncate_adjust_geometry() {
        let chunk = chunk_with(&[1.0, 2.0, 3.0, 4.0]);
        let sample = Sample::new(chunk, 0, 4);
        assert_eq!(sample.skip_front(1).to_vec(), vec![2.0, 3.0, 4.0]);
        assert_eq!(sample.truncated(2).to_vec(), vec![1.0, 2.0]);
        assert_eq!(sample.tail(2).to_vec(), vec![3.0, 4.0]);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "sample outlived a chunk reset")]
    fn stale_generation_read_asserts() {
        let chunk = chunk_with(&[1.0, 2.0, 3.0, 4.0]);
        let sample = Sample::new(chunk.clone(), 0, 4);
        chunk.reset();
        let _ = sample.value_at(0);
    }
}
