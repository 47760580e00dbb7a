use std::sync::{Arc, Mutex};

use crate::{ArenaError, Chunk, Sample};

/// Sizing for the session's audio arena. All chunks are allocated up front;
/// nothing is freed until the session ends.
#[derive(Debug, Clone, Copy)]
pub struct ArenaConfig {
    pub chunk_capacity: usize,
    pub chunk_count: usize,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        // 128 chunks of 1s mono at 48kHz
        Self {
            chunk_capacity: 48_000,
            chunk_count: 128,
        }
    }
}

/// Owns every Chunk for a session and hands them out, never getting them back.
///
/// Sample carving goes through a per-owner [`SampleAllocator`]; the pool
/// itself only tracks which chunk slots are still unused. The mutex covers
/// that single cursor: the control thread may grab whole chunks for a new
/// recording's pre-roll while a capture-side allocator rolls to its next
/// chunk, so the two must serialize, but neither ever holds the lock across a
/// copy.
///
/// Running out of chunks is a capacity-planning bug, not a runtime condition:
/// allocation panics rather than returning an error, because the capture
/// callback has no safe recovery from a missing buffer.
pub struct Pool {
    chunks: Vec<Arc<Chunk>>,
    zero: Arc<Chunk>,
    chunk_capacity: usize,
    next_free: Mutex<usize>,
}

impl Pool {
    pub fn new(config: ArenaConfig) -> Result<Self, ArenaError> {
        if config.chunk_capacity == 0 {
            return Err(ArenaError::ZeroChunkCapacity);
        }
        // Two recycle chunks plus a boundary slot plus room to record.
        if config.chunk_count < 8 {
            return Err(ArenaError::TooFewChunks {
                needed: 8,
                got: config.chunk_count,
            });
        }

        let chunks = (0..config.chunk_count)
            .map(|id| Arc::new(Chunk::new(id as u32, config.chunk_capacity)))
            .collect();
        let zero = Arc::new(Chunk::new(config.chunk_count as u32, config.chunk_capacity));

        Ok(Self {
            chunks,
            zero,
            chunk_capacity: config.chunk_capacity,
            next_free: Mutex::new(0),
        })
    }

    pub fn chunk_capacity(&self) -> usize {
        self.chunk_capacity
    }

    /// Hand out the next unused chunk wholesale, advancing the cursor by two
    /// slots so the following chunk acts as a boundary. Used when reseeding a
    /// recycle target after its history is spliced into a new recording.
    pub fn allocate_chunk(&self) -> Arc<Chunk> {
        let mut next_free = self.next_free.lock().unwrap();
        let chunk = self
            .chunks
            .get(*next_free)
            .unwrap_or_else(|| panic!("audio arena exhausted ({} chunks)", self.chunks.len()))
            .clone();
        *next_free += 2;
        chunk
    }

    /// The next unused chunk for an allocator that rolled off its current one.
    pub(crate) fn next_chunk(&self) -> Arc<Chunk> {
        let mut next_free = self.next_free.lock().unwrap();
        let chunk = self
            .chunks
            .get(*next_free)
            .unwrap_or_else(|| panic!("audio arena exhausted ({} chunks)", self.chunks.len()))
            .clone();
        *next_free += 1;
        chunk
    }

    /// A read-only zero-filled sample from the reserved zero chunk. Cheap
    /// filler for pre-roll that predates the session.
    pub fn zero_sample(&self, len: usize) -> Sample {
        assert!(
            len <= self.chunk_capacity,
            "zero sample request of {len} elements exceeds chunk capacity {}",
            self.chunk_capacity
        );
        Sample::new(self.zero.clone(), 0, len)
    }
}

/// A private carving cursor over the pool.
///
/// Every writer that grows a track owns its own allocator, so two channels
/// recording at the same time carve from different chunks: each track's
/// consecutive samples stay adjacent and keep coalescing instead of
/// interleaving with the other channel's.
#[derive(Default)]
pub struct SampleAllocator {
    current: Option<Arc<Chunk>>,
}

impl SampleAllocator {
    pub fn new() -> Self {
        Self { current: None }
    }

    /// Carve `len` elements from the current chunk, rolling to a fresh chunk
    /// when the current one cannot hold the whole request.
    pub fn allocate(&mut self, pool: &Pool, len: usize) -> Sample {
        assert!(
            len <= pool.chunk_capacity(),
            "sample request of {len} elements exceeds chunk capacity {}",
            pool.chunk_capacity()
        );
        loop {
            if let Some(chunk) = &self.current {
                if let Some(start) = chunk.reserve(len) {
                    return Sample::new(chunk.clone(), start, len);
                }
            }
            self.current = Some(pool.next_chunk());
        }
    }

    /// Stop carving the current chunk; the next allocate starts fresh.
    pub fn end_chunk(&mut self) {
        self.current = None;
    }
}
